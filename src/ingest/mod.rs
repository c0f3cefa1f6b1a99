//! Frame acquisition sources.
//!
//! This module provides the sources a detection port can read frames from:
//! - Synthetic source (`stub://<name>`) for development and tests
//! - Still images from a file or directory (feature: ingest-image)
//! - V4L2 cameras by index, `0` is `/dev/video0` (feature: ingest-v4l2)
//! - Video files and network streams through FFmpeg (feature: ingest-ffmpeg)
//!
//! A source whose feature is not compiled in fails to open with an error
//! naming the feature.
//!
//! A source never blocks for longer than one read attempt. "No frame right now"
//! is `Ok(None)`, not an error.

pub mod convert;
#[cfg(feature = "ingest-image")]
pub mod images;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;
#[cfg(feature = "ingest-ffmpeg")]
pub mod video;

use std::path::Path;

use anyhow::{anyhow, Result};

#[cfg(feature = "ingest-image")]
pub use images::ImageSource;
pub use synthetic::SyntheticSource;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::CameraSource;
#[cfg(feature = "ingest-ffmpeg")]
pub use video::VideoSource;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// One captured RGB8 frame.
#[derive(Clone, Debug)]
pub struct Frame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                pixels.len()
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
        })
    }

    /// Packed RGB8 pixels, row-major.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// Producer of frames for the detection port.
pub trait FrameSource {
    /// Read the next frame, or `None` when none is available right now.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release the underlying handle. Must be idempotent.
    fn close(&mut self) {}
}

/// Parsed form of a source identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Synthetic(String),
    Camera(u32),
    Network(String),
    Path(String),
}

impl SourceKind {
    pub fn parse(id: &str) -> Result<Self> {
        let id = id.trim();
        if id.is_empty() {
            return Err(anyhow!("video source identifier is empty"));
        }
        if let Some(name) = id.strip_prefix("stub://") {
            return Ok(Self::Synthetic(name.to_string()));
        }
        if id.contains("://") {
            return Ok(Self::Network(id.to_string()));
        }
        if id.bytes().all(|b| b.is_ascii_digit()) {
            let index = id
                .parse()
                .map_err(|_| anyhow!("camera index out of range: {}", id))?;
            return Ok(Self::Camera(index));
        }
        Ok(Self::Path(id.to_string()))
    }
}

/// Open the source named by `id`. Failure here is a startup error.
pub fn open_source(id: &str) -> Result<Box<dyn FrameSource>> {
    match SourceKind::parse(id)? {
        SourceKind::Synthetic(name) => Ok(Box::new(SyntheticSource::new(name))),
        SourceKind::Camera(index) => open_camera(index),
        SourceKind::Network(url) => open_video(&url),
        SourceKind::Path(path) if is_still_image_path(Path::new(&path)) => open_images(&path),
        SourceKind::Path(path) => open_video(&path),
    }
}

/// Directories and image files go to the still-image source; anything else
/// is treated as a video file.
pub fn is_still_image_path(path: &Path) -> bool {
    path.is_dir() || has_image_extension(path)
}

pub(crate) fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

#[cfg(feature = "ingest-image")]
fn open_images(path: &str) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(ImageSource::open(path)?))
}

#[cfg(not(feature = "ingest-image"))]
fn open_images(path: &str) -> Result<Box<dyn FrameSource>> {
    Err(anyhow!(
        "image source {} requires the ingest-image feature",
        path
    ))
}

#[cfg(feature = "ingest-v4l2")]
fn open_camera(index: u32) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(CameraSource::open(index)?))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_camera(index: u32) -> Result<Box<dyn FrameSource>> {
    Err(anyhow!(
        "camera index {} requires the ingest-v4l2 feature",
        index
    ))
}

#[cfg(feature = "ingest-ffmpeg")]
fn open_video(uri: &str) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(VideoSource::open(uri)?))
}

#[cfg(not(feature = "ingest-ffmpeg"))]
fn open_video(uri: &str) -> Result<Box<dyn FrameSource>> {
    Err(anyhow!(
        "video source {} requires the ingest-ffmpeg feature",
        uri
    ))
}
