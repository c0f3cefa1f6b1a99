//! Still-image frame source.
//!
//! Reads a single image file, or cycles through the images of a directory in
//! name order. Decode failures are logged and reported as "no frame".

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use super::{has_image_extension, Frame, FrameSource};

pub struct ImageSource {
    paths: Vec<PathBuf>,
    next: usize,
    closed: bool,
}

impl ImageSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let paths = if path.is_dir() {
            let mut paths = Vec::new();
            for entry in std::fs::read_dir(path)
                .with_context(|| format!("failed to read image directory {}", path.display()))?
            {
                let entry_path = entry?.path();
                if has_image_extension(&entry_path) {
                    paths.push(entry_path);
                }
            }
            paths.sort();
            paths
        } else if path.is_file() {
            vec![path.to_path_buf()]
        } else {
            return Err(anyhow!("image source {} does not exist", path.display()));
        };
        if paths.is_empty() {
            return Err(anyhow!("no images found in {}", path.display()));
        }
        log::info!(
            "ImageSource: opened {} ({} image(s))",
            path.display(),
            paths.len()
        );
        Ok(Self {
            paths,
            next: 0,
            closed: false,
        })
    }

    fn read(path: &Path) -> Result<Frame> {
        let rgb = ::image::open(path)
            .with_context(|| format!("failed to decode {}", path.display()))?
            .to_rgb8();
        let (width, height) = rgb.dimensions();
        Frame::new(rgb.into_raw(), width, height)
    }
}

impl FrameSource for ImageSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.closed {
            return Ok(None);
        }
        let path = &self.paths[self.next];
        self.next = (self.next + 1) % self.paths.len();
        match Self::read(path) {
            Ok(frame) => Ok(Some(frame)),
            Err(err) => {
                log::warn!("ImageSource: {:#}", err);
                Ok(None)
            }
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
