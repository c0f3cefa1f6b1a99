//! V4L2 camera source (feature: ingest-v4l2).
//!
//! A numeric source identifier `N` opens `/dev/videoN`. The source asks the
//! driver for packed RGB and falls back to YUYV, converting in memory. Frames
//! are never buffered beyond the driver's mmap ring.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;

use super::convert;
use super::{Frame, FrameSource};

const PREFERRED_WIDTH: u32 = 640;
const PREFERRED_HEIGHT: u32 = 480;
const BUFFER_COUNT: u32 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PixelLayout {
    Rgb3,
    Yuyv,
}

impl PixelLayout {
    fn from_fourcc(fourcc: v4l::FourCC) -> Option<Self> {
        match &fourcc.repr {
            b"RGB3" => Some(Self::Rgb3),
            b"YUYV" => Some(Self::Yuyv),
            _ => None,
        }
    }
}

#[self_referencing]
struct CaptureState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

pub struct CameraSource {
    path: String,
    state: Option<CaptureState>,
    layout: PixelLayout,
    width: u32,
    height: u32,
    stride: u32,
    frame_count: u64,
}

impl CameraSource {
    /// Open `/dev/video<index>` and start streaming.
    pub fn open(index: u32) -> Result<Self> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let path = format!("/dev/video{index}");
        let mut device = v4l::Device::with_path(&path)
            .with_context(|| format!("failed to open camera {path}"))?;

        let layout = negotiate_format(&mut device, &path)?;
        let format = device.format().context("read v4l2 format")?;

        let state = CaptureStateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, BUFFER_COUNT)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        log::info!(
            "CameraSource: connected to {} ({}x{} {:?})",
            path,
            format.width,
            format.height,
            layout
        );
        Ok(Self {
            path,
            state: Some(state),
            layout,
            width: format.width,
            height: format.height,
            stride: format.stride,
            frame_count: 0,
        })
    }
}

fn negotiate_format(device: &mut v4l::Device, path: &str) -> Result<PixelLayout> {
    use v4l::video::Capture;

    for fourcc in [b"RGB3", b"YUYV"] {
        let mut format = device.format().context("read v4l2 format")?;
        format.width = PREFERRED_WIDTH;
        format.height = PREFERRED_HEIGHT;
        format.fourcc = v4l::FourCC::new(fourcc);
        match device.set_format(&format) {
            Ok(actual) => {
                if let Some(layout) = PixelLayout::from_fourcc(actual.fourcc) {
                    return Ok(layout);
                }
            }
            Err(err) => log::warn!(
                "CameraSource: {} rejected {}: {}",
                path,
                String::from_utf8_lossy(fourcc),
                err
            ),
        }
    }
    Err(anyhow!(
        "camera {} supports neither RGB3 nor YUYV capture",
        path
    ))
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        use v4l::io::traits::CaptureStream;

        let Some(state) = self.state.as_mut() else {
            return Ok(None);
        };
        let raw = state.with_stream_mut(|stream| {
            stream.next().map(|(buf, meta)| {
                let used = (meta.bytesused as usize).min(buf.len());
                let used = if used == 0 { buf.len() } else { used };
                buf[..used].to_vec()
            })
        });
        let raw = raw.with_context(|| format!("capture frame from {}", self.path))?;

        let pixels = match self.layout {
            PixelLayout::Rgb3 => {
                let row_bytes = self.width as usize * 3;
                let stride = (self.stride as usize).max(row_bytes);
                convert::pack_rows(&raw, row_bytes, stride, self.height as usize)?
            }
            PixelLayout::Yuyv => convert::yuyv_to_rgb(&raw, self.width, self.height)?,
        };
        self.frame_count += 1;
        Frame::new(pixels, self.width, self.height).map(Some)
    }

    fn close(&mut self) {
        if self.state.take().is_some() {
            log::info!(
                "CameraSource: closed {} after {} frames",
                self.path,
                self.frame_count
            );
        }
    }
}
