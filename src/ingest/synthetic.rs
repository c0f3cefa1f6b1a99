//! Synthetic frame source (`stub://`) for development and tests.

use anyhow::Result;

use super::{Frame, FrameSource};

pub const SYNTHETIC_WIDTH: u32 = 640;
pub const SYNTHETIC_HEIGHT: u32 = 480;

/// Generates a slowly changing pattern frame on every read.
pub struct SyntheticSource {
    name: String,
    frame_count: u64,
    scene_state: u8,
    closed: bool,
}

impl SyntheticSource {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        log::info!("SyntheticSource: connected to stub://{}", name);
        Self {
            name,
            frame_count: 0,
            scene_state: 0,
            closed: false,
        }
    }

    fn generate_pixels(&mut self) -> Vec<u8> {
        let pixel_count = (SYNTHETIC_WIDTH * SYNTHETIC_HEIGHT * 3) as usize;
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let offset = self.frame_count + u64::from(self.scene_state);
        (0..pixel_count)
            .map(|i| ((i as u64 / 3 + offset) % 256) as u8)
            .collect()
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.closed {
            return Ok(None);
        }
        self.frame_count += 1;
        let pixels = self.generate_pixels();
        Frame::new(pixels, SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT).map(Some)
    }

    fn close(&mut self) {
        if !self.closed {
            log::info!(
                "SyntheticSource: closed stub://{} after {} frames",
                self.name,
                self.frame_count
            );
            self.closed = true;
        }
    }
}
