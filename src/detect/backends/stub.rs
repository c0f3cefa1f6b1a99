use anyhow::Result;

use crate::detect::backend::InferenceBackend;
use crate::detect::result::RawDetection;
use crate::ingest::Frame;

/// Stub backend for development and tests.
///
/// Ignores pixel content and emits deterministic detections driven by an
/// internal tick counter: one face orbiting the frame centre, a second face
/// that periodically drifts past the right edge, and one low-confidence
/// candidate that a default threshold filters out.
#[derive(Default)]
pub struct StubBackend {
    tick: u64,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InferenceBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn infer(&mut self, _frame: &Frame) -> Result<Vec<RawDetection>> {
        self.tick += 1;
        let phase = self.tick as f32 * 0.1;

        let cx = 0.5 + 0.25 * phase.cos();
        let cy = 0.5 + 0.2 * phase.sin();
        let mut out = vec![RawDetection::new(
            0.92,
            cx - 0.1,
            cy - 0.13,
            cx + 0.1,
            cy + 0.13,
        )];

        if (self.tick / 25) % 2 == 1 {
            let drift = (self.tick % 25) as f32 / 25.0;
            let x1 = 0.8 + 0.2 * drift;
            out.push(RawDetection::new(0.71, x1, 0.1, x1 + 0.15, 0.32));
        }

        out.push(RawDetection::new(0.3, 0.05, 0.7, 0.12, 0.8));
        Ok(out)
    }
}
