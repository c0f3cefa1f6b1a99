use anyhow::Result;

use crate::detect::result::RawDetection;
use crate::ingest::Frame;

/// Inference backend trait.
///
/// A backend owns its loaded model for its whole lifetime. It turns one frame
/// into normalized detections and knows nothing about thresholds or pixel
/// clamping; the detector loop applies those.
pub trait InferenceBackend {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run inference on a frame.
    ///
    /// An error means this frame produced no usable output (malformed tensor,
    /// shape mismatch). It is never fatal to the caller.
    fn infer(&mut self, frame: &Frame) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook, run once at startup.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release model resources. Must be idempotent.
    fn close(&mut self) {}
}
