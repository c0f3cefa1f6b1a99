/// One normalized detection as reported by an inference backend.
///
/// Coordinates are fractions of the frame (`0..1` nominally, but backends may
/// report values outside that range; post-processing clamps them).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawDetection {
    pub confidence: f32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl RawDetection {
    pub fn new(confidence: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            confidence,
            x1,
            y1,
            x2,
            y2,
        }
    }
}

/// Result of one `DetectionPort::detect` call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PortReading {
    pub source: String,
    pub detections: Vec<RawDetection>,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl PortReading {
    /// Reading for a tick where no frame was read: no detections, 0x0.
    pub fn empty(source: &str) -> Self {
        Self {
            source: source.to_string(),
            ..Self::default()
        }
    }
}
