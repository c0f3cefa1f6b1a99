//! Raw detections to published detections.

use chrono::{DateTime, Utc};

use crate::detect::result::RawDetection;
use crate::snapshot::{Detection, Rect};

/// Scale a normalized box to pixels and clamp it into the frame.
///
/// Coordinates are truncated toward zero. Negative or inverted extents collapse
/// to a zero-area box at the clamped corner instead of being dropped.
pub fn clamp_box(raw: &RawDetection, frame_width: u32, frame_height: u32) -> Rect {
    let w = i64::from(frame_width);
    let h = i64::from(frame_height);
    let scale = |n: f32, extent: i64| (f64::from(n) * extent as f64) as i64;

    let x1 = scale(raw.x1, w).clamp(0, w);
    let y1 = scale(raw.y1, h).clamp(0, h);
    let x2 = scale(raw.x2, w).clamp(x1, w);
    let y2 = scale(raw.y2, h).clamp(y1, h);

    // frame dimensions are u32; values past i32 are saturated
    let narrow = |v: i64| i32::try_from(v).unwrap_or(i32::MAX);
    Rect {
        x: narrow(x1),
        y: narrow(y1),
        width: narrow(x2 - x1),
        height: narrow(y2 - y1),
    }
}

/// Keep detections at or above `threshold`, convert them to pixel space and
/// number them by their position in the kept list.
pub fn select_detections(
    raw: &[RawDetection],
    threshold: f32,
    frame_width: u32,
    frame_height: u32,
    timestamp: DateTime<Utc>,
) -> Vec<Detection> {
    raw.iter()
        .filter(|det| det.confidence >= threshold)
        .enumerate()
        .map(|(id, det)| Detection {
            id,
            bbox: clamp_box(det, frame_width, frame_height),
            landmarks: Vec::new(),
            score: f64::from(det.confidence.clamp(0.0, 1.0)),
            timestamp,
        })
        .collect()
}
