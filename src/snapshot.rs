//! Published detection results.
//!
//! A `Snapshot` is the unit of publication: the detector loop builds one per tick
//! and hands it to the `SnapshotStore` whole. Field names here are the `/faces`
//! wire contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bounding box in pixels relative to the captured frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }
}

/// 2D landmark point. Most backends leave the landmark list empty.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: i32,
    pub y: i32,
}

/// A single detected face.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Position in this snapshot's detection list. Not an identity across snapshots.
    pub id: usize,
    pub bbox: Rect,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub landmarks: Vec<Landmark>,
    pub score: f64,
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
}

/// Latest result of one detection cycle.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub source: String,
    pub frame: u64,
    pub frame_width: u32,
    pub frame_height: u32,
    pub detections: Vec<Detection>,
    pub generated_at: DateTime<Utc>,
}

impl Snapshot {
    /// Serialize for the `/faces` body (pretty-printed, trailing newline).
    pub fn to_json_body(&self) -> serde_json::Result<Vec<u8>> {
        let mut body = serde_json::to_vec_pretty(self)?;
        body.push(b'\n');
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn sample() -> Snapshot {
        let ts: DateTime<Utc> = "2024-05-01T12:00:00Z".parse().unwrap();
        Snapshot {
            source: "stub://camera0".to_string(),
            frame: 7,
            frame_width: 640,
            frame_height: 480,
            detections: vec![Detection {
                id: 0,
                bbox: Rect {
                    x: 10,
                    y: 20,
                    width: 30,
                    height: 40,
                },
                landmarks: Vec::new(),
                score: 0.75,
                timestamp: ts,
            }],
            generated_at: ts,
        }
    }

    #[test]
    fn wire_field_names_match_contract() {
        let value: Value = serde_json::from_slice(&sample().to_json_body().unwrap()).unwrap();
        for key in [
            "source",
            "frame",
            "frame_width",
            "frame_height",
            "detections",
            "generated_at",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        let det = &value["detections"][0];
        assert_eq!(det["id"], 0);
        assert_eq!(det["bbox"]["width"], 30);
        assert_eq!(det["ts"], "2024-05-01T12:00:00Z");
        assert!(det.get("landmarks").is_none());
    }

    #[test]
    fn landmarks_serialized_when_present() {
        let mut snap = sample();
        snap.detections[0].landmarks = vec![Landmark { x: 1, y: 2 }];
        let value: Value = serde_json::from_slice(&snap.to_json_body().unwrap()).unwrap();
        assert_eq!(value["detections"][0]["landmarks"][0]["y"], 2);
    }

    #[test]
    fn default_snapshot_is_zero_value() {
        let snap = Snapshot::default();
        assert_eq!(snap.frame, 0);
        assert_eq!((snap.frame_width, snap.frame_height), (0, 0));
        assert!(snap.detections.is_empty());
        assert_eq!(snap.generated_at.timestamp(), 0);
    }

    #[test]
    fn rect_edges() {
        let r = Rect {
            x: 5,
            y: 6,
            width: 10,
            height: 0,
        };
        assert_eq!(r.right(), 15);
        assert_eq!(r.bottom(), 6);
    }
}
