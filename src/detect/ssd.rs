//! Decoding of SSD detection-output tensors.
//!
//! Caffe/ONNX SSD heads emit `[1, 1, N, 7]` rows of
//! `(image_id, class_id, confidence, x1, y1, x2, y2)` with normalized corners.

use anyhow::{anyhow, Result};

use crate::detect::result::RawDetection;

pub const SSD_ROW_LEN: usize = 7;

/// Decode a flattened SSD output into raw detections, one per row.
///
/// No confidence filtering happens here. An empty tensor is zero detections;
/// a length that is not a whole number of rows is malformed.
pub fn decode_rows(values: &[f32]) -> Result<Vec<RawDetection>> {
    if values.len() % SSD_ROW_LEN != 0 {
        return Err(anyhow!(
            "malformed SSD output: {} values is not a multiple of {}",
            values.len(),
            SSD_ROW_LEN
        ));
    }
    Ok(values
        .chunks_exact(SSD_ROW_LEN)
        .map(|row| RawDetection::new(row[2], row[3], row[4], row[5], row[6]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_rows_in_order() {
        let values = [
            0.0, 1.0, 0.95, 0.1, 0.2, 0.3, 0.4, //
            0.0, 1.0, 0.10, 0.5, 0.5, 0.6, 0.6,
        ];
        let dets = decode_rows(&values).unwrap();
        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0], RawDetection::new(0.95, 0.1, 0.2, 0.3, 0.4));
        assert_eq!(dets[1].confidence, 0.10);
    }

    #[test]
    fn empty_output_is_no_detections() {
        assert!(decode_rows(&[]).unwrap().is_empty());
    }

    #[test]
    fn partial_row_is_malformed() {
        assert!(decode_rows(&[0.0; 10]).is_err());
    }
}
