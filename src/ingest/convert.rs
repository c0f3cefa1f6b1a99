//! Pixel layout conversions shared by the capture sources.

use anyhow::{anyhow, Result};

/// Copy `height` rows of `row_bytes` out of a buffer whose rows are `stride` apart.
pub fn pack_rows(data: &[u8], row_bytes: usize, stride: usize, height: usize) -> Result<Vec<u8>> {
    if stride == row_bytes {
        let len = row_bytes * height;
        return data
            .get(..len)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| anyhow!("frame buffer holds {} bytes, expected {}", data.len(), len));
    }
    if stride < row_bytes {
        return Err(anyhow!(
            "row stride {} is shorter than a {}-byte row",
            stride,
            row_bytes
        ));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height);
    for row in 0..height {
        let start = row * stride;
        pixels.extend_from_slice(
            data.get(start..start + row_bytes)
                .ok_or_else(|| anyhow!("frame row {} is out of bounds", row))?,
        );
    }
    Ok(pixels)
}

/// Convert packed YUYV 4:2:2 to RGB8 (BT.601, limited range).
pub fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    if width % 2 != 0 {
        return Err(anyhow!("YUYV frame width {} is not even", width));
    }
    let pixel_count = width as usize * height as usize;
    let expected = pixel_count * 2;
    let data = data
        .get(..expected)
        .ok_or_else(|| anyhow!("YUYV buffer holds {} bytes, expected {}", data.len(), expected))?;

    let mut rgb = Vec::with_capacity(pixel_count * 3);
    for chunk in data.chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        rgb.extend_from_slice(&ycbcr_to_rgb(y0, u, v));
        rgb.extend_from_slice(&ycbcr_to_rgb(y1, u, v));
    }
    Ok(rgb)
}

fn ycbcr_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = (i32::from(y) - 16).max(0) * 298;
    let d = i32::from(u) - 128;
    let e = i32::from(v) - 128;
    let clamp = |value: i32| ((value + 128) >> 8).clamp(0, 255) as u8;
    [
        clamp(c + 409 * e),
        clamp(c - 100 * d - 208 * e),
        clamp(c + 516 * d),
    ]
}
