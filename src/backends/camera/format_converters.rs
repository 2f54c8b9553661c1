// SPDX-License-Identifier: GPL-3.0-only
//! Pixel format conversion to RGBA
//!
//! Capture devices deliver MJPEG, packed YUV 4:2:2 or raw RGB. Everything
//! downstream (readiness checks, overlay compositing, JPEG encoding) works on
//! tightly packed RGBA, so each raw V4L2 buffer goes through one of these.

/// Convert one BT.601 YUV sample to RGBA
#[inline]
fn yuv_pixel(y: f32, u: f32, v: f32) -> [u8; 4] {
    let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
    let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
    let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
    [r, g, b, 255]
}

/// Convert packed 4:2:2 data to RGBA
///
/// `order` gives the byte positions of (Y0, U, Y1, V) inside each 4-byte group.
fn packed_422_to_rgba(data: &[u8], width: u32, height: u32, order: [usize; 4]) -> Vec<u8> {
    let pixel_count = (width * height) as usize;
    let mut rgba = Vec::with_capacity(pixel_count * 4);

    // Each 4-byte group encodes 2 pixels sharing U and V
    for chunk in data.chunks_exact(4) {
        let y0 = chunk[order[0]] as f32;
        let u = chunk[order[1]] as f32 - 128.0;
        let y1 = chunk[order[2]] as f32;
        let v = chunk[order[3]] as f32 - 128.0;

        for y in [y0, y1] {
            if rgba.len() >= pixel_count * 4 {
                break;
            }
            rgba.extend_from_slice(&yuv_pixel(y, u, v));
        }
    }

    // Short buffers are padded with black so the frame keeps its dimensions
    rgba.resize(pixel_count * 4, 0);
    rgba
}

/// Convert YUYV (Y0 U0 Y1 V0) to RGBA
///
/// This is the uncompressed format nearly every UVC webcam offers.
pub fn yuyv_to_rgba(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    packed_422_to_rgba(data, width, height, [0, 1, 2, 3])
}

/// Convert UYVY (U0 Y0 V0 Y1) to RGBA
pub fn uyvy_to_rgba(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    packed_422_to_rgba(data, width, height, [1, 0, 3, 2])
}

/// Convert RGB to RGBA by adding alpha=255
pub fn rgb_to_rgba(rgb: &[u8]) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(rgb.len() / 3 * 4);
    for chunk in rgb.chunks_exact(3) {
        rgba.extend_from_slice(&[chunk[0], chunk[1], chunk[2], 255]);
    }
    rgba
}

/// Convert 8-bit grayscale to RGBA
pub fn gray_to_rgba(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let pixel_count = (width * height) as usize;
    let mut rgba = Vec::with_capacity(pixel_count * 4);

    for &gray in data.iter().take(pixel_count) {
        rgba.extend_from_slice(&[gray, gray, gray, 255]);
    }

    rgba.resize(pixel_count * 4, 0);
    rgba
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_gray_level() {
        // Y=128 with neutral chroma is mid gray
        let data = vec![128u8, 128, 128, 128];
        let rgba = yuyv_to_rgba(&data, 2, 1);
        assert_eq!(rgba, vec![128, 128, 128, 255, 128, 128, 128, 255]);
    }

    #[test]
    fn test_uyvy_matches_yuyv_reordered() {
        let yuyv = vec![200u8, 90, 40, 160];
        let uyvy = vec![90u8, 200, 160, 40];
        assert_eq!(yuyv_to_rgba(&yuyv, 2, 1), uyvy_to_rgba(&uyvy, 2, 1));
    }

    #[test]
    fn test_short_buffer_is_padded() {
        let rgba = yuyv_to_rgba(&[16, 128, 16, 128], 4, 1);
        assert_eq!(rgba.len(), 16);
        assert_eq!(&rgba[8..], &[0u8; 8]);
    }

    #[test]
    fn test_rgb_to_rgba() {
        let rgb = vec![255, 0, 0, 0, 255, 0];
        let rgba = rgb_to_rgba(&rgb);
        assert_eq!(rgba, vec![255, 0, 0, 255, 0, 255, 0, 255]);
    }

    #[test]
    fn test_gray_to_rgba() {
        assert_eq!(gray_to_rgba(&[7], 1, 1), vec![7, 7, 7, 255]);
    }
}
