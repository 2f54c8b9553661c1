// SPDX-License-Identifier: GPL-3.0-only

//! Overlay drawing primitives
//!
//! All colors are straight (non-premultiplied) RGBA.

use crate::constants::mask::SCALE;
use crate::tracking::FaceRegion;
use image::{Rgba, RgbaImage};

/// Blend `src` over `dst` (Porter-Duff source-over)
#[inline]
pub fn blend_over(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let sa = src[3] as f32 / 255.0;
    if sa <= 0.0 {
        return dst;
    }
    if sa >= 1.0 {
        return src;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    let mut out = [0u8; 4];
    for c in 0..3 {
        let value = (src[c] as f32 * sa + dst[c] as f32 * da * (1.0 - sa)) / out_a;
        out[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}

/// Bilinear sample at continuous pixel coordinates, clamped to the edges
fn sample_bilinear(img: &RgbaImage, x: f32, y: f32) -> Rgba<u8> {
    let (w, h) = img.dimensions();
    let max_x = (w - 1) as f32;
    let max_y = (h - 1) as f32;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = img.get_pixel(x0, y0);
    let p10 = img.get_pixel(x1, y0);
    let p01 = img.get_pixel(x0, y1);
    let p11 = img.get_pixel(x1, y1);

    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
        let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

/// Square the mask is drawn into: center, side length and rotation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskPlacement {
    pub center_x: f32,
    pub center_y: f32,
    pub side: f32,
    /// Radians, clockwise in image coordinates
    pub angle: f32,
}

impl MaskPlacement {
    pub fn for_region(region: &FaceRegion) -> Self {
        let (center_x, center_y) = region.bbox.center();
        Self {
            center_x,
            center_y,
            side: region.bbox.max_side() * SCALE,
            angle: region.roll(),
        }
    }

    /// Position inside the unrotated square for a point, `None` if outside
    ///
    /// Returned coordinates are in 0..=1 on both axes.
    pub fn local(&self, x: f32, y: f32) -> Option<(f32, f32)> {
        let dx = x - self.center_x;
        let dy = y - self.center_y;
        let (sin, cos) = self.angle.sin_cos();
        // Rotate back by -angle
        let u = dx * cos + dy * sin;
        let v = -dx * sin + dy * cos;
        let half = self.side / 2.0;
        if u.abs() > half || v.abs() > half {
            return None;
        }
        Some(((u + half) / self.side, (v + half) / self.side))
    }
}

/// Draw `mask` onto `overlay` at `placement`
///
/// Each covered overlay pixel is mapped back into the mask and sampled
/// bilinearly, then blended over what is already there.
pub fn draw_mask(overlay: &mut RgbaImage, mask: &RgbaImage, placement: &MaskPlacement) {
    let (ow, oh) = overlay.dimensions();
    let (mw, mh) = mask.dimensions();
    if ow == 0 || oh == 0 || mw == 0 || mh == 0 || placement.side <= 0.0 {
        return;
    }

    // Bounding box of the rotated square
    let reach = placement.side * std::f32::consts::FRAC_1_SQRT_2;
    let x_start = (placement.center_x - reach).floor().max(0.0) as u32;
    let y_start = (placement.center_y - reach).floor().max(0.0) as u32;
    let x_end = ((placement.center_x + reach).ceil().max(0.0) as u32).min(ow);
    let y_end = ((placement.center_y + reach).ceil().max(0.0) as u32).min(oh);

    for y in y_start..y_end {
        for x in x_start..x_end {
            let Some((u, v)) = placement.local(x as f32 + 0.5, y as f32 + 0.5) else {
                continue;
            };
            let src = sample_bilinear(mask, u * mw as f32 - 0.5, v * mh as f32 - 0.5);
            let dst = overlay.get_pixel_mut(x, y);
            *dst = blend_over(*dst, src);
        }
    }
}

/// Draw one mask per face region
pub fn draw_regions(overlay: &mut RgbaImage, mask: &RgbaImage, regions: &[FaceRegion]) {
    for region in regions {
        draw_mask(overlay, mask, &MaskPlacement::for_region(region));
    }
}

/// Composite `overlay` onto `base` in place
///
/// Dimensions must match; a mismatched overlay is ignored.
pub fn composite_over(base: &mut RgbaImage, overlay: &RgbaImage) -> bool {
    if base.dimensions() != overlay.dimensions() {
        return false;
    }
    for (dst, src) in base.pixels_mut().zip(overlay.pixels()) {
        *dst = blend_over(*dst, *src);
    }
    true
}
