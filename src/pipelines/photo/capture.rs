// SPDX-License-Identifier: MPL-2.0

//! Photo capture from the active camera session
//!
//! Grabs the latest frame without interrupting the stream and turns it into
//! the image that gets saved: the front photo carries the mask overlay and is
//! mirrored to match the preview, the back photo is the raw frame.

use crate::backends::camera::{CameraFrame, DeviceMediaAccess, Facing};
use crate::compositor::composite_over;
use image::RgbaImage;
use image::imageops::flip_horizontal_in_place;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Photo capture handler
pub struct PhotoCapture;

impl PhotoCapture {
    /// Latest frame of the active session
    ///
    /// Fails if there is no session or the frame has no pixels.
    pub fn snapshot(media: &DeviceMediaAccess) -> Result<Arc<CameraFrame>, String> {
        let frame = media
            .current_frame()
            .ok_or_else(|| "No frame available".to_string())?;

        if frame.is_empty() {
            return Err(format!(
                "Frame has no pixels ({}x{})",
                frame.width, frame.height
            ));
        }

        debug!(
            width = frame.width,
            height = frame.height,
            sequence = frame.sequence,
            "Frame captured from session"
        );
        Ok(frame)
    }

    /// Build the saved image for a frame
    ///
    /// `overlay` is drawn in frame coordinates before any mirroring, so a
    /// mask drawn over a face in the raw frame stays on that face.
    pub fn compose(
        frame: &CameraFrame,
        facing: Facing,
        overlay: Option<&RgbaImage>,
    ) -> Result<RgbaImage, String> {
        let mut image = frame
            .to_rgba_image()
            .ok_or_else(|| "Frame has no pixels".to_string())?;

        if let Some(overlay) = overlay {
            if !composite_over(&mut image, overlay) {
                warn!(
                    frame = ?image.dimensions(),
                    overlay = ?overlay.dimensions(),
                    "Overlay size does not match frame, capturing without mask"
                );
            }
        }

        if facing.is_mirrored() {
            flip_horizontal_in_place(&mut image);
        }

        info!(%facing, width = image.width(), height = image.height(), "Photo composed");
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn gradient(width: u32, height: u32) -> CameraFrame {
        let mut data = Vec::new();
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[x as u8, y as u8, 0, 255]);
            }
        }
        CameraFrame::from_rgba(width, height, data, 1)
    }

    #[test]
    fn test_front_is_mirrored() {
        let frame = gradient(4, 2);
        let image = PhotoCapture::compose(&frame, Facing::Front, None).unwrap();
        assert_eq!(image.get_pixel(0, 0)[0], 3);
        assert_eq!(image.get_pixel(3, 1)[0], 0);
    }

    #[test]
    fn test_back_is_untouched() {
        let frame = gradient(4, 2);
        let image = PhotoCapture::compose(&frame, Facing::Back, None).unwrap();
        assert_eq!(image.as_raw().as_slice(), &frame.data[..]);
    }

    #[test]
    fn test_overlay_is_mirrored_with_frame() {
        let frame = gradient(4, 1);
        let mut overlay = RgbaImage::new(4, 1);
        overlay.put_pixel(0, 0, Rgba([255, 255, 255, 255]));

        let image = PhotoCapture::compose(&frame, Facing::Front, Some(&overlay)).unwrap();
        assert_eq!(image.get_pixel(3, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(image.get_pixel(0, 0)[0], 3);
    }

    #[test]
    fn test_empty_frame_fails() {
        assert!(PhotoCapture::compose(&CameraFrame::empty(0), Facing::Front, None).is_err());
    }
}
