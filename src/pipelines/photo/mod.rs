// SPDX-License-Identifier: MPL-2.0

//! Async photo capture pipeline
//!
//! ```text
//! Active session → Snapshot → Compose (overlay, mirror) → JPEG data URI
//!       ↓
//! Preview continues uninterrupted
//! ```

pub mod capture;
pub mod encoding;

pub use capture::PhotoCapture;
pub use encoding::{EncodedPhoto, PhotoEncoder};

use crate::backends::camera::{DeviceMediaAccess, Facing};
use crate::constants::JpegQualityPreset;
use image::RgbaImage;

/// Snapshot, compose and encode in one step
#[derive(Debug, Clone, Copy, Default)]
pub struct PhotoPipeline {
    encoder: PhotoEncoder,
}

impl PhotoPipeline {
    pub fn new(quality: JpegQualityPreset) -> Self {
        Self {
            encoder: PhotoEncoder::new(quality),
        }
    }

    /// Capture the active session's current frame as a data URI
    pub async fn capture(
        &self,
        media: &DeviceMediaAccess,
        facing: Facing,
        overlay: Option<&RgbaImage>,
    ) -> Result<EncodedPhoto, String> {
        let frame = PhotoCapture::snapshot(media)?;
        let image = PhotoCapture::compose(&frame, facing, overlay)?;
        self.encoder.encode(image).await
    }
}
