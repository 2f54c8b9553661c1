// SPDX-License-Identifier: MPL-2.0

//! Async photo encoding
//!
//! Captured frames leave the capture screen as JPEG data URIs. Encoding is
//! CPU-bound, so it runs on the blocking pool.

use crate::constants::JpegQualityPreset;
use crate::media::encode_data_uri;
use image::{DynamicImage, RgbImage, RgbaImage};
use tracing::{debug, info};

/// Encoded photo ready for the handoff
#[derive(Debug, Clone)]
pub struct EncodedPhoto {
    pub data_uri: String,
    pub width: u32,
    pub height: u32,
    /// Size of the JPEG before base64
    pub encoded_bytes: usize,
}

/// JPEG photo encoder
#[derive(Debug, Clone, Copy, Default)]
pub struct PhotoEncoder {
    quality: JpegQualityPreset,
}

impl PhotoEncoder {
    pub fn new(quality: JpegQualityPreset) -> Self {
        Self { quality }
    }

    pub fn quality(&self) -> JpegQualityPreset {
        self.quality
    }

    /// Encode an RGBA image as a JPEG data URI
    pub async fn encode(&self, image: RgbaImage) -> Result<EncodedPhoto, String> {
        info!(
            width = image.width(),
            height = image.height(),
            quality = self.quality.quality(),
            "Starting encoding"
        );

        let quality = self.quality;
        tokio::task::spawn_blocking(move || Self::encode_blocking(image, quality))
            .await
            .map_err(|e| format!("Encoding task error: {}", e))?
    }

    /// Encode on the current thread
    pub fn encode_blocking(
        image: RgbaImage,
        quality: JpegQualityPreset,
    ) -> Result<EncodedPhoto, String> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err("Frame has no pixels".to_string());
        }

        // JPEG has no alpha channel
        let rgb = DynamicImage::ImageRgba8(image).to_rgb8();
        let data = Self::encode_jpeg(&rgb, quality)?;
        debug!(size = data.len(), "Encoding complete");

        Ok(EncodedPhoto {
            data_uri: encode_data_uri("image/jpeg", &data),
            width,
            height,
            encoded_bytes: data.len(),
        })
    }

    fn encode_jpeg(image: &RgbImage, quality: JpegQualityPreset) -> Result<Vec<u8>, String> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);

        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality.quality());

        encoder
            .encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| format!("JPEG encoding failed: {}", e))?;

        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::ImageDataUri;

    #[tokio::test]
    async fn test_encode_produces_jpeg_data_uri() {
        let image = RgbaImage::from_pixel(8, 6, image::Rgba([10, 200, 30, 255]));
        let encoded = PhotoEncoder::default().encode(image).await.unwrap();
        assert_eq!((encoded.width, encoded.height), (8, 6));

        let parsed = ImageDataUri::parse(&encoded.data_uri).unwrap();
        assert_eq!(parsed.mime, "image/jpeg");
        assert_eq!(parsed.bytes.len(), encoded.encoded_bytes);

        let decoded = image::load_from_memory(&parsed.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 6));
    }

    #[test]
    fn test_empty_image_is_rejected() {
        assert!(PhotoEncoder::encode_blocking(RgbaImage::new(0, 0), JpegQualityPreset::High).is_err());
    }
}
