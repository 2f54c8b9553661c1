// SPDX-License-Identifier: MPL-2.0

//! Image data URIs (`data:image/<subtype>;base64,<payload>`)

use crate::constants::extension_for_mime;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

/// Why a string was not accepted as an image data URI
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataUriError {
    #[error("Not an image data URI")]
    Malformed,
    #[error("Unsupported image type: {0}")]
    UnsupportedMime(String),
    #[error("Image data is empty")]
    Empty,
    #[error("Image data is not valid base64")]
    InvalidBase64,
}

/// Split a data URI into its MIME type and base64 payload
fn split(uri: &str) -> Option<(&str, &str)> {
    let rest = uri.strip_prefix("data:")?;
    let (mime, payload) = rest.split_once(";base64,")?;
    let subtype = mime.strip_prefix("image/")?;
    let valid_subtype = !subtype.is_empty()
        && subtype
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-'));
    if !valid_subtype || payload.is_empty() {
        return None;
    }
    Some((mime, payload))
}

/// Cheap structural check used before anything is uploaded
///
/// Accepts any image subtype with a non-empty base64 payload; the payload
/// itself is not decoded.
pub fn is_image_data_uri(uri: &str) -> bool {
    split(uri.trim()).is_some()
}

/// Build a data URI from encoded image bytes
pub fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// A decoded image data URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDataUri {
    /// Lowercased MIME type, e.g. `image/png`
    pub mime: String,
    /// File extension for storage keys
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

impl ImageDataUri {
    /// Parse and decode a data URI, accepting only JPEG, PNG and WebP
    pub fn parse(uri: &str) -> Result<Self, DataUriError> {
        let uri = uri.trim();
        let (mime, payload) = match split(uri) {
            Some(parts) => parts,
            None if uri.starts_with("data:image/") && uri.ends_with(";base64,") => {
                return Err(DataUriError::Empty);
            }
            None => return Err(DataUriError::Malformed),
        };

        let mime = mime.to_ascii_lowercase();
        let extension = extension_for_mime(&mime)
            .ok_or_else(|| DataUriError::UnsupportedMime(mime.clone()))?;

        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|_| DataUriError::InvalidBase64)?;
        if bytes.is_empty() {
            return Err(DataUriError::Empty);
        }

        Ok(Self {
            mime,
            extension,
            bytes,
        })
    }

    pub fn to_uri(&self) -> String {
        encode_data_uri(&self.mime, &self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_check() {
        assert!(is_image_data_uri("data:image/jpeg;base64,/9j/4AAQ"));
        assert!(is_image_data_uri("data:image/svg+xml;base64,PHN2Zz4="));
        assert!(!is_image_data_uri("https://example.com/a.jpg"));
        assert!(!is_image_data_uri("data:text/plain;base64,aGk="));
        assert!(!is_image_data_uri("data:image/png;base64,"));
        assert!(!is_image_data_uri("data:image/png,raw"));
        assert!(!is_image_data_uri(""));
    }

    #[test]
    fn test_parse_png() {
        let uri = encode_data_uri("image/png", &[0x89, b'P', b'N', b'G']);
        let parsed = ImageDataUri::parse(&uri).unwrap();
        assert_eq!(parsed.mime, "image/png");
        assert_eq!(parsed.extension, "png");
        assert_eq!(parsed.bytes, vec![0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn test_parse_rejections() {
        assert_eq!(
            ImageDataUri::parse("data:image/gif;base64,R0lGOD=="),
            Err(DataUriError::UnsupportedMime("image/gif".to_string()))
        );
        assert_eq!(
            ImageDataUri::parse("data:image/png;base64,"),
            Err(DataUriError::Empty)
        );
        assert_eq!(
            ImageDataUri::parse("data:image/png;base64,@@not base64@@"),
            Err(DataUriError::InvalidBase64)
        );
        assert_eq!(
            ImageDataUri::parse("profiles/avatar.png"),
            Err(DataUriError::Malformed)
        );
    }

    #[test]
    fn test_jpg_alias() {
        let parsed = ImageDataUri::parse("data:image/JPG;base64,AAEC").unwrap();
        assert_eq!(parsed.extension, "jpg");
    }
}
