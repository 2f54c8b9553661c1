// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the capture pipeline and the Ping! API
//!
//! Each subsystem has its own error enum. The `Display` text of every variant is
//! the status line shown to the user, so none of these errors are fatal: callers
//! show the message and leave the screen in a state where the user can retry.

use crate::backends::camera::Facing;
use thiserror::Error;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone, Error)]
pub enum AppError {
    /// Device access errors
    #[error("Camera error: {0}")]
    Media(#[from] MediaError),
    /// Capture sequence errors
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),
    /// Face tracking errors
    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackingError),
    /// Publishing errors
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),
    /// REST API errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
    /// Storage/filesystem errors
    #[error("Storage error: {0}")]
    Storage(String),
    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

/// Device access errors
///
/// Each category carries its own message so the capture screen can tell the
/// user what to fix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    /// Camera capture requires a secure context
    #[error("The camera can only be used over a secure (HTTPS) connection")]
    InsecureContext,
    /// No camera API on this platform
    #[error("This platform does not support camera capture")]
    Unsupported,
    /// The user or the system denied access
    #[error("Camera access was denied. Allow camera permission and try again")]
    PermissionDenied,
    /// No device satisfied any constraint set
    #[error("The {facing} camera is not available on this device")]
    DeviceUnavailable { facing: Facing },
    /// The stream never delivered usable frames
    #[error("The camera did not become ready within {timeout_ms} ms")]
    ReadinessTimeout { timeout_ms: u64 },
    /// Backend failure that fits no other category
    #[error("Camera backend error: {0}")]
    Backend(String),
}

impl MediaError {
    /// Errors worth trying the next constraint set for
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MediaError::DeviceUnavailable { .. } | MediaError::Backend(_)
        )
    }
}

/// Capture sequence errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// A capture sequence is already running
    #[error("A capture is already in progress")]
    Busy,
    /// The shutter was pressed without a ready front camera
    #[error("The front camera is not ready yet")]
    FrontNotReady,
    /// A manual camera switch failed
    #[error("{0}")]
    Camera(#[from] MediaError),
    /// The front frame could not be read or encoded
    #[error("Could not capture the front photo: {0}")]
    FrontCaptureFailed(String),
    /// Switching to the back camera failed
    #[error("The back camera is unavailable: {0}")]
    BackCameraUnavailable(String),
    /// The back frame could not be read or encoded
    #[error("Could not capture the back photo: {0}")]
    BackCaptureFailed(String),
    /// Writing the photo pair for the review screen failed
    #[error("Could not hand off the captured photos: {0}")]
    Handoff(String),
    /// The capture screen has been torn down
    #[error("The camera screen is closed")]
    Closed,
}

/// Face tracking errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackingError {
    /// The detector model or runtime could not be loaded
    #[error("Face tracking is unavailable: {0}")]
    Unavailable(String),
    /// A single detection call failed
    #[error("Face detection failed: {0}")]
    DetectionFailed(String),
}

/// Publishing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// No wallet address available
    #[error("Could not read your wallet. Please sign in again")]
    NotSignedIn,
    /// Front or back photo missing or not an image data URI
    #[error("Front and back photos are required. Please capture again")]
    RecaptureRequired,
    /// The backend answered with a non-2xx status
    #[error("{detail}")]
    Rejected { status: u16, detail: String },
    /// The request never completed
    #[error("Upload failed. Please try again in a moment ({0})")]
    Transport(String),
}

/// REST API errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Non-2xx response, with the raw body as detail
    #[error("Request failed with status {status}: {detail}")]
    Http { status: u16, detail: String },
    /// Connection or protocol failure
    #[error("Request failed: {0}")]
    Transport(String),
    /// Response body did not match the expected shape
    #[error("Unexpected response: {0}")]
    Decode(String),
    /// Local validation rejected the request before sending
    #[error("{0}")]
    Invalid(String),
    /// A newer request superseded this one
    #[error("Request was superseded")]
    Aborted,
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

impl From<ApiError> for PublishError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Http { status, detail } => PublishError::Rejected { status, detail },
            other => PublishError::Transport(other.to_string()),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_messages_are_distinct() {
        let messages = [
            MediaError::InsecureContext.to_string(),
            MediaError::Unsupported.to_string(),
            MediaError::PermissionDenied.to_string(),
            MediaError::DeviceUnavailable {
                facing: Facing::Back,
            }
            .to_string(),
        ];
        for (i, a) in messages.iter().enumerate() {
            for b in &messages[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(messages[3].contains("back"));
    }

    #[test]
    fn test_rejected_surfaces_raw_body() {
        let err: PublishError = ApiError::Http {
            status: 500,
            detail: "{\"status\":\"error\"}".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "{\"status\":\"error\"}");
    }

    #[test]
    fn test_io_errors_are_storage_errors() {
        let err: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, AppError::Storage(ref msg) if msg == "gone"));
    }
}
