// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// JPEG quality presets for captured photos
///
/// Captured frames are encoded as JPEG data URIs before they leave the capture
/// screen. The preset trades upload size against image quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JpegQualityPreset {
    /// Smaller uploads, visible artifacts
    Low,
    /// Balanced
    Medium,
    /// Default: close to the browser's canvas encoder default
    #[default]
    High,
}

impl JpegQualityPreset {
    /// All presets, lowest quality first
    pub const ALL: [JpegQualityPreset; 3] = [
        JpegQualityPreset::Low,
        JpegQualityPreset::Medium,
        JpegQualityPreset::High,
    ];

    /// Display name for the preset
    pub fn display_name(&self) -> &'static str {
        match self {
            JpegQualityPreset::Low => "Low",
            JpegQualityPreset::Medium => "Medium",
            JpegQualityPreset::High => "High",
        }
    }

    /// JPEG quality value (1-100)
    pub fn quality(&self) -> u8 {
        match self {
            JpegQualityPreset::Low => 70,
            JpegQualityPreset::Medium => 85,
            JpegQualityPreset::High => 92,
        }
    }
}

/// Mask geometry
pub mod mask {
    /// Mask side length relative to the larger side of the face box
    pub const SCALE: f32 = 1.2;

    /// Default mask when none is selected
    pub const DEFAULT_MASK: &str = "popcat";

    /// Side length of the generated placeholder mask
    pub const PLACEHOLDER_SIZE: u32 = 256;

    /// Longer side of a rasterized SVG mask
    pub const RASTER_SIZE: u32 = 512;
}

/// Face model input and output handling
pub mod face_model {
    /// Detector input size (width, height)
    pub const DETECTOR_INPUT: (u32, u32) = (320, 240);

    /// Pixel normalization for the detector: `(v - MEAN) / STD`
    pub const PIXEL_MEAN: f32 = 127.0;
    pub const PIXEL_STD: f32 = 128.0;

    /// Minimum face score
    pub const SCORE_THRESHOLD: f32 = 0.5;

    /// Overlap above which the weaker of two boxes is dropped
    pub const IOU_THRESHOLD: f32 = 0.4;

    /// Landmark model input side
    pub const LANDMARK_INPUT: u32 = 128;

    /// Margin added around a face box before cropping for landmarks
    pub const CROP_MARGIN: f32 = 0.2;

    /// Points produced by the landmark model
    pub const LANDMARK_COUNT: usize = 68;
}

/// Capture sequencing and device timing defaults
pub mod timing {
    use super::Duration;

    /// Pause between stopping one stream and requesting the next.
    /// Some drivers fail the open if the previous handle is still closing.
    pub const STREAM_SETTLE_DELAY: Duration = Duration::from_millis(150);

    /// Pause after the back camera is ready, before capturing it (exposure/focus)
    pub const CAPTURE_SETTLE_DELAY: Duration = Duration::from_millis(400);

    /// Maximum wait for a new stream to deliver usable frames
    pub const READY_TIMEOUT: Duration = Duration::from_millis(3000);

    /// Readiness polling interval
    pub const READY_POLL_INTERVAL: Duration = Duration::from_millis(50);

    /// Minimum interval between two face detections
    pub const DETECT_INTERVAL: Duration = Duration::from_millis(60);

    /// Render loop tick (~60Hz display refresh)
    pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

    /// Polling interval while waiting for the first tracked overlay
    pub const OVERLAY_POLL_INTERVAL: Duration = Duration::from_millis(10);

    /// Longest wait for a tracked overlay before capturing without a mask
    pub const OVERLAY_READY_TIMEOUT: Duration = Duration::from_secs(5);

    /// Frame counter modulo for periodic logging
    pub const FRAME_LOG_INTERVAL: u64 = 120;
}

/// Stream readiness thresholds
pub mod readiness {
    /// Frames a stream must have delivered before it counts as ready
    pub const MIN_BUFFERED_FRAMES: u64 = 2;
}

/// Cross-screen handoff keys and placeholder images
pub mod handoff {
    /// Session key of the front (selfie) image
    pub const STORAGE_KEY_FRONT: &str = "ping-camera-front";

    /// Session key of the back (scene) image
    pub const STORAGE_KEY_BACK: &str = "ping-camera-back";

    /// Placeholder front image in the feeds bucket
    pub const FRONT_FALLBACK_FILE: &str = "Feed_selfie_01.png";

    /// Placeholder back image in the feeds bucket
    pub const BACK_FALLBACK_FILE: &str = "Feed_scene_01.png";

    /// Session file name for the multi-process handoff
    pub const SESSION_FILE_NAME: &str = "capture-session.json";
}

/// Feed and profile defaults shared by the client and the proxy service
pub mod feed {
    use super::Duration;

    /// Items per page on the feed screen
    pub const PAGE_SIZE: usize = 3;

    /// Default number of feeds returned by the listing endpoint
    pub const DEFAULT_LIMIT: u32 = 100;

    /// Upper bound for the listing `limit` parameter
    pub const MAX_LIMIT: u32 = 200;

    /// Caption shown when a post has none
    pub const DEFAULT_META: &str = "오늘의 Ping!";

    /// Avatar used when the author has no profile image
    pub const DEFAULT_AVATAR: &str = "/figma/home/avatar-default.png";

    /// Attempts for the initial profile fetch (the sync may not have landed yet)
    pub const PROFILE_FETCH_ATTEMPTS: u32 = 2;

    /// Delay between profile fetch attempts
    pub const PROFILE_FETCH_RETRY_DELAY: Duration = Duration::from_millis(300);
}

/// Identity constants
pub mod identity {
    /// Cookie holding the signed SIWE nonce
    pub const NONCE_COOKIE: &str = "siwe";

    /// Lifetime of an issued nonce
    pub const NONCE_TTL_SECS: i64 = 300;

    /// World ID cloud proof verification endpoint (app id is appended)
    pub const VERIFY_ENDPOINT: &str = "https://developer.worldcoin.org/api/v2/verify";
}

/// Image MIME types accepted in data URIs, with their file extensions
pub const SUPPORTED_IMAGE_MIME: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/jpg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
];

/// Look up the file extension for an accepted image MIME type
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let mime = mime.to_ascii_lowercase();
    SUPPORTED_IMAGE_MIME
        .iter()
        .find(|(m, _)| *m == mime)
        .map(|(_, ext)| *ext)
}

/// Content type for a stored object extension
pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext {
        "jpg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
