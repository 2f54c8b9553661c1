// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use super::VideoStream;
use crate::errors::MediaError;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, MediaError>;

/// Which physical camera a stream is sourced from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    /// Selfie camera, facing the user
    #[default]
    Front,
    /// Scene camera, facing away from the user
    Back,
}

impl Facing {
    /// The other camera
    pub fn opposite(&self) -> Self {
        match self {
            Facing::Front => Facing::Back,
            Facing::Back => Facing::Front,
        }
    }

    /// Front previews are shown mirrored, so saved front photos are mirrored too
    pub fn is_mirrored(&self) -> bool {
        matches!(self, Facing::Front)
    }

    /// Guess the facing of a device from its label
    ///
    /// Mobile platforms and libcamera expose labels such as "Back Camera",
    /// "camera2 1, facing back" or "rear". Desktop webcams usually carry no hint.
    pub fn from_label(label: &str) -> Option<Self> {
        if is_back_label(label) {
            return Some(Facing::Back);
        }
        let label = label.to_ascii_lowercase();
        if ["front", "user", "selfie", "facing front"]
            .iter()
            .any(|hint| label.contains(hint))
        {
            return Some(Facing::Front);
        }
        None
    }
}

impl std::fmt::Display for Facing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Facing::Front => write!(f, "front"),
            Facing::Back => write!(f, "back"),
        }
    }
}

impl std::str::FromStr for Facing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "front" | "user" => Ok(Facing::Front),
            "back" | "rear" | "environment" => Ok(Facing::Back),
            other => Err(format!("unknown camera facing: {}", other)),
        }
    }
}

/// True if a device label names a rear camera
pub fn is_back_label(label: &str) -> bool {
    let label = label.to_ascii_lowercase();
    ["back", "rear", "environment"]
        .iter()
        .any(|hint| label.contains(hint))
}

/// Represents a camera device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    /// Stable identifier used for exact-device requests (e.g. /dev/video0)
    pub id: String,
    /// Human readable label (V4L2 card name)
    pub label: String,
    /// Facing inferred from the label or reported by the platform
    pub facing: Option<Facing>,
}

impl CameraDevice {
    /// Create a device, inferring its facing from the label
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            id: id.into(),
            facing: Facing::from_label(&label),
            label,
        }
    }
}

/// One constraint set tried while negotiating a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoConstraints {
    /// Exactly this device
    DeviceId(String),
    /// A device known to face this way, nothing else
    FacingExact(Facing),
    /// Prefer this facing, accept any device
    FacingIdeal(Facing),
    /// Any video device
    Any,
}

impl std::fmt::Display for VideoConstraints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoConstraints::DeviceId(id) => write!(f, "deviceId={}", id),
            VideoConstraints::FacingExact(facing) => write!(f, "facingMode exact {}", facing),
            VideoConstraints::FacingIdeal(facing) => write!(f, "facingMode ideal {}", facing),
            VideoConstraints::Any => write!(f, "any video"),
        }
    }
}

/// A decoded RGBA frame
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA, `width * height * 4` bytes
    pub data: Arc<[u8]>,
    /// Monotonic frame number within the stream
    pub sequence: u64,
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Wrap RGBA bytes as a frame
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>, sequence: u64) -> Self {
        Self {
            width,
            height,
            data: Arc::from(data),
            sequence,
            captured_at: Instant::now(),
        }
    }

    /// A frame without pixels (device delivered nothing usable)
    pub fn empty(sequence: u64) -> Self {
        Self::from_rgba(0, 0, Vec::new(), sequence)
    }

    /// True if the frame has zero dimensions or a short buffer
    pub fn is_empty(&self) -> bool {
        self.width == 0
            || self.height == 0
            || self.data.len() < (self.width as usize * self.height as usize * 4)
    }

    /// Copy the frame into an owned image buffer
    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        if self.is_empty() {
            return None;
        }
        let len = self.width as usize * self.height as usize * 4;
        RgbaImage::from_raw(self.width, self.height, self.data[..len].to_vec())
    }
}

/// Stream readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Readiness {
    #[default]
    NotReady,
    Ready,
    Failed,
}

/// A freshly opened stream and the device it came from
pub struct OpenedStream {
    pub device: CameraDevice,
    pub stream: Box<dyn VideoStream>,
}

/// One active device video stream
///
/// Owned by [`super::DeviceMediaAccess`]. Dropping the session stops the stream.
pub struct CameraSession {
    facing: Facing,
    device: CameraDevice,
    stream: Box<dyn VideoStream>,
    readiness: Readiness,
}

impl CameraSession {
    pub(crate) fn new(facing: Facing, opened: OpenedStream) -> Self {
        Self {
            facing,
            device: opened.device,
            stream: opened.stream,
            readiness: Readiness::NotReady,
        }
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn device(&self) -> &CameraDevice {
        &self.device
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness
    }

    pub(crate) fn set_readiness(&mut self, readiness: Readiness) {
        self.readiness = readiness;
    }

    pub fn is_mirrored(&self) -> bool {
        self.facing.is_mirrored()
    }

    pub fn stream(&self) -> &dyn VideoStream {
        self.stream.as_ref()
    }

    /// Snapshot of the session for callers outside the manager
    pub fn info(&self) -> CameraSessionInfo {
        let (width, height) = self
            .stream
            .latest_frame()
            .map(|frame| (frame.width, frame.height))
            .unwrap_or((0, 0));
        CameraSessionInfo {
            facing: self.facing,
            device: self.device.clone(),
            readiness: self.readiness,
            width,
            height,
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        tracing::debug!(facing = %self.facing, device = %self.device.label, "Stopping camera stream");
        self.stream.stop();
    }
}

impl std::fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSession")
            .field("facing", &self.facing)
            .field("device", &self.device)
            .field("readiness", &self.readiness)
            .finish()
    }
}

/// Read-only view of a camera session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraSessionInfo {
    pub facing: Facing,
    pub device: CameraDevice,
    pub readiness: Readiness,
    pub width: u32,
    pub height: u32,
}

impl CameraSessionInfo {
    pub fn is_ready(&self) -> bool {
        self.readiness == Readiness::Ready
    }

    pub fn is_mirrored(&self) -> bool {
        self.facing.is_mirrored()
    }
}
