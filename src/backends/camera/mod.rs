// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! Platform media APIs differ in how devices are enumerated and how a stream is
//! requested. Everything platform specific sits behind [`MediaBackend`]; the
//! ordered fallback policy and the single-session rule live above it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │   Capture screen    │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  DeviceMediaAccess  │  ← one session at a time, readiness, settle delay
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │    negotiation      │  ← deviceId → exact → ideal → any
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ MediaBackend trait  │
//! └──────────┬──────────┘
//!       ┌────┴──────┐
//!       ▼           ▼
//!   ┌──────┐   ┌──────────┐
//!   │ V4L2 │   │Synthetic │
//!   └──────┘   └──────────┘
//! ```

pub mod format_converters;
pub mod manager;
pub mod negotiation;
pub mod synthetic;
pub mod types;
#[cfg(all(target_os = "linux", feature = "v4l2"))]
pub mod v4l2;

pub use manager::{DeviceMediaAccess, MediaTiming};
pub use synthetic::{SyntheticBackend, SyntheticCamera};
pub use types::*;

use std::sync::Arc;

/// A live video stream
///
/// Streams are polled: the backend keeps the most recent decoded frame and a
/// running count of delivered frames, which is what readiness checks look at.
pub trait VideoStream: Send + Sync {
    /// Most recent decoded frame, if any arrived yet
    fn latest_frame(&self) -> Option<Arc<CameraFrame>>;

    /// Number of frames delivered since the stream was opened
    fn frames_delivered(&self) -> u64;

    /// Stop capture and release the device. Must be idempotent.
    fn stop(&mut self);

    /// True until [`VideoStream::stop`] has been called
    fn is_active(&self) -> bool;
}

/// Platform media capability
///
/// A backend only knows how to try one constraint set. Ordering and fallback
/// are decided by [`negotiation`].
pub trait MediaBackend: Send + Sync {
    /// Short name for logging
    fn name(&self) -> &'static str;

    /// Check that capture is possible at all (secure context, API present)
    fn check_environment(&self) -> BackendResult<()>;

    /// List video capture devices
    fn enumerate_devices(&self) -> BackendResult<Vec<CameraDevice>>;

    /// Try to open a stream satisfying `constraints`
    fn open(&self, constraints: &VideoConstraints) -> BackendResult<OpenedStream>;
}

/// Get the platform backend
///
/// Returns the V4L2 backend on Linux builds with the `v4l2` feature, the
/// synthetic backend otherwise.
pub fn get_backend() -> Arc<dyn MediaBackend> {
    #[cfg(all(target_os = "linux", feature = "v4l2"))]
    {
        Arc::new(v4l2::V4l2Backend::new())
    }
    #[cfg(not(all(target_os = "linux", feature = "v4l2")))]
    {
        Arc::new(SyntheticBackend::phone())
    }
}

/// Pick the first device matching a constraint set
///
/// Shared by backends that resolve constraints against an enumerated list.
pub fn select_device<'a>(
    devices: &'a [CameraDevice],
    constraints: &VideoConstraints,
) -> BackendResult<&'a CameraDevice> {
    let found = match constraints {
        VideoConstraints::DeviceId(id) => devices.iter().find(|d| &d.id == id),
        VideoConstraints::FacingExact(facing) => {
            devices.iter().find(|d| d.facing == Some(*facing))
        }
        VideoConstraints::FacingIdeal(facing) => devices
            .iter()
            .find(|d| d.facing == Some(*facing))
            .or_else(|| devices.first()),
        VideoConstraints::Any => devices.first(),
    };

    found.ok_or(match constraints {
        VideoConstraints::FacingExact(facing) | VideoConstraints::FacingIdeal(facing) => {
            crate::errors::MediaError::DeviceUnavailable { facing: *facing }
        }
        VideoConstraints::DeviceId(_) | VideoConstraints::Any => {
            crate::errors::MediaError::Backend("no matching video device".to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MediaError;

    fn devices() -> Vec<CameraDevice> {
        vec![
            CameraDevice::new("/dev/video0", "Integrated Camera"),
            CameraDevice::new("/dev/video2", "Rear Camera"),
        ]
    }

    #[test]
    fn test_select_exact_facing() {
        let devices = devices();
        let device = select_device(&devices, &VideoConstraints::FacingExact(Facing::Back));
        assert_eq!(device.map(|d| d.id.as_str()), Ok("/dev/video2"));

        let missing = select_device(&devices, &VideoConstraints::FacingExact(Facing::Front));
        assert_eq!(
            missing,
            Err(MediaError::DeviceUnavailable {
                facing: Facing::Front
            })
        );
    }

    #[test]
    fn test_select_ideal_falls_back_to_first() {
        let devices = devices();
        let device = select_device(&devices, &VideoConstraints::FacingIdeal(Facing::Front));
        assert_eq!(device.map(|d| d.id.as_str()), Ok("/dev/video0"));
    }

    #[test]
    fn test_select_from_empty_list() {
        assert!(select_device(&[], &VideoConstraints::Any).is_err());
    }
}
