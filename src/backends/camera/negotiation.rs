// SPDX-License-Identifier: GPL-3.0-only

//! Ordered constraint fallback
//!
//! Devices disagree about which constraints they honor. Stream requests are
//! therefore tried from most to least specific, and the first one that opens
//! wins:
//!
//! 1. back camera only: a device whose label says back/rear/environment, by id
//! 2. exact facing
//! 3. ideal facing
//! 4. any video device

use super::types::*;
use super::MediaBackend;
use crate::errors::MediaError;
use tracing::{debug, info, warn};

/// Build the ordered list of constraint sets for a facing
pub fn constraint_plan(facing: Facing, devices: &[CameraDevice]) -> Vec<VideoConstraints> {
    let mut plan = Vec::with_capacity(4);

    if facing == Facing::Back {
        if let Some(device) = devices.iter().find(|d| is_back_label(&d.label)) {
            plan.push(VideoConstraints::DeviceId(device.id.clone()));
        }
    }

    plan.push(VideoConstraints::FacingExact(facing));
    plan.push(VideoConstraints::FacingIdeal(facing));
    plan.push(VideoConstraints::Any);
    plan
}

/// Open a stream for `facing`, walking the constraint plan
///
/// Enumeration failures only skip the device-id step. Permission and platform
/// errors end the negotiation immediately since no other constraint set can
/// succeed either.
pub fn negotiate(backend: &dyn MediaBackend, facing: Facing) -> BackendResult<OpenedStream> {
    let devices = if facing == Facing::Back {
        match backend.enumerate_devices() {
            Ok(devices) => devices,
            Err(e) => {
                debug!(error = %e, "Device enumeration failed, skipping device-id lookup");
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    let plan = constraint_plan(facing, &devices);
    let mut last_error = None;

    for constraints in &plan {
        debug!(backend = backend.name(), %constraints, "Requesting video stream");
        match backend.open(constraints) {
            Ok(opened) => {
                info!(
                    %facing,
                    %constraints,
                    device = %opened.device.label,
                    "Video stream opened"
                );
                return Ok(opened);
            }
            Err(e) if e.is_retryable() => {
                debug!(%constraints, error = %e, "Constraint set failed, trying next");
                last_error = Some(e);
            }
            Err(e) => {
                warn!(%constraints, error = %e, "Camera access failed");
                return Err(e);
            }
        }
    }

    warn!(%facing, error = ?last_error, "No constraint set produced a stream");
    Err(MediaError::DeviceUnavailable { facing })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_front_plan() {
        let plan = constraint_plan(Facing::Front, &[]);
        assert_eq!(
            plan,
            vec![
                VideoConstraints::FacingExact(Facing::Front),
                VideoConstraints::FacingIdeal(Facing::Front),
                VideoConstraints::Any,
            ]
        );
    }

    #[test]
    fn test_back_plan_prefers_labelled_device() {
        let devices = vec![
            CameraDevice::new("cam-0", "Front Camera"),
            CameraDevice::new("cam-1", "camera2 1, facing back"),
        ];
        let plan = constraint_plan(Facing::Back, &devices);
        assert_eq!(plan[0], VideoConstraints::DeviceId("cam-1".to_string()));
        assert_eq!(plan[1], VideoConstraints::FacingExact(Facing::Back));
        assert_eq!(plan.len(), 4);
    }

    #[test]
    fn test_back_plan_without_labels() {
        let devices = vec![CameraDevice::new("cam-0", "USB Webcam")];
        let plan = constraint_plan(Facing::Back, &devices);
        assert_eq!(plan[0], VideoConstraints::FacingExact(Facing::Back));
        assert_eq!(plan.len(), 3);
    }
}
