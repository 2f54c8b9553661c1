// SPDX-License-Identifier: GPL-3.0-only

//! Face tracking
//!
//! A [`FaceDetector`] turns a video frame into face regions. The detector
//! itself is pluggable (ONNX face and landmark models with the `onnx`
//! feature, fixed or scripted regions in the CLI and tests);
//! [`TrackingAdapter`] adds the detection cadence on top so the render loop
//! can ask for regions every frame without running inference every frame.

mod cadence;
mod detectors;
pub mod inference;
#[cfg(feature = "onnx")]
mod onnx;

pub use cadence::TrackingAdapter;
pub use detectors::{DetectorStats, FixedRegionDetector, ScriptedDetector};
#[cfg(feature = "onnx")]
pub use onnx::{OnnxFaceDetector, onnx_factory};

use crate::backends::camera::CameraFrame;
use crate::errors::TrackingError;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

/// Axis-aligned face box in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub origin_x: f32,
    pub origin_y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(origin_x: f32, origin_y: f32, width: f32, height: f32) -> Self {
        Self {
            origin_x,
            origin_y,
            width,
            height,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        (
            self.origin_x + self.width / 2.0,
            self.origin_y + self.height / 2.0,
        )
    }

    /// Larger of width and height
    pub fn max_side(&self) -> f32 {
        self.width.max(self.height)
    }
}

impl std::str::FromStr for BoundingBox {
    type Err = String;

    /// Parse `x,y,w,h`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f32> = s
            .split(',')
            .map(|p| p.trim().parse::<f32>())
            .collect::<Result<_, _>>()
            .map_err(|e| format!("invalid face box '{}': {}", s, e))?;
        match parts.as_slice() {
            [x, y, w, h] if *w > 0.0 && *h > 0.0 => Ok(Self::new(*x, *y, *w, *h)),
            [_, _, _, _] => Err(format!("face box '{}' must have a positive size", s)),
            _ => Err(format!("face box '{}' must be x,y,w,h", s)),
        }
    }
}

/// Facial landmark in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One detected face
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FaceRegion {
    pub bbox: BoundingBox,
    pub keypoints: Vec<Keypoint>,
    pub score: f32,
}

impl FaceRegion {
    pub fn new(bbox: BoundingBox) -> Self {
        Self {
            bbox,
            keypoints: Vec::new(),
            score: 1.0,
        }
    }

    pub fn with_keypoints(mut self, keypoints: Vec<Keypoint>) -> Self {
        self.keypoints = keypoints;
        self
    }

    /// Head tilt in radians
    pub fn roll(&self) -> f32 {
        roll_angle(&self.keypoints)
    }
}

/// Estimate head roll from landmarks
///
/// Takes the leftmost and rightmost keypoints and returns the angle of the
/// line between them. With fewer than two keypoints there is nothing to
/// measure and the face is treated as upright.
pub fn roll_angle(keypoints: &[Keypoint]) -> f32 {
    if keypoints.len() < 2 {
        return 0.0;
    }

    let mut left = keypoints[0];
    let mut right = keypoints[0];
    for kp in &keypoints[1..] {
        if kp.x < left.x {
            left = *kp;
        }
        if kp.x > right.x {
            right = *kp;
        }
    }

    (right.y - left.y).atan2(right.x - left.x)
}

/// Face detector capability
pub trait FaceDetector: Send {
    /// Detect faces in a frame captured at `timestamp_ms`
    fn detect(
        &mut self,
        frame: &CameraFrame,
        timestamp_ms: u64,
    ) -> Result<Vec<FaceRegion>, TrackingError>;

    /// Release model resources. Called once on teardown.
    fn close(&mut self);
}

/// Asynchronous detector initializer
///
/// Model loading can take a while, so the capture screen starts the preview
/// first and attaches the detector when the factory resolves.
pub type DetectorFactory =
    Box<dyn FnOnce() -> BoxFuture<'static, Result<Box<dyn FaceDetector>, TrackingError>> + Send>;

/// Wrap a ready detector as a factory
pub fn ready_factory<D: FaceDetector + 'static>(detector: D) -> DetectorFactory {
    Box::new(move || {
        Box::pin(async move { Ok(Box::new(detector) as Box<dyn FaceDetector>) })
    })
}

/// A factory that always fails, as when the model cannot be loaded
pub fn unavailable_factory(reason: impl Into<String>) -> DetectorFactory {
    let reason = reason.into();
    Box::new(move || Box::pin(async move { Err(TrackingError::Unavailable(reason)) }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_4;

    #[test]
    fn test_roll_angle_diagonal() {
        let angle = roll_angle(&[Keypoint::new(0.0, 0.0), Keypoint::new(10.0, 10.0)]);
        assert!((angle - FRAC_PI_4).abs() < 1e-6);
        assert!((angle.to_degrees() - 45.0).abs() < 1e-4);
    }

    #[test]
    fn test_roll_angle_level() {
        let angle = roll_angle(&[Keypoint::new(0.0, 0.0), Keypoint::new(10.0, 0.0)]);
        assert_eq!(angle, 0.0);
    }

    #[test]
    fn test_roll_angle_uses_extreme_points() {
        // Order does not matter and inner points are ignored
        let angle = roll_angle(&[
            Keypoint::new(10.0, 10.0),
            Keypoint::new(5.0, 100.0),
            Keypoint::new(0.0, 0.0),
        ]);
        assert!((angle - FRAC_PI_4).abs() < 1e-6);
    }

    #[test]
    fn test_roll_angle_needs_two_points() {
        assert_eq!(roll_angle(&[]), 0.0);
        assert_eq!(roll_angle(&[Keypoint::new(3.0, 4.0)]), 0.0);
    }

    #[test]
    fn test_parse_bounding_box() {
        let bbox: BoundingBox = "10, 20, 30, 40".parse().unwrap();
        assert_eq!(bbox, BoundingBox::new(10.0, 20.0, 30.0, 40.0));
        assert_eq!(bbox.center(), (25.0, 40.0));
        assert_eq!(bbox.max_side(), 40.0);
        assert!("1,2,3".parse::<BoundingBox>().is_err());
        assert!("1,2,0,4".parse::<BoundingBox>().is_err());
    }
}
