// SPDX-License-Identifier: GPL-3.0-only

//! Detection cadence gate

use super::{FaceDetector, FaceRegion};
use crate::backends::camera::CameraFrame;
use crate::constants::timing;
use std::time::Duration;
use tracing::{debug, warn};

/// Runs a detector at most once per `interval`
///
/// Calls in between return the previous result, so the overlay can lag the
/// video by up to one interval.
pub struct TrackingAdapter {
    detector: Box<dyn FaceDetector>,
    interval: Duration,
    last_detect_ms: Option<u64>,
    last_regions: Vec<FaceRegion>,
    closed: bool,
}

impl TrackingAdapter {
    pub fn new(detector: Box<dyn FaceDetector>) -> Self {
        Self::with_interval(detector, timing::DETECT_INTERVAL)
    }

    pub fn with_interval(detector: Box<dyn FaceDetector>, interval: Duration) -> Self {
        Self {
            detector,
            interval,
            last_detect_ms: None,
            last_regions: Vec::new(),
            closed: false,
        }
    }

    /// Regions for the frame at `now_ms`
    ///
    /// A failed detection clears the regions rather than keeping a stale mask
    /// on screen.
    pub fn regions(&mut self, frame: &CameraFrame, now_ms: u64) -> &[FaceRegion] {
        if self.closed {
            return &[];
        }

        let due = match self.last_detect_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.interval.as_millis() as u64,
        };

        if due {
            self.last_detect_ms = Some(now_ms);
            match self.detector.detect(frame, now_ms) {
                Ok(regions) => {
                    if regions.len() != self.last_regions.len() {
                        debug!(faces = regions.len(), "Face count changed");
                    }
                    self.last_regions = regions;
                }
                Err(e) => {
                    warn!(error = %e, "Face detection failed");
                    self.last_regions.clear();
                }
            }
        }

        &self.last_regions
    }

    /// Most recent regions without running detection
    pub fn last_regions(&self) -> &[FaceRegion] {
        &self.last_regions
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Close the detector. Idempotent.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.last_regions.clear();
            self.detector.close();
            debug!("Face detector closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for TrackingAdapter {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::{BoundingBox, ScriptedDetector};
    use crate::errors::TrackingError;

    fn face(x: f32) -> FaceRegion {
        FaceRegion::new(BoundingBox::new(x, 0.0, 10.0, 10.0))
    }

    #[test]
    fn test_detection_is_rate_limited() {
        let detector = ScriptedDetector::new(vec![Ok(vec![face(1.0)]), Ok(vec![face(2.0)])]);
        let stats = detector.stats();
        let mut adapter = TrackingAdapter::with_interval(Box::new(detector), Duration::from_millis(60));
        let frame = CameraFrame::empty(0);

        assert_eq!(adapter.regions(&frame, 0)[0].bbox.origin_x, 1.0);
        // Within the interval the previous result is reused
        assert_eq!(adapter.regions(&frame, 16)[0].bbox.origin_x, 1.0);
        assert_eq!(adapter.regions(&frame, 59)[0].bbox.origin_x, 1.0);
        assert_eq!(stats.calls(), 1);

        assert_eq!(adapter.regions(&frame, 60)[0].bbox.origin_x, 2.0);
        assert_eq!(stats.calls(), 2);
    }

    #[test]
    fn test_failed_detection_clears_regions() {
        let detector = ScriptedDetector::new(vec![
            Ok(vec![face(1.0)]),
            Err(TrackingError::DetectionFailed("gpu lost".into())),
        ]);
        let mut adapter = TrackingAdapter::with_interval(Box::new(detector), Duration::from_millis(60));
        let frame = CameraFrame::empty(0);

        assert_eq!(adapter.regions(&frame, 0).len(), 1);
        assert!(adapter.regions(&frame, 100).is_empty());
    }

    #[test]
    fn test_close_releases_detector_once() {
        let detector = ScriptedDetector::new(vec![Ok(vec![face(1.0)])]);
        let stats = detector.stats();
        let mut adapter = TrackingAdapter::new(Box::new(detector));
        adapter.close();
        adapter.close();
        assert!(stats.is_closed());
        assert!(adapter.regions(&CameraFrame::empty(0), 1000).is_empty());
        assert_eq!(stats.calls(), 0);
    }
}
