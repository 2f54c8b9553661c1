// SPDX-License-Identifier: GPL-3.0-only

//! Detectors that do not need a model

use super::{FaceDetector, FaceRegion};
use crate::backends::camera::CameraFrame;
use crate::errors::TrackingError;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Reports the same regions for every frame
#[derive(Debug, Clone, Default)]
pub struct FixedRegionDetector {
    regions: Vec<FaceRegion>,
}

impl FixedRegionDetector {
    pub fn new(regions: Vec<FaceRegion>) -> Self {
        Self { regions }
    }
}

impl FaceDetector for FixedRegionDetector {
    fn detect(
        &mut self,
        _frame: &CameraFrame,
        _timestamp_ms: u64,
    ) -> Result<Vec<FaceRegion>, TrackingError> {
        Ok(self.regions.clone())
    }

    fn close(&mut self) {
        self.regions.clear();
    }
}

/// Observable side of a [`ScriptedDetector`]
#[derive(Debug, Clone, Default)]
pub struct DetectorStats {
    calls: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl DetectorStats {
    /// Number of `detect` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Replays a script of results, one entry per `detect` call
///
/// Once the script is exhausted the last entry repeats.
#[derive(Debug)]
pub struct ScriptedDetector {
    script: VecDeque<Result<Vec<FaceRegion>, TrackingError>>,
    last: Result<Vec<FaceRegion>, TrackingError>,
    stats: DetectorStats,
}

impl ScriptedDetector {
    pub fn new(script: Vec<Result<Vec<FaceRegion>, TrackingError>>) -> Self {
        Self {
            script: script.into(),
            last: Ok(Vec::new()),
            stats: DetectorStats::default(),
        }
    }

    pub fn stats(&self) -> DetectorStats {
        self.stats.clone()
    }
}

impl FaceDetector for ScriptedDetector {
    fn detect(
        &mut self,
        _frame: &CameraFrame,
        _timestamp_ms: u64,
    ) -> Result<Vec<FaceRegion>, TrackingError> {
        self.stats.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(next) = self.script.pop_front() {
            self.last = next;
        }
        self.last.clone()
    }

    fn close(&mut self) {
        self.stats.closed.store(true, Ordering::SeqCst);
    }
}
