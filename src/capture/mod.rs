// SPDX-License-Identifier: GPL-3.0-only

//! Dual-camera capture
//!
//! The capture screen owns one camera session, the mask compositor and the
//! face tracker. Pressing the shutter runs the [`sequencer`]: front photo with
//! the mask, switch to the back camera, back photo, then hand the pair to the
//! review screen through a [`handoff::CaptureStore`].

pub mod handoff;
pub mod screen;
pub mod sequencer;

pub use handoff::{
    CaptureStore, FallbackImages, MemoryCaptureStore, ReviewPhotos, SessionFileStore,
};
pub use screen::{CaptureScreen, CaptureScreenBuilder};
pub use sequencer::{CaptureSequencer, SequencerState, ShutterOutcome};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Front and back photo of one capture, as image data URIs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedPhotoPair {
    pub front: String,
    pub back: String,
    pub captured_at: DateTime<Utc>,
}

impl CapturedPhotoPair {
    pub fn new(front: String, back: String) -> Self {
        Self {
            front,
            back,
            captured_at: Utc::now(),
        }
    }
}

/// Screens the capture flow navigates to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Capture screen
    Camera,
    /// Review and publish screen
    CameraPreview,
    /// Feed list
    FeedAll,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Camera => "/camera",
            Route::CameraPreview => "/camera/preview",
            Route::FeedAll => "/feed/all",
        }
    }
}

/// Screen navigation seam
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Navigator that records every navigation
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routes(&self) -> Vec<Route> {
        self.routes.lock().clone()
    }

    pub fn last(&self) -> Option<Route> {
        self.routes.lock().last().copied()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route) {
        info!(route = route.path(), "Navigating");
        self.routes.lock().push(route);
    }
}
