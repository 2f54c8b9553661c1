// SPDX-License-Identifier: GPL-3.0-only

//! Dual-capture sequence
//!
//! ```text
//! Idle → CaptureFront → SwitchToBack → SettleDelay → CaptureBack → Handoff → Idle
//! ```
//!
//! Only one sequence runs at a time. A failure after the front photo puts the
//! front camera back (best effort) so the user can simply press again.

use super::{CaptureStore, CapturedPhotoPair, Navigator, Route};
use crate::backends::camera::{DeviceMediaAccess, Facing};
use crate::compositor::SharedOverlay;
use crate::constants::{JpegQualityPreset, timing};
use crate::errors::CaptureError;
use crate::pipelines::photo::PhotoPipeline;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Sequence step, observable while a capture runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequencerState {
    #[default]
    Idle,
    CaptureFront,
    SwitchToBack,
    SettleDelay,
    CaptureBack,
    Handoff,
}

/// Result of a shutter press
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutterOutcome {
    /// Both photos were taken and handed off
    Completed(CapturedPhotoPair),
    /// A sequence was already running; nothing happened
    Ignored,
}

/// Clears the in-flight flag and resets the state on every exit path
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
    state: &'a Mutex<SequencerState>,
}

impl<'a> InFlightGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool, state: &'a Mutex<SequencerState>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag, state })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        *self.state.lock() = SequencerState::Idle;
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Runs the front-then-back capture sequence
#[derive(Clone)]
pub struct CaptureSequencer {
    media: DeviceMediaAccess,
    store: Arc<dyn CaptureStore>,
    navigator: Arc<dyn Navigator>,
    overlay: Option<SharedOverlay>,
    pipeline: PhotoPipeline,
    settle_delay: Duration,
    in_flight: Arc<AtomicBool>,
    state: Arc<Mutex<SequencerState>>,
}

impl CaptureSequencer {
    pub fn new(
        media: DeviceMediaAccess,
        store: Arc<dyn CaptureStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            media,
            store,
            navigator,
            overlay: None,
            pipeline: PhotoPipeline::default(),
            settle_delay: timing::CAPTURE_SETTLE_DELAY,
            in_flight: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(SequencerState::Idle)),
        }
    }

    /// Bake this overlay into front photos
    pub fn with_overlay(mut self, overlay: SharedOverlay) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_quality(mut self, quality: JpegQualityPreset) -> Self {
        self.pipeline = PhotoPipeline::new(quality);
        self
    }

    pub fn state(&self) -> SequencerState {
        *self.state.lock()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn enter(&self, state: SequencerState) {
        debug!(?state, "Capture step");
        *self.state.lock() = state;
    }

    /// Switch cameras manually
    ///
    /// Rejected while a capture sequence runs.
    pub async fn flip(&self, facing: Facing) -> Result<(), CaptureError> {
        if self.is_busy() {
            return Err(CaptureError::Busy);
        }
        self.media.acquire(facing).await.map_err(|e| {
            warn!(%facing, error = %e, "Camera switch failed");
            CaptureError::Camera(e)
        })?;
        Ok(())
    }

    /// Run the full sequence
    ///
    /// A press while a sequence is running returns [`ShutterOutcome::Ignored`]
    /// without touching the camera, the store or navigation.
    pub async fn shutter(&self) -> Result<ShutterOutcome, CaptureError> {
        let Some(_guard) = InFlightGuard::try_acquire(&self.in_flight, &self.state) else {
            debug!("Shutter pressed while a capture is running, ignoring");
            return Ok(ShutterOutcome::Ignored);
        };
        info!("Capture sequence started");

        // Front photo
        self.enter(SequencerState::CaptureFront);
        if !self.media.is_ready(Facing::Front) {
            return Err(CaptureError::FrontNotReady);
        }
        let front_device = self.media.current_session().map(|info| info.device.id);

        // The overlay is whatever the render loop drew last
        let overlay = self.overlay.as_ref().map(|o| o.lock().image().clone());
        let front = self
            .pipeline
            .capture(&self.media, Facing::Front, overlay.as_ref())
            .await
            .map_err(|e| {
                warn!(error = %e, "Front capture failed");
                CaptureError::FrontCaptureFailed(e)
            })?;
        info!(width = front.width, height = front.height, "Front photo captured");

        // Back camera
        self.enter(SequencerState::SwitchToBack);
        match self.media.acquire(Facing::Back).await {
            Ok(info) if front_device.as_deref() == Some(info.device.id.as_str()) => {
                // Constraint fallback landed on the same physical camera
                warn!(device = %info.device.label, "No separate back camera");
                self.restore_front().await;
                return Err(CaptureError::BackCameraUnavailable(
                    "only a front-facing camera was found".to_string(),
                ));
            }
            Ok(info) => {
                debug!(device = %info.device.label, "Back camera ready");
            }
            Err(e) => {
                warn!(error = %e, "Back camera unavailable");
                self.restore_front().await;
                return Err(CaptureError::BackCameraUnavailable(e.to_string()));
            }
        }

        self.enter(SequencerState::SettleDelay);
        tokio::time::sleep(self.settle_delay).await;

        // Back photo
        self.enter(SequencerState::CaptureBack);
        let back = match self.pipeline.capture(&self.media, Facing::Back, None).await {
            Ok(back) => back,
            Err(e) => {
                warn!(error = %e, "Back capture failed");
                self.restore_front().await;
                return Err(CaptureError::BackCaptureFailed(e));
            }
        };
        info!(width = back.width, height = back.height, "Back photo captured");

        // Handoff
        self.enter(SequencerState::Handoff);
        let pair = CapturedPhotoPair::new(front.data_uri, back.data_uri);
        if let Err(e) = self.store.put(&pair) {
            warn!(error = %e, "Could not store capture");
            self.restore_front().await;
            return Err(CaptureError::Handoff(e.to_string()));
        }
        self.navigator.navigate(Route::CameraPreview);

        info!("Capture sequence complete");
        Ok(ShutterOutcome::Completed(pair))
    }

    /// Put the front camera back after a failed sequence
    ///
    /// Failure here is only logged; the caller reports the original error.
    async fn restore_front(&self) {
        match self.media.acquire(Facing::Front).await {
            Ok(_) => debug!("Front camera restored"),
            Err(e) => warn!(error = %e, "Could not restore front camera"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::{MediaBackend, SyntheticBackend, SyntheticCamera};
    use crate::capture::{FallbackImages, MemoryCaptureStore, RecordingNavigator};
    use crate::errors::MediaError;

    struct Fixture {
        backend: Arc<SyntheticBackend>,
        media: DeviceMediaAccess,
        store: Arc<MemoryCaptureStore>,
        navigator: Arc<RecordingNavigator>,
        sequencer: CaptureSequencer,
    }

    fn fixture(backend: SyntheticBackend) -> Fixture {
        let backend = Arc::new(backend);
        let media = DeviceMediaAccess::new(backend.clone() as Arc<dyn MediaBackend>);
        let store = Arc::new(MemoryCaptureStore::new(FallbackImages::default()));
        let navigator = Arc::new(RecordingNavigator::new());
        let sequencer = CaptureSequencer::new(
            media.clone(),
            store.clone() as Arc<dyn CaptureStore>,
            navigator.clone() as Arc<dyn Navigator>,
        );
        Fixture {
            backend,
            media,
            store,
            navigator,
            sequencer,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_requires_ready_front() {
        let f = fixture(SyntheticBackend::phone());
        assert_eq!(f.sequencer.shutter().await, Err(CaptureError::FrontNotReady));
        assert_eq!(f.sequencer.state(), SequencerState::Idle);
        assert!(!f.sequencer.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_front_frame_leaves_camera_alone() {
        let f = fixture(SyntheticBackend::phone());
        f.media.acquire(Facing::Front).await.unwrap();
        f.backend.set_blank("synthetic-front", true);
        let opened = f.backend.open_count();

        let result = f.sequencer.shutter().await;
        assert!(matches!(result, Err(CaptureError::FrontCaptureFailed(_))));
        assert_eq!(f.backend.open_count(), opened);
        assert_eq!(f.media.facing(), Some(Facing::Front));
        assert_eq!(f.store.put_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_back_frame_restores_front() {
        // The back camera turns ready, then goes blank during the settle delay
        let f = fixture(SyntheticBackend::new(vec![
            SyntheticCamera::new("synthetic-front", "Front Camera"),
            SyntheticCamera::new("synthetic-back", "Back Camera")
                .blank_after(std::time::Duration::from_millis(200)),
        ]));
        f.media.acquire(Facing::Front).await.unwrap();

        let result = f.sequencer.shutter().await;
        assert!(matches!(result, Err(CaptureError::BackCaptureFailed(_))));
        assert!(f.media.is_ready(Facing::Front));
        assert!(f.navigator.routes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flip_rejected_while_busy() {
        let f = fixture(SyntheticBackend::phone());
        f.media.acquire(Facing::Front).await.unwrap();

        let sequencer = f.sequencer.clone();
        let running = tokio::spawn(async move { sequencer.shutter().await });
        tokio::task::yield_now().await;
        // Let the sequence reach the back camera switch
        while !f.sequencer.is_busy() {
            tokio::task::yield_now().await;
        }
        assert_eq!(f.sequencer.flip(Facing::Front).await, Err(CaptureError::Busy));

        let outcome = running.await.unwrap().unwrap();
        assert!(matches!(outcome, ShutterOutcome::Completed(_)));
        assert_eq!(f.sequencer.flip(Facing::Front).await, Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flip_failure_keeps_media_category() {
        let f = fixture(SyntheticBackend::phone().deny_permission());

        for facing in [Facing::Front, Facing::Back] {
            assert_eq!(
                f.sequencer.flip(facing).await,
                Err(CaptureError::Camera(MediaError::PermissionDenied))
            );
        }
        assert_eq!(f.store.put_count(), 0);
        assert!(f.navigator.routes().is_empty());
    }
}
