// SPDX-License-Identifier: GPL-3.0-only

//! Capture screen controller
//!
//! Owns everything the capture screen needs while it is open: the camera
//! session, the mask compositor, the face tracker and the sequencer. Opening
//! the screen starts the front camera and the overlay right away; the detector
//! is attached in the background once its factory resolves. Closing the screen
//! (or dropping it) stops all of it.

use super::{CaptureSequencer, CaptureStore, Navigator, ShutterOutcome};
use crate::backends::camera::{CameraSessionInfo, DeviceMediaAccess, Facing};
use crate::compositor::{MaskCatalog, MaskCompositor, SharedTracker};
use crate::config::Config;
use crate::constants::{JpegQualityPreset, timing};
use crate::errors::CaptureError;
use crate::tracking::{DetectorFactory, TrackingAdapter};
use image::RgbaImage;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Builder for [`CaptureScreen`]
pub struct CaptureScreenBuilder {
    media: DeviceMediaAccess,
    store: Arc<dyn CaptureStore>,
    navigator: Arc<dyn Navigator>,
    catalog: Arc<MaskCatalog>,
    mask: Option<String>,
    detector: Option<DetectorFactory>,
    frame_interval: Duration,
    detect_interval: Duration,
    settle_delay: Duration,
    quality: JpegQualityPreset,
}

impl CaptureScreenBuilder {
    pub fn new(
        media: DeviceMediaAccess,
        store: Arc<dyn CaptureStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            media,
            store,
            navigator,
            catalog: Arc::new(MaskCatalog::new(Config::default().mask_dir())),
            mask: None,
            detector: None,
            frame_interval: timing::FRAME_INTERVAL,
            detect_interval: timing::DETECT_INTERVAL,
            settle_delay: timing::CAPTURE_SETTLE_DELAY,
            quality: JpegQualityPreset::default(),
        }
    }

    /// Apply timings, quality, mask directory and default mask from config
    pub fn config(mut self, config: &Config) -> Self {
        self.catalog = Arc::new(MaskCatalog::new(config.mask_dir()));
        self.mask = Some(config.default_mask.clone());
        self.frame_interval = config.frame_interval();
        self.detect_interval = config.detect_interval();
        self.settle_delay = config.capture_settle_delay();
        self.quality = config.jpeg_quality;
        self
    }

    pub fn catalog(mut self, catalog: Arc<MaskCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Mask shown when the screen opens
    pub fn mask(mut self, id: impl Into<String>) -> Self {
        self.mask = Some(id.into());
        self
    }

    /// Detector to attach once it has initialized
    pub fn detector(mut self, factory: DetectorFactory) -> Self {
        self.detector = Some(factory);
        self
    }

    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Open the screen
    ///
    /// Camera and tracker failures do not fail the call; they end up in
    /// [`CaptureScreen::status_message`] and the screen stays usable.
    pub async fn open(self) -> CaptureScreen {
        let status = Arc::new(Mutex::new(None));
        let closed = Arc::new(AtomicBool::new(false));
        let tracker: SharedTracker = Arc::new(Mutex::new(None));

        if let Err(e) = self.media.acquire(Facing::Front).await {
            warn!(error = %e, "Front camera unavailable");
            *status.lock() = Some(e.to_string());
        }

        let mask = match &self.mask {
            Some(id) => self.catalog.load(id),
            None => self.catalog.default_mask(),
        };
        let compositor = MaskCompositor::start(
            self.media.clone(),
            Arc::clone(&tracker),
            mask,
            self.frame_interval,
        );

        let sequencer = CaptureSequencer::new(self.media.clone(), self.store, self.navigator)
            .with_overlay(compositor.overlay())
            .with_settle_delay(self.settle_delay)
            .with_quality(self.quality);

        let detector_task = self.detector.map(|factory| {
            tokio::spawn(attach_detector(
                factory,
                Arc::clone(&tracker),
                Arc::clone(&status),
                Arc::clone(&closed),
                self.detect_interval,
            ))
        });

        info!(mask = %compositor.mask_id(), "Capture screen opened");

        CaptureScreen {
            media: self.media,
            sequencer,
            compositor: Some(compositor),
            tracker,
            catalog: self.catalog,
            detector_task,
            status,
            closed,
        }
    }
}

async fn attach_detector(
    factory: DetectorFactory,
    tracker: SharedTracker,
    status: Arc<Mutex<Option<String>>>,
    closed: Arc<AtomicBool>,
    interval: Duration,
) {
    match factory().await {
        Ok(mut detector) => {
            let mut slot = tracker.lock();
            // The screen may have closed while the model was loading
            if closed.load(Ordering::SeqCst) {
                detector.close();
                return;
            }
            *slot = Some(TrackingAdapter::with_interval(detector, interval));
            info!("Face tracking attached");
        }
        Err(e) => {
            warn!(error = %e, "Face tracking unavailable, continuing without masks");
            let mut status = status.lock();
            if status.is_none() {
                *status = Some(e.to_string());
            }
        }
    }
}

/// The open capture screen
pub struct CaptureScreen {
    media: DeviceMediaAccess,
    sequencer: CaptureSequencer,
    compositor: Option<MaskCompositor>,
    tracker: SharedTracker,
    catalog: Arc<MaskCatalog>,
    detector_task: Option<JoinHandle<()>>,
    status: Arc<Mutex<Option<String>>>,
    closed: Arc<AtomicBool>,
}

impl CaptureScreen {
    pub fn builder(
        media: DeviceMediaAccess,
        store: Arc<dyn CaptureStore>,
        navigator: Arc<dyn Navigator>,
    ) -> CaptureScreenBuilder {
        CaptureScreenBuilder::new(media, store, navigator)
    }

    /// Latest user-facing error, if any
    pub fn status_message(&self) -> Option<String> {
        self.status.lock().clone()
    }

    pub fn session(&self) -> Option<CameraSessionInfo> {
        self.media.current_session()
    }

    pub fn sequencer(&self) -> &CaptureSequencer {
        &self.sequencer
    }

    /// True once a detector is attached
    pub fn is_tracking(&self) -> bool {
        self.tracker.lock().is_some()
    }

    /// Overlay frames drawn so far
    pub fn rendered_frames(&self) -> u64 {
        self.compositor
            .as_ref()
            .map(MaskCompositor::rendered_frames)
            .unwrap_or(0)
    }

    /// Wait until the overlay has been drawn with the detector attached
    ///
    /// Without a detector this only waits for the first drawn frame. Returns
    /// false if tracking failed to start, the screen closed, or `timeout`
    /// passed; the shutter still works then, without a mask.
    pub async fn wait_for_overlay(&self, timeout: Duration) -> bool {
        let wait = async {
            let mut baseline = None;
            loop {
                if self.closed.load(Ordering::SeqCst) {
                    return false;
                }
                let attaching = self.detector_task.is_some() && !self.is_tracking();
                if attaching {
                    if self
                        .detector_task
                        .as_ref()
                        .is_some_and(JoinHandle::is_finished)
                    {
                        return false;
                    }
                } else {
                    let frames = self.rendered_frames();
                    // A frame in flight when tracking attached may predate it
                    match baseline {
                        None => baseline = Some(frames),
                        Some(start) if frames >= start + 2 => return true,
                        Some(_) => {}
                    }
                }
                tokio::time::sleep(timing::OVERLAY_POLL_INTERVAL).await;
            }
        };
        let ready = tokio::time::timeout(timeout, wait).await.unwrap_or(false);
        if !ready {
            warn!(tracking = self.is_tracking(), "Overlay not ready");
        }
        ready
    }

    /// Current overlay
    pub fn overlay_snapshot(&self) -> Option<RgbaImage> {
        self.compositor.as_ref().map(MaskCompositor::snapshot)
    }

    pub fn mask_id(&self) -> Option<String> {
        self.compositor.as_ref().map(MaskCompositor::mask_id)
    }

    /// Select a mask; unknown ids fall back to the default. Returns the id in use.
    pub fn select_mask(&self, id: &str) -> Option<String> {
        let compositor = self.compositor.as_ref()?;
        let mask = self.catalog.load(id);
        let selected = mask.id.clone();
        compositor.set_mask(mask);
        Some(selected)
    }

    /// Press the shutter
    pub async fn shutter(&self) -> Result<ShutterOutcome, CaptureError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CaptureError::Closed);
        }
        let result = self.sequencer.shutter().await;
        match &result {
            Ok(ShutterOutcome::Completed(_)) => *self.status.lock() = None,
            Ok(ShutterOutcome::Ignored) => {}
            Err(e) => *self.status.lock() = Some(e.to_string()),
        }
        result
    }

    /// Wait for the tracked overlay, then press the shutter
    ///
    /// For one-shot captures that press right after opening the screen.
    pub async fn shutter_when_ready(
        &self,
        timeout: Duration,
    ) -> Result<ShutterOutcome, CaptureError> {
        self.wait_for_overlay(timeout).await;
        self.shutter().await
    }

    /// Switch cameras manually
    pub async fn flip(&self, facing: Facing) -> Result<(), CaptureError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CaptureError::Closed);
        }
        let result = self.sequencer.flip(facing).await;
        match &result {
            Ok(()) => *self.status.lock() = None,
            Err(e) => *self.status.lock() = Some(e.to_string()),
        }
        result
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop the overlay, close the detector and release the camera. Idempotent.
    pub async fn shutdown(&mut self) {
        if self.teardown() {
            self.media.release().await;
            info!("Capture screen closed");
        }
    }

    /// Everything except the camera release; returns false if already closed
    fn teardown(&mut self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        if let Some(task) = self.detector_task.take() {
            task.abort();
        }
        if let Some(mut compositor) = self.compositor.take() {
            compositor.stop();
        }
        true
    }
}

impl Drop for CaptureScreen {
    fn drop(&mut self) {
        if self.teardown() {
            self.media.release_now();
        }
    }
}
