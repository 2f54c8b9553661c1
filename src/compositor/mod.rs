// SPDX-License-Identifier: GPL-3.0-only

//! Mask compositor
//!
//! Keeps a transparent overlay the size of the video frame and redraws it once
//! per display refresh: clear, ask the tracker for face regions, draw the
//! selected mask over each one. The video frame itself is never modified; the
//! preview shows the overlay stacked on top, and the capture sequencer bakes it
//! into the front photo.

pub mod draw;
pub mod mask;

pub use draw::{MaskPlacement, blend_over, composite_over, draw_mask, draw_regions};
pub use mask::{LoadState, MASKS, MaskAsset, MaskCatalog, mask_ids, rasterize_svg};

use crate::backends::camera::{CameraFrame, DeviceMediaAccess};
use crate::constants::timing;
use crate::tracking::{FaceRegion, TrackingAdapter};
use image::RgbaImage;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Overlay state shared between the render loop and its readers
#[derive(Debug, Default)]
pub struct Overlay {
    image: RgbaImage,
    faces: usize,
}

impl Overlay {
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Number of masks drawn in the last render
    pub fn faces(&self) -> usize {
        self.faces
    }

    /// Render one frame's overlay
    ///
    /// The buffer is reallocated only when the frame size changes.
    pub fn render(&mut self, frame: &CameraFrame, regions: &[FaceRegion], mask: &MaskAsset) {
        if self.image.dimensions() != (frame.width, frame.height) {
            debug!(width = frame.width, height = frame.height, "Resizing overlay");
            self.image = RgbaImage::new(frame.width, frame.height);
        } else {
            self.clear();
        }
        draw_regions(&mut self.image, &mask.image, regions);
        self.faces = regions.len();
    }

    pub fn clear(&mut self) {
        for px in self.image.pixels_mut() {
            px.0 = [0, 0, 0, 0];
        }
        self.faces = 0;
    }
}

/// Shared handle to the overlay
pub type SharedOverlay = Arc<Mutex<Overlay>>;

/// Slot the detector is attached to once it has initialized
pub type SharedTracker = Arc<Mutex<Option<TrackingAdapter>>>;

/// Handle to a running render loop
///
/// Dropping the handle stops the loop.
pub struct MaskCompositor {
    overlay: SharedOverlay,
    mask: Arc<Mutex<Arc<MaskAsset>>>,
    tracker: SharedTracker,
    stop: Arc<AtomicBool>,
    rendered: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl MaskCompositor {
    /// Start the render loop over the frames of `media`
    pub fn start(
        media: DeviceMediaAccess,
        tracker: SharedTracker,
        mask: Arc<MaskAsset>,
        interval: Duration,
    ) -> Self {
        let overlay: SharedOverlay = Arc::new(Mutex::new(Overlay::default()));
        let mask = Arc::new(Mutex::new(mask));
        let stop = Arc::new(AtomicBool::new(false));
        let rendered = Arc::new(AtomicU64::new(0));

        info!(interval_ms = interval.as_millis() as u64, "Starting mask compositor");

        let handle = tokio::spawn(render_loop(
            media,
            Arc::clone(&tracker),
            Arc::clone(&mask),
            Arc::clone(&overlay),
            Arc::clone(&stop),
            Arc::clone(&rendered),
            interval,
        ));

        Self {
            overlay,
            mask,
            tracker,
            stop,
            rendered,
            handle: Some(handle),
        }
    }

    /// Start with the default refresh interval
    pub fn start_default(
        media: DeviceMediaAccess,
        tracker: SharedTracker,
        mask: Arc<MaskAsset>,
    ) -> Self {
        Self::start(media, tracker, mask, timing::FRAME_INTERVAL)
    }

    pub fn overlay(&self) -> SharedOverlay {
        Arc::clone(&self.overlay)
    }

    /// Copy of the current overlay, as the capture reads it
    pub fn snapshot(&self) -> RgbaImage {
        self.overlay.lock().image.clone()
    }

    /// Swap the mask drawn from the next frame on
    pub fn set_mask(&self, mask: Arc<MaskAsset>) {
        info!(mask = %mask.id, "Mask selected");
        *self.mask.lock() = mask;
    }

    pub fn mask_id(&self) -> String {
        self.mask.lock().id.clone()
    }

    /// Frames rendered so far
    pub fn rendered_frames(&self) -> u64 {
        self.rendered.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        !self.stop.load(Ordering::SeqCst)
    }

    /// Stop the loop and close the detector. Idempotent.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.abort();
            info!(frames = self.rendered_frames(), "Mask compositor stopped");
        }
        if let Some(mut tracker) = self.tracker.lock().take() {
            tracker.close();
        }
    }
}

impl Drop for MaskCompositor {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn render_loop(
    media: DeviceMediaAccess,
    tracker: SharedTracker,
    mask: Arc<Mutex<Arc<MaskAsset>>>,
    overlay: SharedOverlay,
    stop: Arc<AtomicBool>,
    rendered: Arc<AtomicU64>,
    interval: Duration,
) {
    let started = Instant::now();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_sequence = None;

    loop {
        ticker.tick().await;
        if stop.load(Ordering::SeqCst) {
            break;
        }

        let Some(frame) = media.current_frame() else {
            continue;
        };
        if frame.is_empty() || last_sequence == Some(frame.sequence) {
            continue;
        }
        last_sequence = Some(frame.sequence);

        let now_ms = started.elapsed().as_millis() as u64;
        let regions = match tracker.lock().as_mut() {
            Some(adapter) => adapter.regions(&frame, now_ms).to_vec(),
            None => Vec::new(),
        };
        let mask = Arc::clone(&*mask.lock());

        overlay.lock().render(&frame, &regions, &mask);

        let count = rendered.fetch_add(1, Ordering::SeqCst) + 1;
        if count % timing::FRAME_LOG_INTERVAL == 0 {
            debug!(frames = count, faces = regions.len(), "Overlay rendered");
        }
    }

    debug!("Render loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::{Facing, MediaBackend, SyntheticBackend};
    use crate::tracking::{BoundingBox, FixedRegionDetector};

    #[test]
    fn test_overlay_without_faces_is_transparent() {
        let mut overlay = Overlay::default();
        let frame = CameraFrame::from_rgba(4, 3, vec![255; 48], 1);
        overlay.render(&frame, &[], &MaskAsset::placeholder("popcat"));
        assert_eq!(overlay.image().dimensions(), (4, 3));
        assert!(overlay.image().pixels().all(|px| px[3] == 0));
        assert_eq!(overlay.faces(), 0);
    }

    #[test]
    fn test_overlay_is_cleared_between_frames() {
        let mut overlay = Overlay::default();
        let frame = CameraFrame::from_rgba(20, 20, vec![0; 1600], 1);
        let mask = MaskAsset::from_image("m", RgbaImage::from_pixel(2, 2, image::Rgba([9, 9, 9, 255])));
        let face = FaceRegion::new(BoundingBox::new(0.0, 0.0, 5.0, 5.0));

        overlay.render(&frame, &[face], &mask);
        assert_eq!(overlay.image().get_pixel(2, 2)[3], 255);

        overlay.render(&frame, &[], &mask);
        assert_eq!(overlay.image().get_pixel(2, 2)[3], 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_draws_and_stops() {
        let backend = Arc::new(SyntheticBackend::phone());
        let media = DeviceMediaAccess::new(backend as Arc<dyn MediaBackend>);
        media.acquire(Facing::Front).await.unwrap();

        let detector = FixedRegionDetector::new(vec![FaceRegion::new(BoundingBox::new(
            20.0, 14.0, 20.0, 20.0,
        ))]);
        let tracker: SharedTracker = Arc::new(Mutex::new(Some(TrackingAdapter::new(Box::new(detector)))));
        let mut compositor = MaskCompositor::start_default(
            media.clone(),
            Arc::clone(&tracker),
            Arc::new(MaskAsset::placeholder("popcat")),
        );

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(compositor.rendered_frames() > 0);
        assert_eq!(compositor.overlay().lock().faces(), 1);
        assert_eq!(compositor.snapshot().dimensions(), (64, 48));

        compositor.stop();
        let frames = compositor.rendered_frames();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(compositor.rendered_frames(), frames);
        assert!(tracker.lock().is_none());
    }
}
