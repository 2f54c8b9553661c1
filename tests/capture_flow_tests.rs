// SPDX-License-Identifier: GPL-3.0-only

//! Capture flow tests over the virtual cameras

use image::{Rgba, RgbaImage};
use ping::backends::camera::{
    CameraFrame, DeviceMediaAccess, Facing, MediaBackend, SyntheticBackend, SyntheticCamera,
};
use ping::capture::{
    CaptureScreen, CaptureStore, FallbackImages, MemoryCaptureStore, Navigator,
    RecordingNavigator, Route, SessionFileStore, ShutterOutcome,
};
use ping::compositor::{MaskAsset, MaskCatalog, Overlay};
use ping::errors::CaptureError;
use ping::media::ImageDataUri;
use ping::pipelines::photo::PhotoCapture;
use ping::tracking::{
    BoundingBox, FaceRegion, FixedRegionDetector, Keypoint, ready_factory, roll_angle,
};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    backend: Arc<SyntheticBackend>,
    media: DeviceMediaAccess,
    store: Arc<MemoryCaptureStore>,
    navigator: Arc<RecordingNavigator>,
}

impl Harness {
    fn new(backend: SyntheticBackend) -> Self {
        let backend = Arc::new(backend);
        Self {
            media: DeviceMediaAccess::new(backend.clone() as Arc<dyn MediaBackend>),
            backend,
            store: Arc::new(MemoryCaptureStore::new(FallbackImages::default())),
            navigator: Arc::new(RecordingNavigator::new()),
        }
    }

    async fn open(&self) -> CaptureScreen {
        CaptureScreen::builder(
            self.media.clone(),
            self.store.clone() as Arc<dyn CaptureStore>,
            self.navigator.clone() as Arc<dyn Navigator>,
        )
        .catalog(Arc::new(MaskCatalog::new(
            std::env::temp_dir().join("ping-flow-tests-no-masks"),
        )))
        .open()
        .await
    }
}

#[tokio::test(start_paused = true)]
async fn test_single_stream_across_switches() {
    let h = Harness::new(SyntheticBackend::phone());
    let sequence = [
        Facing::Front,
        Facing::Back,
        Facing::Back,
        Facing::Front,
        Facing::Back,
        Facing::Front,
    ];

    for facing in sequence {
        h.media.acquire(facing).await.unwrap();
        assert_eq!(h.backend.active_streams(), 1);
        assert_eq!(h.media.facing(), Some(facing));
    }
    assert_eq!(h.backend.peak_active_streams(), 1);

    h.media.release().await;
    assert_eq!(h.backend.active_streams(), 0);
}

#[test]
fn test_front_photo_is_mirrored_with_centered_mask() {
    let camera = SyntheticCamera::new("cam", "Front Camera").with_size(20, 10);
    let frame: CameraFrame = camera.render(1);
    let red = Rgba([255, 0, 0, 255]);
    let mask = MaskAsset::from_image("red", RgbaImage::from_pixel(4, 4, red));

    // 1x1 face at the frame center, level keypoints
    let region = FaceRegion::new(BoundingBox::new(9.5, 4.5, 1.0, 1.0))
        .with_keypoints(vec![Keypoint::new(9.6, 5.0), Keypoint::new(10.4, 5.0)]);
    let mut overlay = Overlay::default();
    overlay.render(&frame, &[region], &mask);
    assert_eq!(overlay.faces(), 1);

    let photo = PhotoCapture::compose(&frame, Facing::Front, Some(overlay.image())).unwrap();

    // The 1.2 px square covers the four pixels around the center
    for (x, y) in [(9, 4), (10, 4), (9, 5), (10, 5)] {
        assert_eq!(*photo.get_pixel(x, y), red, "pixel {x},{y}");
    }
    // Everything else is the source, mirrored
    for (x, y) in [(0, 0), (8, 5), (11, 5), (10, 7), (19, 9)] {
        assert_eq!(photo.get_pixel(x, y).0, camera.pattern_pixel(19 - x, y));
    }
}

#[test]
fn test_roll_estimate() {
    let tilted = roll_angle(&[Keypoint::new(0.0, 0.0), Keypoint::new(10.0, 10.0)]);
    assert!((tilted - std::f32::consts::FRAC_PI_4).abs() < 1e-6);
    let level = roll_angle(&[Keypoint::new(0.0, 0.0), Keypoint::new(10.0, 0.0)]);
    assert_eq!(level, 0.0);
}

#[test]
fn test_empty_bridge_returns_fallbacks() {
    let fallback = FallbackImages::from_bucket("https://db.example.co", "feeds");
    let memory = MemoryCaptureStore::new(fallback.clone());
    let photos = memory.take();
    assert_eq!(photos.front, fallback.front);
    assert_eq!(photos.back, fallback.back);
    assert!(!photos.is_capture());

    let dir = tempfile::tempdir().unwrap();
    let file = SessionFileStore::in_dir(dir.path(), fallback.clone());
    let photos = file.take();
    assert_eq!(photos.front, fallback.front);
    assert_eq!(photos.back, fallback.back);
}

#[tokio::test(start_paused = true)]
async fn test_back_unavailable_returns_to_front() {
    let h = Harness::new(SyntheticBackend::front_only());
    let screen = h.open().await;
    assert!(h.media.is_ready(Facing::Front));

    let result = screen.shutter().await;
    assert!(matches!(result, Err(CaptureError::BackCameraUnavailable(_))));

    assert_eq!(h.media.facing(), Some(Facing::Front));
    assert!(h.media.is_ready(Facing::Front));
    let status = screen.status_message().unwrap();
    assert!(status.contains("back camera is unavailable"), "{status}");
    assert!(h.navigator.routes().is_empty());
    assert_eq!(h.store.put_count(), 0);
    assert_eq!(h.backend.peak_active_streams(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_successful_capture_hands_off_once() {
    let h = Harness::new(SyntheticBackend::phone());
    let screen = h.open().await;

    let outcome = screen.shutter().await.unwrap();
    let ShutterOutcome::Completed(pair) = outcome else {
        panic!("expected a completed capture");
    };

    assert_eq!(h.store.put_count(), 1);
    assert_eq!(h.navigator.routes(), vec![Route::CameraPreview]);
    assert!(pair.front.starts_with("data:image/jpeg;base64,"));
    assert!(pair.back.starts_with("data:image/jpeg;base64,"));

    let review = h.store.take();
    assert!(review.is_capture());
    assert_eq!(review.front, pair.front);
    assert_eq!(h.backend.peak_active_streams(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_second_press_is_ignored() {
    let h = Harness::new(SyntheticBackend::phone());
    let screen = Arc::new(h.open().await);

    let first = {
        let screen = screen.clone();
        tokio::spawn(async move { screen.shutter().await })
    };
    while !screen.sequencer().is_busy() {
        tokio::task::yield_now().await;
    }

    assert_eq!(screen.shutter().await, Ok(ShutterOutcome::Ignored));
    let outcome = first.await.unwrap().unwrap();
    assert!(matches!(outcome, ShutterOutcome::Completed(_)));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.store.put_count(), 1);
    assert_eq!(h.navigator.routes().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_one_shot_capture_bakes_in_mask() {
    let masks = tempfile::tempdir().unwrap();
    RgbaImage::from_pixel(8, 8, Rgba([255, 0, 0, 255]))
        .save(masks.path().join("popcat.png"))
        .unwrap();

    let h = Harness::new(SyntheticBackend::phone());
    // Face over the middle of the 64x48 frame
    let face = FaceRegion::new(BoundingBox::new(22.0, 14.0, 20.0, 20.0));
    let mut screen = CaptureScreen::builder(
        h.media.clone(),
        h.store.clone() as Arc<dyn CaptureStore>,
        h.navigator.clone() as Arc<dyn Navigator>,
    )
    .catalog(Arc::new(MaskCatalog::new(masks.path())))
    .mask("popcat")
    .detector(ready_factory(FixedRegionDetector::new(vec![face])))
    .settle_delay(Duration::from_millis(20))
    .open()
    .await;

    // Pressed right after opening, as the CLI does
    let outcome = screen
        .shutter_when_ready(Duration::from_secs(5))
        .await
        .unwrap();
    screen.shutdown().await;

    let ShutterOutcome::Completed(pair) = outcome else {
        panic!("expected a completed capture");
    };
    let front = ImageDataUri::parse(&pair.front).unwrap();
    let photo = image::load_from_memory(&front.bytes).unwrap().to_rgba8();
    let center = photo.get_pixel(32, 24);
    assert!(
        center[0] > 200 && center[1] < 60 && center[2] < 60,
        "front photo center is {:?}, expected the red mask",
        center
    );
}
