// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! The capture and publish steps run as separate processes, so the capture
//! is handed over through the session file in the configured session dir.

use ping::api::{FeedLoader, PingClient, PublishGateway};
use ping::backends::camera::{
    DeviceMediaAccess, MediaBackend, MediaTiming, SyntheticBackend, get_backend,
};
use ping::capture::{
    CaptureScreen, FallbackImages, Navigator, Route, SessionFileStore, ShutterOutcome,
};
use ping::config::Config;
use ping::constants::timing;
use ping::server::{self, MemoryBackend, ServerState};
use ping::tracking::{
    BoundingBox, DetectorFactory, FaceRegion, FixedRegionDetector, ready_factory,
    unavailable_factory,
};
use std::net::SocketAddr;
use std::sync::Arc;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Prints where the flow would go next
struct PrintNavigator;

impl Navigator for PrintNavigator {
    fn navigate(&self, route: Route) {
        println!("Next: {}", route.path());
    }
}

fn backend(virtual_cameras: bool) -> Arc<dyn MediaBackend> {
    if virtual_cameras {
        Arc::new(SyntheticBackend::phone())
    } else {
        get_backend()
    }
}

fn session_store(config: &Config) -> Result<Arc<SessionFileStore>, Box<dyn std::error::Error>> {
    let dir = config.session_dir();
    std::fs::create_dir_all(&dir)?;
    Ok(Arc::new(SessionFileStore::in_dir(
        &dir,
        FallbackImages::default(),
    )))
}

/// List all available cameras
pub fn list_cameras(virtual_cameras: bool) -> CliResult {
    let media = DeviceMediaAccess::new(backend(virtual_cameras));
    let devices = media.enumerate_devices()?;

    if devices.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras ({}):", media.backend_name());
    println!();
    for (index, device) in devices.iter().enumerate() {
        let facing = device
            .facing
            .map(|f| f.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!("  [{}] {} ({}), facing {}", index, device.label, device.id, facing);
    }
    Ok(())
}

/// Open the capture screen, press the shutter once and store the pair
pub async fn capture(
    virtual_cameras: bool,
    mask: Option<String>,
    face: Option<BoundingBox>,
) -> CliResult {
    let config = Config::load()?;
    let media =
        DeviceMediaAccess::with_timing(backend(virtual_cameras), MediaTiming::from(&config));
    let store = session_store(&config)?;

    let detector = match face {
        Some(bbox) => ready_factory(FixedRegionDetector::new(vec![FaceRegion::new(bbox)])),
        None => model_detector(&config),
    };

    let mut builder = CaptureScreen::builder(media, store.clone(), Arc::new(PrintNavigator))
        .config(&config)
        .detector(detector);
    if let Some(mask) = mask {
        builder = builder.mask(mask);
    }
    let mut screen = builder.open().await;

    if let Some(session) = screen.session() {
        println!(
            "Front camera: {} ({}x{})",
            session.device.label, session.width, session.height
        );
    }

    let outcome = screen
        .shutter_when_ready(timing::OVERLAY_READY_TIMEOUT)
        .await;
    let status = screen.status_message();
    screen.shutdown().await;

    match outcome {
        Ok(ShutterOutcome::Completed(_)) => {
            println!("Capture stored in {}", store.path().display());
            Ok(())
        }
        Ok(ShutterOutcome::Ignored) => Err("A capture is already in progress".into()),
        Err(e) => Err(status.unwrap_or_else(|| e.to_string()).into()),
    }
}

/// Publish the stored capture
pub async fn publish(wallet: &str, caption: &str) -> CliResult {
    let config = Config::load()?;
    let store = session_store(&config)?;
    let client = Arc::new(PingClient::new(&config.api_base_url)?);
    let gateway = PublishGateway::new(client, store.clone());

    let published = gateway.publish_stored(Some(wallet), caption).await?;
    match &published.feed {
        Some(feed) => println!("Published feed {}", feed.feed_id),
        None => println!("Published"),
    }
    println!("Next: {}", published.next.path());
    Ok(())
}

/// Print the feed, three posts per page
pub async fn show_feed(wallet: Option<String>, limit: Option<u32>) -> CliResult {
    let config = Config::load()?;
    let client = Arc::new(PingClient::new(&config.api_base_url)?);

    let mut loader = FeedLoader::new(client);
    if let Some(wallet) = wallet {
        loader = loader.for_wallet(wallet);
    }
    if let Some(limit) = limit {
        loader = loader.with_limit(limit);
    }

    let total = loader.reload().wait().await?;
    if total == 0 {
        println!("No posts yet.");
        return Ok(());
    }

    let mut page = 1;
    let mut printed = 0;
    loop {
        println!("Page {}", page);
        let shown = loader.items();
        for post in unprinted(&shown, printed) {
            println!("  {} by {}: {}", post.feed_id, post.user, post.meta);
            println!("    front {}", post.overlay);
            println!("    back  {}", post.image);
        }
        printed = shown.len();
        if !loader.has_more() {
            break;
        }
        loader.load_more();
        page += 1;
    }
    Ok(())
}

/// Detector for the configured face models
#[cfg(feature = "onnx")]
fn model_detector(config: &Config) -> DetectorFactory {
    match &config.face_model {
        Some(face_model) => {
            ping::tracking::onnx_factory(face_model.clone(), config.landmark_model.clone())
        }
        None => unavailable_factory("no face model configured"),
    }
}

#[cfg(not(feature = "onnx"))]
fn model_detector(config: &Config) -> DetectorFactory {
    if config.face_model.is_some() {
        unavailable_factory("built without the onnx feature")
    } else {
        unavailable_factory("no face model configured")
    }
}

/// Items revealed since the last page was printed
fn unprinted<T>(shown: &[T], printed: usize) -> &[T] {
    &shown[printed.min(shown.len())..]
}

/// Run the REST proxy until interrupted
pub async fn serve(bind: SocketAddr, memory: bool) -> CliResult {
    let state = if memory {
        ServerState::memory(Arc::new(MemoryBackend::new()))
            .with_app_id(std::env::var("APP_ID").ok())
    } else {
        ServerState::from_env()
    };
    server::serve(bind, state).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_last_page_is_not_repeated() {
        let all: Vec<u32> = (0..7).collect();
        let mut printed = 0;
        let mut pages = Vec::new();
        for visible in [3, 6, 7] {
            let shown = &all[..visible];
            pages.push(unprinted(shown, printed).to_vec());
            printed = shown.len();
        }
        assert_eq!(pages, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
        assert!(unprinted(&all[..2], 7).is_empty());
    }
}
