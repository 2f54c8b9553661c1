// SPDX-License-Identifier: GPL-3.0-only

//! Publish gateway and feed loader tests against scripted API doubles

use async_trait::async_trait;
use parking_lot::Mutex;
use ping::api::{
    CreateFeedRequest, FeedLoader, FeedPostView, FeedPublisher, FeedSource, PublishGateway,
};
use ping::capture::{
    CaptureStore, CapturedPhotoPair, FallbackImages, MemoryCaptureStore, Route,
};
use ping::errors::{ApiError, PublishError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const FRONT: &str = "data:image/jpeg;base64,/9j/4AAQSkZJRg==";
const BACK: &str = "data:image/jpeg;base64,/9j/4AAQSkZJRh==";

#[derive(Default)]
struct CountingApi {
    calls: AtomicUsize,
    requests: Mutex<Vec<CreateFeedRequest>>,
    reject: Option<ApiError>,
}

#[async_trait]
impl FeedPublisher for CountingApi {
    async fn create_feed(
        &self,
        request: &CreateFeedRequest,
    ) -> Result<Option<FeedPostView>, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        if let Some(err) = &self.reject {
            return Err(err.clone());
        }
        Ok(Some(FeedPostView {
            feed_id: "feed-1".to_string(),
            ..Default::default()
        }))
    }
}

fn gateway(api: &Arc<CountingApi>) -> (PublishGateway, Arc<MemoryCaptureStore>) {
    let store = Arc::new(MemoryCaptureStore::new(FallbackImages::default()));
    let gateway = PublishGateway::new(
        api.clone() as Arc<dyn FeedPublisher>,
        store.clone() as Arc<dyn CaptureStore>,
    );
    (gateway, store)
}

#[tokio::test]
async fn test_missing_wallet_rejected_before_network() {
    let api = Arc::new(CountingApi::default());
    let (gateway, _) = gateway(&api);

    for wallet in [None, Some(""), Some("   ")] {
        let result = gateway.publish(wallet, FRONT, BACK, "hi").await;
        assert_eq!(result, Err(PublishError::NotSignedIn));
    }
    assert_eq!(api.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_non_data_uri_requires_recapture() {
    let api = Arc::new(CountingApi::default());
    let (gateway, store) = gateway(&api);

    // Nothing stored: the placeholders are URLs, not captures
    let result = gateway.publish_stored(Some("0xabc"), "").await;
    assert_eq!(result, Err(PublishError::RecaptureRequired));

    let result = gateway
        .publish(Some("0xabc"), "https://cdn.example.com/a.jpg", BACK, "")
        .await;
    assert_eq!(result, Err(PublishError::RecaptureRequired));
    assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.put_count(), 0);
}

#[tokio::test]
async fn test_publish_stored_capture() {
    let api = Arc::new(CountingApi::default());
    let (gateway, store) = gateway(&api);
    store
        .put(&CapturedPhotoPair::new(FRONT.to_string(), BACK.to_string()))
        .unwrap();

    let published = gateway
        .publish_stored(Some(" 0xABC "), "  sunny  ")
        .await
        .unwrap();
    assert_eq!(published.next, Route::FeedAll);
    assert_eq!(published.feed.unwrap().feed_id, "feed-1");

    let sent = api.requests.lock()[0].clone();
    assert_eq!(sent.wallet_address.as_deref(), Some("0xABC"));
    assert_eq!(sent.caption.as_deref(), Some("sunny"));
    assert_eq!(sent.front_image.as_deref(), Some(FRONT));

    // The capture is consumed
    assert!(!store.take().is_capture());
}

#[tokio::test]
async fn test_rejection_keeps_capture() {
    let api = Arc::new(CountingApi {
        reject: Some(ApiError::Http {
            status: 500,
            detail: "Supabase feeds insert failed".to_string(),
        }),
        ..Default::default()
    });
    let (gateway, store) = gateway(&api);
    store
        .put(&CapturedPhotoPair::new(FRONT.to_string(), BACK.to_string()))
        .unwrap();

    let result = gateway.publish_stored(Some("0xabc"), "").await;
    assert!(matches!(result, Err(PublishError::Rejected { status: 500, .. })));
    assert!(store.take().is_capture());
}

/// Each call sleeps, then answers with posts tagged by call number
struct SlowSource {
    calls: AtomicUsize,
    delays: Vec<Duration>,
}

#[async_trait]
impl FeedSource for SlowSource {
    async fn fetch_feeds(
        &self,
        _wallet: Option<&str>,
        _limit: Option<u32>,
    ) -> Result<Vec<FeedPostView>, ApiError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays.get(call).copied().unwrap_or_default();
        tokio::time::sleep(delay).await;
        Ok((0..5)
            .map(|i| FeedPostView {
                feed_id: format!("call{}-{}", call, i),
                ..Default::default()
            })
            .collect())
    }
}

#[tokio::test(start_paused = true)]
async fn test_reload_cancels_prior_request() {
    let source = Arc::new(SlowSource {
        calls: AtomicUsize::new(0),
        delays: vec![Duration::from_millis(500), Duration::from_millis(50)],
    });
    let loader = FeedLoader::new(source.clone() as Arc<dyn FeedSource>);

    let first = loader.reload();
    while source.calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }
    let second = loader.reload();

    assert_eq!(second.wait().await, Ok(5));
    assert_eq!(first.wait().await, Err(ApiError::Aborted));

    // Past the first request's delay; nothing changes
    tokio::time::sleep(Duration::from_secs(1)).await;
    let ids: Vec<String> = loader.items().into_iter().map(|p| p.feed_id).collect();
    assert_eq!(ids, ["call1-0", "call1-1", "call1-2"]);
    assert!(loader.has_more());
    assert!(!loader.is_loading());

    assert_eq!(loader.load_more(), 2);
    assert!(!loader.has_more());
    assert_eq!(loader.all_items().len(), 5);
}
