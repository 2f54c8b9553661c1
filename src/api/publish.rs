// SPDX-License-Identifier: GPL-3.0-only

//! Publish gateway
//!
//! Validates a captured pair locally, sends it once and clears the handoff
//! store when the backend accepts it.

use super::FeedPublisher;
use super::types::{CreateFeedRequest, FeedPostView};
use crate::capture::{CaptureStore, Route};
use crate::errors::PublishError;
use crate::media::is_image_data_uri;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of a successful publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    /// The stored post, when the backend returned it
    pub feed: Option<FeedPostView>,
    /// Where the caller goes next
    pub next: Route,
}

/// Sends captured photo pairs to the feed
pub struct PublishGateway {
    api: Arc<dyn FeedPublisher>,
    store: Arc<dyn CaptureStore>,
}

impl PublishGateway {
    pub fn new(api: Arc<dyn FeedPublisher>, store: Arc<dyn CaptureStore>) -> Self {
        Self { api, store }
    }

    /// Publish the pair with an optional caption
    ///
    /// Nothing is sent without a wallet or without two image data URIs. A
    /// blank caption is sent as `null`. There is no retry.
    pub async fn publish(
        &self,
        wallet: Option<&str>,
        front: &str,
        back: &str,
        caption: &str,
    ) -> Result<Published, PublishError> {
        let wallet = wallet
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .ok_or(PublishError::NotSignedIn)?;
        if !is_image_data_uri(front) || !is_image_data_uri(back) {
            return Err(PublishError::RecaptureRequired);
        }

        let caption = caption.trim();
        let request = CreateFeedRequest {
            wallet_address: Some(wallet.to_string()),
            front_image: Some(front.to_string()),
            back_image: Some(back.to_string()),
            caption: (!caption.is_empty()).then(|| caption.to_string()),
        };

        let feed = self.api.create_feed(&request).await.map_err(|e| {
            warn!(error = %e, "Publish failed");
            PublishError::from(e)
        })?;

        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Could not clear stored capture");
        }
        info!(feed_id = feed.as_ref().map(|f| f.feed_id.as_str()), "Published");

        Ok(Published {
            feed,
            next: Route::FeedAll,
        })
    }

    /// Publish whatever the capture store currently holds
    pub async fn publish_stored(
        &self,
        wallet: Option<&str>,
        caption: &str,
    ) -> Result<Published, PublishError> {
        let photos = self.store.take();
        self.publish(wallet, &photos.front, &photos.back, caption).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CapturedPhotoPair, FallbackImages, MemoryCaptureStore};
    use crate::errors::ApiError;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    const FRONT: &str = "data:image/jpeg;base64,AAAA";
    const BACK: &str = "data:image/jpeg;base64,BBBB";

    #[derive(Default)]
    struct FakeApi {
        requests: Mutex<Vec<CreateFeedRequest>>,
        reject: Option<(u16, String)>,
    }

    #[async_trait]
    impl FeedPublisher for FakeApi {
        async fn create_feed(
            &self,
            request: &CreateFeedRequest,
        ) -> Result<Option<FeedPostView>, ApiError> {
            self.requests.lock().push(request.clone());
            match &self.reject {
                Some((status, detail)) => Err(ApiError::Http {
                    status: *status,
                    detail: detail.clone(),
                }),
                None => Ok(Some(FeedPostView {
                    feed_id: "feed-1".into(),
                    ..Default::default()
                })),
            }
        }
    }

    fn gateway(api: Arc<FakeApi>) -> (PublishGateway, Arc<MemoryCaptureStore>) {
        let store = Arc::new(MemoryCaptureStore::new(FallbackImages::default()));
        store
            .put(&CapturedPhotoPair::new(FRONT.into(), BACK.into()))
            .unwrap();
        (PublishGateway::new(api, store.clone()), store)
    }

    #[tokio::test]
    async fn test_blank_wallet_sends_nothing() {
        let api = Arc::new(FakeApi::default());
        let (gateway, _) = gateway(api.clone());
        for wallet in [None, Some(""), Some("   ")] {
            let err = gateway.publish(wallet, FRONT, BACK, "").await.unwrap_err();
            assert_eq!(err, PublishError::NotSignedIn);
        }
        assert!(api.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_placeholder_photos_require_recapture() {
        let api = Arc::new(FakeApi::default());
        let (gateway, _) = gateway(api.clone());
        let err = gateway
            .publish(Some("0xabc"), "/feeds/Feed_selfie_01.png", BACK, "")
            .await
            .unwrap_err();
        assert_eq!(err, PublishError::RecaptureRequired);
        assert!(api.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_caption_is_trimmed_and_store_cleared() {
        let api = Arc::new(FakeApi::default());
        let (gateway, store) = gateway(api.clone());

        let published = gateway.publish_stored(Some(" 0xabc "), "   ").await.unwrap();
        assert_eq!(published.next, Route::FeedAll);
        assert_eq!(published.feed.unwrap().feed_id, "feed-1");

        let sent = api.requests.lock()[0].clone();
        assert_eq!(sent.wallet_address.as_deref(), Some("0xabc"));
        assert_eq!(sent.caption, None);
        assert!(!store.take().is_capture());
    }

    #[tokio::test]
    async fn test_rejection_surfaces_raw_body_and_keeps_store() {
        let api = Arc::new(FakeApi {
            reject: Some((500, "{\"message\":\"Supabase feeds insert failed\"}".into())),
            ..Default::default()
        });
        let (gateway, store) = gateway(api.clone());

        let err = gateway
            .publish(Some("0xabc"), FRONT, BACK, " hi ")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PublishError::Rejected {
                status: 500,
                detail: "{\"message\":\"Supabase feeds insert failed\"}".into()
            }
        );
        assert_eq!(api.requests.lock().len(), 1);
        assert_eq!(api.requests.lock()[0].caption.as_deref(), Some("hi"));
        assert!(store.take().is_capture());
    }
}
