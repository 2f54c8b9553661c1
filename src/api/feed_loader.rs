// SPDX-License-Identifier: GPL-3.0-only

//! Feed list loader
//!
//! The full list is fetched in one request and revealed a page at a time.
//! Only the latest reload counts: starting a new one aborts the previous
//! request, and a result that still arrives late is discarded by generation.

use super::FeedSource;
use super::types::FeedPostView;
use crate::constants::feed::{DEFAULT_LIMIT, PAGE_SIZE};
use crate::errors::ApiError;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Message shown when the feed cannot be loaded
pub const LOAD_FAILED_MESSAGE: &str = "Could not load the feed";

#[derive(Debug, Default)]
struct FeedState {
    all: Vec<FeedPostView>,
    visible: usize,
    loading: bool,
    error: Option<String>,
}

impl FeedState {
    fn has_more(&self) -> bool {
        self.all.len() > self.visible
    }
}

/// Handle to one reload
pub struct FeedRequest {
    handle: JoinHandle<Result<usize, ApiError>>,
}

impl FeedRequest {
    /// Wait for the reload; a superseded reload gives [`ApiError::Aborted`]
    pub async fn wait(self) -> Result<usize, ApiError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(ApiError::Aborted),
            Err(e) => Err(ApiError::Transport(e.to_string())),
        }
    }
}

/// Paged view over the feed list
pub struct FeedLoader {
    source: Arc<dyn FeedSource>,
    wallet: Option<String>,
    limit: u32,
    state: Arc<Mutex<FeedState>>,
    generation: Arc<AtomicU64>,
    in_flight: Mutex<Option<tokio::task::AbortHandle>>,
}

impl FeedLoader {
    /// Loader over all feeds
    pub fn new(source: Arc<dyn FeedSource>) -> Self {
        Self {
            source,
            wallet: None,
            limit: DEFAULT_LIMIT,
            state: Arc::new(Mutex::new(FeedState::default())),
            generation: Arc::new(AtomicU64::new(0)),
            in_flight: Mutex::new(None),
        }
    }

    /// Only feeds of this wallet
    pub fn for_wallet(mut self, wallet: impl Into<String>) -> Self {
        self.wallet = Some(wallet.into());
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Fetch the list again, replacing any reload still in flight
    pub fn reload(&self) -> FeedRequest {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = self.state.lock();
            state.loading = true;
            state.error = None;
        }

        let source = Arc::clone(&self.source);
        let state = Arc::clone(&self.state);
        let latest = Arc::clone(&self.generation);
        let wallet = self.wallet.clone();
        let limit = self.limit;

        let handle = tokio::spawn(async move {
            let result = source.fetch_feeds(wallet.as_deref(), Some(limit)).await;

            let mut state = state.lock();
            if latest.load(Ordering::SeqCst) != generation {
                debug!(generation, "Discarding superseded feed result");
                return Err(ApiError::Aborted);
            }
            state.loading = false;
            match result {
                Ok(feeds) => {
                    let count = feeds.len();
                    state.visible = count.min(PAGE_SIZE);
                    state.all = feeds;
                    debug!(count, "Feed loaded");
                    Ok(count)
                }
                Err(e) => {
                    warn!(error = %e, "Feed load failed");
                    state.error = Some(LOAD_FAILED_MESSAGE.to_string());
                    Err(e)
                }
            }
        });

        if let Some(previous) = self.in_flight.lock().replace(handle.abort_handle()) {
            previous.abort();
        }
        FeedRequest { handle }
    }

    /// Reveal the next page of the already loaded list
    ///
    /// Returns the number of newly visible items.
    pub fn load_more(&self) -> usize {
        let mut state = self.state.lock();
        if state.loading || !state.has_more() {
            return 0;
        }
        let before = state.visible;
        state.visible = (before + PAGE_SIZE).min(state.all.len());
        state.visible - before
    }

    /// Items revealed so far
    pub fn items(&self) -> Vec<FeedPostView> {
        let state = self.state.lock();
        state.all[..state.visible].to_vec()
    }

    /// Every loaded item, revealed or not
    pub fn all_items(&self) -> Vec<FeedPostView> {
        self.state.lock().all.clone()
    }

    pub fn has_more(&self) -> bool {
        self.state.lock().has_more()
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().loading
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }
}

impl Drop for FeedLoader {
    fn drop(&mut self) {
        if let Some(handle) = self.in_flight.lock().take() {
            handle.abort();
        }
    }
}
