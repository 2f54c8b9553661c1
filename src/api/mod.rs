// SPDX-License-Identifier: GPL-3.0-only

//! Ping! REST API client side
//!
//! [`client::PingClient`] speaks HTTP to the API. The publish gateway and the
//! feed loader only see the narrow traits below, so they can be driven by
//! something other than a live server.

pub mod client;
pub mod feed_loader;
pub mod publish;
pub mod types;

pub use client::{NonceGrant, PingClient};
pub use feed_loader::{FeedLoader, FeedRequest};
pub use publish::{PublishGateway, Published};
pub use types::*;

use crate::errors::ApiError;
use async_trait::async_trait;

/// Creates feed posts
#[async_trait]
pub trait FeedPublisher: Send + Sync {
    async fn create_feed(
        &self,
        request: &CreateFeedRequest,
    ) -> Result<Option<FeedPostView>, ApiError>;
}

/// Lists feed posts
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_feeds(
        &self,
        wallet: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<FeedPostView>, ApiError>;
}
