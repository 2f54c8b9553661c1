// SPDX-License-Identifier: GPL-3.0-only

//! Hosted database and object storage
//!
//! The proxy only needs a handful of table and bucket operations. They sit
//! behind [`SupabaseBackend`] so the service can run against the real REST API
//! ([`RestBackend`]) or an in-process store ([`MemoryBackend`]).

mod memory;
mod rest;

pub use memory::MemoryBackend;
pub use rest::RestBackend;

use super::models::{FeedRow, NewFeedRow, NewUserRow, PointRow, UserChanges, UserRow};
use async_trait::async_trait;

/// A failed backend call, carrying the raw response body or transport error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendFailure {
    pub detail: String,
}

impl BackendFailure {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

impl From<reqwest::Error> for BackendFailure {
    fn from(err: reqwest::Error) -> Self {
        Self::new(err.to_string())
    }
}

pub type BackendResult<T> = Result<T, BackendFailure>;

/// Table and bucket operations used by the proxy
#[async_trait]
pub trait SupabaseBackend: Send + Sync {
    /// Newest feeds first, optionally for one wallet
    async fn list_feeds(&self, wallet: Option<&str>, limit: u32) -> BackendResult<Vec<FeedRow>>;

    async fn find_feed(&self, feed_id: &str) -> BackendResult<Option<FeedRow>>;

    /// Insert a feed and return the stored rows
    async fn insert_feed(&self, row: &NewFeedRow) -> BackendResult<Vec<FeedRow>>;

    async fn users_by_wallet(&self, wallets: &[String]) -> BackendResult<Vec<UserRow>>;

    async fn find_user(&self, wallet: &str) -> BackendResult<Option<UserRow>>;

    /// Patch an existing user; an empty result means no such user
    async fn update_user(&self, wallet: &str, changes: &UserChanges) -> BackendResult<Vec<UserRow>>;

    /// Insert or merge a user row
    async fn upsert_user(&self, row: &UserRow) -> BackendResult<Vec<UserRow>>;

    /// Insert a user unless the wallet already exists
    async fn insert_user_if_absent(&self, row: &NewUserRow) -> BackendResult<()>;

    /// Create a zero balance unless the wallet already has one
    async fn insert_points_if_absent(&self, wallet: &str) -> BackendResult<()>;

    async fn find_points(&self, wallet: &str) -> BackendResult<Option<PointRow>>;

    /// Store an object, replacing any existing one
    async fn upload_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> BackendResult<()>;
}
