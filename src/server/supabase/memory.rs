// SPDX-License-Identifier: GPL-3.0-only

//! In-process backend
//!
//! Keeps tables and objects in memory. Backs `ping serve --memory` and the
//! HTTP tests; individual operations can be made to fail.

use super::{BackendFailure, BackendResult, SupabaseBackend};
use crate::server::models::{FeedRow, NewFeedRow, NewUserRow, PointRow, UserChanges, UserRow};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
struct Tables {
    /// Oldest first
    feeds: Vec<FeedRow>,
    users: BTreeMap<String, UserRow>,
    points: BTreeMap<String, PointRow>,
    objects: HashMap<(String, String), StoredObject>,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: Mutex<Tables>,
    failing: Mutex<HashSet<&'static str>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call of `operation` (a trait method name) fail
    pub fn fail(self, operation: &'static str) -> Self {
        self.failing.lock().insert(operation);
        self
    }

    fn check(&self, operation: &'static str) -> BackendResult<()> {
        if self.failing.lock().contains(operation) {
            return Err(BackendFailure::new(format!(
                "{{\"message\":\"{} failed\"}}",
                operation
            )));
        }
        Ok(())
    }

    /// Seed a feed row directly
    pub fn push_feed(&self, row: FeedRow) {
        self.tables.lock().feeds.push(row);
    }

    /// Seed a user row directly
    pub fn push_user(&self, row: UserRow) {
        self.tables
            .lock()
            .users
            .insert(row.wallet_address.clone(), row);
    }

    /// Seed a point balance directly
    pub fn set_points(&self, wallet: &str, value: Value) {
        self.tables.lock().points.insert(
            wallet.to_string(),
            PointRow {
                wallet_address: wallet.to_string(),
                ping_point: value,
            },
        );
    }

    pub fn feeds(&self) -> Vec<FeedRow> {
        self.tables.lock().feeds.clone()
    }

    pub fn user(&self, wallet: &str) -> Option<UserRow> {
        self.tables.lock().users.get(wallet).cloned()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.tables
            .lock()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn object_keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .tables
            .lock()
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl SupabaseBackend for MemoryBackend {
    async fn list_feeds(&self, wallet: Option<&str>, limit: u32) -> BackendResult<Vec<FeedRow>> {
        self.check("list_feeds")?;
        let tables = self.tables.lock();
        Ok(tables
            .feeds
            .iter()
            .rev()
            .filter(|row| wallet.is_none_or(|w| row.wallet_address == w))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn find_feed(&self, feed_id: &str) -> BackendResult<Option<FeedRow>> {
        self.check("find_feed")?;
        let tables = self.tables.lock();
        Ok(tables.feeds.iter().find(|row| row.feed_id == feed_id).cloned())
    }

    async fn insert_feed(&self, row: &NewFeedRow) -> BackendResult<Vec<FeedRow>> {
        self.check("insert_feed")?;
        let stored = FeedRow {
            feed_id: row.feed_id.clone(),
            wallet_address: row.wallet_address.clone(),
            front_url: row.front_url.clone(),
            back_url: row.back_url.clone(),
            caption: row.caption.clone(),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        self.tables.lock().feeds.push(stored.clone());
        Ok(vec![stored])
    }

    async fn users_by_wallet(&self, wallets: &[String]) -> BackendResult<Vec<UserRow>> {
        self.check("users_by_wallet")?;
        let tables = self.tables.lock();
        Ok(wallets
            .iter()
            .filter_map(|w| tables.users.get(w).cloned())
            .collect())
    }

    async fn find_user(&self, wallet: &str) -> BackendResult<Option<UserRow>> {
        self.check("find_user")?;
        Ok(self.tables.lock().users.get(wallet).cloned())
    }

    async fn update_user(&self, wallet: &str, changes: &UserChanges) -> BackendResult<Vec<UserRow>> {
        self.check("update_user")?;
        let mut tables = self.tables.lock();
        let Some(user) = tables.users.get_mut(wallet) else {
            return Ok(Vec::new());
        };
        if let Some(nickname) = &changes.nickname {
            user.nickname = Some(nickname.clone());
        }
        if let Some(url) = &changes.profile_url {
            user.profile_url = Some(url.clone());
        }
        if let Some(url) = &changes.background_url {
            user.background_url = Some(url.clone());
        }
        Ok(vec![user.clone()])
    }

    async fn upsert_user(&self, row: &UserRow) -> BackendResult<Vec<UserRow>> {
        self.check("upsert_user")?;
        self.tables
            .lock()
            .users
            .insert(row.wallet_address.clone(), row.clone());
        Ok(vec![row.clone()])
    }

    async fn insert_user_if_absent(&self, row: &NewUserRow) -> BackendResult<()> {
        self.check("insert_user_if_absent")?;
        self.tables
            .lock()
            .users
            .entry(row.wallet_address.clone())
            .or_insert_with(|| UserRow {
                wallet_address: row.wallet_address.clone(),
                nickname: Some(row.nickname.clone()),
                profile_url: row.profile_url.clone(),
                background_url: None,
            });
        Ok(())
    }

    async fn insert_points_if_absent(&self, wallet: &str) -> BackendResult<()> {
        self.check("insert_points_if_absent")?;
        self.tables
            .lock()
            .points
            .entry(wallet.to_string())
            .or_insert_with(|| PointRow {
                wallet_address: wallet.to_string(),
                ping_point: Value::from(0),
            });
        Ok(())
    }

    async fn find_points(&self, wallet: &str) -> BackendResult<Option<PointRow>> {
        self.check("find_points")?;
        Ok(self.tables.lock().points.get(wallet).cloned())
    }

    async fn upload_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> BackendResult<()> {
        self.check("upload_object")?;
        self.tables.lock().objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                content_type: content_type.to_string(),
                bytes,
            },
        );
        Ok(())
    }
}
