// SPDX-License-Identifier: GPL-3.0-only

//! REST backend over the hosted database API

use super::{BackendFailure, BackendResult, SupabaseBackend};
use crate::config::BackendEnv;
use crate::server::models::{FeedRow, NewFeedRow, NewUserRow, PointRow, UserChanges, UserRow};
use crate::storage::upload_object_url;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

const FEED_COLUMNS: &str = "feed_id,wallet_address,front_url,back_url,caption,created_at";
const USER_COLUMNS: &str = "wallet_address,nickname,profile_url,background_url";
const RETURN_REPRESENTATION: &str = "return=representation";
const MERGE_DUPLICATES: &str = "resolution=merge-duplicates,return=representation";
const IGNORE_DUPLICATES: &str = "resolution=ignore-duplicates,return=minimal";

/// Backend speaking to `<base>/rest/v1` and `<base>/storage/v1`
#[derive(Debug, Clone)]
pub struct RestBackend {
    http: Client,
    base_url: String,
    service_key: String,
}

impl RestBackend {
    pub fn new(env: &BackendEnv) -> BackendResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: env.supabase_url.trim_end_matches('/').to_string(),
            service_key: env.service_role_key.clone(),
        })
    }

    fn table(&self, name: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, name)
    }

    fn auth_headers(&self) -> BackendResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&self.service_key)
            .map_err(|e| BackendFailure::new(format!("invalid service key: {}", e)))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.service_key))
            .map_err(|e| BackendFailure::new(format!("invalid service key: {}", e)))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }

    /// Headers for table requests
    fn table_headers(&self, prefer: Option<&'static str>) -> BackendResult<HeaderMap> {
        let mut headers = self.auth_headers()?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("Content-Profile", HeaderValue::from_static("public"));
        headers.insert("Accept-Profile", HeaderValue::from_static("public"));
        if let Some(prefer) = prefer {
            headers.insert("Prefer", HeaderValue::from_static(prefer));
        }
        Ok(headers)
    }

    async fn rows<T: DeserializeOwned>(request: RequestBuilder) -> BackendResult<Vec<T>> {
        let response = ensure_success(request.send().await?).await?;
        Ok(response.json().await?)
    }
}

async fn ensure_success(response: reqwest::Response) -> BackendResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), "Backend request failed");
    Err(BackendFailure::new(detail))
}

#[async_trait]
impl SupabaseBackend for RestBackend {
    async fn list_feeds(&self, wallet: Option<&str>, limit: u32) -> BackendResult<Vec<FeedRow>> {
        let mut query = vec![
            ("select", FEED_COLUMNS.to_string()),
            ("order", "created_at.desc".to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(wallet) = wallet {
            query.push(("wallet_address", format!("eq.{}", wallet)));
        }
        let request = self
            .http
            .get(self.table("feeds"))
            .headers(self.table_headers(None)?)
            .query(&query);
        let rows: Vec<FeedRow> = Self::rows(request).await?;
        debug!(count = rows.len(), "Feeds queried");
        Ok(rows)
    }

    async fn find_feed(&self, feed_id: &str) -> BackendResult<Option<FeedRow>> {
        let request = self
            .http
            .get(self.table("feeds"))
            .headers(self.table_headers(None)?)
            .query(&[
                ("select", FEED_COLUMNS.to_string()),
                ("feed_id", format!("eq.{}", feed_id)),
                ("limit", "1".to_string()),
            ]);
        let rows: Vec<FeedRow> = Self::rows(request).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_feed(&self, row: &NewFeedRow) -> BackendResult<Vec<FeedRow>> {
        let request = self
            .http
            .post(self.table("feeds"))
            .headers(self.table_headers(Some(RETURN_REPRESENTATION))?)
            .json(&[row]);
        Self::rows(request).await
    }

    async fn users_by_wallet(&self, wallets: &[String]) -> BackendResult<Vec<UserRow>> {
        let request = self
            .http
            .get(self.table("users"))
            .headers(self.table_headers(None)?)
            .query(&[
                ("select", "wallet_address,nickname,profile_url".to_string()),
                ("wallet_address", format!("in.({})", wallets.join(","))),
            ]);
        Self::rows(request).await
    }

    async fn find_user(&self, wallet: &str) -> BackendResult<Option<UserRow>> {
        let request = self
            .http
            .get(self.table("users"))
            .headers(self.table_headers(None)?)
            .query(&[
                ("select", USER_COLUMNS.to_string()),
                ("wallet_address", format!("eq.{}", wallet)),
                ("limit", "1".to_string()),
            ]);
        let rows: Vec<UserRow> = Self::rows(request).await?;
        Ok(rows.into_iter().next())
    }

    async fn update_user(&self, wallet: &str, changes: &UserChanges) -> BackendResult<Vec<UserRow>> {
        let request = self
            .http
            .patch(self.table("users"))
            .headers(self.table_headers(Some(RETURN_REPRESENTATION))?)
            .query(&[
                ("select", USER_COLUMNS.to_string()),
                ("wallet_address", format!("eq.{}", wallet)),
                ("limit", "1".to_string()),
            ])
            .json(changes);
        Self::rows(request).await
    }

    async fn upsert_user(&self, row: &UserRow) -> BackendResult<Vec<UserRow>> {
        let request = self
            .http
            .post(self.table("users"))
            .headers(self.table_headers(Some(MERGE_DUPLICATES))?)
            .query(&[("on_conflict", "wallet_address"), ("select", USER_COLUMNS)])
            .json(&[row]);
        Self::rows(request).await
    }

    async fn insert_user_if_absent(&self, row: &NewUserRow) -> BackendResult<()> {
        let request = self
            .http
            .post(self.table("users"))
            .headers(self.table_headers(Some(IGNORE_DUPLICATES))?)
            .query(&[("on_conflict", "wallet_address")])
            .json(&[row]);
        ensure_success(request.send().await?).await?;
        Ok(())
    }

    async fn insert_points_if_absent(&self, wallet: &str) -> BackendResult<()> {
        let request = self
            .http
            .post(self.table("points"))
            .headers(self.table_headers(Some(IGNORE_DUPLICATES))?)
            .query(&[("on_conflict", "wallet_address")])
            .json(&serde_json::json!([{ "wallet_address": wallet, "ping_point": 0 }]));
        ensure_success(request.send().await?).await?;
        Ok(())
    }

    async fn find_points(&self, wallet: &str) -> BackendResult<Option<PointRow>> {
        let request = self
            .http
            .get(self.table("points"))
            .headers(self.table_headers(None)?)
            .query(&[
                ("select", "wallet_address,ping_point".to_string()),
                ("wallet_address", format!("eq.{}", wallet)),
                ("limit", "1".to_string()),
            ]);
        let rows: Vec<PointRow> = Self::rows(request).await?;
        Ok(rows.into_iter().next())
    }

    async fn upload_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> BackendResult<()> {
        let url = upload_object_url(&self.base_url, bucket, key);
        let size = bytes.len();
        let request = self
            .http
            .post(url)
            .headers(self.auth_headers()?)
            .header("x-upsert", "true")
            .header(CONTENT_TYPE, content_type.to_string())
            .body(bytes);
        let response = request.send().await?;
        if !response.status().is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(BackendFailure::new(format!(
                "Supabase storage upload failed ({}): {}",
                key, detail
            )));
        }
        debug!(bucket, key, size, "Object uploaded");
        Ok(())
    }
}
