// SPDX-License-Identifier: GPL-3.0-only

//! Typed client for the Ping! REST API

use super::types::*;
use super::{FeedPublisher, FeedSource};
use crate::constants::feed::{PROFILE_FETCH_ATTEMPTS, PROFILE_FETCH_RETRY_DELAY};
use crate::constants::identity::NONCE_COOKIE;
use crate::errors::ApiError;
use async_trait::async_trait;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Nonce plus the cookie that has to accompany its completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonceGrant {
    pub nonce: String,
    /// `siwe=<value>` pair to send back, if the server set one
    pub cookie: Option<String>,
}

/// Client for one Ping! API deployment
#[derive(Debug, Clone)]
pub struct PingClient {
    http: Client,
    base_url: String,
}

impl PingClient {
    /// Create a client for `base_url` (for example `http://localhost:3000`)
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Feeds, newest first
    pub async fn list_feeds(
        &self,
        wallet: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<FeedPostView>, ApiError> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(wallet) = wallet.map(str::trim).filter(|w| !w.is_empty()) {
            query.push(("walletAddress", wallet.to_string()));
        }
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        let response: FeedListResponse =
            send_json(self.http.get(self.endpoint("feeds")).query(&query)).await?;
        debug!(count = response.feeds.len(), "Feeds loaded");
        Ok(response.feeds)
    }

    /// One feed by id
    pub async fn get_feed(&self, id: &str) -> Result<FeedPostView, ApiError> {
        let url = self.endpoint(&format!("feeds/{}", urlencode(id)));
        let response: FeedResponse = send_json(self.http.get(url)).await?;
        response
            .feed
            .ok_or_else(|| ApiError::Decode("response has no feed".to_string()))
    }

    /// Publish a feed; `None` when the server stored it but returned no row
    pub async fn create_feed(
        &self,
        request: &CreateFeedRequest,
    ) -> Result<Option<FeedPostView>, ApiError> {
        let response: FeedResponse =
            send_json(self.http.post(self.endpoint("feeds")).json(request)).await?;
        Ok(response.feed)
    }

    /// Profile of a wallet, `None` if the user does not exist
    pub async fn get_user(&self, wallet: &str) -> Result<Option<UserProfile>, ApiError> {
        let request = self
            .http
            .get(self.endpoint("users"))
            .query(&[("walletAddress", wallet.trim())]);
        let response: UserResponse = send_json(request).await?;
        Ok(response.user)
    }

    /// Profile lookup that allows for a freshly synced user
    ///
    /// Right after sign-in the user row may not exist yet, so an empty result
    /// is retried once after a short pause. Errors are not retried.
    pub async fn fetch_profile(&self, wallet: &str) -> Result<Option<UserProfile>, ApiError> {
        for attempt in 1..=PROFILE_FETCH_ATTEMPTS {
            let user = self.get_user(wallet).await?;
            if user.is_some() || attempt == PROFILE_FETCH_ATTEMPTS {
                return Ok(user);
            }
            debug!(attempt, "Profile not found yet, retrying");
            tokio::time::sleep(PROFILE_FETCH_RETRY_DELAY).await;
        }
        Ok(None)
    }

    pub async fn update_user(
        &self,
        request: &UpdateUserRequest,
    ) -> Result<Option<UserProfile>, ApiError> {
        let response: UserResponse =
            send_json(self.http.patch(self.endpoint("users")).json(request)).await?;
        Ok(response.user)
    }

    pub async fn sync_user(&self, request: &SyncUserRequest) -> Result<(), ApiError> {
        let _: StatusResponse =
            send_json(self.http.post(self.endpoint("users/sync")).json(request)).await?;
        Ok(())
    }

    pub async fn get_points(&self, wallet: &str) -> Result<PointBalance, ApiError> {
        let request = self
            .http
            .get(self.endpoint("points"))
            .query(&[("walletAddress", wallet.trim())]);
        let response: PointResponse = send_json(request).await?;
        Ok(response.point)
    }

    /// Request a sign-in nonce
    pub async fn nonce(&self) -> Result<NonceGrant, ApiError> {
        let response = self.http.get(self.endpoint("nonce")).send().await?;
        let response = check_status(response).await?;
        let cookie = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| value.split(';').next())
            .find(|pair| pair.trim_start().starts_with(&format!("{}=", NONCE_COOKIE)))
            .map(|pair| pair.trim().to_string());
        let body: NonceResponse = response.json().await?;
        Ok(NonceGrant {
            nonce: body.nonce,
            cookie,
        })
    }

    /// Complete wallet sign-in with the nonce cookie from [`PingClient::nonce`]
    pub async fn complete_siwe(
        &self,
        request: &CompleteSiweRequest,
        cookie: Option<&str>,
    ) -> Result<SiweResponse, ApiError> {
        let mut builder = self.http.post(self.endpoint("complete-siwe")).json(request);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        send_json(builder).await
    }

    /// Forward a proof for verification; the body is passed through as-is
    pub async fn verify(&self, request: &VerifyRequest) -> Result<Value, ApiError> {
        send_json(self.http.post(self.endpoint("verify")).json(request)).await
    }
}

#[async_trait]
impl FeedPublisher for PingClient {
    async fn create_feed(
        &self,
        request: &CreateFeedRequest,
    ) -> Result<Option<FeedPostView>, ApiError> {
        PingClient::create_feed(self, request).await
    }
}

#[async_trait]
impl FeedSource for PingClient {
    async fn fetch_feeds(
        &self,
        wallet: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<FeedPostView>, ApiError> {
        self.list_feeds(wallet, limit).await
    }
}

/// Turn a non-2xx response into [`ApiError::Http`] with the raw body
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), "API request failed");
    Err(ApiError::Http {
        status: status.as_u16(),
        detail,
    })
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ApiError> {
    let response = check_status(request.send().await?).await?;
    Ok(response.json().await?)
}

fn urlencode(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_cleanly() {
        let client = PingClient::with_client(Client::new(), " http://localhost:3000/ ");
        assert_eq!(client.base_url(), "http://localhost:3000");
        assert_eq!(client.endpoint("/feeds"), "http://localhost:3000/api/feeds");
        assert_eq!(client.endpoint("users/sync"), "http://localhost:3000/api/users/sync");
    }

    #[test]
    fn test_path_segment_encoding() {
        assert_eq!(urlencode("a b/c"), "a%20b%2Fc");
        assert_eq!(urlencode("3f2a-11"), "3f2a-11");
    }
}
