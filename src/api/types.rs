// SPDX-License-Identifier: GPL-3.0-only

//! Wire types of the Ping! REST API
//!
//! Request bodies use the camelCase keys the endpoints expect; rows and feed
//! cards keep the snake_case column names.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Feed card as returned by the feed endpoints
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedPostView {
    pub id: String,
    pub feed_id: String,
    pub wallet_address: String,
    /// Display name of the author
    pub user: String,
    /// Caption, or the default line when there is none
    pub meta: String,
    pub avatar: String,
    /// Back photo URL
    pub image: String,
    /// Front photo URL
    pub overlay: String,
    pub caption: String,
    pub created_at: String,
}

/// Public user profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub wallet_address: String,
    pub nickname: Option<String>,
    pub profile_url: Option<String>,
    pub background_url: Option<String>,
}

/// Point balance of a wallet
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointBalance {
    pub wallet_address: String,
    pub ping_point: i64,
}

/// `POST /api/feeds`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateFeedRequest {
    pub wallet_address: Option<String>,
    pub front_image: Option<String>,
    pub back_image: Option<String>,
    pub caption: Option<String>,
}

/// `PATCH /api/users`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateUserRequest {
    pub wallet_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_image: Option<String>,
}

/// `POST /api/users/sync`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncUserRequest {
    pub wallet_address: Option<String>,
    pub username: Option<String>,
    pub profile_picture_url: Option<String>,
}

/// `POST /api/complete-siwe`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompleteSiweRequest {
    pub payload: Value,
    pub nonce: String,
}

/// `POST /api/verify`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyRequest {
    pub payload: Value,
    pub action: String,
    pub signal: Option<String>,
}

/// `{status, feeds}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedListResponse {
    pub status: String,
    pub feeds: Vec<FeedPostView>,
}

/// `{status, feed}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedResponse {
    pub status: String,
    pub feed: Option<FeedPostView>,
}

/// `{status, user}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserResponse {
    pub status: String,
    pub user: Option<UserProfile>,
}

/// `{status, point}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointResponse {
    pub status: String,
    pub point: PointBalance,
}

/// `{nonce}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceResponse {
    pub nonce: String,
}

/// `{status, isValid, message?}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiweResponse {
    pub status: String,
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `{status, message?, detail?}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_keys_are_camel_case() {
        let body = serde_json::to_value(CreateFeedRequest {
            wallet_address: Some("0xabc".into()),
            front_image: Some("data:image/jpeg;base64,AA==".into()),
            back_image: None,
            caption: None,
        })
        .unwrap();
        assert_eq!(body["walletAddress"], "0xabc");
        assert!(body["frontImage"].is_string());
        assert!(body["caption"].is_null());
    }

    #[test]
    fn test_partial_update_omits_unset_fields() {
        let body = serde_json::to_value(UpdateUserRequest {
            wallet_address: Some("0xabc".into()),
            nickname: Some("ping".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(body.as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_siwe_response_shape() {
        let parsed: SiweResponse =
            serde_json::from_str(r#"{"status":"error","isValid":false,"message":"Invalid nonce"}"#)
                .unwrap();
        assert!(!parsed.is_valid);
        assert_eq!(parsed.message.as_deref(), Some("Invalid nonce"));
    }
}
