// SPDX-License-Identifier: GPL-3.0-only

//! Table rows of the hosted backend and their public views

use crate::api::{FeedPostView, PointBalance, UserProfile};
use crate::constants::feed::{DEFAULT_AVATAR, DEFAULT_META};
use crate::storage::resolve_storage_url;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `feeds` row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedRow {
    pub feed_id: String,
    pub wallet_address: String,
    pub front_url: String,
    pub back_url: String,
    pub caption: Option<String>,
    pub created_at: String,
}

/// `feeds` insert
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewFeedRow {
    pub feed_id: String,
    pub wallet_address: String,
    pub front_url: String,
    pub back_url: String,
    pub caption: Option<String>,
}

/// `users` row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserRow {
    pub wallet_address: String,
    pub nickname: Option<String>,
    pub profile_url: Option<String>,
    pub background_url: Option<String>,
}

/// Partial `users` update; unset fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_url: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.nickname.is_none() && self.profile_url.is_none() && self.background_url.is_none()
    }
}

/// `users` insert made on sign-in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewUserRow {
    pub wallet_address: String,
    pub nickname: String,
    pub profile_url: Option<String>,
}

/// `points` row; the balance may come back as a number or a string
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointRow {
    pub wallet_address: String,
    pub ping_point: Value,
}

impl PointRow {
    pub fn balance(&self) -> PointBalance {
        PointBalance {
            wallet_address: self.wallet_address.clone(),
            ping_point: parse_points(&self.ping_point),
        }
    }
}

/// Numeric value of a point balance; anything unparseable counts as zero
pub fn parse_points(value: &Value) -> i64 {
    let number = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
        }
        _ => None,
    };
    number.unwrap_or(0)
}

/// Normalized wallet: trimmed and lowercased, `None` when blank
pub fn normalize_wallet(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

/// Display name for a wallet without a nickname: `user-<chars 2..8>`
pub fn fallback_nickname(wallet: &str) -> String {
    if wallet.is_empty() {
        return "user".to_string();
    }
    let short: String = wallet.chars().skip(2).take(6).collect();
    format!("user-{}", short)
}

/// File name prefix for a wallet's uploads: its first 18 alphanumerics
pub fn wallet_token(wallet: &str) -> String {
    let token: String = wallet
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(18)
        .collect();
    if token.is_empty() {
        "user".to_string()
    } else {
        token
    }
}

/// Where feed and profile images live
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageSettings {
    pub base_url: String,
    pub feeds_bucket: String,
    pub profiles_bucket: String,
}

impl StorageSettings {
    pub fn new(base_url: &str, feeds_bucket: &str, profiles_bucket: &str) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            feeds_bucket: feeds_bucket.to_string(),
            profiles_bucket: profiles_bucket.to_string(),
        }
    }

    fn profile_url(&self, raw: Option<&str>) -> Option<String> {
        resolve_storage_url(raw, &self.base_url, &self.profiles_bucket)
    }

    fn feed_url(&self, raw: &str) -> String {
        resolve_storage_url(Some(raw), &self.base_url, &self.feeds_bucket)
            .unwrap_or_else(|| raw.to_string())
    }

    /// Feed card for listings; image URLs are resolved
    pub fn feed_card(&self, row: &FeedRow, user: Option<&UserRow>) -> FeedPostView {
        FeedPostView {
            image: self.feed_url(&row.back_url),
            overlay: self.feed_url(&row.front_url),
            ..self.feed_card_raw(row, user)
        }
    }

    /// Feed card with the stored image URLs as-is, for single-feed lookups
    pub fn feed_card_raw(&self, row: &FeedRow, user: Option<&UserRow>) -> FeedPostView {
        let nickname = user
            .and_then(|u| u.nickname.as_deref())
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| fallback_nickname(&row.wallet_address));
        let meta = row
            .caption
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_META)
            .to_string();
        let avatar = self
            .profile_url(user.and_then(|u| u.profile_url.as_deref()))
            .unwrap_or_else(|| DEFAULT_AVATAR.to_string());

        FeedPostView {
            id: row.feed_id.clone(),
            feed_id: row.feed_id.clone(),
            wallet_address: row.wallet_address.clone(),
            user: nickname,
            meta,
            avatar,
            image: row.back_url.clone(),
            overlay: row.front_url.clone(),
            caption: row.caption.clone().unwrap_or_default(),
            created_at: row.created_at.clone(),
        }
    }

    /// Public profile with image URLs resolved
    pub fn public_user(&self, row: &UserRow) -> UserProfile {
        UserProfile {
            wallet_address: row.wallet_address.clone(),
            nickname: row.nickname.clone(),
            profile_url: self.profile_url(row.profile_url.as_deref()),
            background_url: self.profile_url(row.background_url.as_deref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings() -> StorageSettings {
        StorageSettings::new("https://db.example.co/", "feeds", "profiles")
    }

    fn row() -> FeedRow {
        FeedRow {
            feed_id: "f1".into(),
            wallet_address: "0x1234567890".into(),
            front_url: "/feeds/f1-front.jpg".into(),
            back_url: "https://cdn.example.com/f1-back.jpg".into(),
            caption: Some("  ".into()),
            created_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn test_card_fallbacks() {
        let card = settings().feed_card(&row(), None);
        assert_eq!(card.user, "user-123456");
        assert_eq!(card.meta, DEFAULT_META);
        assert_eq!(card.avatar, DEFAULT_AVATAR);
        assert_eq!(card.caption, "  ");
        assert_eq!(card.image, "https://cdn.example.com/f1-back.jpg");
        assert_eq!(
            card.overlay,
            "https://db.example.co/storage/v1/object/public/feeds/f1-front.jpg"
        );
    }

    #[test]
    fn test_card_uses_user_row() {
        let user = UserRow {
            wallet_address: "0x1234567890".into(),
            nickname: Some(" pinger ".into()),
            profile_url: Some("profiles/a.png".into()),
            background_url: None,
        };
        let card = settings().feed_card_raw(&row(), Some(&user));
        assert_eq!(card.user, "pinger");
        assert_eq!(
            card.avatar,
            "https://db.example.co/storage/v1/object/public/profiles/a.png"
        );
        // Raw cards keep stored URLs
        assert_eq!(card.overlay, "/feeds/f1-front.jpg");
    }

    #[test]
    fn test_empty_wallet_label() {
        assert_eq!(fallback_nickname(""), "user");
        assert_eq!(fallback_nickname("0xab"), "user-ab");
    }

    #[test]
    fn test_wallet_token() {
        assert_eq!(wallet_token("0xAbC-123"), "0xAbC123");
        assert_eq!(wallet_token("0x0123456789abcdef0123"), "0x0123456789abcdef");
        assert_eq!(wallet_token("---"), "user");
    }

    #[test]
    fn test_parse_points() {
        assert_eq!(parse_points(&json!(12)), 12);
        assert_eq!(parse_points(&json!("40")), 40);
        assert_eq!(parse_points(&json!(" 7.0 ")), 7);
        assert_eq!(parse_points(&json!("lots")), 0);
        assert_eq!(parse_points(&Value::Null), 0);
    }

    #[test]
    fn test_normalize_wallet() {
        assert_eq!(normalize_wallet(Some(" 0xABC ")).as_deref(), Some("0xabc"));
        assert_eq!(normalize_wallet(Some("  ")), None);
        assert_eq!(normalize_wallet(None), None);
    }
}
