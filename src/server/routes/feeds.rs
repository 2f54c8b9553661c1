// SPDX-License-Identifier: GPL-3.0-only

//! `/api/feeds`

use crate::api::{CreateFeedRequest, FeedListResponse, FeedResponse};
use crate::constants::feed::{DEFAULT_LIMIT, MAX_LIMIT};
use crate::constants::mime_for_extension;
use crate::media::ImageDataUri;
use crate::server::ServerState;
use crate::server::error::{ServerError, ServerResult};
use crate::server::models::{NewFeedRow, UserRow, normalize_wallet};
use crate::storage::bucket_asset_url;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

pub fn feed_routes() -> Router<ServerState> {
    Router::new()
        .route("/feeds", get(list_feeds).post(create_feed))
        .route("/feeds/{id}", get(get_feed))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedQuery {
    pub wallet_address: Option<String>,
    pub limit: Option<String>,
}

/// Listing limit: floored and clamped, default when missing or not a number
pub fn parse_limit(raw: Option<&str>) -> u32 {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return DEFAULT_LIMIT;
    };
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => value.floor().clamp(1.0, MAX_LIMIT as f64) as u32,
        _ => DEFAULT_LIMIT,
    }
}

async fn list_feeds(
    State(state): State<ServerState>,
    Query(query): Query<FeedQuery>,
) -> ServerResult<Json<FeedListResponse>> {
    let backend = state.backend()?;
    let limit = parse_limit(query.limit.as_deref());
    let wallet = normalize_wallet(query.wallet_address.as_deref());

    let rows = backend
        .list_feeds(wallet.as_deref(), limit)
        .await
        .map_err(|e| ServerError::backend("Supabase feeds query failed", e))?;

    let wallets: Vec<String> = rows
        .iter()
        .map(|row| row.wallet_address.clone())
        .filter(|w| !w.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    // Missing profiles only cost the nickname and avatar
    let users: HashMap<String, UserRow> = if wallets.is_empty() {
        HashMap::new()
    } else {
        match backend.users_by_wallet(&wallets).await {
            Ok(users) => users
                .into_iter()
                .map(|u| (u.wallet_address.clone(), u))
                .collect(),
            Err(e) => {
                warn!(detail = %e.detail, "User lookup for feed cards failed");
                HashMap::new()
            }
        }
    };

    let feeds = rows
        .iter()
        .map(|row| state.storage.feed_card(row, users.get(&row.wallet_address)))
        .collect::<Vec<_>>();
    debug!(count = feeds.len(), limit, "Feeds listed");

    Ok(Json(FeedListResponse {
        status: "success".to_string(),
        feeds,
    }))
}

async fn create_feed(
    State(state): State<ServerState>,
    Json(body): Json<CreateFeedRequest>,
) -> ServerResult<(StatusCode, Json<FeedResponse>)> {
    let wallet = normalize_wallet(body.wallet_address.as_deref());
    let front = body.front_image.as_deref().and_then(|u| ImageDataUri::parse(u).ok());
    let back = body.back_image.as_deref().and_then(|u| ImageDataUri::parse(u).ok());

    let (Some(wallet), Some(front), Some(back)) = (wallet, front, back) else {
        return Err(ServerError::bad_request(
            "walletAddress, frontImage(data url), backImage(data url) are required",
        ));
    };
    let backend = state.backend()?;
    let caption = body
        .caption
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string);

    let feed_id = uuid::Uuid::new_v4().to_string();
    let front_name = format!("{}-front.{}", feed_id, front.extension);
    let back_name = format!("{}-back.{}", feed_id, back.extension);
    let bucket = &state.storage.feeds_bucket;

    futures::try_join!(
        backend.upload_object(bucket, &front_name, mime_for_extension(front.extension), front.bytes),
        backend.upload_object(bucket, &back_name, mime_for_extension(back.extension), back.bytes),
    )?;

    let row = NewFeedRow {
        feed_id: feed_id.clone(),
        wallet_address: wallet.clone(),
        front_url: bucket_asset_url(&state.storage.base_url, bucket, &front_name),
        back_url: bucket_asset_url(&state.storage.base_url, bucket, &back_name),
        caption,
    };
    let inserted = backend
        .insert_feed(&row)
        .await
        .map_err(|e| ServerError::backend("Supabase feeds insert failed", e))?;

    info!(feed_id = %feed_id, wallet = %wallet, "Feed created");
    let feed = inserted.first().map(|r| state.storage.feed_card(r, None));
    Ok((
        StatusCode::CREATED,
        Json(FeedResponse {
            status: "success".to_string(),
            feed,
        }),
    ))
}

async fn get_feed(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> ServerResult<Json<FeedResponse>> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ServerError::bad_request("feed id is required"));
    }
    let backend = state.backend()?;
    let row = backend
        .find_feed(id)
        .await
        .map_err(|e| ServerError::backend("Supabase feed query failed", e))?
        .ok_or_else(|| ServerError::not_found("Feed not found"))?;

    let user = match backend.find_user(&row.wallet_address).await {
        Ok(user) => user,
        Err(e) => {
            warn!(detail = %e.detail, "Author lookup failed");
            None
        }
    };

    Ok(Json(FeedResponse {
        status: "success".to_string(),
        feed: Some(state.storage.feed_card_raw(&row, user.as_ref())),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_limit() {
        assert_eq!(parse_limit(None), DEFAULT_LIMIT);
        assert_eq!(parse_limit(Some("")), DEFAULT_LIMIT);
        assert_eq!(parse_limit(Some("abc")), DEFAULT_LIMIT);
        assert_eq!(parse_limit(Some("0")), 1);
        assert_eq!(parse_limit(Some("-5")), 1);
        assert_eq!(parse_limit(Some("12.9")), 12);
        assert_eq!(parse_limit(Some("5000")), MAX_LIMIT);
    }
}
