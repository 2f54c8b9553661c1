// SPDX-License-Identifier: GPL-3.0-only

//! `/api/users`, `/api/users/sync` and `/api/points`

use crate::api::{
    PointBalance, PointResponse, StatusResponse, SyncUserRequest, UpdateUserRequest, UserResponse,
};
use crate::constants::mime_for_extension;
use crate::media::ImageDataUri;
use crate::server::ServerState;
use crate::server::error::{ServerError, ServerResult};
use crate::server::models::{
    NewUserRow, UserChanges, UserRow, fallback_nickname, normalize_wallet, wallet_token,
};
use crate::server::supabase::SupabaseBackend;
use crate::storage::bucket_asset_url;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{debug, info};

pub fn user_routes() -> Router<ServerState> {
    Router::new()
        .route("/users", get(get_user).patch(update_user))
        .route("/users/sync", post(sync_user))
        .route("/points", get(get_points))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WalletQuery {
    pub wallet_address: Option<String>,
}

impl WalletQuery {
    fn require(&self) -> ServerResult<String> {
        normalize_wallet(self.wallet_address.as_deref())
            .ok_or_else(|| ServerError::bad_request("walletAddress query is required"))
    }
}

async fn get_user(
    State(state): State<ServerState>,
    Query(query): Query<WalletQuery>,
) -> ServerResult<Json<UserResponse>> {
    let wallet = query.require()?;
    let backend = state.backend()?;
    let user = backend
        .find_user(&wallet)
        .await
        .map_err(|e| ServerError::backend("Supabase user query failed", e))?;

    Ok(Json(UserResponse {
        status: "success".to_string(),
        user: user.map(|row| state.storage.public_user(&row)),
    }))
}

/// Optional image field: absent or blank is no change, anything else must decode
fn image_field(raw: Option<&str>, field: &str) -> ServerResult<Option<ImageDataUri>> {
    match raw.filter(|r| !r.is_empty()) {
        None => Ok(None),
        Some(raw) => ImageDataUri::parse(raw).map(Some).map_err(|_| {
            ServerError::bad_request(format!(
                "{} must be a supported image data URL (jpg/png/webp)",
                field
            ))
        }),
    }
}

/// Upload a profile image and return its stored URL
async fn upload_profile_image(
    state: &ServerState,
    backend: &dyn SupabaseBackend,
    wallet: &str,
    kind: &str,
    image: ImageDataUri,
) -> ServerResult<String> {
    let bucket = &state.storage.profiles_bucket;
    let name = format!(
        "{}-{}-{}.{}",
        wallet_token(wallet),
        kind,
        chrono::Utc::now().timestamp_millis(),
        image.extension
    );
    backend
        .upload_object(bucket, &name, mime_for_extension(image.extension), image.bytes)
        .await?;
    debug!(key = %name, "Profile image stored");
    Ok(bucket_asset_url(&state.storage.base_url, bucket, &name))
}

async fn update_user(
    State(state): State<ServerState>,
    Json(body): Json<UpdateUserRequest>,
) -> ServerResult<Json<UserResponse>> {
    let wallet = normalize_wallet(body.wallet_address.as_deref())
        .ok_or_else(|| ServerError::bad_request("walletAddress is required"))?;
    let nickname = body.nickname.as_deref().map(str::trim);
    if nickname.is_some_and(str::is_empty) {
        return Err(ServerError::bad_request("nickname cannot be empty"));
    }
    let profile = image_field(body.profile_image.as_deref(), "profileImage")?;
    let background = image_field(body.background_image.as_deref(), "backgroundImage")?;
    if nickname.is_none() && profile.is_none() && background.is_none() {
        return Err(ServerError::bad_request("No profile changes were provided"));
    }
    let backend = state.backend()?;

    let mut changes = UserChanges {
        nickname: nickname.map(str::to_string),
        ..Default::default()
    };
    if let Some(image) = profile {
        changes.profile_url =
            Some(upload_profile_image(&state, backend.as_ref(), &wallet, "profile", image).await?);
    }
    if let Some(image) = background {
        changes.background_url = Some(
            upload_profile_image(&state, backend.as_ref(), &wallet, "background", image).await?,
        );
    }

    let mut rows = backend
        .update_user(&wallet, &changes)
        .await
        .map_err(|e| ServerError::backend("Supabase user update failed", e))?;

    if rows.is_empty() {
        debug!(wallet = %wallet, "No user row to patch, upserting");
        let row = UserRow {
            nickname: Some(
                changes
                    .nickname
                    .clone()
                    .unwrap_or_else(|| fallback_nickname(&wallet)),
            ),
            profile_url: changes.profile_url.clone(),
            background_url: changes.background_url.clone(),
            wallet_address: wallet.clone(),
        };
        rows = backend
            .upsert_user(&row)
            .await
            .map_err(|e| ServerError::backend("Supabase user upsert failed", e))?;
    }

    info!(wallet = %wallet, "Profile updated");
    Ok(Json(UserResponse {
        status: "success".to_string(),
        user: rows.first().map(|row| state.storage.public_user(row)),
    }))
}

async fn sync_user(
    State(state): State<ServerState>,
    Json(body): Json<SyncUserRequest>,
) -> ServerResult<Json<StatusResponse>> {
    let wallet = normalize_wallet(body.wallet_address.as_deref())
        .ok_or_else(|| ServerError::bad_request("walletAddress is required"))?;
    let backend = state.backend()?;

    let row = NewUserRow {
        nickname: body
            .username
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| fallback_nickname(&wallet)),
        profile_url: body
            .profile_picture_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string),
        wallet_address: wallet.clone(),
    };
    debug!(wallet = %wallet, nickname = %row.nickname, "Syncing user");

    backend
        .insert_user_if_absent(&row)
        .await
        .map_err(|e| ServerError::backend("Supabase insert failed", e))?;
    backend
        .insert_points_if_absent(&wallet)
        .await
        .map_err(|e| ServerError::backend("Supabase points insert failed", e))?;

    Ok(Json(StatusResponse {
        status: "success".to_string(),
        ..Default::default()
    }))
}

async fn get_points(
    State(state): State<ServerState>,
    Query(query): Query<WalletQuery>,
) -> ServerResult<Json<PointResponse>> {
    let wallet = query.require()?;
    let backend = state.backend()?;
    let point = backend
        .find_points(&wallet)
        .await
        .map_err(|e| ServerError::backend("Supabase points query failed", e))?
        .map(|row| row.balance())
        .unwrap_or(PointBalance {
            wallet_address: wallet,
            ping_point: 0,
        });

    Ok(Json(PointResponse {
        status: "success".to_string(),
        point,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_field_validation() {
        assert!(image_field(None, "profileImage").unwrap().is_none());
        assert!(image_field(Some(""), "profileImage").unwrap().is_none());
        assert!(
            image_field(Some("data:image/png;base64,iVBORw0K"), "profileImage")
                .unwrap()
                .is_some()
        );
        let err = image_field(Some("data:image/gif;base64,R0lG"), "backgroundImage").unwrap_err();
        assert_eq!(
            err.message,
            "backgroundImage must be a supported image data URL (jpg/png/webp)"
        );
    }
}
