// SPDX-License-Identifier: GPL-3.0-only

//! `/api/nonce`, `/api/complete-siwe` and `/api/verify`

use crate::api::{CompleteSiweRequest, NonceResponse, SiweResponse, VerifyRequest};
use crate::constants::identity::NONCE_COOKIE;
use crate::server::ServerState;
use crate::server::error::{ServerError, ServerResult};
use crate::server::identity::{check_siwe_payload, cookie_value, generate_nonce};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{AppendHeaders, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

pub fn auth_routes() -> Router<ServerState> {
    Router::new()
        .route("/nonce", get(issue_nonce))
        .route("/complete-siwe", post(complete_siwe))
        .route("/verify", post(verify_proof))
}

async fn issue_nonce(State(state): State<ServerState>) -> impl IntoResponse {
    let nonce = generate_nonce();
    let cookie = state
        .signer
        .set_cookie_header(&state.signer.sign(&nonce, Utc::now()));
    debug!("Nonce issued");
    (
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(NonceResponse { nonce }),
    )
}

fn siwe_error(message: impl Into<String>) -> Json<SiweResponse> {
    Json(SiweResponse {
        status: "error".to_string(),
        is_valid: false,
        message: Some(message.into()),
    })
}

async fn complete_siwe(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(body): Json<CompleteSiweRequest>,
) -> Json<SiweResponse> {
    let now = Utc::now();
    let signed_nonce = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| cookie_value(value, NONCE_COOKIE))
        .and_then(|cookie| state.signer.verify(cookie, now));

    if signed_nonce.as_deref() != Some(body.nonce.as_str()) || body.nonce.is_empty() {
        warn!("Sign-in attempted with an invalid nonce");
        return siwe_error("Invalid nonce");
    }

    let attempt = match check_siwe_payload(&body.payload, &body.nonce, now) {
        Ok(attempt) => attempt,
        Err(e) => {
            debug!(error = %e, "Sign-in message rejected");
            return siwe_error(e.to_string());
        }
    };

    if let Err(e) = state.siwe.verify(&attempt).await {
        warn!(address = %attempt.message.address, error = %e, "Sign-in signature rejected");
        return siwe_error(e.to_string());
    }

    info!(address = %attempt.message.address, "Wallet signed in");
    Json(SiweResponse {
        status: "success".to_string(),
        is_valid: true,
        message: None,
    })
}

async fn verify_proof(
    State(state): State<ServerState>,
    Json(body): Json<VerifyRequest>,
) -> ServerResult<impl IntoResponse> {
    let app_id = state
        .app_id
        .as_deref()
        .ok_or_else(|| ServerError::internal("APP_ID is not configured"))?;
    let verifier = state
        .verifier
        .as_ref()
        .ok_or_else(|| ServerError::internal("Proof verification is not available"))?;

    let verdict = verifier
        .verify(app_id, &body)
        .await
        .map_err(|detail| ServerError {
            detail: Some(detail),
            ..ServerError::internal("Proof verification request failed")
        })?;

    let status = if verdict.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    info!(action = %body.action, success = verdict.success, "Proof verified");
    Ok((
        status,
        Json(json!({ "verifyRes": verdict.body, "status": status.as_u16() })),
    ))
}
