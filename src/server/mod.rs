// SPDX-License-Identifier: GPL-3.0-only

//! REST proxy service
//!
//! Serves `/api/*` for the client. Feeds, profiles and points are stored in
//! the hosted database behind [`supabase::SupabaseBackend`]; wallet sign-in
//! (nonce cookies, signature checks) and proof verification live in
//! [`identity`].
//!
//! When the backend is not configured the service still starts: data routes
//! answer `500` with the missing-environment message, and the sign-in routes
//! keep working.

pub mod error;
pub mod identity;
pub mod models;
mod routes;
pub mod supabase;

pub use error::{MISSING_ENV_MESSAGE, ServerError, ServerResult};
pub use identity::{
    EcdsaSiweVerifier, HttpProofVerifier, NonceSigner, ProofVerdict, ProofVerifier, SiweVerifier,
};
pub use models::StorageSettings;
pub use routes::parse_limit;
pub use supabase::{MemoryBackend, RestBackend, SupabaseBackend};

use crate::config::BackendEnv;
use crate::errors::{AppError, AppResult};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared handler state
#[derive(Clone)]
pub struct ServerState {
    backend: Option<Arc<dyn SupabaseBackend>>,
    pub storage: StorageSettings,
    pub signer: NonceSigner,
    pub siwe: Arc<dyn SiweVerifier>,
    pub verifier: Option<Arc<dyn ProofVerifier>>,
    pub app_id: Option<String>,
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("backend", &self.backend.is_some())
            .field("storage", &self.storage)
            .field("app_id", &self.app_id)
            .finish_non_exhaustive()
    }
}

impl ServerState {
    /// State without a backend, signing nonces with a random key
    pub fn new(storage: StorageSettings) -> Self {
        Self {
            backend: None,
            storage,
            signer: NonceSigner::ephemeral(),
            siwe: Arc::new(EcdsaSiweVerifier),
            verifier: None,
            app_id: None,
        }
    }

    /// State over an in-process backend with default buckets
    pub fn memory(backend: Arc<MemoryBackend>) -> Self {
        Self::new(StorageSettings::new("", "feeds", "profiles")).with_backend(backend)
    }

    /// State from the process environment
    ///
    /// A missing backend configuration is logged and leaves the data routes
    /// disabled.
    pub fn from_env() -> Self {
        let env = match BackendEnv::from_env() {
            Ok(env) => env,
            Err(e) => {
                warn!(error = %e, "Backend not configured, data routes disabled");
                return Self::new(StorageSettings::default())
                    .with_http_verifier()
                    .with_app_id(std::env::var("APP_ID").ok());
            }
        };
        Self::from_backend_env(&env)
    }

    /// State for a resolved backend configuration
    pub fn from_backend_env(env: &BackendEnv) -> Self {
        let storage = StorageSettings::new(&env.supabase_url, &env.feeds_bucket, &env.profiles_bucket);
        let mut state = Self::new(storage)
            .with_http_verifier()
            .with_app_id(env.app_id.clone());
        match RestBackend::new(env) {
            Ok(backend) => state = state.with_backend(Arc::new(backend)),
            Err(e) => warn!(detail = %e.detail, "Backend client could not be built"),
        }
        match &env.nonce_secret {
            Some(secret) => state.with_signer(NonceSigner::new(secret.as_bytes())),
            None => {
                warn!("PING_NONCE_SECRET not set, nonces will not survive a restart");
                state
            }
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn SupabaseBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_signer(mut self, signer: NonceSigner) -> Self {
        self.signer = signer;
        self
    }

    /// Replace the sign-in signature check, e.g. for contract wallets
    pub fn with_siwe_verifier(mut self, siwe: Arc<dyn SiweVerifier>) -> Self {
        self.siwe = siwe;
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn ProofVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_app_id(mut self, app_id: Option<String>) -> Self {
        self.app_id = app_id.filter(|id| !id.trim().is_empty());
        self
    }

    /// Verify proofs against the identity provider's HTTP endpoint
    fn with_http_verifier(self) -> Self {
        match HttpProofVerifier::new() {
            Ok(http) => self.with_verifier(Arc::new(http)),
            Err(e) => {
                warn!(error = %e, "Proof verifier unavailable");
                self
            }
        }
    }

    /// Configured backend, or the missing-environment error
    pub fn backend(&self) -> ServerResult<Arc<dyn SupabaseBackend>> {
        self.backend.clone().ok_or_else(ServerError::missing_env)
    }
}

/// Router serving `/api/*`
pub fn router(state: ServerState) -> Router {
    Router::new()
        .nest("/api", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped
pub async fn serve(addr: SocketAddr, state: ServerState) -> AppResult<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Other(format!("Failed to bind {}: {}", addr, e)))?;
    let local = listener
        .local_addr()
        .map_err(|e| AppError::Other(e.to_string()))?;
    info!(addr = %local, "Serving Ping! API");

    axum::serve(listener, router(state))
        .await
        .map_err(|e| AppError::Other(format!("Server error: {}", e)))
}
