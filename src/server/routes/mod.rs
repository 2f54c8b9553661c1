// SPDX-License-Identifier: GPL-3.0-only

//! REST routes, all mounted under `/api`

mod auth;
mod feeds;
mod users;

pub use feeds::parse_limit;

use super::ServerState;
use axum::Router;

pub fn api_routes() -> Router<ServerState> {
    Router::new()
        .merge(feeds::feed_routes())
        .merge(users::user_routes())
        .merge(auth::auth_routes())
}
