//! Admin endpoints, behind a bearer token.
//!
//! - `GET /admin/status`: version and whether the log sink is still open
//! - `GET /admin/sink`: sink counters (accepted, dropped, written, queued)

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState, api_key: String) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/sink", get(get_sink_stats))
        .layer(middleware::from_fn_with_state(api_key, admin_auth_middleware))
        .with_state(state)
}
