//! Axum router wiring.
//!
//! The metrics middleware wraps every route, including `/metrics` itself.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};

use crate::{app_state::AppState, obs, ops, sms};

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.cfg().server.max_body_bytes;
    Router::new()
        .route(
            "/sms",
            post(sms::handler::send_sms).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/metrics", get(ops::metrics))
        .route("/healthz", get(ops::healthz))
        .route("/readyz", get(ops::readyz))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            obs::middleware::track_http,
        ))
        .with_state(state)
}
