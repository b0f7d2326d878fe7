//! Axum router for the Webhook Ingress service.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers, mirroring the shape the rest of this workspace's
//! daemon-style services use.

pub mod error;
pub mod state;
pub mod webhook;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhooks/blaze/order", post(webhook::receive_blaze_order_webhook))
        .route("/webhooks/health", get(webhook::webhook_health))
        .with_state(state)
}
