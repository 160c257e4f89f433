pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::analysis::handlers as analysis;
use crate::payments::handlers as payments;
use crate::state::AppState;

/// Multipart framing on top of the video bytes themselves.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = usize::try_from(state.config.max_upload_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/upload-video",
            post(analysis::handle_upload_video).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/analysis/:id", get(analysis::handle_get_analysis))
        .route("/api/analyses", get(analysis::handle_list_analyses))
        .route(
            "/api/create-payment-intent",
            post(payments::handle_create_payment_intent),
        )
        .route("/api/webhook", post(payments::handle_webhook))
        .with_state(state)
}
