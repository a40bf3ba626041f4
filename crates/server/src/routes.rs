use std::sync::Arc;

use axum::{
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use common::types::Health;
use service::{polls::VoteStore, reviews::ReviewStore};

pub mod polls;
pub mod reviews;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub votes: Arc<VoteStore>,
    pub reviews: Arc<ReviewStore>,
}

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn metrics() -> (axum::http::StatusCode, String) {
    service::metrics::encode_metrics()
}

/// Build the full application router
pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    let poll_routes = Router::new()
        .route("/api/poll/vote", post(polls::vote))
        .route("/api/poll/results/:poll_id", get(polls::results))
        .route("/api/poll/raw", get(polls::raw))
        .route("/api/poll/all", get(polls::all));

    let review_routes = Router::new()
        .route("/api/reviews", get(reviews::list_approved).post(reviews::submit))
        .route("/api/reviews/all", get(reviews::list_all))
        .route("/api/reviews/approve/:index", post(reviews::approve))
        .route("/api/reviews/reject/:index", post(reviews::reject));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .merge(poll_routes)
        .merge(review_routes)
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                // 每次请求创建 span，日志级别为 INFO
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                // 响应返回时打点，包含状态码与耗时
                .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
