use std::net::SocketAddr;

use axum::Router;
use common::admin_http::spawn_admin_server;
use configs::AppConfig;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::routes::{self, AppState};
use service::{polls::VoteStore, reviews::ReviewStore, runtime};

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

/// Open the stores named by the storage config.
pub fn build_state(cfg: &AppConfig) -> AppState {
    let votes_path = runtime::data_path(&cfg.storage.data_dir, &cfg.storage.votes_file);
    let reviews_path = runtime::data_path(&cfg.storage.data_dir, &cfg.storage.reviews_file);
    AppState {
        votes: VoteStore::open(votes_path),
        reviews: ReviewStore::open(reviews_path),
    }
}

pub fn build_app(state: AppState) -> Router {
    routes::build_router(state, build_cors())
}

/// Serve until the listener fails. Logging must already be initialised.
pub async fn run_with_config(cfg: AppConfig) -> anyhow::Result<()> {
    let votes_path = runtime::data_path(&cfg.storage.data_dir, &cfg.storage.votes_file);
    runtime::ensure_env(&cfg.storage.data_dir, &votes_path).await?;

    let state = build_state(&cfg);
    info!(votes = %state.votes.location(), "vote store ready");

    if let Some(admin_addr) = &cfg.server.admin_addr {
        spawn_admin_server(admin_addr, service::metrics::encode_metrics);
    }

    let app = build_app(state);
    let addr: SocketAddr = cfg.server.bind_addr().parse()?;
    info!(%addr, "starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
