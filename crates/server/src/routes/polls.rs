use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use service::errors::ServiceError;
use service::polls::{OptionTally, Votes};
use tracing::{error, info};

use super::AppState;
use crate::errors::ApiError;

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    #[serde(default)]
    pub poll_id: String,
    #[serde(default)]
    pub option: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoteResponse {
    pub success: bool,
    pub poll_id: String,
    pub option: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResultsResponse {
    pub poll_id: String,
    pub results: OptionTally,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AllVotesResponse {
    pub votes: Votes,
}

pub async fn vote(
    State(state): State<AppState>,
    Json(req): Json<VoteRequest>,
) -> Result<Json<VoteResponse>, ApiError> {
    info!(poll_id = %req.poll_id, option = %req.option, "vote received");
    match state.votes.record_vote(&req.poll_id, &req.option).await {
        Ok(_) => Ok(Json(VoteResponse { success: true, poll_id: req.poll_id, option: req.option })),
        Err(ServiceError::Validation(msg)) => Err(ApiError::BadRequest(msg)),
        Err(e) => {
            error!(poll_id = %req.poll_id, error = %e, "error saving vote");
            Err(ApiError::Internal("Failed to save vote.".into()))
        }
    }
}

pub async fn results(State(state): State<AppState>, Path(poll_id): Path<String>) -> Json<ResultsResponse> {
    let results = state.votes.get_results(&poll_id).await;
    Json(ResultsResponse { poll_id, results })
}

/// Whatever shape is on disk; clients fall back to this when structured calls fail.
pub async fn raw(State(state): State<AppState>) -> Json<Value> {
    Json(state.votes.get_raw().await)
}

pub async fn all(State(state): State<AppState>) -> Json<AllVotesResponse> {
    Json(AllVotesResponse { votes: state.votes.get_all().await })
}
