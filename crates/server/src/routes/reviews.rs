use axum::{
    extract::{FromRequest, Multipart, Path, Request, State},
    http::header::CONTENT_TYPE,
    Json,
};
use serde::{Deserialize, Serialize};
use service::reviews::{Review, ReviewInput};

use super::AppState;
use crate::errors::ApiError;

#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewResponse {
    pub success: bool,
    pub review: Review,
}

/// Accepts the site's multipart review form or a JSON body.
pub async fn submit(
    State(state): State<AppState>,
    req: Request,
) -> Result<Json<ReviewResponse>, ApiError> {
    let is_multipart = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("multipart/form-data"))
        .unwrap_or(false);

    let input = if is_multipart {
        let multipart = Multipart::from_request(req, &state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        read_form(multipart).await?
    } else {
        let Json(input) = Json::<ReviewInput>::from_request(req, &state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        input
    };

    let review = state.reviews.submit(input).await?;
    Ok(Json(ReviewResponse { success: true, review }))
}

async fn read_form(mut multipart: Multipart) -> Result<ReviewInput, ApiError> {
    let mut input = ReviewInput {
        name: String::new(),
        review: String::new(),
        content: None,
        rating: 0,
        photo_url: None,
        video_url: None,
    };
    let mut rating: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let Some(key) = field.name().map(str::to_owned) else { continue };
        // photo / video parts are not stored
        if !matches!(key.as_str(), "name" | "review" | "content" | "rating") {
            continue;
        }
        let text = field
            .text()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        match key.as_str() {
            "name" => input.name = text,
            "review" => input.review = text,
            "content" => input.content = (!text.is_empty()).then_some(text),
            _ => rating = Some(text),
        }
    }

    let rating = rating.ok_or_else(|| ApiError::BadRequest("rating is required".into()))?;
    input.rating = rating
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("rating must be an integer, got {rating:?}")))?;
    Ok(input)
}

pub async fn list_approved(State(state): State<AppState>) -> Json<Vec<Review>> {
    Json(state.reviews.list_approved().await)
}

// includes pending reviews; there is no auth layer in front of this
pub async fn list_all(State(state): State<AppState>) -> Json<Vec<Review>> {
    Json(state.reviews.list_all().await)
}

pub async fn reject(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<Json<ReviewResponse>, ApiError> {
    let review = state.reviews.reject(index).await?;
    Ok(Json(ReviewResponse { success: true, review }))
}

pub async fn approve(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<Json<ReviewResponse>, ApiError> {
    let review = state.reviews.approve(index).await?;
    Ok(Json(ReviewResponse { success: true, review }))
}
