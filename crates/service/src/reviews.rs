//! Customer reviews awaiting moderation.
//!
//! Stored as a JSON array. New reviews start `pending`; only `approved`
//! ones are shown publicly, `rejected` ones stay on file.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::errors::ServiceError;
use crate::metrics;
use crate::storage::{DocumentStorage, JsonFileStorage, Loaded};

/// Moderation state. Unknown strings are carried through unchanged so a
/// status written by another tool never makes the document unreadable.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
    Other(String),
}

impl From<String> for ReviewStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => ReviewStatus::Pending,
            "approved" => ReviewStatus::Approved,
            "rejected" => ReviewStatus::Rejected,
            _ => ReviewStatus::Other(s),
        }
    }
}

impl ReviewStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
            ReviewStatus::Other(s) => s,
        }
    }
}

impl From<ReviewStatus> for String {
    fn from(status: ReviewStatus) -> Self {
        match status {
            ReviewStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub name: String,
    pub review: String,
    #[serde(default)]
    pub content: Option<String>,
    pub rating: u8,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    pub status: ReviewStatus,
    /// Absent on entries written before timestamps were recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Submission payload; status and timestamp are assigned by the store.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReviewInput {
    pub name: String,
    pub review: String,
    #[serde(default)]
    pub content: Option<String>,
    pub rating: i64,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
}

impl ReviewInput {
    pub fn validate(&self) -> Result<u8, ServiceError> {
        if self.name.trim().is_empty() {
            return Err(ServiceError::Validation("name must not be empty".into()));
        }
        if self.review.trim().is_empty() {
            return Err(ServiceError::Validation("review must not be empty".into()));
        }
        match u8::try_from(self.rating) {
            Ok(r) if (1..=5).contains(&r) => Ok(r),
            _ => Err(ServiceError::Validation("rating must be between 1 and 5".into())),
        }
    }
}

pub struct ReviewStore {
    storage: Arc<dyn DocumentStorage>,
    write_lock: Mutex<()>,
}

impl ReviewStore {
    pub fn new(storage: Arc<dyn DocumentStorage>) -> Self {
        Self { storage, write_lock: Mutex::new(()) }
    }

    pub fn open<P: Into<PathBuf>>(path: P) -> Arc<Self> {
        Arc::new(Self::new(Arc::new(JsonFileStorage::new(path))))
    }

    fn parse(&self, value: Value) -> Result<Vec<Review>, ServiceError> {
        serde_json::from_value(value).map_err(|e| {
            warn!(path = %self.storage.location(), error = %e, "review document has unexpected shape");
            ServiceError::Corrupt(self.storage.location())
        })
    }

    /// Strict read used before writing: a broken document is never overwritten.
    async fn load_strict(&self) -> Result<Option<Vec<Review>>, ServiceError> {
        match self.storage.load().await? {
            Loaded::Missing => Ok(None),
            Loaded::Corrupt { reason } => {
                metrics::CORRUPT_DOCUMENT_TOTAL.inc();
                warn!(path = %self.storage.location(), %reason, "review document failed to parse");
                Err(ServiceError::Corrupt(self.storage.location()))
            }
            Loaded::Parsed(value) => self.parse(value).map(Some),
        }
    }

    async fn persist(&self, reviews: &[Review]) -> Result<(), ServiceError> {
        let doc = serde_json::to_value(reviews).map_err(crate::errors::StorageError::from)?;
        if let Err(e) = self.storage.write_atomic(&doc).await {
            metrics::STORAGE_WRITE_FAILURES_TOTAL.inc();
            return Err(e.into());
        }
        Ok(())
    }

    /// Every review including pending ones; empty when the document is absent or broken.
    pub async fn list_all(&self) -> Vec<Review> {
        match self.load_strict().await {
            Ok(reviews) => reviews.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "serving empty review list");
                Vec::new()
            }
        }
    }

    pub async fn list_approved(&self) -> Vec<Review> {
        self.list_all()
            .await
            .into_iter()
            .filter(|r| r.status == ReviewStatus::Approved)
            .collect()
    }

    pub async fn submit(&self, input: ReviewInput) -> Result<Review, ServiceError> {
        let rating = input.validate()?;
        let review = Review {
            name: input.name.trim().to_string(),
            review: input.review,
            content: input.content,
            rating,
            photo_url: input.photo_url,
            video_url: input.video_url,
            status: ReviewStatus::Pending,
            created_at: Some(Utc::now()),
        };

        let _guard = self.write_lock.lock().await;
        let mut reviews = self.load_strict().await?.unwrap_or_default();
        reviews.push(review.clone());
        self.persist(&reviews).await?;
        metrics::REVIEWS_SUBMITTED_TOTAL.inc();
        info!(index = reviews.len() - 1, rating, "review submitted for moderation");
        Ok(review)
    }

    /// Mark the review at `index` (position in `list_all`) as approved.
    pub async fn approve(&self, index: usize) -> Result<Review, ServiceError> {
        self.set_status(index, ReviewStatus::Approved).await
    }

    /// Hide the review at `index`; it stays in the file for the record.
    pub async fn reject(&self, index: usize) -> Result<Review, ServiceError> {
        self.set_status(index, ReviewStatus::Rejected).await
    }

    async fn set_status(&self, index: usize, status: ReviewStatus) -> Result<Review, ServiceError> {
        let _guard = self.write_lock.lock().await;
        let mut reviews = self
            .load_strict()
            .await?
            .ok_or_else(|| ServiceError::not_found("reviews"))?;
        let Some(review) = reviews.get_mut(index) else {
            return Err(ServiceError::Validation(format!("invalid review index {index}")));
        };
        review.status = status;
        let updated = review.clone();
        self.persist(&reviews).await?;
        info!(index, status = updated.status.as_str(), "review status changed");
        Ok(updated)
    }
}
