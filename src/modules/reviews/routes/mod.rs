//! Review handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, FromRef, Path, State},
    Json,
};
use serde_json::json;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use uuid::Uuid;

use bookshelf_authz::{ApiKey, ApiKeys};
use bookshelf_db::JsonCollection;
use bookshelf_http::{AppError, Envelope};

use super::models::{CreateReview, Review};

#[derive(Clone)]
pub struct ReviewsState {
    pub reviews: Arc<JsonCollection<Review>>,
    pub api_keys: ApiKeys,
}

impl FromRef<ReviewsState> for ApiKeys {
    fn from_ref(state: &ReviewsState) -> Self {
        state.api_keys.clone()
    }
}

/// `GET /api/reviews/book/{bookId}`
///
/// A book without reviews yields an empty list, not a 404.
pub async fn reviews_for_book(
    State(state): State<ReviewsState>,
    Path(book_id): Path<String>,
) -> Result<Envelope<Vec<Review>>, AppError> {
    let reviews = state.reviews.load().await.map_err(AppError::internal)?;
    let matching = reviews
        .into_iter()
        .filter(|review| review.is_for_book(&book_id))
        .collect();
    Ok(Envelope::list(matching))
}

/// `POST /api/reviews`
pub async fn create_review(
    State(state): State<ReviewsState>,
    _key: ApiKey,
    body: Result<Json<CreateReview>, JsonRejection>,
) -> Result<Envelope<Review>, AppError> {
    let Json(body) = body.map_err(|e| AppError::bad_request(e.body_text()))?;

    let missing = body.missing_fields();
    if !missing.is_empty() {
        let details = missing
            .iter()
            .map(|field| json!({ "field": field, "error": "required" }))
            .collect();
        return Err(AppError::validation(
            details,
            format!("Missing required fields: {}", missing.join(", ")),
        ));
    }

    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(AppError::internal)?;
    let id = new_review_id();

    let review = state
        .reviews
        .append_with(|_| body.into_review(id, timestamp))
        .await
        .map_err(AppError::internal)?;

    tracing::info!(
        review_id = %review.id,
        book_id = %review.book_id,
        "review created"
    );

    Ok(Envelope::created(review).with_message("Review created successfully"))
}

/// `review-<uuid v7>`
pub fn new_review_id() -> String {
    format!("review-{}", Uuid::now_v7())
}
