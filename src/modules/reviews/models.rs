use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::modules::books::models::is_missing;

/// A reader review as stored in `reviews.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    /// `review-<uuid>`
    pub id: String,
    /// Id of the reviewed book; not checked against the catalogue
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub book_id: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub author: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub rating: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub comment: Value,
    /// RFC 3339 creation time
    #[serde(default)]
    pub timestamp: String,
    #[serde(default = "verified_default")]
    pub verified: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Review {
    /// `bookId` equals `book_id`, whether it was stored as a string or a number
    pub fn is_for_book(&self, book_id: &str) -> bool {
        match &self.book_id {
            Value::String(s) => s == book_id,
            Value::Number(n) => n.to_string() == book_id,
            _ => false,
        }
    }
}

fn verified_default() -> Value {
    Value::Bool(false)
}

/// Body of `POST /api/reviews`. Values are taken as sent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReview {
    pub book_id: Option<Value>,
    pub author: Option<Value>,
    pub rating: Option<Value>,
    pub comment: Option<Value>,
    pub verified: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CreateReview {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("bookId", &self.book_id),
            ("author", &self.author),
            ("rating", &self.rating),
            ("comment", &self.comment),
        ]
        .into_iter()
        .filter(|(_, value)| is_missing(value))
        .map(|(name, _)| name)
        .collect()
    }

    pub fn into_review(mut self, id: String, timestamp: String) -> Review {
        self.extra.remove("id");
        self.extra.remove("timestamp");

        Review {
            id,
            book_id: self.book_id.unwrap_or_default(),
            author: self.author.unwrap_or_default(),
            rating: self.rating.unwrap_or_default(),
            comment: self.comment.unwrap_or_default(),
            timestamp,
            verified: self.verified.unwrap_or_else(verified_default),
            extra: self.extra,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reports_every_missing_field() {
        let body: CreateReview = serde_json::from_value(json!({"author": "Ada"})).unwrap();
        assert_eq!(body.missing_fields(), vec!["bookId", "rating", "comment"]);

        let body: CreateReview = serde_json::from_value(
            json!({"bookId": " ", "author": "Ada", "rating": null, "comment": "ok"}),
        )
        .unwrap();
        assert_eq!(body.missing_fields(), vec!["bookId", "rating"]);
    }

    #[test]
    fn string_rating_counts_as_present() {
        let body: CreateReview = serde_json::from_value(
            json!({"bookId": 2, "author": "Ada", "rating": "5", "comment": "Great"}),
        )
        .unwrap();
        assert!(body.missing_fields().is_empty());

        let review = body.into_review("review-1".to_string(), String::new());
        assert_eq!(review.rating, "5");
        assert!(review.is_for_book("2"));
        assert!(!review.is_for_book("20"));
    }

    #[test]
    fn into_review_ignores_client_id_and_timestamp() {
        let body: CreateReview = serde_json::from_value(json!({
            "id": "review-mine",
            "timestamp": "1999-01-01T00:00:00Z",
            "bookId": "2",
            "author": "Ada",
            "rating": 5,
            "comment": "Loved it",
            "title": "Five stars"
        }))
        .unwrap();
        assert!(body.missing_fields().is_empty());

        let review = body.into_review(
            "review-0192".to_string(),
            "2024-05-01T10:00:00Z".to_string(),
        );
        assert_eq!(review.id, "review-0192");
        assert_eq!(review.timestamp, "2024-05-01T10:00:00Z");
        assert_eq!(review.verified, false);
        assert_eq!(review.extra.len(), 1);

        let stored = serde_json::to_value(&review).unwrap();
        assert_eq!(stored["bookId"], "2");
        assert_eq!(stored["title"], "Five stars");
    }
}
