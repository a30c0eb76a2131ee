//! Book catalogue handlers.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, FromRef, Path, Query, State},
    Json,
};
use serde_json::json;
use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime,
};

use bookshelf_authz::{ApiKey, ApiKeys};
use bookshelf_db::JsonCollection;
use bookshelf_http::{AppError, Envelope};

use super::models::{Book, CreateBook, DateRangeQuery};

/// Maximum number of entries in the top-rated listing
pub const TOP_RATED_LIMIT: usize = 10;

/// Shared state of the books router
#[derive(Clone)]
pub struct BooksState {
    pub books: Arc<JsonCollection<Book>>,
    pub api_keys: ApiKeys,
}

impl FromRef<BooksState> for ApiKeys {
    fn from_ref(state: &BooksState) -> Self {
        state.api_keys.clone()
    }
}

/// `GET /api/books`
pub async fn list_books(State(state): State<BooksState>) -> Result<Envelope<Vec<Book>>, AppError> {
    let books = state.books.load().await.map_err(AppError::internal)?;
    Ok(Envelope::list(books))
}

/// `GET /api/books/featured`
pub async fn featured_books(
    State(state): State<BooksState>,
) -> Result<Envelope<Vec<Book>>, AppError> {
    let books = state.books.load().await.map_err(AppError::internal)?;
    let featured = books.into_iter().filter(Book::is_featured).collect();
    Ok(Envelope::list(featured))
}

/// `GET /api/books/top-rated`
pub async fn top_rated_books(
    State(state): State<BooksState>,
) -> Result<Envelope<Vec<Book>>, AppError> {
    let books = state.books.load().await.map_err(AppError::internal)?;
    Ok(Envelope::list(top_rated(books)))
}

/// `GET /api/books/date-range?start=..&end=..`
pub async fn books_by_date_range(
    State(state): State<BooksState>,
    query: Result<Query<DateRangeQuery>, QueryRejection>,
) -> Result<Envelope<Vec<Book>>, AppError> {
    let Query(query) = query.map_err(|e| AppError::bad_request(e.body_text()))?;

    let (Some(start), Some(end)) = (
        query.start.filter(|s| !s.is_empty()),
        query.end.filter(|s| !s.is_empty()),
    ) else {
        return Err(AppError::bad_request(
            "Both start and end query parameters are required",
        ));
    };

    let (Some(start), Some(end)) = (parse_instant(&start), parse_instant(&end)) else {
        return Err(AppError::bad_request(
            "Invalid date format. Use YYYY-MM-DD or an RFC 3339 datetime",
        ));
    };

    if start > end {
        return Err(AppError::bad_request(
            "Start date must be on or before end date",
        ));
    }

    let books = state.books.load().await.map_err(AppError::internal)?;
    Ok(Envelope::list(published_between(books, start, end)))
}

/// `GET /api/books/{id}`
pub async fn get_book(
    State(state): State<BooksState>,
    Path(id): Path<String>,
) -> Result<Envelope<Book>, AppError> {
    let books = state.books.load().await.map_err(AppError::internal)?;

    books
        .into_iter()
        .find(|book| book.id == id)
        .map(Envelope::ok)
        .ok_or_else(|| AppError::not_found("Book not found"))
}

/// `POST /api/books`
pub async fn create_book(
    State(state): State<BooksState>,
    _key: ApiKey,
    body: Result<Json<CreateBook>, JsonRejection>,
) -> Result<Envelope<Book>, AppError> {
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

    let today = OffsetDateTime::now_utc();
    let book = state
        .books
        .append_with(|existing| body.into_book(next_book_id(existing), today))
        .await
        .map_err(AppError::internal)?;

    tracing::info!(book_id = %book.id, title = %book.title, "book created");

    Ok(Envelope::created(book).with_message("Book created successfully"))
}

/// Highest `rating * reviewCount` first, ties kept in file order.
pub fn top_rated(mut books: Vec<Book>) -> Vec<Book> {
    books.sort_by(|a, b| b.score().total_cmp(&a.score()));
    books.truncate(TOP_RATED_LIMIT);
    books
}

/// Books whose publication instant lies in `[start, end]`. Books with an
/// unparsable `datePublished` never match.
pub fn published_between(
    books: Vec<Book>,
    start: OffsetDateTime,
    end: OffsetDateTime,
) -> Vec<Book> {
    books
        .into_iter()
        .filter(|book| {
            book.published()
                .and_then(parse_instant)
                .is_some_and(|published| start <= published && published <= end)
        })
        .collect()
}

/// One more than the largest numeric id. Non-numeric ids are ignored.
///
/// Once the largest id is `u64::MAX` the smallest unused id is handed out
/// instead, so the result never equals an existing id.
pub fn next_book_id(existing: &[Book]) -> String {
    let largest = existing
        .iter()
        .filter_map(|book| book.id.parse::<u64>().ok())
        .max();

    if let Some(next) = largest.map_or(Some(1), |max| max.checked_add(1)) {
        return next.to_string();
    }

    let taken: HashSet<&str> = existing.iter().map(|book| book.id.as_str()).collect();
    let mut candidate: u64 = 1;
    while taken.contains(candidate.to_string().as_str()) {
        candidate += 1;
    }
    candidate.to_string()
}

/// `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 datetime.
pub fn parse_instant(value: &str) -> Option<OffsetDateTime> {
    let value = value.trim();
    if let Ok(instant) = OffsetDateTime::parse(value, &Rfc3339) {
        return Some(instant);
    }

    Date::parse(value, format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|date| date.midnight().assume_utc())
}
