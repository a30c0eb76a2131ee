use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use time::OffsetDateTime;

/// A catalogue entry as stored in `books.json`.
///
/// Client-supplied fields keep whatever JSON value they were created with;
/// readers interpret them through the accessors below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Unique identifier, assigned as the next free integer
    pub id: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub title: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub author: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub price: Value,
    #[serde(default = "zero")]
    pub rating: Value,
    #[serde(default = "zero")]
    pub review_count: Value,
    #[serde(default = "in_stock_default")]
    pub in_stock: Value,
    #[serde(default = "featured_default")]
    pub featured: Value,
    /// ISO date (`YYYY-MM-DD`) or RFC 3339 datetime
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub date_published: Value,
    /// Fields the catalogue does not model, kept as stored
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Book {
    /// Popularity used by the top-rated listing
    pub fn score(&self) -> f64 {
        numeric(&self.rating) * numeric(&self.review_count)
    }

    pub fn is_featured(&self) -> bool {
        self.featured.as_bool() == Some(true)
    }

    pub fn published(&self) -> Option<&str> {
        self.date_published.as_str()
    }
}

/// Numbers as-is, numeric strings parsed, anything else counts as zero.
pub fn numeric(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite()).unwrap_or(0.0)
}

fn zero() -> Value {
    json!(0)
}

fn in_stock_default() -> Value {
    Value::Bool(true)
}

fn featured_default() -> Value {
    Value::Bool(false)
}

/// Body of `POST /api/books`. Values are taken as sent; only presence of the
/// required ones is checked.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBook {
    pub title: Option<Value>,
    pub author: Option<Value>,
    pub price: Option<Value>,
    pub rating: Option<Value>,
    pub review_count: Option<Value>,
    pub in_stock: Option<Value>,
    pub featured: Option<Value>,
    pub date_published: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CreateBook {
    /// Names of required fields that are absent, null, or blank
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("title", &self.title),
            ("author", &self.author),
            ("price", &self.price),
        ]
        .into_iter()
        .filter(|(_, value)| is_missing(value))
        .map(|(name, _)| name)
        .collect()
    }

    /// Build the stored record. Call only after `missing_fields` came back empty.
    pub fn into_book(mut self, id: String, today: OffsetDateTime) -> Book {
        // server-assigned
        self.extra.remove("id");

        Book {
            id,
            title: self.title.unwrap_or_default(),
            author: self.author.unwrap_or_default(),
            price: self.price.unwrap_or_default(),
            rating: self.rating.unwrap_or_else(zero),
            review_count: self.review_count.unwrap_or_else(zero),
            in_stock: self.in_stock.unwrap_or_else(in_stock_default),
            featured: self.featured.unwrap_or_else(featured_default),
            date_published: self
                .date_published
                .filter(|date| !is_blank(date))
                .unwrap_or_else(|| Value::String(iso_date(today))),
            extra: self.extra,
        }
    }
}

/// Query of `GET /api/books/date-range`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateRangeQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Absent, null, or a blank string
pub fn is_missing(value: &Option<Value>) -> bool {
    value.as_ref().map_or(true, is_blank)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn iso_date(moment: OffsetDateTime) -> String {
    let date = moment.date();
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}
