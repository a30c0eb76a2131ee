//! Shared-secret authorization for mutating endpoints.
//!
//! Handlers that take an [`ApiKey`] argument only run when the request
//! carries an `X-API-Key` header whose value is one of the configured keys.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use bookshelf_http::AppError;

pub const API_KEY_HEADER: &str = "x-api-key";

/// The set of accepted keys.
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    keys: Arc<[String]>,
}

impl ApiKeys {
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, candidate: &str) -> bool {
        self.keys.iter().any(|key| key == candidate)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Proof that the request presented an accepted key.
#[derive(Debug, Clone)]
pub struct ApiKey(pub String);

impl<S> FromRequestParts<S> for ApiKey
where
    ApiKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = ApiKeys::from_ref(state);

        let Some(value) = parts.headers.get(API_KEY_HEADER) else {
            tracing::warn!(path = %parts.uri.path(), "request without API key");
            return Err(AppError::unauthorized("API key is required"));
        };

        match value.to_str() {
            Ok(candidate) if keys.contains(candidate) => Ok(ApiKey(candidate.to_string())),
            _ => {
                tracing::warn!(path = %parts.uri.path(), "request with invalid API key");
                Err(AppError::unauthorized("Invalid API key"))
            }
        }
    }
}
