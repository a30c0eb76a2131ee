pub mod models;
pub mod routes;

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use axum::{
    routing::{get, post},
    Router,
};
use serde_json::json;

use bookshelf_authz::ApiKeys;
use bookshelf_db::JsonCollection;
use bookshelf_kernel::{settings::Settings, InitCtx, Module};

use routes::ReviewsState;

/// Key of the array inside `reviews.json`
pub const COLLECTION_KEY: &str = "reviews";

/// Reviews of catalogue books
pub struct ReviewsModule {
    state: ReviewsState,
}

impl ReviewsModule {
    pub fn new(reviews: Arc<JsonCollection<models::Review>>, api_keys: ApiKeys) -> Self {
        Self {
            state: ReviewsState { reviews, api_keys },
        }
    }
}

#[async_trait]
impl Module for ReviewsModule {
    fn name(&self) -> &'static str {
        "reviews"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let created = self
            .state
            .reviews
            .ensure_exists()
            .await
            .with_context(|| "failed to prepare reviews collection")?;

        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            path = %self.state.reviews.path().display(),
            created,
            "reviews module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", post(routes::create_review))
            .route("/book/{bookId}", get(routes::reviews_for_book))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/": {
                    "post": {
                        "summary": "Create a review (requires X-API-Key)",
                        "tags": ["Reviews"],
                        "parameters": [{
                            "name": "X-API-Key",
                            "in": "header",
                            "required": true,
                            "schema": { "type": "string" }
                        }],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/CreateReview" }
                                }
                            }
                        },
                        "responses": {
                            "201": {
                                "description": "Created review",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/ReviewEnvelope" }
                                    }
                                }
                            },
                            "400": { "description": "Missing required fields" },
                            "401": { "description": "Missing or invalid API key" },
                            "500": { "description": "Collection could not be written" }
                        }
                    }
                },
                "/book/{bookId}": {
                    "get": {
                        "summary": "List reviews for a book",
                        "tags": ["Reviews"],
                        "parameters": [{
                            "name": "bookId",
                            "in": "path",
                            "required": true,
                            "schema": { "type": "string" }
                        }],
                        "responses": {
                            "200": {
                                "description": "Reviews with their count, possibly empty",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/ReviewList" }
                                    }
                                }
                            },
                            "500": { "description": "Collection could not be read" }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Review": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "bookId": { "type": "string" },
                            "author": { "type": "string" },
                            "rating": { "type": "number" },
                            "comment": { "type": "string" },
                            "timestamp": { "type": "string", "format": "date-time" },
                            "verified": { "type": "boolean", "default": false }
                        },
                        "required": ["id", "bookId", "author", "rating", "comment"]
                    },
                    "CreateReview": {
                        "type": "object",
                        "properties": {
                            "bookId": { "type": "string" },
                            "author": { "type": "string" },
                            "rating": { "type": "number" },
                            "comment": { "type": "string" },
                            "verified": { "type": "boolean" }
                        },
                        "required": ["bookId", "author", "rating", "comment"]
                    },
                    "ReviewEnvelope": {
                        "type": "object",
                        "properties": {
                            "success": { "type": "boolean" },
                            "data": { "$ref": "#/components/schemas/Review" },
                            "message": { "type": "string" }
                        }
                    },
                    "ReviewList": {
                        "type": "object",
                        "properties": {
                            "success": { "type": "boolean" },
                            "data": {
                                "type": "array",
                                "items": { "$ref": "#/components/schemas/Review" }
                            },
                            "count": { "type": "integer" }
                        }
                    }
                }
            }
        }))
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "reviews module stopped");
        Ok(())
    }
}

/// Create the reviews module from settings
pub fn create_module(settings: &Settings) -> Arc<dyn Module> {
    let reviews = Arc::new(JsonCollection::new(settings.reviews_path(), COLLECTION_KEY));
    let api_keys = ApiKeys::new(settings.auth.api_keys.iter().cloned());
    Arc::new(ReviewsModule::new(reviews, api_keys))
}
