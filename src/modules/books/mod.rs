pub mod models;
pub mod routes;

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use axum::{routing::get, Router};
use serde_json::json;

use bookshelf_authz::ApiKeys;
use bookshelf_db::JsonCollection;
use bookshelf_kernel::{settings::Settings, InitCtx, Module};

use routes::BooksState;

/// Key of the array inside `books.json`
pub const COLLECTION_KEY: &str = "books";

/// Book catalogue: listing, filtering, lookup, and creation
pub struct BooksModule {
    state: BooksState,
}

impl BooksModule {
    pub fn new(books: Arc<JsonCollection<models::Book>>, api_keys: ApiKeys) -> Self {
        Self {
            state: BooksState { books, api_keys },
        }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let created = self
            .state
            .books
            .ensure_exists()
            .await
            .with_context(|| "failed to prepare books collection")?;

        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            path = %self.state.books.path().display(),
            created,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        // literal segments take precedence over `{id}`
        Router::new()
            .route("/", get(routes::list_books).post(routes::create_book))
            .route("/featured", get(routes::featured_books))
            .route("/top-rated", get(routes::top_rated_books))
            .route("/date-range", get(routes::books_by_date_range))
            .route("/{id}", get(routes::get_book))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = |description: &str| {
            json!({
                "description": description,
                "content": {
                    "application/json": {
                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                    }
                }
            })
        };
        let book_list = json!({
            "description": "Books with their count",
            "content": {
                "application/json": {
                    "schema": { "$ref": "#/components/schemas/BookList" }
                }
            }
        });

        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "List all books",
                        "tags": ["Books"],
                        "responses": {
                            "200": book_list,
                            "500": error("Collection could not be read")
                        }
                    },
                    "post": {
                        "summary": "Create a book (requires X-API-Key)",
                        "tags": ["Books"],
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
                                    "schema": { "$ref": "#/components/schemas/CreateBook" }
                                }
                            }
                        },
                        "responses": {
                            "201": {
                                "description": "Created book",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/BookEnvelope" }
                                    }
                                }
                            },
                            "400": error("Missing required fields"),
                            "401": error("Missing or invalid API key"),
                            "500": error("Collection could not be written")
                        }
                    }
                },
                "/featured": {
                    "get": {
                        "summary": "List featured books",
                        "tags": ["Books"],
                        "responses": {
                            "200": book_list,
                            "500": error("Collection could not be read")
                        }
                    }
                },
                "/top-rated": {
                    "get": {
                        "summary": "Top 10 books by rating * reviewCount",
                        "tags": ["Books"],
                        "responses": {
                            "200": book_list,
                            "500": error("Collection could not be read")
                        }
                    }
                },
                "/date-range": {
                    "get": {
                        "summary": "Books published within [start, end]",
                        "tags": ["Books"],
                        "parameters": [
                            {
                                "name": "start",
                                "in": "query",
                                "required": true,
                                "schema": { "type": "string", "format": "date" }
                            },
                            {
                                "name": "end",
                                "in": "query",
                                "required": true,
                                "schema": { "type": "string", "format": "date" }
                            }
                        ],
                        "responses": {
                            "200": book_list,
                            "400": error("Missing, invalid, or inverted date range"),
                            "500": error("Collection could not be read")
                        }
                    }
                },
                "/{id}": {
                    "get": {
                        "summary": "Get a book by id",
                        "tags": ["Books"],
                        "parameters": [{
                            "name": "id",
                            "in": "path",
                            "required": true,
                            "schema": { "type": "string" }
                        }],
                        "responses": {
                            "200": {
                                "description": "The book",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/BookEnvelope" }
                                    }
                                }
                            },
                            "404": error("Book not found"),
                            "500": error("Collection could not be read")
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Book": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "title": { "type": "string" },
                            "author": { "type": "string" },
                            "price": { "type": "number" },
                            "rating": { "type": "number", "default": 0 },
                            "reviewCount": { "type": "number", "default": 0 },
                            "inStock": { "type": "boolean", "default": true },
                            "featured": { "type": "boolean", "default": false },
                            "datePublished": { "type": "string", "format": "date" }
                        },
                        "required": ["id", "title", "author", "price"]
                    },
                    "CreateBook": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "author": { "type": "string" },
                            "price": { "type": "number" },
                            "rating": { "type": "number" },
                            "reviewCount": { "type": "number" },
                            "inStock": { "type": "boolean" },
                            "featured": { "type": "boolean" },
                            "datePublished": { "type": "string", "format": "date" }
                        },
                        "required": ["title", "author", "price"]
                    },
                    "BookEnvelope": {
                        "type": "object",
                        "properties": {
                            "success": { "type": "boolean" },
                            "data": { "$ref": "#/components/schemas/Book" },
                            "message": { "type": "string" }
                        },
                        "required": ["success", "data"]
                    },
                    "BookList": {
                        "type": "object",
                        "properties": {
                            "success": { "type": "boolean" },
                            "data": {
                                "type": "array",
                                "items": { "$ref": "#/components/schemas/Book" }
                            },
                            "count": { "type": "integer" }
                        },
                        "required": ["success", "data", "count"]
                    }
                }
            }
        }))
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Create the books module from settings
pub fn create_module(settings: &Settings) -> Arc<dyn Module> {
    let books = Arc::new(JsonCollection::new(settings.books_path(), COLLECTION_KEY));
    let api_keys = ApiKeys::new(settings.auth.api_keys.iter().cloned());
    Arc::new(BooksModule::new(books, api_keys))
}
