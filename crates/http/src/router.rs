//! Router builder for the bookshelf HTTP server

use std::collections::BTreeMap;
use std::time::Duration;

use axum::{extract::Request, http::HeaderValue, routing::get, Router};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::{
    cors::{Any, CorsLayer},
    normalize_path::NormalizePath,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use uuid::Uuid;

use bookshelf_kernel::ModuleRegistry;

use crate::response::Envelope;

const SERVICE_NAME: &str = "Bookshelf API";
const SERVICE_DESCRIPTION: &str = "Book catalogue and reviews backed by flat JSON files";
const HTTP_METHODS: &[&str] = &["get", "post", "put", "patch", "delete"];

/// Builder for constructing the main HTTP router
///
/// Layers only wrap the routes registered before them, so add routes and
/// modules first and middleware last.
pub struct RouterBuilder {
    router: Router,
}

impl RouterBuilder {
    /// Create a new router builder
    pub fn new() -> Self {
        Self {
            router: Router::new(),
        }
    }

    /// Add a route to the router
    pub fn route(mut self, path: &str, route: axum::routing::MethodRouter) -> Self {
        self.router = self.router.route(path, route);
        self
    }

    /// Mount a module's router under `/api/{module_name}`
    pub fn mount_module(mut self, module_name: &str, module_router: Router) -> Self {
        let api_path = format!("/api/{}", module_name);
        self.router = self.router.nest(&api_path, module_router);
        self
    }

    /// Add tracing middleware
    pub fn with_tracing(mut self) -> Self {
        self.router = self.router.layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_request(DefaultOnRequest::new().level(tracing::Level::INFO))
                .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
        );
        self
    }

    /// Add CORS middleware
    pub fn with_cors(mut self) -> Self {
        self.router = self.router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
        self
    }

    /// Assign an `x-request-id` to every request and echo it on the response
    pub fn with_request_id(mut self) -> Self {
        self.router = self
            .router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7));
        self
    }

    /// Add timeout middleware
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.router = self
            .router
            .layer(TimeoutLayer::new(Duration::from_millis(timeout_ms)));
        self
    }

    /// Serve the merged OpenAPI document and the service index at `/`
    pub fn with_openapi(mut self, registry: &ModuleRegistry) -> Self {
        let openapi_spec = openapi_document(registry);

        match serde_json::from_value::<utoipa::openapi::OpenApi>(openapi_spec.clone()) {
            Ok(openapi) => tracing::debug!(
                paths = openapi.paths.paths.len(),
                "OpenAPI document assembled"
            ),
            Err(e) => tracing::warn!(error = %e, "merged OpenAPI document is not valid OpenAPI"),
        }

        let info = ServiceInfo {
            name: SERVICE_NAME,
            version: env!("CARGO_PKG_VERSION"),
            description: SERVICE_DESCRIPTION,
            endpoints: endpoint_listing(&openapi_spec),
        };

        self.router = self
            .router
            .route(
                "/",
                get(move || {
                    let info = info.clone();
                    async move { Envelope::ok(info) }
                }),
            )
            .route(
                "/docs/openapi.json",
                get(move || async move { axum::Json(openapi_spec.clone()) }),
            );

        self
    }

    /// Route `/api/books/` like `/api/books`
    ///
    /// Normalization has to happen before routing, so the routes added so far
    /// move behind a fallback service. Add middleware after this call.
    pub fn with_trailing_slash_trimmed(self) -> Self {
        Self {
            router: Router::new()
                .fallback_service(NormalizePath::trim_trailing_slash(self.router)),
        }
    }

    /// Build the final router
    pub fn build(self) -> Router {
        self.router
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Body of `GET /`
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub endpoints: BTreeMap<String, String>,
}

/// Merge every module's OpenAPI fragment into one document, prefixing module
/// paths with their mount point.
pub fn openapi_document(registry: &ModuleRegistry) -> Value {
    let mut openapi_spec = json!({
        "openapi": "3.1.0",
        "info": {
            "title": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "description": SERVICE_DESCRIPTION
        },
        "paths": {},
        "components": {
            "schemas": {}
        }
    });

    openapi_spec["components"]["schemas"]["ErrorResponse"] = json!({
        "type": "object",
        "properties": {
            "success": { "type": "boolean" },
            "error": { "type": "string" },
            "code": { "type": "string" },
            "message": { "type": "string" },
            "details": { "type": "array", "items": {} },
            "trace_id": { "type": "string" },
            "timestamp": { "type": "string" }
        },
        "required": ["success", "error", "code", "trace_id", "timestamp"]
    });

    openapi_spec["paths"]["/"] = json!({
        "get": {
            "summary": "Service info and endpoint listing",
            "responses": { "200": { "description": "Service info" } }
        }
    });
    openapi_spec["paths"]["/healthz"] = json!({
        "get": {
            "summary": "Health check",
            "responses": {
                "200": {
                    "description": "OK",
                    "content": { "text/plain": { "schema": { "type": "string" } } }
                }
            }
        }
    });
    openapi_spec["paths"]["/docs/openapi.json"] = json!({
        "get": {
            "summary": "OpenAPI document",
            "responses": { "200": { "description": "This document" } }
        }
    });

    for module in registry.modules() {
        let Some(module_spec) = module.openapi() else {
            continue;
        };

        if let Some(paths) = module_spec.get("paths").and_then(Value::as_object) {
            for (path, path_item) in paths {
                // "/" maps onto the bare mount point
                let prefixed_path = match path.as_str() {
                    "/" => format!("/api/{}", module.name()),
                    _ => format!("/api/{}{}", module.name(), path),
                };
                openapi_spec["paths"][prefixed_path] = path_item.clone();
            }
        }

        if let Some(schemas) = module_spec
            .get("components")
            .and_then(|components| components.get("schemas"))
            .and_then(Value::as_object)
        {
            for (schema_name, schema_def) in schemas {
                openapi_spec["components"]["schemas"][schema_name] = schema_def.clone();
            }
        }
    }

    openapi_spec
}

/// `"GET /api/books" -> "List all books"` for every operation in the document.
pub fn endpoint_listing(openapi_spec: &Value) -> BTreeMap<String, String> {
    let mut endpoints = BTreeMap::new();
    let Some(paths) = openapi_spec.get("paths").and_then(Value::as_object) else {
        return endpoints;
    };

    for (path, path_item) in paths {
        for method in HTTP_METHODS {
            if let Some(operation) = path_item.get(*method) {
                let summary = operation
                    .get("summary")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                endpoints.insert(
                    format!("{} {}", method.to_uppercase(), path),
                    summary.to_string(),
                );
            }
        }
    }

    endpoints
}

/// Request ID generator producing time-ordered UUIDs
#[derive(Clone, Copy)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let request_id = Uuid::now_v7().to_string().parse::<HeaderValue>().ok()?;
        Some(RequestId::new(request_id))
    }
}
