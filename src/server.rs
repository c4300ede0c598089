//! HTTP tool server.
//!
//! Exposes the index operations as a JSON HTTP API for agents and other
//! local clients. All tools are registered in a [`ToolRegistry`] and
//! dispatched through the same `POST /tools/{name}` handler.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/tools/list` | List all registered tools with schemas |
//! | `POST` | `/tools/{name}` | Call a tool with a JSON object body |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query: invalid configuration: query must not be empty" } }
//! ```
//!
//! | Code | Status | Raised for |
//! |------|--------|------------|
//! | `not_found` | 404 | unknown tool |
//! | `bad_request` | 400 | non-object body, empty query, invalid configuration |
//! | `capability_unavailable` | 503 | embedding model or vector store cannot be opened |
//! | `tool_error` | 500 | anything else |
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::error::{classify, RagError};
use crate::traits::{ToolContext, ToolInfo, ToolRegistry};

/// Default bind address for `ragdocs serve`.
pub const DEFAULT_BIND: &str = "127.0.0.1:7340";

#[derive(Clone)]
struct AppState {
    ctx: Arc<ToolContext>,
    tools: Arc<ToolRegistry>,
}

/// Serve the built-in tools on `bind_addr` until the process exits.
pub async fn run_server(config_file: Option<PathBuf>, bind_addr: &str) -> anyhow::Result<()> {
    let app = router(ToolContext::new(config_file), ToolRegistry::with_builtins());

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("tool server listening on http://{}", listener.local_addr()?);
    eprintln!("ragdocs tool server listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// The server's router, for serving or for in-process tests.
pub fn router(ctx: ToolContext, tools: ToolRegistry) -> Router {
    let state = AppState {
        ctx: Arc::new(ctx),
        tools: Arc::new(tools),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn app_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> AppError {
    AppError {
        status,
        code,
        message: message.into(),
    }
}

fn classify_tool_error(tool_name: &str, err: anyhow::Error) -> AppError {
    let message = format!("{}: {:#}", tool_name, err);
    match classify(&err) {
        Some(RagError::InvalidConfiguration(_)) => {
            app_error(StatusCode::BAD_REQUEST, "bad_request", message)
        }
        Some(RagError::MissingCapability(_)) => app_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "capability_unavailable",
            message,
        ),
        None => {
            tracing::warn!("{}", message);
            app_error(StatusCode::INTERNAL_SERVER_ERROR, "tool_error", message)
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /tools/list ============

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    let tools = state
        .tools
        .tools()
        .iter()
        .map(|t| ToolInfo::of(t.as_ref()))
        .collect();
    Json(ToolListResponse { tools })
}

// ============ POST /tools/{name} ============

async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(params): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let tool = state.tools.find(&name).ok_or_else(|| {
        app_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("no tool registered with name: {}", name),
        )
    })?;

    if !params.is_object() {
        return Err(app_error(
            StatusCode::BAD_REQUEST,
            "bad_request",
            "parameters must be a JSON object",
        ));
    }

    tracing::debug!("calling tool {}", name);
    let result = tool
        .execute(params, &state.ctx)
        .await
        .map_err(|e| classify_tool_error(&name, e))?;

    Ok(Json(serde_json::json!({ "result": result })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_invalid_configuration() {
        let err: anyhow::Error = RagError::invalid("top_k must be >= 1").into();
        let app = classify_tool_error("query", err);
        assert_eq!(app.status, StatusCode::BAD_REQUEST);
        assert_eq!(app.code, "bad_request");
        assert!(app.message.starts_with("query: "));
    }

    #[test]
    fn test_classify_missing_capability() {
        let err: anyhow::Error = RagError::missing("model unavailable").into();
        let app = classify_tool_error("build_index", err);
        assert_eq!(app.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(app.code, "capability_unavailable");
    }

    #[test]
    fn test_classify_goes_by_error_type_not_message() {
        let err: anyhow::Error = RagError::invalid("query must not be empty").into();
        let app = classify_tool_error("query", err);
        assert_eq!(app.status, StatusCode::BAD_REQUEST);

        let app = classify_tool_error("status", anyhow::anyhow!("field must not be empty"));
        assert_eq!(app.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(app.code, "tool_error");
    }

    #[test]
    fn test_classify_other() {
        let app = classify_tool_error("status", anyhow::anyhow!("disk on fire"));
        assert_eq!(app.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(app.code, "tool_error");
    }
}
