//! Tool trait and the built-in index tools.
//!
//! Every operation the server exposes is a [`Tool`]: a name, a
//! description, a JSON Schema for its parameters, and an async `execute`.
//! Tools are collected in a [`ToolRegistry`] and dispatched by
//! `POST /tools/{name}`. The CLI drives the same operations through
//! [`ToolContext`].
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 ToolRegistry                 │
//! │  build_index  refresh_index  query  status   │
//! └──────────────────────┬───────────────────────┘
//!                        ▼
//!          ToolContext → Config::resolve → pipelines
//! ```
//!
//! # Usage
//!
//! ```rust
//! use rag_docs::traits::ToolRegistry;
//!
//! let tools = ToolRegistry::with_builtins();
//! assert!(tools.find("query").is_some());
//! ```

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

use crate::config::{Config, ConfigOverrides};
use crate::error::RagError;
use crate::ingest::{build_index_with_store, BuildRequest};
use crate::models::{BuildSummary, QueryResponse, StatusReport};
use crate::search::query_index_with_store;
use crate::stats::get_status_with_store;
use crate::vector_store::sqlite::SqliteVectorStore;

// ═══════════════════════════════════════════════════════════════════════
// Tool Trait
// ═══════════════════════════════════════════════════════════════════════

/// An operation callable over the tool server.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Route name, used in `POST /tools/{name}`.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for the parameters object.
    fn parameters_schema(&self) -> Value;

    /// Run the tool. `params` is always a JSON object.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

/// Tool metadata as listed by `GET /tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolInfo {
    pub fn of(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters_schema(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// ToolContext
// ═══════════════════════════════════════════════════════════════════════

/// Shared context for tool execution.
///
/// Holds only the optional config file path. Every operation resolves a
/// fresh [`Config`] snapshot with its own overrides applied, so a running
/// server picks up config file and environment changes per call.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    config_file: Option<PathBuf>,
}

impl ToolContext {
    pub fn new(config_file: Option<PathBuf>) -> Self {
        Self { config_file }
    }

    /// Resolve a configuration snapshot for one call.
    pub fn resolve(&self, overrides: &ConfigOverrides) -> Result<Config> {
        Config::resolve(self.config_file.as_deref(), overrides)
    }

    /// Build or update the index.
    pub async fn build(&self, overrides: &ConfigOverrides, rebuild: bool) -> Result<BuildSummary> {
        let config = self.resolve(overrides)?;
        let embedder = config.embedding.create_embedder()?;
        let store = SqliteVectorStore::open(&config.index.data_dir).await?;
        let request = BuildRequest::from_config(&config, rebuild);
        let result = build_index_with_store(&store, &request, embedder.as_ref()).await;
        store.close().await;
        result
    }

    /// Answer a query against the index.
    pub async fn query(&self, query: &str, overrides: &ConfigOverrides) -> Result<QueryResponse> {
        if query.trim().is_empty() {
            return Err(RagError::invalid("query must not be empty").into());
        }
        let config = self.resolve(overrides)?;
        let embedder = config.embedding.create_embedder()?;
        let store = SqliteVectorStore::open(&config.index.data_dir).await?;
        let result = query_index_with_store(
            &store,
            query,
            &config.index.data_dir,
            &config.index.collection_name,
            config.retrieval.top_k,
            embedder.as_ref(),
        )
        .await;
        store.close().await;
        result
    }

    /// Report document and chunk counts.
    pub async fn status(&self, overrides: &ConfigOverrides) -> Result<StatusReport> {
        let config = self.resolve(overrides)?;
        let store = SqliteVectorStore::open(&config.index.data_dir).await?;
        let result = get_status_with_store(
            &store,
            &config.index.data_dir,
            &config.index.collection_name,
        )
        .await;
        store.close().await;
        result
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Built-in Tool Implementations
// ═══════════════════════════════════════════════════════════════════════

fn overrides_from(params: &Value) -> Result<ConfigOverrides> {
    serde_json::from_value(params.clone())
        .map_err(|e| RagError::invalid(format!("invalid parameters: {}", e)).into())
}

/// Build or update the index from the documents directory.
pub struct BuildIndexTool;

#[async_trait]
impl Tool for BuildIndexTool {
    fn name(&self) -> &str {
        "build_index"
    }

    fn description(&self) -> &str {
        "Index the documents directory (incremental unless rebuild is set)"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "docs_dir": { "type": "string", "description": "Documents directory" },
                "data_dir": { "type": "string", "description": "Index data directory" },
                "collection_name": { "type": "string" },
                "chunk_size": { "type": "integer", "minimum": 1 },
                "chunk_overlap": { "type": "integer", "minimum": 0 },
                "embedding_backend": { "type": "string", "enum": ["sentence-transformer", "simple"] },
                "rebuild": { "type": "boolean", "default": false }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let overrides = overrides_from(&params)?;
        let rebuild = params["rebuild"].as_bool().unwrap_or(false);
        let summary = ctx.build(&overrides, rebuild).await?;
        Ok(serde_json::to_value(&summary)?)
    }
}

/// Rebuild the index from scratch with the resolved configuration.
pub struct RefreshIndexTool;

#[async_trait]
impl Tool for RefreshIndexTool {
    fn name(&self) -> &str {
        "refresh_index"
    }

    fn description(&self) -> &str {
        "Rebuild the index from scratch"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
        let summary = ctx.build(&ConfigOverrides::default(), true).await?;
        Ok(serde_json::to_value(&summary)?)
    }
}

/// Retrieve the documents most relevant to a query.
pub struct QueryTool;

#[async_trait]
impl Tool for QueryTool {
    fn name(&self) -> &str {
        "query"
    }

    fn description(&self) -> &str {
        "Find the documents most relevant to a query"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Natural-language query" },
                "data_dir": { "type": "string" },
                "collection_name": { "type": "string" },
                "top_k": { "type": "integer", "minimum": 1, "default": 3 },
                "embedding_backend": { "type": "string", "enum": ["sentence-transformer", "simple"] }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let query = params["query"].as_str().unwrap_or("");
        let overrides = overrides_from(&params)?;
        let response = ctx.query(query, &overrides).await?;
        Ok(serde_json::to_value(&response)?)
    }
}

/// Report index counts.
pub struct StatusTool;

#[async_trait]
impl Tool for StatusTool {
    fn name(&self) -> &str {
        "status"
    }

    fn description(&self) -> &str {
        "Report document and chunk counts for the index"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "data_dir": { "type": "string" },
                "collection_name": { "type": "string" }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let overrides = overrides_from(&params)?;
        let report = ctx.status(&overrides).await?;
        Ok(serde_json::to_value(&report)?)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Registry of tools served by the HTTP server.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// A registry holding `build_index`, `refresh_index`, `query`, and `status`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(BuildIndexTool));
        registry.register(Box::new(RefreshIndexTool));
        registry.register(Box::new(QueryTool));
        registry.register(Box::new(StatusTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
