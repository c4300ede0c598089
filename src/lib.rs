//! # rag-docs
//!
//! Local document indexing and retrieval for AI tools.
//!
//! rag-docs walks a documents folder (`.txt`, `.md`, `.docx`), splits each
//! document into overlapping character windows, embeds the windows, and
//! stores them in a vector collection next to a JSON document store. A
//! query is embedded the same way and answered with the most similar
//! documents, each reported once with its full text.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────────┐
//! │  documents  │──▶│ chunk+embed │──▶│ vectors.sqlite   │
//! │ txt/md/docx │   │             │   │ doc_store.json   │
//! └─────────────┘   └─────────────┘   └────────┬─────────┘
//!                                              │
//!                         ┌────────────────────┤
//!                         ▼                    ▼
//!                    ┌──────────┐        ┌──────────┐
//!                    │   CLI    │        │   HTTP   │
//!                    │(ragdocs) │        │  tools   │
//!                    └──────────┘        └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ragdocs build --docs-dir ./docs     # index (incremental)
//! ragdocs query "deployment"          # top documents as JSON
//! ragdocs status                      # counts
//! ragdocs serve                       # HTTP tool server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Layered configuration (defaults, TOML, env, overrides) |
//! | [`models`] | Core data types and result shapes |
//! | [`documents`] | Directory walking and document ids |
//! | [`extract`] | `.docx` text extraction |
//! | [`chunk`] | Character-window chunking |
//! | [`doc_store`] | JSON document store |
//! | [`embedding`] | Embedder trait, local model and hash backends |
//! | [`vector_store`] | Vector collections (SQLite, in-memory) |
//! | [`ingest`] | Indexing pipeline |
//! | [`search`] | Query pipeline |
//! | [`stats`] | Index status |
//! | [`traits`] | Tool trait and built-in tools |
//! | [`server`] | HTTP tool server |
//! | [`error`] | Typed failures |
//! | [`logging`] | `tracing` subscriber setup |

pub mod chunk;
pub mod config;
pub mod doc_store;
pub mod documents;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod logging;
pub mod models;
pub mod search;
pub mod server;
pub mod stats;
pub mod traits;
pub mod vector_store;
