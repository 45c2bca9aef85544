//! Codedoc Pipeline
//!
//! A batch pipeline that walks a project, drives per-language LSP servers
//! to extract symbols and call graphs, persists the result to SQLite, and
//! runs a documentation backend over the undocumented leaves of the call
//! graph.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐   walk    ┌──────────────┐   per-language session
//! │   Project   │──────────►│    Walker    │──────────────┐
//! │  directory  │           │    (A2)      │              ▼
//! └─────────────┘           └──────────────┘      ┌────────────────┐
//!                                                  │   LSP Client   │
//!                                                  │      (C3)      │
//!                                                  └───────┬────────┘
//!                                                          │ JSON-RPC
//!                                                  ┌───────▼────────┐
//!                                                  │ Language Server │
//!                                                  └────────────────┘
//!                            ┌──────────────┐ extract   │
//!                            │  Extractor   │◄──────────┘
//!                            │     (C5)     │
//!                            └──────┬───────┘
//!                                   │ symbols, call edges
//!                            ┌──────▼───────┐   leaves first   ┌─────────────┐
//!                            │    Store     │◄─────────────────│  LLM Driver │
//!                            │     (C7)     │─────────────────►│     (A3)    │
//!                            └──────────────┘                  └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`error`] — layered error types for every component boundary.
//! - [`model`] — the shared data model (`Symbol`, `FileRecord`, `Folder`, ...).
//! - [`transport`] — C1, the framed `Content-Length` message transport.
//! - [`rpc`] — C2, the JSON-RPC session built on top of it.
//! - [`uri`] — C4, host/container path and URI reconciliation.
//! - [`lsp`] — C3, the typed LSP client facade.
//! - [`config`] — A1, the language/server/ignore/kind config tables.
//! - [`walker`] — A2, the gitignore-aware project walker.
//! - [`extractor`] — C5, the per-file symbol/call-edge extraction pipeline.
//! - [`store`] — C7, the SQLite persistence layer.
//! - [`llm`] — A3, the documentation backend trait and its stub implementation.
//! - [`orchestrator`] — C6, the per-language run driver.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod error;
pub mod extractor;
pub mod llm;
pub mod lsp;
pub mod model;
pub mod orchestrator;
pub mod rpc;
pub mod store;
pub mod transport;
pub mod uri;
pub mod walker;

pub use error::{Error, Result};
