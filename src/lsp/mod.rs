//! LSP Client (C3): a typed facade over the JSON-RPC session that speaks
//! just enough of LSP 3.x for extraction — `initialize`, `didOpen`,
//! `documentSymbol`, `definition`, `references`, `shutdown` — over either a
//! local subprocess or a containerized server.

pub mod client;

pub use client::{ClientMode, LspClient, LspClientBuilder, LspClientConfig};
