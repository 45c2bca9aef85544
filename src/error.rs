//! Error types for the documentation pipeline.
//!
//! Errors are organized by subsystem, mirroring the component boundaries of
//! the LSP orchestration layer: framing, JSON-RPC correlation, the client
//! facade, URI reconciliation, extraction, persistence, and config loading.
//! Each leaf enum is `thiserror`-derived; [`Error`] composes them into one
//! type so the Orchestrator can propagate any of them with `?`.

use thiserror::Error;

/// Errors from the framed `Content-Length` transport (C1).
#[derive(Debug, Error)]
pub enum TransportError {
    /// A header line had no colon separator.
    #[error("malformed header line: {0:?}")]
    BadHeader(String),

    /// The stream ended before `Content-Length` bytes were read.
    #[error("stream ended after {got} of {expected} expected bytes")]
    ShortRead {
        /// Bytes actually read before EOF.
        got: usize,
        /// Bytes the `Content-Length` header promised.
        expected: usize,
    },

    /// The payload was not valid UTF-8.
    #[error("payload is not valid UTF-8: {0}")]
    BadUtf8(#[from] std::string::FromUtf8Error),

    /// The payload was not valid JSON.
    #[error("payload is not valid JSON: {0}")]
    BadJson(#[from] serde_json::Error),

    /// Underlying I/O failure.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the JSON-RPC session layer (C2).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// The call's deadline elapsed before a response arrived.
    #[error("request timed out")]
    Timeout,

    /// The session was shut down while the call was pending.
    #[error("request cancelled")]
    Cancelled,

    /// The reader loop terminated due to a transport failure.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The server returned a JSON-RPC error object.
    #[error("server error {code}: {message}")]
    Protocol {
        /// JSON-RPC error code.
        code: i64,
        /// JSON-RPC error message.
        message: String,
    },
}

/// Errors from the LSP client facade (C3).
#[derive(Debug, Error)]
pub enum ClientError {
    /// The language server executable could not be spawned.
    #[error("failed to start language server: {0}")]
    SpawnFailed(String),

    /// The server process exited within its startup grace period.
    #[error("language server exited within {0:?} of starting")]
    EarlyExit(std::time::Duration),

    /// `initialize` did not complete within its deadline.
    #[error("language server did not initialize within {0:?}")]
    InitTimeout(std::time::Duration),

    /// A capability required by the pipeline was absent from the server's
    /// advertised `ServerCapabilities`.
    #[error("language server is missing capability: {0}")]
    CapabilityMissing(String),

    /// The underlying RPC layer failed.
    #[error("rpc error: {0}")]
    Rpc(#[from] RpcError),
}

/// Errors from the Path/URI Reconciler (C4).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UriError {
    /// A reference URI could not be rebased under the project root.
    #[error("uri {uri:?} lies outside the workspace root {root:?}")]
    OutsideWorkspace {
        /// The offending URI, as a string.
        uri: String,
        /// The project root it was checked against.
        root: String,
    },

    /// The URI was not a well-formed `file://` URI.
    #[error("not a file:// uri: {0:?}")]
    NotFileUri(String),
}

/// Errors from the Symbol Extractor (C5); always per-file, never fatal to a run.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The file could not be read or opened in the session.
    #[error("could not open {path}: {source}")]
    OpenFailed {
        /// Project-relative path of the file.
        path: String,
        /// Underlying cause.
        #[source]
        source: ClientError,
    },

    /// A query (`documentSymbol`, `definition`, `references`) failed.
    #[error("query {method} failed for {path}: {source}")]
    QueryFailed {
        /// The LSP method that failed.
        method: &'static str,
        /// Project-relative path of the file.
        path: String,
        /// Underlying cause.
        #[source]
        source: ClientError,
    },
}

/// Persistence failures (C7); fatal to the whole run.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying SQLite driver returned an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A project was persisted with no name.
    #[error("project has no name")]
    MissingProjectName,
}

/// Config-table loading failures (A1); fatal at process startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path that could not be read.
        path: String,
        /// Underlying I/O cause.
        #[source]
        source: std::io::Error,
    },

    /// The config file was not valid JSON for its expected shape.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that failed to parse.
        path: String,
        /// Underlying cause.
        #[source]
        source: serde_json::Error,
    },

    /// A table entry referenced a kind or language outside the fixed enumeration.
    #[error("unrecognized {what} in config table: {name:?}")]
    UnknownEntry {
        /// What kind of entry was unrecognized (`"symbol kind"`, `"language"`, ...).
        what: &'static str,
        /// The offending value.
        name: String,
    },
}

/// A unified error type for the pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-layer error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// JSON-RPC-layer error.
    #[error("rpc error: {0}")]
    Rpc(#[from] RpcError),

    /// LSP client error.
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// URI reconciliation error.
    #[error("uri error: {0}")]
    Uri(#[from] UriError),

    /// Per-file extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Persistence error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Config loading error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Generic I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_display() {
        let err = TransportError::ShortRead {
            got: 3,
            expected: 10,
        };
        assert_eq!(err.to_string(), "stream ended after 3 of 10 expected bytes");
    }

    #[test]
    fn rpc_error_equality_for_test_assertions() {
        assert_eq!(RpcError::Timeout, RpcError::Timeout);
        assert_ne!(RpcError::Timeout, RpcError::Cancelled);
    }

    #[test]
    fn error_conversion_chain() {
        let rpc_err = RpcError::Timeout;
        let client_err: ClientError = rpc_err.into();
        assert!(matches!(client_err, ClientError::Rpc(RpcError::Timeout)));
        let err: Error = client_err.into();
        assert!(matches!(err, Error::Client(ClientError::Rpc(RpcError::Timeout))));
    }
}
