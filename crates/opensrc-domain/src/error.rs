//! Error taxonomy.
//!
//! One sum type with a `kind` discriminant per variant, each carrying a
//! message and optional source — the shape spec.md §7 asks for, and the
//! shape the teacher workspace already uses. Fallible operations return
//! `Result<T, Error>`; they never throw across a component boundary. Only
//! true invariant violations (a `scan` row missing its embedding, a chunk
//! with `start_line > end_line`) are allowed to panic.

use thiserror::Error;

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// The single error type propagated across every component boundary.
#[derive(Error, Debug)]
pub enum Error {
    /// No vector-extension binary matches this host's OS/arch.
    #[error("unsupported platform for vector store: {message}")]
    UnsupportedPlatform {
        /// Detail on what was searched for and not found.
        message: String,
    },

    /// The vector extension binary exists but failed to load.
    #[error("vector extension missing or failed to load: {message}")]
    VectorExtensionMissing {
        /// Loader diagnostic.
        message: String,
    },

    /// The vector extension is loaded but unavailable for this call
    /// (e.g. store closed, or a transient backend fault).
    #[error("vector extension not available: {message}")]
    VectorExtensionNotAvailable {
        /// Detail on why the extension call could not be served.
        message: String,
    },

    /// A VectorStore operation failed.
    #[error("database error during {op}: {message}")]
    DatabaseError {
        /// The operation that failed (`insert_batch`, `finalize`, `scan`, …).
        op: String,
        /// Underlying diagnostic.
        message: String,
    },

    /// A referenced source name has no registry entry.
    #[error("source not found: {name}")]
    SourceNotFound {
        /// The unresolved source name.
        name: String,
    },

    /// A path argument resolved outside its source root.
    #[error("Path traversal rejected: {path}")]
    PathTraversal {
        /// The offending, caller-supplied path.
        path: String,
    },

    /// A file could not be read (permissions, encoding, I/O).
    #[error("failed to read {path}: {message}")]
    FileReadError {
        /// The file that failed to read.
        path: String,
        /// Underlying diagnostic.
        message: String,
    },

    /// The embedder's model has not finished loading.
    #[error("embedder not ready: {message}")]
    EmbedderNotReady {
        /// Detail on what is still initializing.
        message: String,
    },

    /// Inference failed inside the embedder.
    #[error("embedding failed: {message}")]
    EmbedError {
        /// Underlying diagnostic.
        message: String,
    },

    /// Fetching a package or repository failed.
    #[error("fetch failed for {spec}: {message}")]
    FetchError {
        /// The spec string that failed to resolve/fetch.
        spec: String,
        /// Underlying diagnostic.
        message: String,
    },

    /// The agent's script raised inside the sandbox.
    #[error("script execution failed: {message}")]
    CodeExecutionError {
        /// The error surfaced from the sandboxed runtime.
        message: String,
    },

    /// The agent's script exceeded its deadline.
    #[error("Execution timeout: script did not complete within {millis}ms")]
    ExecutionTimeout {
        /// The deadline that was exceeded.
        millis: u64,
    },

    /// A malformed fetch-spec string (see spec §6 grammar).
    #[error("invalid source spec {spec}: {message}")]
    InvalidSpec {
        /// The spec string that failed to parse.
        spec: String,
        /// Why it didn't parse.
        message: String,
    },

    /// Config file or environment parsing failed.
    #[error("configuration error: {message}")]
    Config {
        /// Diagnostic from the config loader.
        message: String,
    },

    /// Generic I/O failure not covered by a more specific variant.
    #[error("I/O error: {message}")]
    Io {
        /// Diagnostic message.
        message: String,
    },

    /// JSON (de)serialization failure.
    #[error("JSON error: {source}")]
    Json {
        /// The underlying serde_json error.
        #[from]
        source: serde_json::Error,
    },

    /// Catch-all for invariant violations surfaced as a recoverable
    /// error rather than a panic (used at component boundaries where a
    /// panic would take down an unrelated in-flight request).
    #[error("internal error: {message}")]
    Internal {
        /// Description of the invariant that was violated.
        message: String,
    },
}

impl Error {
    /// Build an `UnsupportedPlatform` error.
    pub fn unsupported_platform(message: impl Into<String>) -> Self {
        Self::UnsupportedPlatform { message: message.into() }
    }

    /// Build a `VectorExtensionMissing` error.
    pub fn vector_extension_missing(message: impl Into<String>) -> Self {
        Self::VectorExtensionMissing { message: message.into() }
    }

    /// Build a `VectorExtensionNotAvailable` error.
    pub fn vector_extension_unavailable(message: impl Into<String>) -> Self {
        Self::VectorExtensionNotAvailable { message: message.into() }
    }

    /// Build a `DatabaseError`.
    pub fn database(op: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DatabaseError { op: op.into(), message: message.into() }
    }

    /// Build a `SourceNotFound` error.
    pub fn source_not_found(name: impl Into<String>) -> Self {
        Self::SourceNotFound { name: name.into() }
    }

    /// Build a `PathTraversal` error.
    pub fn path_traversal(path: impl Into<String>) -> Self {
        Self::PathTraversal { path: path.into() }
    }

    /// Build a `FileReadError`.
    pub fn file_read(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FileReadError { path: path.into(), message: message.into() }
    }

    /// Build an `EmbedderNotReady` error.
    pub fn embedder_not_ready(message: impl Into<String>) -> Self {
        Self::EmbedderNotReady { message: message.into() }
    }

    /// Build an `EmbedError`.
    pub fn embed(message: impl Into<String>) -> Self {
        Self::EmbedError { message: message.into() }
    }

    /// Build a `FetchError`.
    pub fn fetch(spec: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FetchError { spec: spec.into(), message: message.into() }
    }

    /// Build a `CodeExecutionError`.
    pub fn code_execution(message: impl Into<String>) -> Self {
        Self::CodeExecutionError { message: message.into() }
    }

    /// Build an `ExecutionTimeout` error.
    pub fn execution_timeout(millis: u64) -> Self {
        Self::ExecutionTimeout { millis }
    }

    /// Build an `InvalidSpec` error.
    pub fn invalid_spec(spec: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSpec { spec: spec.into(), message: message.into() }
    }

    /// Build a `Config` error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Build an `Io` error.
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io { message: message.into() }
    }

    /// Build an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}
