//! Domain layer for opensrc.
//!
//! Pure types and port traits: no I/O, no async runtimes beyond the
//! `async-trait` signatures the ports need. Everything here is the
//! vocabulary the rest of the workspace is built from — `Source`,
//! `CodeChunk`, `IndexedEntry`, the `SourceIndexState` machine, the error
//! taxonomy, and the `Fetcher` / `Embedder` / `VectorStore` / `Chunker`
//! port traits that the `opensrc-providers` crate implements.

pub mod chunk;
pub mod constants;
pub mod entry;
pub mod error;
pub mod ports;
pub mod source;

pub use chunk::{ChunkKind, CodeChunk};
pub use entry::{Embedding, IndexedEntry, ScoredEntry};
pub use error::{Error, Result};
pub use source::{Source, SourceIndexState, SourceKind};
