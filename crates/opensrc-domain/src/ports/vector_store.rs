//! The `VectorStore` port (spec §4.1): durable storage of chunks and
//! their embeddings, plus an approximate nearest-neighbor scan.

use crate::entry::{Embedding, IndexedEntry, ScoredEntry};
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Durable storage for indexed chunks, with a quantized approximate
/// nearest-neighbor scan operator.
///
/// # Contracts
///
/// - `insert_batch` is atomic per call and does **not** rebuild the
///   quantized index — that's `finalize`'s job, called once per source
///   at the end of ingestion, because quantization is an offline build
///   step too expensive to pay per batch.
/// - `scan` returns rows in ascending cosine distance, ties broken by
///   ascending row id. When `source_filter` is non-empty it requests
///   `2 * top_k` candidates from the quantized index first, then filters
///   by source, then truncates — the standard post-filter recall
///   safeguard for quantized ANN (see
///   `opensrc_domain::constants::FILTERED_SCAN_INFLATION`).
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Open (or create) the store rooted at `dir`. Implementations
    /// should enable WAL-equivalent durability and preload any existing
    /// quantized index before returning.
    async fn init(&self, dir: &Path) -> Result<()>;

    /// Insert `chunks.len()` rows for `source` in one atomic unit.
    /// Precondition: `chunks.len() == embeddings.len()`.
    async fn insert_batch(
        &self,
        source: &str,
        chunks: Vec<crate::chunk::CodeChunk>,
        embeddings: Vec<Embedding>,
    ) -> Result<()>;

    /// Rebuild the quantized index and preload it. Expensive; call once
    /// per source at the end of ingestion.
    async fn finalize(&self) -> Result<()>;

    /// Record that `source` has completed indexing.
    async fn mark_indexed(&self, source: &str) -> Result<()>;

    /// `true` if `mark_indexed(source)` has run and no `delete_source`
    /// has since removed it.
    async fn is_indexed(&self, source: &str) -> Result<bool>;

    /// All sources currently marked indexed.
    async fn list_indexed(&self) -> Result<Vec<String>>;

    /// Delete all rows for `source` plus its `indexed_sources` entry.
    /// The quantized index is left stale but still correct: the
    /// deleted rows are simply gone from any future scan's result set.
    async fn delete_source(&self, source: &str) -> Result<()>;

    /// Approximate k-NN scan. Returns at most `top_k` hits, ascending by
    /// distance (ties by row id). Empty if the store has no rows, or if
    /// a non-empty `source_filter` matches none.
    async fn scan(
        &self,
        query: &Embedding,
        top_k: usize,
        source_filter: &[String],
    ) -> Result<Vec<ScoredEntry>>;

    /// Fetch a single row by id, used by `QueryPlanner`/`FileAccess`
    /// cross-checks and by tests asserting §8's round-trip law.
    async fn get(&self, id: u64) -> Result<Option<IndexedEntry>>;
}
