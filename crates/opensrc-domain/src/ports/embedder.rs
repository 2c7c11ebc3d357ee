//! The `Embedder` port (spec §4.2): text → unit-norm dense vector.

use crate::entry::Embedding;
use crate::error::Result;
use async_trait::async_trait;

/// Maps strings to normalized dense vectors of a fixed dimension.
///
/// Implementations are expected to be a process-wide singleton with a
/// one-shot lazy init (`EmbedderNotReady` until the model has loaded).
/// If the underlying model runtime is not reentrant, the implementation
/// must serialize concurrent calls internally — callers never see that
/// detail.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed one query string. Implementations prepend a fixed
    /// retrieval-instruction prefix and truncate to the model's
    /// character budget before inference.
    async fn embed_query(&self, text: &str) -> Result<Embedding>;

    /// Embed a batch of chunk texts in one forward pass, aligned
    /// 1:1 with the input order. Batch size is bounded by the caller
    /// (the `IndexEngine`), not by this trait.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;
}
