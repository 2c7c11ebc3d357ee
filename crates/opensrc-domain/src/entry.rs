//! `IndexedEntry` — a `CodeChunk` plus its embedding, as stored (and
//! scanned) by the `VectorStore`.

use crate::chunk::CodeChunk;
use crate::constants::EMBEDDING_DIM;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// A unit-norm float32 vector of fixed dimension `EMBEDDING_DIM`.
///
/// Wrapping `Vec<f32>` rather than exposing it bare lets us enforce the
/// dimension invariant once, at construction, instead of at every call
/// site that would otherwise need to check `v.len() == D`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    /// Wrap a vector, checking its dimension and renormalizing it to
    /// unit L2 norm. Panics on dimension mismatch — a model returning
    /// the wrong width is an invariant violation, not a recoverable
    /// runtime error.
    pub fn new(vector: Vec<f32>) -> Self {
        assert_eq!(
            vector.len(),
            EMBEDDING_DIM,
            "embedding dimension mismatch: got {}, expected {EMBEDDING_DIM}",
            vector.len()
        );
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        let normalized = if norm > 0.0 {
            vector.into_iter().map(|x| x / norm).collect()
        } else {
            vector
        };
        Self(normalized)
    }

    /// Try to wrap a vector, returning a recoverable error instead of
    /// panicking — used when the vector comes from an external source
    /// (e.g. deserialized from the store) rather than freshly computed.
    pub fn try_new(vector: Vec<f32>) -> Result<Self> {
        if vector.len() != EMBEDDING_DIM {
            return Err(Error::internal(format!(
                "embedding dimension mismatch: got {}, expected {EMBEDDING_DIM}",
                vector.len()
            )));
        }
        Ok(Self::new(vector))
    }

    /// Borrow the underlying components.
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Cosine similarity against another unit-norm embedding. Since both
    /// vectors are unit norm this is simply the dot product.
    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        self.0.iter().zip(other.0.iter()).map(|(a, b)| a * b).sum()
    }

    /// Cosine distance, `1 - similarity`.
    pub fn cosine_distance(&self, other: &Embedding) -> f32 {
        1.0 - self.cosine_similarity(other)
    }
}

/// One row in the `chunks` table: a chunk, its source, its embedding,
/// and the store-assigned row id that breaks ties in `scan` ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedEntry {
    /// Store-assigned row id. Rows are inserted in file-enumeration then
    /// chunker-emission order, so ascending id reflects that order.
    pub id: u64,
    /// Name of the owning `Source`.
    pub source: String,
    /// The chunk this row indexes.
    pub chunk: CodeChunk,
    /// Its embedding.
    pub embedding: Embedding,
}

/// A `scan` hit: a row plus its distance from the query vector.
#[derive(Debug, Clone)]
pub struct ScoredEntry {
    /// The matched row.
    pub entry: IndexedEntry,
    /// Cosine distance from the query vector (smaller is closer).
    pub distance: f32,
}

impl ScoredEntry {
    /// `1 - distance`, the relevance score reported in `SearchResult`.
    pub fn score(&self) -> f32 {
        1.0 - self.distance
    }
}
