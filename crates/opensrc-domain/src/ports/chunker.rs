//! The `Chunker` port (spec §4.3): turn one file into a list of chunks
//! without loading the whole corpus first.

use crate::chunk::CodeChunk;
use crate::error::Result;

/// Language-dispatched file chunker.
///
/// A single implementation (`opensrc_providers::chunking::Dispatcher`)
/// routes by extension to one of four strategies; this trait is the
/// seam the `IndexEngine` depends on, so tests can substitute a stub
/// chunker without pulling in tree-sitter or pulldown-cmark.
pub trait Chunker: Send + Sync {
    /// Chunk `content` (the file at `file_path`, relative to its source
    /// root) into a sequence of `CodeChunk`s. Never fails on malformed
    /// input — an unparseable file degrades to the sliding-window
    /// fallback rather than erroring, so `Result` here is reserved for
    /// true I/O-adjacent failures the dispatcher's callers might hit
    /// (there are none yet; kept for forward compatibility with
    /// strategies that might need it).
    fn chunk(&self, content: &str, file_path: &str) -> Result<Vec<CodeChunk>>;
}
