//! Concrete adapters implementing `opensrc_domain::ports`.
//!
//! Each submodule grounds one port in a real crate: `chunking` dispatches
//! by file extension across four strategies, `embedding` wraps FastEmbed
//! behind an actor, `vector_store` wraps EdgeVec's HNSW index behind an
//! actor with a write-serializing lock, and `fetcher` resolves spec
//! strings into registry downloads or git clones.

pub mod chunking;
pub mod constants;
pub mod embedding;
pub mod fetcher;
pub mod vector_store;

pub use chunking::Dispatcher as ChunkingDispatcher;
pub use embedding::fastembed::FastEmbedEmbedder;
pub use fetcher::RealFetcher;
pub use vector_store::edgevec::EdgeVecStore;
