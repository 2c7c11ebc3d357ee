//! Application layer for opensrc: the orchestration that ties the
//! domain's port traits together into the system's actual behavior —
//! `SourceRegistry`, `IndexEngine`, `QueryPlanner`, and `FileAccess`.
//!
//! Nothing here knows about a concrete embedder, vector store, or
//! fetcher implementation; everything is expressed against
//! `opensrc_domain::ports`. `opensrc-providers` supplies the concrete
//! adapters, `opensrc-server` wires them together into one `App`.

pub mod ast_grep;
pub mod file_access;
pub mod index_engine;
pub mod query_planner;
pub mod registry;

pub use file_access::FileAccess;
pub use index_engine::{IndexEngine, IndexEngineHandle};
pub use query_planner::{QueryPlanner, SearchOutcome};
pub use registry::SourceRegistry;
