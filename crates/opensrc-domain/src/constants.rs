//! Tunable bounds called out in the specification. These are the
//! `Default` values for `opensrc_infrastructure::config::AppConfig`; the
//! config layer may override any of them, but a fresh process with no
//! config file behaves exactly per spec.

/// Embedding vector dimensionality. Fixed by the embedding model; not
/// meant to be overridden at runtime, unlike the other constants here.
pub const EMBEDDING_DIM: usize = 768;

/// Character budget for a single embedding input (query or chunk).
/// Longer inputs are truncated with a trailing marker before embedding.
pub const MAX_EMBED_CHARS: usize = 1800;

/// Marker appended to a truncated embedding input.
pub const TRUNCATION_MARKER: &str = " …[truncated]";

/// Instruction prefix prepended to query text before embedding, to bias
/// the model toward retrieval-style queries rather than raw code.
pub const QUERY_INSTRUCTION_PREFIX: &str =
    "Represent this query for retrieving relevant source code: ";

/// Chunks accumulated by the IndexEngine before an embed+insert+yield.
pub const BATCH_SIZE: usize = 50;

/// Maximum number of sources indexing concurrently.
pub const MAX_CONCURRENT_INDEX: usize = 2;

/// Default `topK` for `semanticSearch`.
pub const DEFAULT_TOP_K: usize = 20;

/// Default cap on `grep` results.
pub const DEFAULT_GREP_MAX_RESULTS: usize = 100;

/// Default cap on `astGrep` matches.
pub const DEFAULT_AST_GREP_LIMIT: usize = 1000;

/// Candidate-budget inflation factor applied to a quantized-index scan
/// when a source filter is also applied, to preserve recall.
pub const FILTERED_SCAN_INFLATION: usize = 2;

/// Sandbox script deadline, covering sync + async lifetime of one call.
pub const SANDBOX_DEADLINE_MS: u64 = 30_000;

/// Server-side search timeout (mirrors the sandbox deadline).
pub const SEARCH_TIMEOUT_MS: u64 = 30_000;

/// Output truncation budget: `MAX_TOKENS * CHARS_PER_TOKEN`.
pub const MAX_TOKENS: usize = 8_000;

/// Characters-per-token approximation used for the truncation budget.
pub const CHARS_PER_TOKEN: usize = 4;

/// Truncated-output budget in characters.
pub const MAX_OUTPUT_CHARS: usize = MAX_TOKENS * CHARS_PER_TOKEN;

/// Maximum characters kept per `grep` match line.
pub const GREP_LINE_TRUNCATE: usize = 200;

/// Sliding-window fallback chunker: window size in lines.
pub const SLIDING_WINDOW_SIZE: usize = 50;

/// Sliding-window fallback chunker: overlap in lines between windows.
pub const SLIDING_WINDOW_OVERLAP: usize = 15;

/// Minimum fenced-code-block length (chars) to become its own chunk in
/// the Markdown chunker; shorter blocks stay folded into their section.
pub const MIN_CODEBLOCK_CHARS: usize = 20;
