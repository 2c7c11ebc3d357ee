//! `QueryPlanner` (spec §4.4): dispatches the three search verbs —
//! `grep`, `astGrep`, `semanticSearch` — against a resolved source
//! directory, and shapes `semanticSearch`'s not-ready responses.

use crate::ast_grep::{AstGrep, AstMatch};
use crate::file_access::{FileAccess, GrepMatch};
use opensrc_domain::chunk::ChunkKind;
use opensrc_domain::constants::{DEFAULT_AST_GREP_LIMIT, DEFAULT_GREP_MAX_RESULTS, DEFAULT_TOP_K};
use opensrc_domain::entry::ScoredEntry;
use opensrc_domain::error::Result;
use opensrc_domain::ports::{Embedder, VectorStore};
use opensrc_domain::source::SourceIndexState;
use std::path::Path;
use std::sync::Arc;

/// One hit from `semanticSearch`.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticHit {
    pub source: String,
    pub file: String,
    pub identifier: String,
    pub kind: ChunkKind,
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
    pub score: f32,
}

/// `semanticSearch`'s result shape (spec §4.4): either hits, or a
/// typed not-ready failure naming which of the requested sources
/// aren't queryable yet so the caller can decide whether to wait.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(untagged)]
pub enum SearchOutcome {
    Hits(Vec<SemanticHit>),
    NotReady { error: NotReadyReason, sources: Vec<String> },
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotReadyReason {
    NotIndexed,
    Indexing,
}

/// Orchestrates the three query verbs against one resolved source
/// directory (or, for `semanticSearch`, a set of already-indexed
/// source names).
pub struct QueryPlanner {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    file_access: FileAccess,
    ast_grep: AstGrep,
}

impl QueryPlanner {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store, file_access: FileAccess::new(), ast_grep: AstGrep::new() }
    }

    /// Regex search over one source's files.
    pub fn grep(&self, root: &Path, pattern: &str, max_results: Option<usize>) -> Result<Vec<GrepMatch>> {
        self.file_access.grep(root, pattern, max_results.unwrap_or(DEFAULT_GREP_MAX_RESULTS))
    }

    /// Structural search over one source's files. `glob` and `langs`
    /// narrow the file set searched, applied before `limit` truncates
    /// the match list.
    pub fn ast_grep(&self, root: &Path, pattern: &str, limit: Option<usize>, glob: Option<&str>, langs: &[String]) -> Result<Vec<AstMatch>> {
        self.ast_grep.search(root, pattern, limit.unwrap_or(DEFAULT_AST_GREP_LIMIT), glob, langs)
    }

    /// Embed `query` and scan the vector store, restricted to
    /// `source_names`. Any name in `source_names` that isn't fully
    /// indexed short-circuits the whole call into a `NotReady` outcome
    /// naming every such source, rather than silently searching a
    /// partial index (spec §4.4: a query against a still-indexing
    /// source must not return misleadingly incomplete results).
    pub async fn semantic_search(
        &self,
        query: &str,
        source_names: &[String],
        states: impl Fn(&str) -> SourceIndexState,
        any_indexing: bool,
        top_k: Option<usize>,
    ) -> Result<SearchOutcome> {
        if source_names.is_empty() {
            let nothing_indexed = self.store.list_indexed().await?.is_empty();
            if nothing_indexed && !any_indexing {
                return Ok(SearchOutcome::NotReady { error: NotReadyReason::NotIndexed, sources: vec![] });
            }
        }

        let mut not_indexed = Vec::new();
        let mut indexing = Vec::new();
        for name in source_names {
            match states(name) {
                SourceIndexState::Indexed => {}
                SourceIndexState::Indexing | SourceIndexState::Queued => indexing.push(name.clone()),
                SourceIndexState::Unknown => not_indexed.push(name.clone()),
            }
        }
        if !not_indexed.is_empty() {
            return Ok(SearchOutcome::NotReady { error: NotReadyReason::NotIndexed, sources: not_indexed });
        }
        if !indexing.is_empty() {
            return Ok(SearchOutcome::NotReady { error: NotReadyReason::Indexing, sources: indexing });
        }

        let embedding = self.embedder.embed_query(query).await?;
        let scored = self.store.scan(&embedding, top_k.unwrap_or(DEFAULT_TOP_K), source_names).await?;
        Ok(SearchOutcome::Hits(scored.into_iter().map(to_hit).collect()))
    }
}

fn to_hit(scored: ScoredEntry) -> SemanticHit {
    let score = scored.score();
    SemanticHit {
        source: scored.entry.source,
        file: scored.entry.chunk.file,
        identifier: scored.entry.chunk.identifier,
        kind: scored.entry.chunk.kind,
        start_line: scored.entry.chunk.start_line,
        end_line: scored.entry.chunk.end_line,
        content: scored.entry.chunk.content,
        score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use opensrc_domain::chunk::{ChunkKind, CodeChunk};
    use opensrc_domain::entry::{Embedding, IndexedEntry};

    struct StubEmbedder;
    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed_query(&self, _text: &str) -> Result<Embedding> {
            Ok(Embedding::new(vec![1.0; 768]))
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
            Ok(texts.iter().map(|_| Embedding::new(vec![1.0; 768])).collect())
        }
    }

    struct StubStore;
    #[async_trait]
    impl VectorStore for StubStore {
        async fn init(&self, _dir: &Path) -> Result<()> {
            Ok(())
        }
        async fn insert_batch(&self, _source: &str, _chunks: Vec<CodeChunk>, _embeddings: Vec<Embedding>) -> Result<()> {
            Ok(())
        }
        async fn finalize(&self) -> Result<()> {
            Ok(())
        }
        async fn mark_indexed(&self, _source: &str) -> Result<()> {
            Ok(())
        }
        async fn is_indexed(&self, _source: &str) -> Result<bool> {
            Ok(true)
        }
        async fn list_indexed(&self) -> Result<Vec<String>> {
            Ok(vec![])
        }
        async fn delete_source(&self, _source: &str) -> Result<()> {
            Ok(())
        }
        async fn scan(&self, _query: &Embedding, _top_k: usize, _source_filter: &[String]) -> Result<Vec<ScoredEntry>> {
            Ok(vec![ScoredEntry {
                entry: IndexedEntry {
                    id: 1,
                    source: "zod".to_string(),
                    chunk: CodeChunk {
                        file: "src/index.ts".to_string(),
                        identifier: "parse".to_string(),
                        kind: ChunkKind::Function,
                        start_line: 1,
                        end_line: 5,
                        content: "function parse() {}".to_string(),
                        parent: None,
                    },
                    embedding: Embedding::new(vec![1.0; 768]),
                },
                distance: 0.1,
            }])
        }
        async fn get(&self, _id: u64) -> Result<Option<IndexedEntry>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn semantic_search_returns_hits_when_indexed() {
        let planner = QueryPlanner::new(Arc::new(StubEmbedder), Arc::new(StubStore));
        let outcome = planner
            .semantic_search("parse a schema", &["zod".to_string()], |_| SourceIndexState::Indexed, false, None)
            .await
            .unwrap();
        match outcome {
            SearchOutcome::Hits(hits) => {
                assert_eq!(hits.len(), 1);
                assert_eq!(hits[0].source, "zod");
            }
            SearchOutcome::NotReady { .. } => panic!("expected hits"),
        }
    }

    #[tokio::test]
    async fn semantic_search_reports_not_indexed_sources() {
        let planner = QueryPlanner::new(Arc::new(StubEmbedder), Arc::new(StubStore));
        let outcome = planner
            .semantic_search("parse a schema", &["ghost".to_string()], |_| SourceIndexState::Unknown, false, None)
            .await
            .unwrap();
        match outcome {
            SearchOutcome::NotReady { error: NotReadyReason::NotIndexed, sources } => {
                assert_eq!(sources, vec!["ghost".to_string()]);
            }
            other => panic!("expected NotReady(NotIndexed), got {other:?}"),
        }
    }

    #[tokio::test]
    async fn semantic_search_reports_still_indexing() {
        let planner = QueryPlanner::new(Arc::new(StubEmbedder), Arc::new(StubStore));
        let outcome = planner
            .semantic_search("parse a schema", &["zod".to_string()], |_| SourceIndexState::Indexing, false, None)
            .await
            .unwrap();
        assert!(matches!(outcome, SearchOutcome::NotReady { error: NotReadyReason::Indexing, .. }));
    }
}
