//! `IndexEngine` (spec §4.5): the state machine and scheduler that
//! turns a fetched source's files into embedded chunks in the vector
//! store.
//!
//! ```text
//! unknown --enqueue--> queued --schedule--> indexing --finalize--> indexed
//!                         |                    |
//!                         +---- drop (dup) ----+
//!                                             `--- error ---> unknown
//! ```
//!
//! At most `MAX_CONCURRENT_INDEX` sources index at once; everything
//! else waits on a semaphore permit in FIFO-ish order (Tokio's
//! semaphore doesn't guarantee strict FIFO under contention, which
//! spec §5 doesn't require either). Chunks stream off disk one file at
//! a time via `async-stream` rather than materializing the whole
//! source in memory, and the pipeline yields between batches so a
//! large source doesn't starve other tasks on the runtime.

use dashmap::DashMap;
use futures::{Stream, StreamExt};
use opensrc_domain::chunk::CodeChunk;
use opensrc_domain::constants::{BATCH_SIZE, MAX_CONCURRENT_INDEX, MAX_EMBED_CHARS, TRUNCATION_MARKER};
use opensrc_domain::error::{Error, Result};
use opensrc_domain::ports::{Chunker, Embedder, VectorStore};
use opensrc_domain::source::SourceIndexState;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Shared handle to one `IndexEngine`, cloned into every spawned
/// indexing task.
pub type IndexEngineHandle = Arc<IndexEngine>;

/// Coordinates chunking, embedding, and vector-store insertion for
/// every source that gets indexed over the process's lifetime.
pub struct IndexEngine {
    chunker: Arc<dyn Chunker>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    states: DashMap<String, SourceIndexState>,
    semaphore: Arc<Semaphore>,
}

impl IndexEngine {
    pub fn new(chunker: Arc<dyn Chunker>, embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            chunker,
            embedder,
            store,
            states: DashMap::new(),
            semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT_INDEX)),
        }
    }

    /// Current lifecycle state for `source`. `Unknown` for anything
    /// never enqueued, or that errored out with no checkpoint kept.
    pub fn state(&self, source: &str) -> SourceIndexState {
        self.states.get(source).map(|s| *s).unwrap_or(SourceIndexState::Unknown)
    }

    pub fn is_indexed(&self, source: &str) -> bool {
        self.state(source) == SourceIndexState::Indexed
    }

    /// Whether any source is currently `Queued` or `Indexing` — used by
    /// `semanticSearch`'s global not-ready check (spec §4.4 step 1)
    /// when the caller didn't scope the query to specific sources.
    pub fn any_indexing(&self) -> bool {
        self.states.iter().any(|e| matches!(*e.value(), SourceIndexState::Queued | SourceIndexState::Indexing))
    }

    /// Restore a state from a previous run (startup reconciliation
    /// consults the vector store's `list_indexed`/`is_indexed` and
    /// calls this to seed `Indexed` without re-running the pipeline).
    pub fn set_state(&self, source: &str, state: SourceIndexState) {
        self.states.insert(source.to_string(), state);
    }

    /// Enqueue `source_name` (rooted at `root` on disk) for indexing.
    /// A no-op if the source is already queued, indexing, or indexed —
    /// spec §4.5's "drop (dup)" transition. Returns immediately; the
    /// actual pipeline runs on a spawned task.
    pub fn enqueue(self: &Arc<Self>, source_name: String, root: PathBuf) {
        match self.state(&source_name) {
            SourceIndexState::Queued | SourceIndexState::Indexing | SourceIndexState::Indexed => return,
            SourceIndexState::Unknown => {}
        }
        self.states.insert(source_name.clone(), SourceIndexState::Queued);

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let permit = match engine.semaphore.clone().acquire_owned().await {
                Ok(p) => p,
                Err(_) => return,
            };
            engine.states.insert(source_name.clone(), SourceIndexState::Indexing);
            let result = engine.run(&source_name, &root).await;
            drop(permit);

            match result {
                Ok(()) => {
                    engine.states.insert(source_name, SourceIndexState::Indexed);
                }
                Err(e) => {
                    tracing::warn!(source = %source_name, error = %e, "indexing failed");
                    engine.states.insert(source_name, SourceIndexState::Unknown);
                }
            }
        });
    }

    async fn run(&self, source: &str, root: &Path) -> Result<()> {
        let mut stream = Box::pin(chunk_stream(Arc::clone(&self.chunker), root.to_path_buf()));
        let mut batch: Vec<CodeChunk> = Vec::with_capacity(BATCH_SIZE);
        let mut total = 0usize;

        while let Some(item) = stream.next().await {
            batch.push(item?);
            if batch.len() >= BATCH_SIZE {
                total += batch.len();
                self.flush_batch(source, &mut batch).await?;
                tokio::task::yield_now().await;
            }
        }
        if !batch.is_empty() {
            total += batch.len();
            self.flush_batch(source, &mut batch).await?;
        }

        if total > 0 {
            self.store.finalize().await?;
        }
        self.store.mark_indexed(source).await?;
        Ok(())
    }

    async fn flush_batch(&self, source: &str, batch: &mut Vec<CodeChunk>) -> Result<()> {
        let texts: Vec<String> = batch.iter().map(|c| truncate_for_embedding(&c.content)).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        let chunks = std::mem::take(batch);
        self.store.insert_batch(source, chunks, embeddings).await
    }
}

/// Clamp an embedding input to `MAX_EMBED_CHARS`, appending
/// `TRUNCATION_MARKER` when it doesn't fit. Character-counted, not
/// byte-counted, so multi-byte UTF-8 content doesn't get sliced mid
/// codepoint.
fn truncate_for_embedding(content: &str) -> String {
    if content.chars().count() <= MAX_EMBED_CHARS {
        return content.to_string();
    }
    let budget = MAX_EMBED_CHARS.saturating_sub(TRUNCATION_MARKER.chars().count());
    let mut truncated: String = content.chars().take(budget).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

/// Stream `CodeChunk`s for every non-ignored file under `root`, one
/// file read + chunk call at a time. A file that fails to chunk (or
/// read) doesn't abort the source — it's skipped — except a directory
/// walk error, which propagates since it likely signals something
/// wrong with the whole source root.
fn chunk_stream(chunker: Arc<dyn Chunker>, root: PathBuf) -> impl Stream<Item = Result<CodeChunk>> {
    async_stream::stream! {
        for entry in ignore::WalkBuilder::new(&root).hidden(false).git_ignore(false).build() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    yield Err(Error::file_read(root.display().to_string(), e.to_string()));
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() || !is_allowed(path) || is_ignored(path) {
                continue;
            }
            let Ok(content) = tokio::fs::read_to_string(path).await else { continue };
            let rel = path.strip_prefix(&root).unwrap_or(path).to_string_lossy().replace('\\', "/");
            match chunker.chunk(&content, &rel) {
                Ok(chunks) => {
                    for chunk in chunks {
                        yield Ok(chunk);
                    }
                }
                Err(_) => continue,
            }
        }
    }
}

/// Spec §4.5 step 2's allow-list: the extensions every AST/Markdown
/// chunker understands, plus anything the sliding-window fallback
/// would otherwise take — restricted here so binary/vendor noise never
/// reaches the chunker at all.
const ALLOWED_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mts", "cts", "mjs", "cjs", "rs", "md", "mdx", "markdown",
];

fn is_allowed(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    ALLOWED_EXTENSIONS.contains(&ext)
}

fn is_ignored(path: &Path) -> bool {
    const SKIP_DIRS: &[&str] = &["node_modules", ".git", "target", "dist", "build", ".venv", "__pycache__"];
    if path.components().any(|c| SKIP_DIRS.contains(&c.as_os_str().to_string_lossy().as_ref())) {
        return true;
    }
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if name.ends_with(".d.ts") || name.ends_with(".min.js") {
        return true;
    }
    matches!(name, "CHANGELOG.md" | "HISTORY.md")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use opensrc_domain::entry::{Embedding, IndexedEntry, ScoredEntry};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct LineChunker;
    impl Chunker for LineChunker {
        fn chunk(&self, content: &str, file_path: &str) -> Result<Vec<CodeChunk>> {
            Ok(vec![CodeChunk {
                file: file_path.to_string(),
                identifier: file_path.to_string(),
                kind: opensrc_domain::chunk::ChunkKind::Unknown,
                start_line: 1,
                end_line: content.lines().count() as u32,
                content: content.to_string(),
                parent: None,
            }])
        }
    }

    struct StubEmbedder;
    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed_query(&self, _text: &str) -> Result<Embedding> {
            Ok(Embedding::new(vec![0.0; 768]))
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
            Ok(texts.iter().map(|_| Embedding::new(vec![0.0; 768])).collect())
        }
    }

    #[derive(Default)]
    struct CountingStore {
        inserted: AtomicUsize,
        finalized: AtomicUsize,
        marked: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl VectorStore for CountingStore {
        async fn init(&self, _dir: &Path) -> Result<()> {
            Ok(())
        }
        async fn insert_batch(&self, _source: &str, chunks: Vec<CodeChunk>, _embeddings: Vec<Embedding>) -> Result<()> {
            self.inserted.fetch_add(chunks.len(), Ordering::SeqCst);
            Ok(())
        }
        async fn finalize(&self) -> Result<()> {
            self.finalized.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn mark_indexed(&self, source: &str) -> Result<()> {
            self.marked.lock().unwrap().push(source.to_string());
            Ok(())
        }
        async fn is_indexed(&self, source: &str) -> Result<bool> {
            Ok(self.marked.lock().unwrap().iter().any(|s| s == source))
        }
        async fn list_indexed(&self) -> Result<Vec<String>> {
            Ok(self.marked.lock().unwrap().clone())
        }
        async fn delete_source(&self, _source: &str) -> Result<()> {
            Ok(())
        }
        async fn scan(&self, _query: &Embedding, _top_k: usize, _source_filter: &[String]) -> Result<Vec<ScoredEntry>> {
            Ok(vec![])
        }
        async fn get(&self, _id: u64) -> Result<Option<IndexedEntry>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn enqueue_indexes_and_transitions_to_indexed() {
        let dir = tempfile::tempdir().unwrap();
        // Must carry an allow-listed extension (§4.5 step 2) or `chunk_stream`
        // skips it before the chunker ever sees it.
        std::fs::write(dir.path().join("a.rs"), "fn hello() {}\n").unwrap();

        let store = Arc::new(CountingStore::default());
        let engine = Arc::new(IndexEngine::new(Arc::new(LineChunker), Arc::new(StubEmbedder), store.clone()));

        engine.enqueue("demo".to_string(), dir.path().to_path_buf());
        for _ in 0..50 {
            if engine.is_indexed("demo") {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        assert!(engine.is_indexed("demo"));
        assert_eq!(store.inserted.load(Ordering::SeqCst), 1);
        assert_eq!(store.finalized.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn truncate_leaves_short_content_alone() {
        assert_eq!(truncate_for_embedding("short"), "short");
    }

    #[test]
    fn truncate_clamps_long_content() {
        let long = "x".repeat(MAX_EMBED_CHARS + 500);
        let truncated = truncate_for_embedding(&long);
        assert!(truncated.chars().count() <= MAX_EMBED_CHARS);
        assert!(truncated.ends_with(TRUNCATION_MARKER));
    }

    struct EmptyChunker;
    impl Chunker for EmptyChunker {
        fn chunk(&self, _content: &str, _file_path: &str) -> Result<Vec<CodeChunk>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn empty_source_skips_finalize_but_still_marks_indexed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn hello() {}\n").unwrap();

        let store = Arc::new(CountingStore::default());
        let engine = Arc::new(IndexEngine::new(Arc::new(EmptyChunker), Arc::new(StubEmbedder), store.clone()));

        engine.enqueue("empty".to_string(), dir.path().to_path_buf());
        for _ in 0..50 {
            if engine.is_indexed("empty") {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        assert!(engine.is_indexed("empty"));
        assert_eq!(store.inserted.load(Ordering::SeqCst), 0);
        assert_eq!(store.finalized.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn duplicate_enqueue_of_indexing_source_is_noop() {
        let store = Arc::new(CountingStore::default());
        let engine = Arc::new(IndexEngine::new(Arc::new(LineChunker), Arc::new(StubEmbedder), store));
        engine.set_state("demo", SourceIndexState::Indexing);
        engine.enqueue("demo".to_string(), PathBuf::from("/nonexistent"));
        assert_eq!(engine.state("demo"), SourceIndexState::Indexing);
    }
}
