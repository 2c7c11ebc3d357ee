//! EdgeVec-backed `VectorStore` (spec §4.1): an embedded HNSW index
//! plus a JSONL row log for durability.
//!
//! `HnswIndex`/`VectorStorage` aren't `Sync`, so — exactly as the
//! embedder does for `TextEmbedding` — they're owned by one actor task
//! and driven over a channel. `insert_batch`/`finalize` only ever
//! reach the actor one call at a time since the channel itself
//! serializes them; that's what resolves the writer-lock question the
//! port leaves open.

use async_trait::async_trait;
use edgevec::hnsw::VectorId;
use opensrc_domain::chunk::CodeChunk;
use opensrc_domain::constants::FILTERED_SCAN_INFLATION;
use opensrc_domain::entry::{Embedding, IndexedEntry, ScoredEntry};
use opensrc_domain::error::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};

use crate::constants::{EDGEVEC_HNSW_EF_CONSTRUCTION, EDGEVEC_HNSW_EF_SEARCH, EDGEVEC_HNSW_M, EDGEVEC_HNSW_M0};

const ENTRIES_FILE: &str = "entries.jsonl";
const DELETIONS_FILE: &str = "deletions.jsonl";
const INDEXED_MANIFEST: &str = "indexed_sources.json";

enum Message {
    Init { dir: PathBuf, tx: oneshot::Sender<Result<()>> },
    InsertBatch { source: String, chunks: Vec<CodeChunk>, embeddings: Vec<Embedding>, tx: oneshot::Sender<Result<()>> },
    Finalize { tx: oneshot::Sender<Result<()>> },
    MarkIndexed { source: String, tx: oneshot::Sender<Result<()>> },
    IsIndexed { source: String, tx: oneshot::Sender<Result<bool>> },
    ListIndexed { tx: oneshot::Sender<Result<Vec<String>>> },
    DeleteSource { source: String, tx: oneshot::Sender<Result<()>> },
    Scan { query: Embedding, top_k: usize, source_filter: Vec<String>, tx: oneshot::Sender<Result<Vec<ScoredEntry>>> },
    Get { id: u64, tx: oneshot::Sender<Result<Option<IndexedEntry>>> },
}

pub struct EdgeVecStore {
    sender: mpsc::Sender<Message>,
}

impl EdgeVecStore {
    pub fn new() -> Result<Self> {
        let (tx, rx) = mpsc::channel(128);
        let actor = Actor::new(rx)?;
        tokio::spawn(actor.run());
        Ok(Self { sender: tx })
    }

    async fn call<T>(&self, build: impl FnOnce(oneshot::Sender<Result<T>>) -> Message) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender.send(build(tx)).await.map_err(|_| Error::database("send", "vector store actor channel closed"))?;
        rx.await.unwrap_or_else(|_| Err(Error::database("recv", "vector store actor closed")))
    }
}

#[async_trait]
impl opensrc_domain::ports::VectorStore for EdgeVecStore {
    async fn init(&self, dir: &Path) -> Result<()> {
        self.call(|tx| Message::Init { dir: dir.to_path_buf(), tx }).await
    }

    async fn insert_batch(&self, source: &str, chunks: Vec<CodeChunk>, embeddings: Vec<Embedding>) -> Result<()> {
        self.call(|tx| Message::InsertBatch { source: source.to_string(), chunks, embeddings, tx }).await
    }

    async fn finalize(&self) -> Result<()> {
        self.call(|tx| Message::Finalize { tx }).await
    }

    async fn mark_indexed(&self, source: &str) -> Result<()> {
        self.call(|tx| Message::MarkIndexed { source: source.to_string(), tx }).await
    }

    async fn is_indexed(&self, source: &str) -> Result<bool> {
        self.call(|tx| Message::IsIndexed { source: source.to_string(), tx }).await
    }

    async fn list_indexed(&self) -> Result<Vec<String>> {
        self.call(|tx| Message::ListIndexed { tx }).await
    }

    async fn delete_source(&self, source: &str) -> Result<()> {
        self.call(|tx| Message::DeleteSource { source: source.to_string(), tx }).await
    }

    async fn scan(&self, query: &Embedding, top_k: usize, source_filter: &[String]) -> Result<Vec<ScoredEntry>> {
        let query = query.clone();
        let source_filter = source_filter.to_vec();
        self.call(|tx| Message::Scan { query, top_k, source_filter, tx }).await
    }

    async fn get(&self, id: u64) -> Result<Option<IndexedEntry>> {
        self.call(|tx| Message::Get { id, tx }).await
    }
}

/// One persisted row, as written to `entries.jsonl`.
#[derive(serde::Serialize, serde::Deserialize)]
struct PersistedRow {
    id: u64,
    source: String,
    chunk: CodeChunk,
    embedding: Embedding,
}

struct Actor {
    receiver: mpsc::Receiver<Message>,
    index: edgevec::HnswIndex,
    storage: edgevec::VectorStorage,
    entries: HashMap<u64, IndexedEntry>,
    row_to_vec: HashMap<u64, VectorId>,
    indexed_sources: HashSet<String>,
    deleted_ids: HashSet<u64>,
    next_id: u64,
    dir: Option<PathBuf>,
}

impl Actor {
    fn new(receiver: mpsc::Receiver<Message>) -> Result<Self> {
        let hnsw_config = edgevec::HnswConfig {
            m: EDGEVEC_HNSW_M,
            m0: EDGEVEC_HNSW_M0,
            ef_construction: EDGEVEC_HNSW_EF_CONSTRUCTION,
            ef_search: EDGEVEC_HNSW_EF_SEARCH,
            dimensions: opensrc_domain::constants::EMBEDDING_DIM as u32,
            metric: edgevec::HnswConfig::METRIC_COSINE,
            _reserved: [0; 2],
        };
        let storage = edgevec::VectorStorage::new(&hnsw_config, None);
        let index = edgevec::HnswIndex::new(hnsw_config, &storage)
            .map_err(|e| Error::database("init", format!("failed to create HNSW index: {e}")))?;

        Ok(Self {
            receiver,
            index,
            storage,
            entries: HashMap::new(),
            row_to_vec: HashMap::new(),
            indexed_sources: HashSet::new(),
            deleted_ids: HashSet::new(),
            next_id: 0,
            dir: None,
        })
    }

    async fn run(mut self) {
        while let Some(msg) = self.receiver.recv().await {
            match msg {
                Message::Init { dir, tx } => {
                    let result = self.load(&dir);
                    let _ = tx.send(result);
                }
                Message::InsertBatch { source, chunks, embeddings, tx } => {
                    let result = self.insert_batch(&source, chunks, embeddings);
                    let _ = tx.send(result);
                }
                Message::Finalize { tx } => {
                    let result = self.finalize();
                    let _ = tx.send(result);
                }
                Message::MarkIndexed { source, tx } => {
                    let result = self.mark_indexed(&source);
                    let _ = tx.send(result);
                }
                Message::IsIndexed { source, tx } => {
                    let _ = tx.send(Ok(self.indexed_sources.contains(&source)));
                }
                Message::ListIndexed { tx } => {
                    let _ = tx.send(Ok(self.indexed_sources.iter().cloned().collect()));
                }
                Message::DeleteSource { source, tx } => {
                    let result = self.delete_source(&source);
                    let _ = tx.send(result);
                }
                Message::Scan { query, top_k, source_filter, tx } => {
                    let result = self.scan(&query, top_k, &source_filter);
                    let _ = tx.send(result);
                }
                Message::Get { id, tx } => {
                    let _ = tx.send(Ok(self.entries.get(&id).cloned()));
                }
            }
        }
    }

    fn load(&mut self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        self.dir = Some(dir.to_path_buf());

        let deletions_path = dir.join(DELETIONS_FILE);
        if let Ok(file) = std::fs::File::open(&deletions_path) {
            for line in BufReader::new(file).lines().map_while(std::result::Result::ok) {
                if let Ok(id) = line.trim().parse::<u64>() {
                    self.deleted_ids.insert(id);
                }
            }
        }

        let entries_path = dir.join(ENTRIES_FILE);
        if let Ok(file) = std::fs::File::open(&entries_path) {
            for line in BufReader::new(file).lines().map_while(std::result::Result::ok) {
                if line.trim().is_empty() {
                    continue;
                }
                let row: PersistedRow = serde_json::from_str(&line)?;
                if self.deleted_ids.contains(&row.id) {
                    continue;
                }
                let vector_id = self
                    .index
                    .insert(row.embedding.as_slice(), &mut self.storage)
                    .map_err(|e| Error::database("load", format!("failed to replay row {}: {e}", row.id)))?;
                self.row_to_vec.insert(row.id, vector_id);
                self.entries.insert(row.id, IndexedEntry { id: row.id, source: row.source, chunk: row.chunk, embedding: row.embedding });
                self.next_id = self.next_id.max(row.id + 1);
            }
        }

        let manifest_path = dir.join(INDEXED_MANIFEST);
        if let Ok(content) = std::fs::read_to_string(manifest_path) {
            let names: Vec<String> = serde_json::from_str(&content)?;
            self.indexed_sources = names.into_iter().collect();
        }

        Ok(())
    }

    fn dir(&self) -> Result<&Path> {
        self.dir.as_deref().ok_or_else(|| Error::database("insert_batch", "vector store not initialized"))
    }

    fn insert_batch(&mut self, source: &str, chunks: Vec<CodeChunk>, embeddings: Vec<Embedding>) -> Result<()> {
        if chunks.len() != embeddings.len() {
            return Err(Error::database("insert_batch", "chunks and embeddings length mismatch"));
        }
        let dir = self.dir()?.to_path_buf();
        let entries_path = dir.join(ENTRIES_FILE);
        let mut writer = std::fs::OpenOptions::new().create(true).append(true).open(&entries_path)?;

        for (chunk, embedding) in chunks.into_iter().zip(embeddings.into_iter()) {
            let id = self.next_id;
            self.next_id += 1;

            let vector_id = self
                .index
                .insert(embedding.as_slice(), &mut self.storage)
                .map_err(|e| Error::database("insert_batch", format!("HNSW insert failed: {e}")))?;

            let row = PersistedRow { id, source: source.to_string(), chunk: chunk.clone(), embedding: embedding.clone() };
            writeln!(writer, "{}", serde_json::to_string(&row)?)?;

            self.row_to_vec.insert(id, vector_id);
            self.entries.insert(id, IndexedEntry { id, source: source.to_string(), chunk, embedding });
        }
        writer.flush()?;
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        // `edgevec::HnswIndex::insert` builds the graph incrementally, so
        // there's no separate quantized-rebuild step the way the port's
        // doc comment describes for a batch-oriented store. `finalize`
        // is therefore just a durability checkpoint.
        let dir = self.dir()?;
        let entries_path = dir.join(ENTRIES_FILE);
        if let Ok(file) = std::fs::File::open(entries_path) {
            file.sync_all()?;
        }
        Ok(())
    }

    fn mark_indexed(&mut self, source: &str) -> Result<()> {
        self.indexed_sources.insert(source.to_string());
        self.persist_manifest()
    }

    fn persist_manifest(&self) -> Result<()> {
        let dir = self.dir()?;
        let names: Vec<&String> = self.indexed_sources.iter().collect();
        std::fs::write(dir.join(INDEXED_MANIFEST), serde_json::to_string(&names)?)?;
        Ok(())
    }

    fn delete_source(&mut self, source: &str) -> Result<()> {
        let doomed: Vec<u64> = self.entries.iter().filter(|(_, e)| e.source == source).map(|(id, _)| *id).collect();
        let dir = self.dir()?.to_path_buf();
        let deletions_path = dir.join(DELETIONS_FILE);
        let mut writer = std::fs::OpenOptions::new().create(true).append(true).open(&deletions_path)?;

        for id in doomed {
            if let Some(vector_id) = self.row_to_vec.remove(&id) {
                let _ = self.index.soft_delete(vector_id);
            }
            self.entries.remove(&id);
            self.deleted_ids.insert(id);
            writeln!(writer, "{id}")?;
        }
        writer.flush()?;

        self.indexed_sources.remove(source);
        self.persist_manifest()
    }

    fn scan(&self, query: &Embedding, top_k: usize, source_filter: &[String]) -> Result<Vec<ScoredEntry>> {
        if self.entries.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        let requested = if source_filter.is_empty() { top_k } else { top_k * FILTERED_SCAN_INFLATION };

        let hits = self
            .index
            .search(query.as_slice(), requested, &self.storage)
            .map_err(|e| Error::database("scan", format!("HNSW search failed: {e}")))?;

        let mut out = Vec::with_capacity(top_k);
        for hit in hits {
            let row_id = self.row_to_vec.iter().find_map(|(row, vid)| (*vid == hit.vector_id).then_some(*row));
            let Some(row_id) = row_id else { continue };
            let Some(entry) = self.entries.get(&row_id) else { continue };
            if !source_filter.is_empty() && !source_filter.iter().any(|s| s == &entry.source) {
                continue;
            }
            out.push(ScoredEntry { entry: entry.clone(), distance: hit.distance });
            if out.len() == top_k {
                break;
            }
        }
        out.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal).then(a.entry.id.cmp(&b.entry.id)));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opensrc_domain::chunk::ChunkKind;
    use opensrc_domain::ports::VectorStore;

    fn chunk(file: &str, id: &str) -> CodeChunk {
        CodeChunk { file: file.to_string(), identifier: id.to_string(), kind: ChunkKind::Function, start_line: 1, end_line: 2, content: "fn f() {}".to_string(), parent: None }
    }

    fn embedding(seed: f32) -> Embedding {
        let mut v = vec![0.0f32; opensrc_domain::constants::EMBEDDING_DIM];
        v[0] = seed;
        v[1] = 1.0;
        Embedding::new(v)
    }

    #[tokio::test]
    async fn inserts_and_scans_back() {
        let tmp = tempfile::tempdir().unwrap();
        let store = EdgeVecStore::new().unwrap();
        store.init(tmp.path()).await.unwrap();

        store.insert_batch("zod", vec![chunk("a.ts", "parse")], vec![embedding(1.0)]).await.unwrap();
        store.finalize().await.unwrap();
        store.mark_indexed("zod").await.unwrap();

        assert!(store.is_indexed("zod").await.unwrap());
        let hits = store.scan(&embedding(1.0), 5, &[]).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entry.source, "zod");
    }

    #[tokio::test]
    async fn delete_source_removes_rows_from_future_scans() {
        let tmp = tempfile::tempdir().unwrap();
        let store = EdgeVecStore::new().unwrap();
        store.init(tmp.path()).await.unwrap();

        store.insert_batch("zod", vec![chunk("a.ts", "parse")], vec![embedding(1.0)]).await.unwrap();
        store.mark_indexed("zod").await.unwrap();
        store.delete_source("zod").await.unwrap();

        assert!(!store.is_indexed("zod").await.unwrap());
        let hits = store.scan(&embedding(1.0), 5, &[]).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn reopening_the_store_skips_deleted_rows() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let store = EdgeVecStore::new().unwrap();
            store.init(tmp.path()).await.unwrap();
            store.insert_batch("zod", vec![chunk("a.ts", "parse")], vec![embedding(1.0)]).await.unwrap();
            store.insert_batch("lodash", vec![chunk("b.ts", "map")], vec![embedding(2.0)]).await.unwrap();
            store.mark_indexed("zod").await.unwrap();
            store.mark_indexed("lodash").await.unwrap();
            store.delete_source("zod").await.unwrap();
        }

        let reopened = EdgeVecStore::new().unwrap();
        reopened.init(tmp.path()).await.unwrap();
        assert!(!reopened.is_indexed("zod").await.unwrap());
        assert!(reopened.is_indexed("lodash").await.unwrap());
        let hits = reopened.scan(&embedding(2.0), 5, &[]).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entry.source, "lodash");
    }

    #[tokio::test]
    async fn filtered_scan_only_returns_matching_source() {
        let tmp = tempfile::tempdir().unwrap();
        let store = EdgeVecStore::new().unwrap();
        store.init(tmp.path()).await.unwrap();
        store.insert_batch("zod", vec![chunk("a.ts", "parse")], vec![embedding(1.0)]).await.unwrap();
        store.insert_batch("lodash", vec![chunk("b.ts", "map")], vec![embedding(2.0)]).await.unwrap();

        let hits = store.scan(&embedding(1.0), 5, &["lodash".to_string()]).await.unwrap();
        assert!(hits.iter().all(|h| h.entry.source == "lodash"));
    }
}
