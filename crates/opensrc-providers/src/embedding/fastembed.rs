//! FastEmbed-backed `Embedder` (spec §4.2): local ONNX inference, no
//! external API calls.
//!
//! `TextEmbedding` is not `Sync` and its `embed` call is a blocking CPU
//! operation, so it's owned by a dedicated actor task and driven
//! through a channel — the same shape the vector store adapter uses
//! for its own non-`Sync` backing library.

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use opensrc_domain::constants::{EMBEDDING_DIM, MAX_EMBED_CHARS, QUERY_INSTRUCTION_PREFIX, TRUNCATION_MARKER};
use opensrc_domain::entry::Embedding;
use opensrc_domain::error::{Error, Result};
use tokio::sync::{mpsc, oneshot};

enum Message {
    EmbedBatch { texts: Vec<String>, tx: oneshot::Sender<Result<Vec<Embedding>>> },
}

/// Local embedding provider. `BGEBaseENV15` is the only FastEmbed model
/// this adapter initializes with, since it's the one in FastEmbed's
/// catalog that matches `EMBEDDING_DIM` (768) — every other entry in
/// FastEmbed's model list is 384/1024/1536-dimensional, and the
/// `Embedding` newtype panics on a width mismatch.
pub struct FastEmbedEmbedder {
    sender: mpsc::Sender<Message>,
}

impl FastEmbedEmbedder {
    pub fn new() -> Result<Self> {
        let init_options = InitOptions::new(EmbeddingModel::BGEBaseENV15).with_show_download_progress(true);
        let model = TextEmbedding::try_new(init_options)
            .map_err(|e| Error::embedder_not_ready(format!("failed to initialize FastEmbed model: {e}")))?;

        let (tx, rx) = mpsc::channel(128);
        let mut actor = Actor { receiver: rx, model };
        tokio::task::spawn_blocking(move || actor.run());

        Ok(Self { sender: tx })
    }

    async fn embed_batch_raw(&self, texts: Vec<String>) -> Result<Vec<Embedding>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Message::EmbedBatch { texts, tx })
            .await
            .map_err(|_| Error::embedder_not_ready("FastEmbed actor channel closed"))?;
        rx.await.unwrap_or_else(|_| Err(Error::embedder_not_ready("FastEmbed actor closed")))
    }
}

#[async_trait]
impl opensrc_domain::ports::Embedder for FastEmbedEmbedder {
    async fn embed_query(&self, text: &str) -> Result<Embedding> {
        let prefixed = format!("{QUERY_INSTRUCTION_PREFIX}{}", clamp(text));
        let mut result = self.embed_batch_raw(vec![prefixed]).await?;
        result.pop().ok_or_else(|| Error::embed("FastEmbed returned no vector for the query"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let clamped: Vec<String> = texts.iter().map(|t| clamp(t)).collect();
        self.embed_batch_raw(clamped).await
    }
}

fn clamp(text: &str) -> String {
    if text.chars().count() <= MAX_EMBED_CHARS {
        return text.to_string();
    }
    let budget = MAX_EMBED_CHARS.saturating_sub(TRUNCATION_MARKER.chars().count());
    let mut out: String = text.chars().take(budget).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

struct Actor {
    receiver: mpsc::Receiver<Message>,
    model: TextEmbedding,
}

impl Actor {
    fn run(&mut self) {
        while let Some(msg) = self.receiver.blocking_recv() {
            match msg {
                Message::EmbedBatch { texts, tx } => {
                    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
                    let result = self.model.embed(refs, None).map_err(|e| Error::embed(format!("FastEmbed inference failed: {e}")));
                    let response = result.and_then(|vectors| {
                        vectors
                            .into_iter()
                            .map(|v| {
                                if v.len() != EMBEDDING_DIM {
                                    return Err(Error::embed(format!(
                                        "FastEmbed returned {} dims, expected {EMBEDDING_DIM}",
                                        v.len()
                                    )));
                                }
                                Ok(Embedding::new(v))
                            })
                            .collect::<Result<Vec<_>>>()
                    });
                    let _ = tx.send(response);
                }
            }
        }
    }
}
