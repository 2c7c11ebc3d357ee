//! Chunking dispatcher (spec §4.3): routes a file to one of four
//! strategies by extension, falling back to a sliding window for
//! anything unrecognized or unparseable.

pub mod markdown;
pub mod rust_lang;
pub mod sliding_window;
pub mod ts_family;

use opensrc_domain::chunk::CodeChunk;
use opensrc_domain::error::Result;
use opensrc_domain::ports::Chunker;

/// Routes `chunk(content, file_path)` calls by file extension.
///
/// Holds no state — each strategy module builds its own tree-sitter
/// parser per call, matching `ast_grep`'s reasoning that a shared
/// cached parser isn't worth the synchronization it would need.
#[derive(Debug, Default, Clone, Copy)]
pub struct Dispatcher;

impl Dispatcher {
    pub fn new() -> Self {
        Self
    }
}

impl Chunker for Dispatcher {
    fn chunk(&self, content: &str, file_path: &str) -> Result<Vec<CodeChunk>> {
        let ext = file_path.rsplit('.').next().unwrap_or("");
        let chunks = match ext {
            "rs" => rust_lang::chunk(content, file_path),
            "js" | "jsx" | "mjs" | "cjs" | "ts" | "mts" | "cts" | "tsx" => ts_family::chunk(content, file_path, ext),
            "md" | "mdx" | "markdown" => markdown::chunk(content, file_path),
            _ => None,
        };
        Ok(chunks.unwrap_or_else(|| sliding_window::chunk(content, file_path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_extension_falls_back_to_sliding_window() {
        let dispatcher = Dispatcher::new();
        let content = (0..120).map(|i| format!("line {i}\n")).collect::<String>();
        let chunks = dispatcher.chunk(&content, "notes.txt").unwrap();
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.kind == opensrc_domain::chunk::ChunkKind::Unknown));
    }

    #[test]
    fn routes_rust_files_to_the_rust_strategy() {
        let dispatcher = Dispatcher::new();
        let chunks = dispatcher.chunk("fn main() {}\n", "main.rs").unwrap();
        assert!(chunks.iter().any(|c| c.kind == opensrc_domain::chunk::ChunkKind::Function));
    }
}
