//! Sliding-window fallback chunker: used for any file whose language
//! isn't otherwise recognized, or whose AST chunker produced nothing
//! (an empty/malformed file). Windows overlap so a match spanning a
//! window boundary is still fully captured by at least one chunk.

use opensrc_domain::chunk::{ChunkKind, CodeChunk};
use opensrc_domain::constants::{SLIDING_WINDOW_OVERLAP, SLIDING_WINDOW_SIZE};

pub fn chunk(content: &str, file_path: &str) -> Vec<CodeChunk> {
    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return Vec::new();
    }

    let stride = SLIDING_WINDOW_SIZE.saturating_sub(SLIDING_WINDOW_OVERLAP).max(1);
    let mut out = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + SLIDING_WINDOW_SIZE).min(lines.len());
        out.push(CodeChunk {
            file: file_path.to_string(),
            identifier: format!("lines_{}_{}", start + 1, end),
            kind: ChunkKind::Unknown,
            start_line: start as u32 + 1,
            end_line: end as u32,
            content: lines[start..end].join("\n"),
            parent: None,
        });
        if end == lines.len() {
            break;
        }
        start += stride;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_short_file_is_one_window() {
        let content = "a\nb\nc\n";
        let chunks = chunk(content, "a.txt");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 3);
    }

    #[test]
    fn long_file_produces_overlapping_windows() {
        let content = (1..=120).map(|i| format!("line {i}\n")).collect::<String>();
        let chunks = chunk(&content, "a.txt");
        assert!(chunks.len() > 1);
        // consecutive windows overlap by SLIDING_WINDOW_OVERLAP lines
        assert_eq!(chunks[1].start_line, chunks[0].end_line - SLIDING_WINDOW_OVERLAP as u32 + 1);
    }

    #[test]
    fn empty_file_yields_no_chunks() {
        assert!(chunk("", "empty.txt").is_empty());
    }
}
