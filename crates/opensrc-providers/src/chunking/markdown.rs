//! Markdown chunker: one chunk per heading-delimited section, plus a
//! standalone chunk for any fenced code block long enough to matter
//! (spec's `MIN_CODEBLOCK_CHARS`) so a grep for a code sample doesn't
//! have to scan past its surrounding prose.

use opensrc_domain::chunk::{ChunkKind, CodeChunk};
use opensrc_domain::constants::MIN_CODEBLOCK_CHARS;
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

struct Section {
    heading: String,
    start_line: u32,
    end_line: u32,
}

pub fn chunk(content: &str, file_path: &str) -> Option<Vec<CodeChunk>> {
    if content.trim().is_empty() {
        return None;
    }

    let lines: Vec<&str> = content.lines().collect();
    let mut sections = Vec::new();
    let mut code_blocks = Vec::new();
    let mut current_heading = "preamble".to_string();
    let mut current_start = 1u32;
    let mut in_code_block: Option<(String, u32)> = None;
    let mut awaiting_heading_text = false;
    let mut heading_buf = String::new();

    let parser = Parser::new_ext(content, Options::ENABLE_TABLES).into_offset_iter();
    for (event, range) in parser {
        let line_of = |offset: usize| (content[..offset.min(content.len())].matches('\n').count() as u32) + 1;

        match event {
            Event::Start(Tag::Heading { .. }) => {
                let start = line_of(range.start);
                if start > current_start {
                    sections.push(Section { heading: current_heading.clone(), start_line: current_start, end_line: start.saturating_sub(1).max(current_start) });
                }
                current_start = start;
                awaiting_heading_text = true;
                heading_buf.clear();
            }
            Event::End(TagEnd::Heading(_)) => {
                if !heading_buf.is_empty() {
                    current_heading = heading_buf.clone();
                }
                awaiting_heading_text = false;
            }
            Event::Text(text) if awaiting_heading_text => {
                heading_buf.push_str(&text);
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    pulldown_cmark::CodeBlockKind::Fenced(lang) => lang.to_string(),
                    pulldown_cmark::CodeBlockKind::Indented => String::new(),
                };
                in_code_block = Some((lang, line_of(range.start)));
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((lang, start_line)) = in_code_block.take() {
                    let end_line = line_of(range.end);
                    let text = lines
                        .get((start_line as usize).saturating_sub(1)..end_line as usize)
                        .map(|ls| ls.join("\n"))
                        .unwrap_or_default();
                    if text.chars().count() >= MIN_CODEBLOCK_CHARS {
                        let lang_tag = if lang.is_empty() { "text" } else { lang.as_str() };
                        code_blocks.push(CodeChunk {
                            file: file_path.to_string(),
                            identifier: format!("codeblock_{lang_tag}_L{start_line}"),
                            kind: ChunkKind::Codeblock,
                            start_line,
                            end_line,
                            content: text,
                            parent: Some(current_heading.clone()),
                        });
                    }
                }
            }
            _ => {}
        }
    }

    sections.push(Section { heading: current_heading, start_line: current_start, end_line: lines.len() as u32 });

    let mut out: Vec<CodeChunk> = sections
        .into_iter()
        .filter(|s| s.start_line <= s.end_line)
        .map(|s| CodeChunk {
            file: file_path.to_string(),
            identifier: s.heading,
            kind: ChunkKind::Section,
            start_line: s.start_line,
            end_line: s.end_line,
            content: lines
                .get((s.start_line as usize).saturating_sub(1)..s.end_line as usize)
                .map(|ls| ls.join("\n"))
                .unwrap_or_default(),
            parent: None,
        })
        .collect();
    out.extend(code_blocks);

    (!out.is_empty()).then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_by_heading() {
        let md = "# Intro\nhello\n\n## Usage\nmore text\n";
        let chunks = chunk(md, "README.md").unwrap();
        assert!(chunks.iter().any(|c| c.identifier == "Intro"));
        assert!(chunks.iter().any(|c| c.identifier == "Usage"));
    }

    #[test]
    fn extracts_long_fenced_code_block_separately() {
        let code = "x".repeat(40);
        let md = format!("# Demo\n\n```rust\n{code}\n```\n");
        let chunks = chunk(&md, "README.md").unwrap();
        let block = chunks.iter().find(|c| c.kind == ChunkKind::Codeblock).unwrap();
        assert!(block.identifier.starts_with("codeblock_rust_L"));
    }

    #[test]
    fn preamble_section_before_first_heading_uses_exact_identifier() {
        let md = "intro text\n\n# First Heading\nbody\n";
        let chunks = chunk(md, "README.md").unwrap();
        assert!(chunks.iter().any(|c| c.identifier == "preamble"));
    }

    #[test]
    fn short_code_block_stays_folded_into_section() {
        let md = "# Demo\n\n```rust\nx\n```\n";
        let chunks = chunk(md, "README.md").unwrap();
        assert!(!chunks.iter().any(|c| c.kind == ChunkKind::Codeblock));
    }
}
