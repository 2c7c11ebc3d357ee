//! `CodeChunk` — a semantically meaningful fragment of one file, the
//! unit of embedding.

use serde::{Deserialize, Serialize};

/// The structural role a chunk plays in its source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    /// Top-level function / function declaration.
    Function,
    /// A class body.
    Class,
    /// A method inside a class/impl.
    Method,
    /// A TS/JS interface.
    Interface,
    /// A TS type alias.
    Type,
    /// A top-level variable/const whose initializer is a function value.
    Variable,
    /// An enum declaration.
    Enum,
    /// A Rust struct.
    Struct,
    /// A Rust trait.
    Trait,
    /// A Rust `impl` block.
    Impl,
    /// A Rust module.
    Mod,
    /// A Rust macro definition.
    Macro,
    /// A Markdown heading span.
    Section,
    /// A Markdown fenced code block extracted on its own.
    Codeblock,
    /// The sliding-window fallback, or anything not otherwise classified.
    Unknown,
}

/// A named slice of one file, carrying enough context to be embedded and
/// later shown back to the agent as a `SearchResult`.
///
/// Invariants (spec §3): `start_line <= end_line`; `content` equals the
/// file's slice over `[start_line, end_line]` (1-based, inclusive, modulo
/// trailing-newline conventions); chunks from one file overlap only when
/// produced by the sliding-window fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeChunk {
    /// Path relative to the source root.
    pub file: String,
    /// Human label: function/type name, heading text, or `lines_<a>_<b>`.
    pub identifier: String,
    /// Structural role.
    pub kind: ChunkKind,
    /// 1-based inclusive start line.
    pub start_line: u32,
    /// 1-based inclusive end line.
    pub end_line: u32,
    /// Exact extracted text.
    pub content: String,
    /// Owning context — a class name, an `impl` signature, etc.
    pub parent: Option<String>,
}

impl CodeChunk {
    /// `true` if `[start_line, end_line]` is a well-formed, non-empty
    /// inclusive range.
    pub fn has_valid_range(&self) -> bool {
        self.start_line >= 1 && self.start_line <= self.end_line
    }
}
