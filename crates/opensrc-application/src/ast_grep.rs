//! Structural search over source files using tree-sitter grammars and
//! `$NAME` / `$$$NAME` metavariable patterns (spec §6).
//!
//! A pattern is itself a snippet of source in the target language.
//! `$NAME` binds to exactly one node (and, once bound, every further
//! occurrence of `$NAME` in the same pattern must match identical
//! text); `$$$NAME` binds to the remaining run of sibling nodes in a
//! list and must appear last among its siblings in the pattern.

use opensrc_domain::error::{Error, Result};
use std::collections::HashMap;
use std::path::Path;
use tree_sitter::{Node, Parser, Tree};

/// Languages this module can parse and match against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Rust,
    JavaScript,
    TypeScript,
    Tsx,
}

impl Language {
    /// Map a file extension to the language used to parse it. Returns
    /// `None` for anything `ast_grep` doesn't support — callers skip
    /// such files rather than erroring, matching `grep`'s tolerance of
    /// a mixed-language tree.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "rs" => Some(Self::Rust),
            "js" | "jsx" | "mjs" | "cjs" => Some(Self::JavaScript),
            "ts" | "mts" | "cts" => Some(Self::TypeScript),
            "tsx" => Some(Self::Tsx),
            _ => None,
        }
    }

    fn grammar(self) -> tree_sitter::Language {
        match self {
            Self::Rust => tree_sitter_rust::LANGUAGE.into(),
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Self::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }

    fn parser(self) -> Result<Parser> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.grammar())
            .map_err(|e| Error::internal(format!("tree-sitter grammar load failed: {e}")))?;
        Ok(parser)
    }

    /// Whether a caller-supplied `lang` name (spec §4.4's `lang: string
    /// | string[]` override) names this language. An unrecognized name
    /// matches every language, the same tolerance `grep` extends to an
    /// unrecognized `include` glob.
    fn matches_name(self, name: &str) -> bool {
        match name.to_lowercase().as_str() {
            "rust" | "rs" => self == Self::Rust,
            "javascript" | "js" => self == Self::JavaScript,
            "typescript" | "ts" => self == Self::TypeScript,
            "tsx" => self == Self::Tsx,
            _ => true,
        }
    }
}

/// One structural match (spec §6: `{file, line, column, endLine,
/// endColumn, text, metavars}`).
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AstMatch {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub end_line: u32,
    pub end_column: u32,
    pub text: String,
    pub metavars: HashMap<String, String>,
}

/// Stateless structural-search engine. Parsers are built per call
/// (tree-sitter parsers are cheap and not `Send`-friendly to cache
/// across an async boundary without a mutex per language, which isn't
/// worth it at this call volume).
#[derive(Debug, Default, Clone, Copy)]
pub struct AstGrep;

impl AstGrep {
    pub fn new() -> Self {
        Self
    }

    /// Search every file under `root` whose extension maps to a known
    /// `Language`, matching `pattern` (parsed in that same language)
    /// against every node in the file's tree. Stops once `limit`
    /// matches have been collected across all files.
    ///
    /// `glob` and `langs`, when given, narrow the set of files walked
    /// *before* `limit` is applied — the caller's scope restriction
    /// must not be defeated by the cap being hit on out-of-scope files
    /// first (spec §4.4's `{glob?, lang?}` options narrow the search,
    /// they don't post-filter its results).
    pub fn search(&self, root: &Path, pattern: &str, limit: usize, glob: Option<&str>, langs: &[String]) -> Result<Vec<AstMatch>> {
        let glob_pattern = glob.map(glob::Pattern::new).transpose().map_err(|e| Error::invalid_spec(glob.unwrap_or_default(), e.to_string()))?;
        let mut out = Vec::new();
        let mut pattern_cache: HashMap<Language, (Tree, String)> = HashMap::new();

        'walk: for entry in ignore::WalkBuilder::new(root).hidden(false).git_ignore(false).build() {
            let entry = entry.map_err(|e| Error::file_read(root.display().to_string(), e.to_string()))?;
            let path = entry.path();
            if !path.is_file() || is_ignored(path) {
                continue;
            }
            let Some(ext) = path.extension().and_then(|e| e.to_str()) else { continue };
            let Some(lang) = Language::from_extension(ext) else { continue };
            if !langs.is_empty() && !langs.iter().any(|l| lang.matches_name(l)) {
                continue;
            }
            let rel = path.strip_prefix(root).unwrap_or(path).to_string_lossy().replace('\\', "/");
            if let Some(g) = &glob_pattern {
                if !g.matches(&rel) {
                    continue;
                }
            }

            if !pattern_cache.contains_key(&lang) {
                let mut parser = lang.parser()?;
                let tree = parser
                    .parse(pattern, None)
                    .ok_or_else(|| Error::invalid_spec(pattern.to_string(), "failed to parse pattern"))?;
                pattern_cache.insert(lang, (tree, pattern.to_string()));
            }
            let (pattern_tree, pattern_src) = pattern_cache.get(&lang).unwrap();
            let pattern_root = pattern_tree
                .root_node()
                .named_child(0)
                .unwrap_or_else(|| pattern_tree.root_node());

            let Ok(content) = std::fs::read_to_string(path) else { continue };
            let mut parser = lang.parser()?;
            let Some(target_tree) = parser.parse(&content, None) else { continue };

            for node in preorder(target_tree.root_node()) {
                let mut captures = HashMap::new();
                if node_matches(pattern_root, node, pattern_src.as_bytes(), content.as_bytes(), &mut captures) {
                    out.push(AstMatch {
                        file: rel.clone(),
                        line: node.start_position().row as u32 + 1,
                        column: node.start_position().column as u32,
                        end_line: node.end_position().row as u32 + 1,
                        end_column: node.end_position().column as u32,
                        text: node.utf8_text(content.as_bytes()).unwrap_or_default().to_string(),
                        metavars: captures,
                    });
                    if out.len() >= limit {
                        break 'walk;
                    }
                }
            }
        }
        Ok(out)
    }
}

fn is_ignored(path: &Path) -> bool {
    const SKIP: &[&str] = &[".git", "node_modules", "target", "dist", "build", ".venv", "__pycache__"];
    path.components().any(|c| SKIP.contains(&c.as_os_str().to_string_lossy().as_ref()))
}

/// All nodes in `root`'s subtree, preorder, `root` included. Collected
/// into a `Vec` up front rather than a lazy cursor-driven iterator —
/// simpler to reason about and files are small enough it doesn't matter.
fn preorder(root: Node) -> Vec<Node> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(n) = stack.pop() {
        out.push(n);
        let mut cursor = n.walk();
        stack.extend(n.children(&mut cursor).collect::<Vec<_>>().into_iter().rev());
    }
    out
}

fn node_text<'a>(node: Node, src: &'a [u8]) -> &'a str {
    node.utf8_text(src).unwrap_or("")
}

/// `$NAME` — binds one node. `$_` (no captured name) matches without
/// recording anything.
fn single_metavar(text: &str) -> Option<&str> {
    let rest = text.strip_prefix('$')?;
    if rest.starts_with('$') || rest.is_empty() {
        return None;
    }
    rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_').then_some(rest)
}

/// `$$$NAME` — binds the rest of a sibling list (spec §6).
fn multi_metavar(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("$$$")?;
    (!rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')).then_some(rest)
}

fn bind(captures: &mut HashMap<String, String>, name: &str, text: &str) -> bool {
    if name == "_" {
        return true;
    }
    match captures.get(name) {
        Some(existing) => existing == text,
        None => {
            captures.insert(name.to_string(), text.to_string());
            true
        }
    }
}

/// Structural match of `p` against `t`. `$NAME` at any position matches
/// `t` wholesale, regardless of node kind.
fn node_matches(p: Node, t: Node, src_p: &[u8], src_t: &[u8], captures: &mut HashMap<String, String>) -> bool {
    let ptext = node_text(p, src_p);
    if let Some(name) = single_metavar(ptext) {
        return bind(captures, name, node_text(t, src_t));
    }
    if p.kind() != t.kind() {
        return false;
    }

    let mut pc = p.walk();
    let pattern_children: Vec<Node> = p.named_children(&mut pc).collect();
    if pattern_children.is_empty() {
        return ptext == node_text(t, src_t);
    }

    let mut tc = t.walk();
    let target_children: Vec<Node> = t.named_children(&mut tc).collect();
    match_children(&pattern_children, &target_children, src_p, src_t, captures)
}

/// Compare a pattern's child list against a target's, honoring a
/// trailing `$$$NAME` as "bind everything left over". Any earlier
/// length mismatch without a multi-metavar tail fails the match.
fn match_children(
    pattern: &[Node],
    target: &[Node],
    src_p: &[u8],
    src_t: &[u8],
    captures: &mut HashMap<String, String>,
) -> bool {
    if let Some(last) = pattern.last() {
        if let Some(name) = multi_metavar(node_text(*last, src_p)) {
            let fixed = &pattern[..pattern.len() - 1];
            if target.len() < fixed.len() {
                return false;
            }
            for (p, t) in fixed.iter().zip(target.iter()) {
                if !node_matches(*p, *t, src_p, src_t, captures) {
                    return false;
                }
            }
            let rest_text: Vec<&str> = target[fixed.len()..].iter().map(|n| node_text(*n, src_t)).collect();
            return bind(captures, name, &rest_text.join(", "));
        }
    }

    if pattern.len() != target.len() {
        return false;
    }
    pattern
        .iter()
        .zip(target.iter())
        .all(|(p, t)| node_matches(*p, *t, src_p, src_t, captures))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn matches_function_call_with_single_metavar() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "fn f() { console_log(\"hi\"); foo(1, 2); }").unwrap();
        // not valid rust, but tree-sitter is error-tolerant enough to still
        // expose a call_expression node for `foo(1, 2)`.
        fs::write(dir.path().join("b.js"), "function f() { foo(1, 2); bar(3); }").unwrap();

        let ag = AstGrep::new();
        let matches = ag.search(dir.path(), "foo($A, $B)", 10, None, &[]).unwrap();
        assert!(matches.iter().any(|m| m.file == "b.js"));
        let m = matches.iter().find(|m| m.file == "b.js").unwrap();
        assert_eq!(m.metavars.get("A").map(String::as_str), Some("1"));
        assert_eq!(m.metavars.get("B").map(String::as_str), Some("2"));
    }

    #[test]
    fn multi_metavar_binds_remaining_args() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.js"), "log(\"a\", 1, 2, 3);").unwrap();
        let ag = AstGrep::new();
        let matches = ag.search(dir.path(), "log($$$REST)", 10, None, &[]).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].metavars.get("REST").map(String::as_str), Some("\"a\", 1, 2, 3"));
    }

    #[test]
    fn unsupported_extension_is_skipped_not_erroring() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "foo(1, 2)").unwrap();
        let ag = AstGrep::new();
        let matches = ag.search(dir.path(), "foo($A, $B)", 10, None, &[]).unwrap();
        assert!(matches.is_empty());
    }

    /// Regression test for the order-of-operations bug spec §8 scenario 4
    /// guards against: narrowing by `glob` must happen before `limit` is
    /// applied, not after — otherwise a low limit hit on out-of-scope
    /// files can starve the in-scope match entirely.
    #[test]
    fn glob_narrows_before_limit_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            fs::write(dir.path().join(format!("noise{i}.js")), "foo(1, 2);").unwrap();
        }
        fs::write(dir.path().join("foo.ts"), "foo(9, 9);").unwrap();

        let ag = AstGrep::new();
        let matches = ag.search(dir.path(), "foo($A, $B)", 1, Some("**/foo.ts"), &[]).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].file, "foo.ts");
    }

    #[test]
    fn lang_filter_restricts_to_named_language() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.js"), "foo(1, 2);").unwrap();
        fs::write(dir.path().join("a.ts"), "foo(3, 4);").unwrap();

        let ag = AstGrep::new();
        let langs = vec!["typescript".to_string()];
        let matches = ag.search(dir.path(), "foo($A, $B)", 10, None, &langs).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].file, "a.ts");
    }
}
