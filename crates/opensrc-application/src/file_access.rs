//! `FileAccess` (spec §4.6): path-traversal-safe reads, globbing, and
//! grep, every call rooted at one source's directory.
//!
//! Every public method takes a `root: &Path` (the source's resolved
//! on-disk directory) and a caller-supplied relative path or pattern.
//! Nothing here ever trusts a caller-supplied path until it has been
//! canonicalized and checked to still live under `root`.

use opensrc_domain::constants::GREP_LINE_TRUNCATE;
use opensrc_domain::error::{Error, Result};
use regex::RegexBuilder;
use std::path::{Path, PathBuf};

/// One grep hit.
#[derive(Debug, Clone, serde::Serialize)]
pub struct GrepMatch {
    pub file: String,
    pub line: u32,
    pub content: String,
}

/// One node of a `tree` listing (spec §6: `TreeNode{name,type,children?}`).
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: TreeNodeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,
}

/// Discriminant for `TreeNode::node_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeNodeType {
    File,
    Dir,
}

/// Stateless helper bundling the path-safety checks and file
/// operations the query planner and sandbox API need. Holds no data of
/// its own — every method takes the root to operate under explicitly,
/// so one instance is shared across all sources.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileAccess;

impl FileAccess {
    pub fn new() -> Self {
        Self
    }

    /// Resolve `relative` against `root`, rejecting any path that
    /// escapes it after canonicalization (spec §4.6, §7: `PathTraversal`).
    ///
    /// Comparison is done with a trailing separator on `root` so a
    /// sibling directory that merely shares `root` as a string prefix
    /// (`/data/foo-evil` vs `/data/foo`) is correctly rejected.
    pub fn resolve(&self, root: &Path, relative: &str) -> Result<PathBuf> {
        let candidate = root.join(relative.trim_start_matches(['/', '\\']));
        let canonical_root = root
            .canonicalize()
            .map_err(|e| Error::file_read(root.display().to_string(), e.to_string()))?;
        let canonical = candidate
            .canonicalize()
            .map_err(|_| Error::path_traversal(relative.to_string()))?;

        let mut root_with_sep = canonical_root.into_os_string();
        root_with_sep.push(std::path::MAIN_SEPARATOR.to_string());
        let canonical_str = canonical.as_os_str();

        if canonical_str == root_with_sep.as_os_str().trim_end_matches(std::path::MAIN_SEPARATOR)
            || canonical.starts_with(PathBuf::from(root_with_sep))
        {
            Ok(canonical)
        } else {
            Err(Error::path_traversal(relative.to_string()))
        }
    }

    /// Read one file's full contents.
    pub async fn read(&self, root: &Path, relative: &str) -> Result<String> {
        let path = self.resolve(root, relative)?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| Error::file_read(relative.to_string(), e.to_string()))
    }

    /// Read several files at once, each independently fallible; spec
    /// §4.6 asks that one bad path not abort the rest of the batch.
    pub async fn read_many(&self, root: &Path, relatives: &[String]) -> Vec<(String, Result<String>)> {
        let mut out = Vec::with_capacity(relatives.len());
        for rel in relatives {
            out.push((rel.clone(), self.read(root, rel).await));
        }
        out
    }

    /// List files under `root` matching a glob pattern (relative to
    /// `root`), skipping common noise directories the same way the
    /// chunker's enumeration does.
    pub fn glob(&self, root: &Path, pattern: &str) -> Result<Vec<String>> {
        let full_pattern = root.join(pattern);
        let full_pattern = full_pattern.to_string_lossy().to_string();
        let mut matches = Vec::new();
        for entry in glob::glob(&full_pattern)
            .map_err(|e| Error::invalid_spec(pattern.to_string(), e.to_string()))?
        {
            let path = entry.map_err(|e| Error::file_read(pattern.to_string(), e.to_string()))?;
            if !path.is_file() || is_ignored(&path) {
                continue;
            }
            if let Ok(rel) = path.strip_prefix(root) {
                matches.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
        matches.sort();
        Ok(matches)
    }

    /// Build a nested `TreeNode` rooted at `root` (spec §6:
    /// `tree(source, {depth?, pattern?})`). `depth` bounds how many
    /// directory levels are descended (`None` is unbounded); `pattern`,
    /// when given, keeps only files whose relative path matches the
    /// glob, pruning directories left with no matching descendant.
    pub fn tree(&self, root: &Path, depth: Option<u32>, pattern: Option<&str>) -> Result<TreeNode> {
        let glob = pattern.map(glob::Pattern::new).transpose().map_err(|e| Error::invalid_spec(pattern.unwrap_or_default().to_string(), e.to_string()))?;
        let name = root.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| ".".to_string());
        let node = build_tree_node(root, root, &name, depth, glob.as_ref())?;
        Ok(node.unwrap_or(TreeNode { name, node_type: TreeNodeType::Dir, children: Some(Vec::new()) }))
    }

    /// Case-insensitive regex search over every non-ignored file under
    /// `root`, capped at `max_results` matches and truncating each
    /// matched line to `GREP_LINE_TRUNCATE` characters.
    ///
    /// Open question (spec §9): whether grep should offer a
    /// case-sensitive mode is left unresolved in the distilled spec.
    /// This implementation always matches case-insensitively, mirroring
    /// the one worked example in spec §8 ("grep for `TODO`" matching
    /// `// todo:`) — a caller needing exact case can pre-filter results.
    pub fn grep(&self, root: &Path, pattern: &str, max_results: usize) -> Result<Vec<GrepMatch>> {
        let re = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::invalid_spec(pattern.to_string(), e.to_string()))?;

        let mut out = Vec::new();
        'walk: for entry in ignore::WalkBuilder::new(root).hidden(false).git_ignore(false).build() {
            let entry = entry.map_err(|e| Error::file_read(root.display().to_string(), e.to_string()))?;
            let path = entry.path();
            let is_min_js = path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.ends_with(".min.js"));
            if !path.is_file() || is_ignored(path) || is_min_js {
                continue;
            }
            let Ok(content) = std::fs::read_to_string(path) else { continue };
            let rel = path.strip_prefix(root).unwrap_or(path).to_string_lossy().replace('\\', "/");
            for (i, line) in content.lines().enumerate() {
                if re.is_match(line) {
                    let trimmed = line.trim();
                    let text = if trimmed.chars().count() > GREP_LINE_TRUNCATE {
                        trimmed.chars().take(GREP_LINE_TRUNCATE).collect::<String>() + "…"
                    } else {
                        trimmed.to_string()
                    };
                    out.push(GrepMatch { file: rel.clone(), line: (i + 1) as u32, content: text });
                    if out.len() >= max_results {
                        break 'walk;
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Directories never surfaced by `glob`, `tree`, or `grep` — build
/// output and VCS metadata, mirroring the chunker's own enumeration
/// skip-list so results stay consistent across tools.
fn is_ignored(path: &Path) -> bool {
    const SKIP: &[&str] = &[".git", "node_modules", "target", "dist", "build", ".venv", "__pycache__"];
    path.components().any(|c| SKIP.contains(&c.as_os_str().to_string_lossy().as_ref()))
}

/// Recursively build a `TreeNode` for `path` (relative to `root`, used
/// for pattern matching). Returns `None` for a directory whose subtree
/// holds nothing matching `pattern` (directories are themselves pruned
/// rather than listed empty), so the caller can fall back to an empty
/// root node when the whole tree is filtered away.
fn build_tree_node(
    root: &Path,
    path: &Path,
    name: &str,
    depth: Option<u32>,
    pattern: Option<&glob::Pattern>,
) -> Result<Option<TreeNode>> {
    if path != root && is_ignored(path) {
        return Ok(None);
    }

    if path.is_dir() {
        if depth == Some(0) {
            return Ok(None);
        }
        let next_depth = depth.map(|d| d - 1);
        let mut entries: Vec<PathBuf> = std::fs::read_dir(path)
            .map_err(|e| Error::file_read(path.display().to_string(), e.to_string()))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        entries.sort();

        let mut children = Vec::new();
        for child in entries {
            let child_name = child.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            if let Some(node) = build_tree_node(root, &child, &child_name, next_depth, pattern)? {
                children.push(node);
            }
        }
        if children.is_empty() && pattern.is_some() {
            return Ok(None);
        }
        Ok(Some(TreeNode { name: name.to_string(), node_type: TreeNodeType::Dir, children: Some(children) }))
    } else {
        if let Some(pat) = pattern {
            let rel = path.strip_prefix(root).unwrap_or(path).to_string_lossy().replace('\\', "/");
            if !pat.matches(&rel) {
                return Ok(None);
            }
        }
        Ok(Some(TreeNode { name: name.to_string(), node_type: TreeNodeType::File, children: None }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn setup() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/lib.rs"), "// TODO: fix this\nfn main() {}\n").unwrap();
        fs::create_dir_all(dir.path().join("node_modules/dep")).unwrap();
        fs::write(dir.path().join("node_modules/dep/index.js"), "TODO noise").unwrap();
        dir
    }

    #[test]
    fn resolve_rejects_traversal() {
        let dir = setup();
        let fa = FileAccess::new();
        assert!(fa.resolve(dir.path(), "src/lib.rs").is_ok());
        assert!(fa.resolve(dir.path(), "../../etc/passwd").is_err());
    }

    #[tokio::test]
    async fn reads_file_contents() {
        let dir = setup();
        let fa = FileAccess::new();
        let content = fa.read(dir.path(), "src/lib.rs").await.unwrap();
        assert!(content.contains("TODO"));
    }

    #[test]
    fn grep_skips_ignored_dirs() {
        let dir = setup();
        let fa = FileAccess::new();
        let hits = fa.grep(dir.path(), "todo", 100).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].file, "src/lib.rs");
    }

    #[test]
    fn grep_skips_minified_js() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.min.js"), "match\n").unwrap();
        fs::write(dir.path().join("app.js"), "match\n").unwrap();
        let fa = FileAccess::new();
        let hits = fa.grep(dir.path(), "match", 100).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].file, "app.js");
    }

    #[test]
    fn grep_respects_max_results() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "match\nmatch\nmatch\n").unwrap();
        let fa = FileAccess::new();
        let hits = fa.grep(dir.path(), "match", 2).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn glob_finds_matching_files() {
        let dir = setup();
        let fa = FileAccess::new();
        let matches = fa.glob(dir.path(), "src/*.rs").unwrap();
        assert_eq!(matches, vec!["src/lib.rs".to_string()]);
    }

    #[test]
    fn grep_match_carries_content_field() {
        let dir = setup();
        let fa = FileAccess::new();
        let hits = fa.grep(dir.path(), "todo", 100).unwrap();
        assert_eq!(hits[0].content, "// TODO: fix this");
    }

    #[test]
    fn tree_skips_ignored_dirs_and_nests_children() {
        let dir = setup();
        let fa = FileAccess::new();
        let root = fa.tree(dir.path(), None, None).unwrap();
        assert_eq!(root.node_type, TreeNodeType::Dir);
        let names: Vec<&str> = root.children.as_ref().unwrap().iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"src"));
        assert!(!names.contains(&"node_modules"));
    }

    #[test]
    fn tree_respects_depth_limit() {
        let dir = setup();
        let fa = FileAccess::new();
        let root = fa.tree(dir.path(), Some(1), None).unwrap();
        let src = root.children.as_ref().unwrap().iter().find(|c| c.name == "src").unwrap();
        assert!(src.children.as_ref().unwrap().is_empty());
    }

    #[test]
    fn tree_pattern_prunes_unmatched_branches() {
        let dir = setup();
        let fa = FileAccess::new();
        let root = fa.tree(dir.path(), None, Some("src/*.rs")).unwrap();
        let names: Vec<&str> = root.children.as_ref().unwrap().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["src"]);
    }
}
