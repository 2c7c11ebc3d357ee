//! `SandboxApi` (spec §4.7, §6): the `opensrc` object's operations,
//! each returning a `serde_json::Value` so the one JS bridge in
//! `sandbox.rs` can hand every result to the script the same way —
//! `JSON.parse` the Rust-computed JSON rather than a bespoke `IntoJs`
//! impl per return shape.

use crate::app::App;
use opensrc_application::query_planner::SearchOutcome;
use opensrc_domain::error::{Error, Result};
use opensrc_domain::ports::ParsedSpec;
use opensrc_domain::source::{Source, SourceIndexState, SourceKind};
use serde_json::{Value, json};
use std::sync::Arc;

/// Thin facade translating the sandbox's flat, JSON-friendly calls
/// into the application layer's typed operations.
pub struct SandboxApi {
    app: Arc<App>,
}

impl SandboxApi {
    pub fn new(app: Arc<App>) -> Self {
        Self { app }
    }

    pub fn list(&self) -> Value {
        json!(self.app.registry.list())
    }

    pub fn has(&self, name: &str, version: Option<&str>) -> Value {
        json!(self.app.registry.has(name, version))
    }

    pub fn get(&self, name: &str) -> Value {
        json!(self.app.registry.get(name))
    }

    pub fn files(&self, source: &str, pattern: Option<&str>) -> Result<Value> {
        let root = self.app.source_root(source)?;
        let matches = self.app.file_access.glob(&root, pattern.unwrap_or("**/*"))?;
        let entries: Vec<Value> = matches
            .into_iter()
            .map(|path| {
                let full = root.join(&path);
                let size = std::fs::metadata(&full).map(|m| m.len()).unwrap_or(0);
                json!({"path": path, "size": size, "isDirectory": false})
            })
            .collect();
        Ok(json!(entries))
    }

    pub fn tree(&self, source: &str, depth: Option<u32>, pattern: Option<&str>) -> Result<Value> {
        let root = self.app.source_root(source)?;
        let node = self.app.file_access.tree(&root, depth, pattern)?;
        Ok(json!(node))
    }

    pub async fn read(&self, source: &str, path: &str) -> Result<Value> {
        let root = self.app.source_root(source)?;
        let content = self.app.file_access.read(&root, path).await?;
        Ok(json!(content))
    }

    pub async fn read_many(&self, source: &str, paths: Vec<String>) -> Result<Value> {
        let root = self.app.source_root(source)?;
        let results = self.app.file_access.read_many(&root, &paths).await;
        let map: serde_json::Map<String, Value> = results
            .into_iter()
            .map(|(path, result)| {
                let value = match result {
                    Ok(content) => Value::String(content),
                    Err(e) => Value::String(format!("[Error: {e}]")),
                };
                (path, value)
            })
            .collect();
        Ok(Value::Object(map))
    }

    /// `sources` defaults to every registered source when omitted.
    /// `include` is an optional glob applied to the matched file path.
    pub fn grep(
        &self,
        pattern: &str,
        sources: Option<Vec<String>>,
        include: Option<&str>,
        max_results: Option<usize>,
    ) -> Result<Value> {
        let targets = sources.unwrap_or_else(|| self.app.registry.list().into_iter().map(|s| s.name).collect());
        let include_glob = include.map(glob::Pattern::new).transpose().map_err(|e| Error::invalid_spec(pattern, e.to_string()))?;
        let cap = max_results.unwrap_or(opensrc_domain::constants::DEFAULT_GREP_MAX_RESULTS);

        let mut out = Vec::new();
        'sources: for name in targets {
            let Ok(root) = self.app.source_root(&name) else { continue };
            let remaining = cap.saturating_sub(out.len());
            if remaining == 0 {
                break;
            }
            let matches = self.app.query_planner.grep(&root, pattern, Some(remaining))?;
            for m in matches {
                if let Some(g) = &include_glob {
                    if !g.matches(&m.file) {
                        continue;
                    }
                }
                out.push(json!({"source": name, "file": m.file, "line": m.line, "content": m.content}));
                if out.len() >= cap {
                    break 'sources;
                }
            }
        }
        Ok(json!(out))
    }

    /// `lang` accepts either one language name or several (spec §6:
    /// `lang: string | string[]`); an empty list means no restriction.
    pub fn ast_grep(
        &self,
        source: &str,
        pattern: &str,
        glob_pattern: Option<&str>,
        langs: &[String],
        limit: Option<usize>,
    ) -> Result<Value> {
        let root = self.app.source_root(source)?;
        let cap = limit.unwrap_or(opensrc_domain::constants::DEFAULT_AST_GREP_LIMIT);
        let matches = self.app.query_planner.ast_grep(&root, pattern, Some(cap), glob_pattern, langs)?;
        Ok(json!(matches))
    }

    pub async fn semantic_search(&self, query: &str, sources: Option<Vec<String>>, top_k: Option<usize>) -> Result<Value> {
        let source_names = sources.unwrap_or_else(|| self.app.registry.list().into_iter().map(|s| s.name).collect());
        let engine = Arc::clone(&self.app.index_engine);
        let any_indexing = engine.any_indexing();
        let outcome = self
            .app
            .query_planner
            .semantic_search(query, &source_names, |name| engine.state(name), any_indexing, top_k)
            .await?;
        Ok(match outcome {
            SearchOutcome::Hits(hits) => json!(hits),
            SearchOutcome::NotReady { error, sources } => {
                let tag = match error {
                    opensrc_application::query_planner::NotReadyReason::NotIndexed => "not_indexed",
                    opensrc_application::query_planner::NotReadyReason::Indexing => "indexing",
                };
                json!({"error": tag, "sources": sources})
            }
        })
    }

    pub fn resolve(&self, spec: &str) -> Result<Value> {
        let parsed = self.app.fetcher.resolve(spec)?;
        Ok(parsed_spec_json(&parsed))
    }

    /// `modify`, when `true`, forces a re-fetch of a spec whose
    /// destination directory already exists — an addition not spelled
    /// out in spec §6 beyond naming the parameter; documented as an
    /// open-question resolution in DESIGN.md.
    pub async fn fetch(&self, specs: Vec<String>, modify: bool) -> Result<Value> {
        let mut out = Vec::with_capacity(specs.len());
        for spec in specs {
            match self.fetch_one(&spec, modify).await {
                Ok(value) => out.push(value),
                Err(e) => out.push(json!({"spec": spec, "error": e.to_string()})),
            }
        }
        Ok(json!(out))
    }

    async fn fetch_one(&self, spec: &str, modify: bool) -> Result<Value> {
        let parsed = self.app.fetcher.resolve(spec)?;
        let dest = self.app.data_dir.join(relative_path(&parsed));
        if modify && dest.exists() {
            tokio::fs::remove_dir_all(&dest).await?;
        }

        let fetched = self.app.fetcher.fetch_one(&self.app.data_dir, &parsed).await?;
        let version = parsed.version_or_ref.clone().unwrap_or_else(|| "latest".to_string());
        let source = Source::new(parsed.kind, fetched.name.clone(), version, fetched.path.clone());
        self.app.registry.upsert(source).await?;

        if !fetched.already_existed {
            self.app.index_engine.enqueue(fetched.name.clone(), self.app.data_dir.join(&fetched.path));
        }

        Ok(json!({"name": fetched.name, "path": fetched.path, "alreadyExisted": fetched.already_existed}))
    }

    pub async fn remove(&self, names: Vec<String>) -> Result<Value> {
        let removed = self.app.registry.remove(&names).await?;
        for name in &removed {
            let _ = self.app.store.delete_source(name).await;
            self.app.index_engine.set_state(name, SourceIndexState::Unknown);
        }
        Ok(json!({"success": true, "removed": removed}))
    }

    pub async fn clean(&self, packages: bool, repos: bool, npm: bool, pypi: bool, crates: bool) -> Result<Value> {
        let mut kinds = Vec::new();
        if packages {
            kinds.extend([SourceKind::Npm, SourceKind::Pypi, SourceKind::Crates]);
        }
        if npm {
            kinds.push(SourceKind::Npm);
        }
        if pypi {
            kinds.push(SourceKind::Pypi);
        }
        if crates {
            kinds.push(SourceKind::Crates);
        }
        if repos {
            kinds.push(SourceKind::Repo);
        }
        kinds.dedup();

        let removed = self.app.registry.clean(&kinds).await?;
        for name in &removed {
            let _ = self.app.store.delete_source(name).await;
            self.app.index_engine.set_state(name, SourceIndexState::Unknown);
        }
        Ok(json!({"success": true, "removed": removed}))
    }
}

fn relative_path(parsed: &ParsedSpec) -> String {
    match parsed.kind {
        SourceKind::Npm => format!("packages/npm/{}", parsed.name),
        SourceKind::Pypi => format!("packages/pypi/{}", parsed.name),
        SourceKind::Crates => format!("packages/crates/{}", parsed.name),
        SourceKind::Repo => format!("repos/{}", parsed.name),
    }
}

fn parsed_spec_json(parsed: &ParsedSpec) -> Value {
    json!({
        "kind": parsed.kind.as_str(),
        "name": parsed.name,
        "version": parsed.version_or_ref,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_path_matches_fetcher_convention() {
        let parsed = ParsedSpec { kind: SourceKind::Npm, name: "zod".to_string(), version_or_ref: None };
        assert_eq!(relative_path(&parsed), "packages/npm/zod");
    }
}
