//! `SourceRegistry` (spec §4.8, §6): the in-memory, manifest-backed list
//! of ingested sources.
//!
//! The in-memory list is authoritative during a session; every mutation
//! (fetch adding an entry, remove/clean deleting one) writes through to
//! `sources.json` before returning, so a crash between mutation and
//! shutdown loses at most the in-flight call, never a prior one.

use chrono::{DateTime, Utc};
use opensrc_domain::error::{Error, Result};
use opensrc_domain::source::{Source, SourceKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// On-disk manifest shape (spec §6): registry packages and git repos
/// kept in separate arrays, plus a last-write timestamp.
///
/// Open question (spec §9): the original's manifest writer mixes a
/// normalized field set with one mirroring an external fetcher's own
/// schema, and doesn't say which wins under concurrent writes. This
/// implementation has no concurrent external writer — the registry
/// itself is the only writer of `sources.json` — so it always emits
/// (and expects to read) the single normalized shape below.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    #[serde(default)]
    packages: Vec<Source>,
    #[serde(default)]
    repos: Vec<Source>,
    #[serde(default = "Utc::now")]
    updated_at: DateTime<Utc>,
}

impl Manifest {
    fn from_sources(sources: &HashMap<String, Source>) -> Self {
        let mut packages = Vec::new();
        let mut repos = Vec::new();
        for s in sources.values() {
            match s.kind {
                SourceKind::Repo => repos.push(s.clone()),
                _ => packages.push(s.clone()),
            }
        }
        packages.sort_by(|a, b| a.name.cmp(&b.name));
        repos.sort_by(|a, b| a.name.cmp(&b.name));
        Self { packages, repos, updated_at: Utc::now() }
    }

    fn into_sources(self) -> HashMap<String, Source> {
        self.packages
            .into_iter()
            .chain(self.repos)
            .map(|s| (s.name.clone(), s))
            .collect()
    }
}

/// The registry of ingested sources, mirrored to `manifest_path`.
pub struct SourceRegistry {
    manifest_path: PathBuf,
    sources: RwLock<HashMap<String, Source>>,
}

impl SourceRegistry {
    /// Load the registry from `manifest_path`, tolerating a missing
    /// file (treated as an empty registry — the common case on first
    /// run).
    pub async fn load(manifest_path: impl Into<PathBuf>) -> Result<Self> {
        let manifest_path = manifest_path.into();
        let sources = match tokio::fs::read_to_string(&manifest_path).await {
            Ok(raw) => {
                let manifest: Manifest = serde_json::from_str(&raw)?;
                manifest.into_sources()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(Error::io(format!("reading {}: {e}", manifest_path.display()))),
        };
        Ok(Self { manifest_path, sources: RwLock::new(sources) })
    }

    /// Persist the current in-memory state to `manifest_path`. Called
    /// after every mutation, and once more on shutdown for good measure.
    pub async fn save(&self) -> Result<()> {
        let manifest = {
            let guard = self.sources.read().expect("registry lock poisoned");
            Manifest::from_sources(&guard)
        };
        if let Some(parent) = self.manifest_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&manifest)?;
        tokio::fs::write(&self.manifest_path, json).await?;
        Ok(())
    }

    /// All known sources, in no particular order.
    pub fn list(&self) -> Vec<Source> {
        self.sources.read().expect("registry lock poisoned").values().cloned().collect()
    }

    /// Look up one source by name.
    pub fn get(&self, name: &str) -> Option<Source> {
        self.sources.read().expect("registry lock poisoned").get(name).cloned()
    }

    /// `true` if `name` (optionally pinned to `version`) is registered.
    pub fn has(&self, name: &str, version: Option<&str>) -> bool {
        let guard = self.sources.read().expect("registry lock poisoned");
        match guard.get(name) {
            Some(s) => version.is_none_or(|v| s.version == v),
            None => false,
        }
    }

    /// Insert or replace a source, then write through to the manifest.
    /// A re-fetch of an existing name replaces it in place (spec §3:
    /// "mutated only by re-fetch (replace in place) or remove").
    pub async fn upsert(&self, source: Source) -> Result<()> {
        self.sources.write().expect("registry lock poisoned").insert(source.name.clone(), source);
        self.save().await
    }

    /// Remove the named sources, returning which ones actually existed.
    /// Idempotent: removing a name twice is a no-op the second time.
    pub async fn remove(&self, names: &[String]) -> Result<Vec<String>> {
        let removed: Vec<String> = {
            let mut guard = self.sources.write().expect("registry lock poisoned");
            names.iter().filter(|n| guard.remove(n.as_str()).is_some()).cloned().collect()
        };
        if !removed.is_empty() {
            self.save().await?;
        }
        Ok(removed)
    }

    /// Remove every source matching the given kind filters. An empty
    /// filter set matches nothing (callers ask for at least one kind);
    /// `None` for a given flag means "don't filter on this axis".
    pub async fn clean(&self, kinds: &[SourceKind]) -> Result<Vec<String>> {
        let removed: Vec<String> = {
            let mut guard = self.sources.write().expect("registry lock poisoned");
            let to_remove: Vec<String> = guard
                .values()
                .filter(|s| kinds.contains(&s.kind))
                .map(|s| s.name.clone())
                .collect();
            for name in &to_remove {
                guard.remove(name);
            }
            to_remove
        };
        if !removed.is_empty() {
            self.save().await?;
        }
        Ok(removed)
    }

    /// Resolve `name` to its on-disk directory, joined under `data_root`.
    pub fn resolve_path(&self, data_root: &Path, name: &str) -> Option<PathBuf> {
        self.get(name).map(|s| data_root.join(s.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opensrc_domain::source::SourceKind;

    #[tokio::test]
    async fn roundtrips_through_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = dir.path().join("sources.json");

        let registry = SourceRegistry::load(&manifest_path).await.unwrap();
        assert!(registry.list().is_empty());

        let source = Source::new(SourceKind::Npm, "zod", "3.22.4", "packages/npm/zod");
        registry.upsert(source).await.unwrap();
        assert!(registry.has("zod", None));
        assert!(registry.has("zod", Some("3.22.4")));
        assert!(!registry.has("zod", Some("1.0.0")));

        let reloaded = SourceRegistry::load(&manifest_path).await.unwrap();
        assert_eq!(reloaded.list().len(), 1);
        assert_eq!(reloaded.get("zod").unwrap().version, "3.22.4");
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SourceRegistry::load(dir.path().join("sources.json")).await.unwrap();
        registry
            .upsert(Source::new(SourceKind::Npm, "zod", "3.22.4", "packages/npm/zod"))
            .await
            .unwrap();

        let removed = registry.remove(&["zod".to_string()]).await.unwrap();
        assert_eq!(removed, vec!["zod".to_string()]);
        assert!(registry.list().is_empty());

        let removed_again = registry.remove(&["zod".to_string()]).await.unwrap();
        assert!(removed_again.is_empty());
    }

    #[tokio::test]
    async fn clean_filters_by_kind() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SourceRegistry::load(dir.path().join("sources.json")).await.unwrap();
        registry
            .upsert(Source::new(SourceKind::Npm, "zod", "3.22.4", "packages/npm/zod"))
            .await
            .unwrap();
        registry
            .upsert(Source::new(SourceKind::Repo, "github.com/facebook/react", "main", "repos/github.com/facebook/react"))
            .await
            .unwrap();

        let removed = registry.clean(&[SourceKind::Npm]).await.unwrap();
        assert_eq!(removed, vec!["zod".to_string()]);
        assert_eq!(registry.list().len(), 1);
    }
}
