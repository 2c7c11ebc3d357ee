//! `RealFetcher` (spec §3, §6): resolves a fetch-spec string against
//! npm, PyPI, crates.io, or a git host, and lands the result on disk.

mod archive;
mod git;
mod registries;

use opensrc_domain::error::{Error, Result};
use opensrc_domain::ports::{parse_spec, FetchedSource, ParsedSpec};
use opensrc_domain::source::SourceKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::FETCH_HTTP_TIMEOUT_SECS;

pub struct RealFetcher {
    client: reqwest::Client,
}

impl RealFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_HTTP_TIMEOUT_SECS))
            .user_agent(format!("opensrc/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::fetch("<client>", format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    fn dest_path(root: &Path, parsed: &ParsedSpec) -> PathBuf {
        let relative = relative_path(parsed);
        root.join(relative)
    }
}

/// Path (relative to the data root) a fetched source lands at, matching
/// `Source::path`'s documented convention: `packages/<registry>/<name>/…`
/// for registry packages, `repos/<host>/<owner>/<name>` for repos.
fn relative_path(parsed: &ParsedSpec) -> String {
    match parsed.kind {
        SourceKind::Npm => format!("packages/npm/{}", parsed.name),
        SourceKind::Pypi => format!("packages/pypi/{}", parsed.name),
        SourceKind::Crates => format!("packages/crates/{}", parsed.name),
        SourceKind::Repo => format!("repos/{}", parsed.name),
    }
}

#[async_trait::async_trait]
impl opensrc_domain::ports::Fetcher for RealFetcher {
    fn resolve(&self, spec: &str) -> Result<ParsedSpec> {
        parse_spec(spec)
    }

    async fn fetch_one(&self, root: &Path, parsed: &ParsedSpec) -> Result<FetchedSource> {
        let dest = Self::dest_path(root, parsed);
        let relative = relative_path(parsed);

        if dir_is_populated(&dest) {
            return Ok(FetchedSource { name: parsed.name.clone(), path: relative, already_existed: true });
        }

        tokio::fs::create_dir_all(&dest)
            .await
            .map_err(|e| Error::fetch(&parsed.name, format!("failed to create destination directory: {e}")))?;

        let result = match parsed.kind {
            SourceKind::Npm => registries::fetch_npm(&self.client, parsed, &dest).await,
            SourceKind::Pypi => registries::fetch_pypi(&self.client, parsed, &dest).await,
            SourceKind::Crates => registries::fetch_crate(&self.client, parsed, &dest).await,
            SourceKind::Repo => git::clone(parsed, &dest).await,
        };

        if let Err(e) = result {
            let _ = tokio::fs::remove_dir_all(&dest).await;
            return Err(e);
        }

        Ok(FetchedSource { name: parsed.name.clone(), path: relative, already_existed: false })
    }
}

fn dir_is_populated(dir: &Path) -> bool {
    std::fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use opensrc_domain::source::SourceKind;

    #[test]
    fn relative_path_follows_the_documented_convention() {
        let npm = ParsedSpec { kind: SourceKind::Npm, name: "zod".to_string(), version_or_ref: None };
        assert_eq!(relative_path(&npm), "packages/npm/zod");

        let repo =
            ParsedSpec { kind: SourceKind::Repo, name: "github.com/facebook/react".to_string(), version_or_ref: None };
        assert_eq!(relative_path(&repo), "repos/github.com/facebook/react");
    }

    #[test]
    fn resolve_delegates_to_the_shared_parser() {
        use opensrc_domain::ports::Fetcher;
        let fetcher = RealFetcher::new().unwrap();
        let parsed = fetcher.resolve("npm:zod@3.22.4").unwrap();
        assert_eq!(parsed.name, "zod");
    }

    #[test]
    fn empty_dir_counts_as_not_populated() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(!dir_is_populated(tmp.path()));
    }
}
