//! The `Fetcher` port (spec §3, §6): resolves a spec string to a
//! registry package or a git repository and lands it on disk.

use crate::error::Result;
use crate::source::SourceKind;
use async_trait::async_trait;

/// A parsed fetch-spec string (spec §6 grammar), before any network or
/// disk activity. `resolve(spec)` returns this; `fetch` consumes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSpec {
    /// Which kind of source this resolves to.
    pub kind: SourceKind,
    /// The resolved `name` (bare package name, or `host/owner/repo`).
    pub name: String,
    /// Registry version or git ref, if the spec pinned one.
    pub version_or_ref: Option<String>,
}

/// One record in a `fetch` call's result list.
#[derive(Debug, Clone)]
pub struct FetchedSource {
    /// The resolved source name.
    pub name: String,
    /// On-disk path, relative to the data root.
    pub path: String,
    /// `true` if this source was already present and this call was a no-op.
    pub already_existed: bool,
}

/// External collaborator: registry resolution and git clone. The core
/// treats this as a leaf dependency — `opensrc-providers::fetcher`
/// implements it with a real (if modest) npm/PyPI/crates.io/git
/// backend, per spec §1's framing of fetch as "an external Fetcher".
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Parse a spec string into its components without touching the
    /// network or the filesystem.
    fn resolve(&self, spec: &str) -> Result<ParsedSpec>;

    /// Fetch one already-parsed spec, placing its content under `root`.
    /// Returns `already_existed = true` without re-fetching if a
    /// matching source directory is already populated.
    async fn fetch_one(&self, root: &std::path::Path, parsed: &ParsedSpec) -> Result<FetchedSource>;
}

/// Parse the spec grammar from spec.md §6:
///
/// ```text
/// spec := bareName [ "@" version ]
///       | "npm:" name [ "@" version ]
///       | ("pypi:"|"pip:") name [ "==" version ]
///       | ("crates:"|"cargo:") name [ "@" version ]
///       | "github:" owner "/" repo [ "@" ref ]
///       | "gitlab:" owner "/" repo [ "@" ref ]
///       | owner "/" repo [ "@" ref ]      (* GitHub default *)
/// ```
///
/// Split out as a free function (rather than a method with no `self`
/// dependency) so both `Fetcher::resolve` implementations and the
/// sandbox API's `resolve()` call share one parser and so it is
/// unit-testable without a `Fetcher` instance at all.
pub fn parse_spec(spec: &str) -> Result<ParsedSpec> {
    use crate::error::Error;

    let spec = spec.trim();
    if spec.is_empty() {
        return Err(Error::invalid_spec(spec, "empty spec"));
    }

    if let Some(rest) = spec.strip_prefix("npm:") {
        let (name, version) = split_at_sep(rest, '@');
        return Ok(ParsedSpec { kind: SourceKind::Npm, name: name.to_string(), version_or_ref: version });
    }
    if let Some(rest) = spec.strip_prefix("pypi:").or_else(|| spec.strip_prefix("pip:")) {
        let (name, version) = split_at_sep(rest, '=');
        // PyPI specs use `==`; strip a second leading `=` if present.
        let version = version.map(|v| v.trim_start_matches('=').to_string());
        return Ok(ParsedSpec { kind: SourceKind::Pypi, name: name.to_string(), version_or_ref: version });
    }
    if let Some(rest) = spec.strip_prefix("crates:").or_else(|| spec.strip_prefix("cargo:")) {
        let (name, version) = split_at_sep(rest, '@');
        return Ok(ParsedSpec { kind: SourceKind::Crates, name: name.to_string(), version_or_ref: version });
    }
    if let Some(rest) = spec.strip_prefix("github:") {
        return parse_owner_repo(rest, spec);
    }
    if let Some(rest) = spec.strip_prefix("gitlab:") {
        return parse_owner_repo(rest, spec).map(|mut p| {
            p.name = format!("gitlab.com/{}", p.name.trim_start_matches("github.com/"));
            p
        });
    }
    if spec.contains('/') {
        // Bare `owner/repo[@ref]` defaults to GitHub.
        return parse_owner_repo(spec, spec);
    }

    // Bare package name: ambiguous across registries by design (spec
    // leaves resolution order to the Fetcher); we treat it as npm,
    // the most common case, matching the worked example in spec §8.
    let (name, version) = split_at_sep(spec, '@');
    Ok(ParsedSpec { kind: SourceKind::Npm, name: name.to_string(), version_or_ref: version })
}

fn split_at_sep(s: &str, sep: char) -> (&str, Option<String>) {
    match s.split_once(sep) {
        Some((name, version)) if !version.is_empty() => (name, Some(version.to_string())),
        _ => (s, None),
    }
}

fn parse_owner_repo(rest: &str, original: &str) -> Result<ParsedSpec> {
    use crate::error::Error;
    let (owner_repo, r#ref) = split_at_sep(rest, '@');
    let mut parts = owner_repo.splitn(2, '/');
    let owner = parts.next().filter(|s| !s.is_empty());
    let repo = parts.next().filter(|s| !s.is_empty());
    match (owner, repo) {
        (Some(owner), Some(repo)) => Ok(ParsedSpec {
            kind: SourceKind::Repo,
            name: format!("github.com/{owner}/{repo}"),
            version_or_ref: r#ref,
        }),
        _ => Err(Error::invalid_spec(original, "expected owner/repo")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_github_shorthand() {
        let p = parse_spec("facebook/react@main").unwrap();
        assert_eq!(p.kind, SourceKind::Repo);
        assert_eq!(p.name, "github.com/facebook/react");
        assert_eq!(p.version_or_ref.as_deref(), Some("main"));
    }

    #[test]
    fn parses_npm_with_version() {
        let p = parse_spec("npm:zod@3.22.4").unwrap();
        assert_eq!(p.kind, SourceKind::Npm);
        assert_eq!(p.name, "zod");
        assert_eq!(p.version_or_ref.as_deref(), Some("3.22.4"));
    }

    #[test]
    fn parses_pypi_double_equals() {
        let p = parse_spec("pypi:requests==2.31.0").unwrap();
        assert_eq!(p.kind, SourceKind::Pypi);
        assert_eq!(p.name, "requests");
        assert_eq!(p.version_or_ref.as_deref(), Some("2.31.0"));
    }

    #[test]
    fn parses_crates_shorthand() {
        let p = parse_spec("cargo:serde@1.0").unwrap();
        assert_eq!(p.kind, SourceKind::Crates);
        assert_eq!(p.name, "serde");
    }

    #[test]
    fn parses_gitlab_prefixed() {
        let p = parse_spec("gitlab:gitlab-org/gitlab").unwrap();
        assert_eq!(p.kind, SourceKind::Repo);
        assert_eq!(p.name, "gitlab.com/gitlab-org/gitlab");
    }

    #[test]
    fn rejects_empty_spec() {
        assert!(parse_spec("").is_err());
    }

    #[test]
    fn rejects_malformed_owner_repo() {
        assert!(parse_spec("github:onlyowner").is_err());
    }
}
