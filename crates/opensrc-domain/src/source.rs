//! `Source` — one ingested artifact (a registry package or a git
//! repository) and its indexing lifecycle.

use serde::{Deserialize, Serialize};

/// Which external collaborator produced a `Source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// An npm package.
    Npm,
    /// A PyPI package.
    Pypi,
    /// A crates.io package.
    Crates,
    /// A cloned git repository.
    Repo,
}

impl SourceKind {
    /// Short lowercase tag used in manifest JSON and log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Pypi => "pypi",
            Self::Crates => "crates",
            Self::Repo => "repo",
        }
    }
}

/// One ingested artifact.
///
/// Invariants (spec §3): `name` is unique within the registry; `path`
/// resolves inside the data root; the directory at `path` exists for
/// every entry actually present in the registry — a `Source` is only
/// visible here once its directory is fully populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Registry package vs. git repository.
    #[serde(rename = "type")]
    pub kind: SourceKind,

    /// Globally unique identifier. For registries: the bare package
    /// name. For repos: `host/owner/repo`.
    pub name: String,

    /// Registry version string, or git ref, whichever applies.
    pub version: String,

    /// On-disk directory holding the fetched tree, relative to the data
    /// root (`packages/<registry>/<name>/…` or `repos/<host>/<owner>/<name>/…`).
    pub path: String,

    /// When this source was (re-)fetched.
    pub fetched_at: chrono::DateTime<chrono::Utc>,
}

impl Source {
    /// Build a new `Source` record stamped with the current time.
    pub fn new(kind: SourceKind, name: impl Into<String>, version: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            version: version.into(),
            path: path.into(),
            fetched_at: chrono::Utc::now(),
        }
    }
}

/// Per-source indexing lifecycle state (spec §4.5).
///
/// ```text
/// unknown --enqueue--> queued --schedule--> indexing --finalize--> indexed
///                         |                    |
///                         +---- drop (dup) ----+
///                                             `--- error ---> unknown
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceIndexState {
    /// Never queued, or a previous run errored and left no checkpoint.
    Unknown,
    /// Waiting for an indexing slot.
    Queued,
    /// Actively being chunked/embedded/inserted.
    Indexing,
    /// `markIndexed` has completed; safe to query.
    Indexed,
}
