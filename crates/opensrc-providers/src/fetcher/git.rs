//! Git host backend: shells out to the system `git` binary rather than
//! vendoring `libgit2` bindings — a shallow `git clone` is all fetch
//! needs, and the workspace already depends on `reqwest` for the
//! registry backends, not a git library.

use opensrc_domain::error::{Error, Result};
use opensrc_domain::ports::ParsedSpec;
use std::path::Path;
use tokio::process::Command;

/// Shallow-clone `parsed`'s repository into `dest`, then drop its
/// `.git` directory — only the tree is kept resident, per spec §1's
/// framing of git clone as an external collaborator whose result is
/// "a local directory for a package spec", not a live git checkout.
pub async fn clone(parsed: &ParsedSpec, dest: &Path) -> Result<()> {
    let url = clone_url(&parsed.name);

    let mut cmd = Command::new("git");
    cmd.arg("clone").arg("--depth").arg("1").arg("--quiet");
    if let Some(r#ref) = &parsed.version_or_ref {
        cmd.arg("--branch").arg(r#ref);
    }
    cmd.arg(&url).arg(dest);

    let output = cmd.output().await.map_err(|e| Error::fetch(&parsed.name, format!("failed to spawn git: {e}")))?;
    if !output.status.success() {
        return Err(Error::fetch(&parsed.name, format!("git clone failed: {}", String::from_utf8_lossy(&output.stderr))));
    }

    let git_dir = dest.join(".git");
    if git_dir.exists() {
        tokio::fs::remove_dir_all(&git_dir).await.map_err(|e| Error::fetch(&parsed.name, format!("failed to prune .git: {e}")))?;
    }
    Ok(())
}

/// `name` is already normalized to `host/owner/repo` (spec §3); turn it
/// back into an HTTPS clone URL for the host git understands.
fn clone_url(name: &str) -> String {
    format!("https://{name}.git")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_url_adds_https_and_git_suffix() {
        assert_eq!(clone_url("github.com/facebook/react"), "https://github.com/facebook/react.git");
    }
}
