//! Data-directory resolution (spec §6): `$OPENSRC_DIR`, then
//! `$XDG_DATA_HOME/opensrc`, then `$HOME/.local/share/opensrc`.

use std::env;
use std::path::PathBuf;

/// Resolve the data root, honoring an explicit override (e.g. `--data-dir`)
/// ahead of the environment chain.
pub fn resolve_data_dir(override_path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = override_path {
        return path;
    }
    if let Ok(dir) = env::var("OPENSRC_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    if let Ok(xdg) = env::var("XDG_DATA_HOME") {
        if !xdg.is_empty() {
            return PathBuf::from(xdg).join("opensrc");
        }
    }
    let home = env::var("HOME").map(PathBuf::from).ok().or_else(dirs::home_dir).unwrap_or_default();
    home.join(".local").join("share").join("opensrc")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins_over_everything() {
        let resolved = resolve_data_dir(Some(PathBuf::from("/tmp/explicit")));
        assert_eq!(resolved, PathBuf::from("/tmp/explicit"));
    }
}
