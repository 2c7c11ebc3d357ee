//! Shared archive extraction for the registry fetchers: npm/crates.io
//! ship gzipped tarballs, PyPI ships either a gzipped sdist tarball or
//! a wheel zip.

use opensrc_domain::error::{Error, Result};
use std::path::Path;

/// Extract a `.tar.gz` into `dest`, stripping the first path component
/// (npm tarballs nest everything under `package/`; crates.io crates
/// nest under `<name>-<version>/`).
pub fn extract_tar_gz(bytes: &[u8], dest: &Path, spec_name: &str) -> Result<()> {
    let gz = flate2::read::GzDecoder::new(bytes);
    let mut archive = tar::Archive::new(gz);
    for entry in archive.entries().map_err(|e| Error::fetch(spec_name, format!("bad tarball: {e}")))? {
        let mut entry = entry.map_err(|e| Error::fetch(spec_name, format!("bad tar entry: {e}")))?;
        let path = entry.path().map_err(|e| Error::fetch(spec_name, format!("bad entry path: {e}")))?.into_owned();
        let Some(stripped) = strip_first_component(&path) else { continue };
        if stripped.as_os_str().is_empty() {
            continue;
        }
        let target = dest.join(&stripped);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        entry.unpack(&target).map_err(|e| Error::fetch(spec_name, format!("failed to unpack {}: {e}", stripped.display())))?;
    }
    Ok(())
}

/// Extract a `.zip` (PyPI wheel) into `dest`, keeping the archive's
/// internal layout as-is — wheels don't nest under a version-stamped
/// top-level directory the way sdists and npm tarballs do.
pub fn extract_zip(bytes: &[u8], dest: &Path, spec_name: &str) -> Result<()> {
    let reader = std::io::Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(reader).map_err(|e| Error::fetch(spec_name, format!("bad zip: {e}")))?;
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(|e| Error::fetch(spec_name, format!("bad zip entry: {e}")))?;
        let Some(name) = file.enclosed_name() else { continue };
        let target = dest.join(&name);
        if file.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = std::fs::File::create(&target)?;
        std::io::copy(&mut file, &mut out).map_err(|e| Error::fetch(spec_name, format!("failed to extract {}: {e}", name.display())))?;
    }
    Ok(())
}

fn strip_first_component(path: &Path) -> Option<std::path::PathBuf> {
    let mut components = path.components();
    components.next()?;
    Some(components.as_path().to_path_buf())
}
