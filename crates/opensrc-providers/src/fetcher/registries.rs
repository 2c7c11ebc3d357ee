//! Registry backends: npm, PyPI, crates.io. Each resolves a version
//! (the pinned one, or the registry's "latest"/"max" concept), downloads
//! the one archive that backend publishes, and hands it to
//! `archive::extract_tar_gz`/`extract_zip`.

use opensrc_domain::error::{Error, Result};
use opensrc_domain::ports::ParsedSpec;
use std::path::Path;

use super::archive::{extract_tar_gz, extract_zip};
use crate::constants::{CRATES_IO_BASE, NPM_REGISTRY_BASE, PYPI_BASE};

pub async fn fetch_npm(client: &reqwest::Client, parsed: &ParsedSpec, dest: &Path) -> Result<()> {
    let meta: serde_json::Value = get_json(client, &format!("{NPM_REGISTRY_BASE}/{}", parsed.name), &parsed.name).await?;

    let version = match &parsed.version_or_ref {
        Some(v) => v.clone(),
        None => meta
            .pointer("/dist-tags/latest")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| Error::fetch(&parsed.name, "npm metadata has no dist-tags.latest"))?
            .to_string(),
    };
    let tarball = meta
        .pointer(&format!("/versions/{version}/dist/tarball"))
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| Error::fetch(&parsed.name, format!("npm metadata has no tarball for version {version}")))?;

    let bytes = get_bytes(client, tarball, &parsed.name).await?;
    extract_tar_gz(&bytes, dest, &parsed.name)
}

pub async fn fetch_pypi(client: &reqwest::Client, parsed: &ParsedSpec, dest: &Path) -> Result<()> {
    let url = match &parsed.version_or_ref {
        Some(v) => format!("{PYPI_BASE}/{}/{v}/json", parsed.name),
        None => format!("{PYPI_BASE}/{}/json", parsed.name),
    };
    let meta: serde_json::Value = get_json(client, &url, &parsed.name).await?;

    let urls = meta
        .get("urls")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| Error::fetch(&parsed.name, "PyPI metadata has no urls[]"))?;

    // Prefer an sdist (a tarball we can extract the same way npm/crates
    // tarballs are extracted); fall back to a wheel (a zip) if no sdist
    // was published for this release.
    let sdist = urls.iter().find(|u| u.get("packagetype").and_then(serde_json::Value::as_str) == Some("sdist"));
    let chosen = sdist.or_else(|| urls.first()).ok_or_else(|| Error::fetch(&parsed.name, "PyPI release has no files"))?;
    let download_url = chosen
        .get("url")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| Error::fetch(&parsed.name, "PyPI file entry has no url"))?;

    let bytes = get_bytes(client, download_url, &parsed.name).await?;
    if download_url.ends_with(".whl") || download_url.ends_with(".zip") {
        extract_zip(&bytes, dest, &parsed.name)
    } else {
        extract_tar_gz(&bytes, dest, &parsed.name)
    }
}

pub async fn fetch_crate(client: &reqwest::Client, parsed: &ParsedSpec, dest: &Path) -> Result<()> {
    let version = match &parsed.version_or_ref {
        Some(v) => v.clone(),
        None => {
            let meta: serde_json::Value = get_json(client, &format!("{CRATES_IO_BASE}/{}", parsed.name), &parsed.name).await?;
            meta
                .pointer("/crate/max_stable_version")
                .or_else(|| meta.pointer("/crate/max_version"))
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| Error::fetch(&parsed.name, "crates.io metadata has no max_version"))?
                .to_string()
        }
    };

    let download_url = format!("{CRATES_IO_BASE}/{}/{version}/download", parsed.name);
    let bytes = get_bytes(client, &download_url, &parsed.name).await?;
    extract_tar_gz(&bytes, dest, &parsed.name)
}

async fn get_json(client: &reqwest::Client, url: &str, spec_name: &str) -> Result<serde_json::Value> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::fetch(spec_name, format!("request to {url} failed: {e}")))?
        .error_for_status()
        .map_err(|e| Error::fetch(spec_name, format!("{url} returned an error status: {e}")))?;
    response.json().await.map_err(|e| Error::fetch(spec_name, format!("failed to parse JSON from {url}: {e}")))
}

async fn get_bytes(client: &reqwest::Client, url: &str, spec_name: &str) -> Result<Vec<u8>> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::fetch(spec_name, format!("request to {url} failed: {e}")))?
        .error_for_status()
        .map_err(|e| Error::fetch(spec_name, format!("{url} returned an error status: {e}")))?;
    response.bytes().await.map(|b| b.to_vec()).map_err(|e| Error::fetch(spec_name, format!("failed to download {url}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn npm_tarball_pointer_shape() {
        let meta = serde_json::json!({
            "dist-tags": {"latest": "3.22.4"},
            "versions": {"3.22.4": {"dist": {"tarball": "https://registry.npmjs.org/zod/-/zod-3.22.4.tgz"}}}
        });
        let version = meta.pointer("/dist-tags/latest").and_then(serde_json::Value::as_str).unwrap();
        assert_eq!(version, "3.22.4");
        let tarball = meta.pointer(&format!("/versions/{version}/dist/tarball")).and_then(serde_json::Value::as_str).unwrap();
        assert_eq!(tarball, "https://registry.npmjs.org/zod/-/zod-3.22.4.tgz");
    }
}
