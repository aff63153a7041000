use anyhow::{Context, Result};

use abstutil::prettyprint_usize;

/// Downloads bytes from a URL. This must be called with a tokio runtime somewhere.
pub async fn download_bytes<I: AsRef<str>>(url: I) -> Result<Vec<u8>> {
    let url = url.as_ref();
    let resp = reqwest::get(url)
        .await
        .with_context(|| format!("downloading {}", url))?;
    resp.error_for_status_ref()
        .with_context(|| format!("downloading {}", url))?;
    let bytes = resp.bytes().await?.to_vec();
    debug!("Downloaded {} bytes from {}", prettyprint_usize(bytes.len()), url);
    Ok(bytes)
}

/// Downloads a file. This must be called with a tokio runtime somewhere.
pub async fn download_to_file<I: AsRef<str>>(url: I, path: &str) -> Result<()> {
    let bytes = download_bytes(url).await?;
    crate::write_file(path, &bytes)
}

/// Builds a GET URL with percent-encoded query parameters.
pub fn url_with_params(base: &str, params: &[(&str, &str)]) -> Result<String> {
    let url = reqwest::Url::parse_with_params(base, params)
        .with_context(|| format!("bad URL {}", base))?;
    Ok(url.to_string())
}

/// Only downloads if `path` doesn't exist yet; a cache hit skips the network entirely. Returns
/// true if something was downloaded.
pub async fn maybe_download<I: AsRef<str>>(url: I, path: &str) -> Result<bool> {
    if crate::file_exists(path) {
        debug!("{} already exists, not downloading", path);
        return Ok(false);
    }
    info!("Downloading '{}'", path);
    download_to_file(url, path).await?;
    Ok(true)
}
