//! Blocking asset downloads.

use std::path::Path;

use containdb_common::error::{ContainDbError, Result};

/// Fetches a remote asset to a local file.
pub trait Fetch: Send + Sync {
    /// Downloads `url` into `dest`, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the server answers with a
    /// non-success status, or `dest` cannot be written.
    fn fetch(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// Full-body HTTP download: no streaming, no resume.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpFetcher;

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
        let download_err = |message: String| ContainDbError::Download {
            url: url.to_string(),
            message,
        };

        let response = reqwest::blocking::get(url).map_err(|e| download_err(e.to_string()))?;
        if !response.status().is_success() {
            return Err(download_err(format!("HTTP {}", response.status())));
        }
        let bytes = response
            .bytes()
            .map_err(|e| download_err(format!("failed to read response body: {e}")))?;

        std::fs::write(dest, &bytes).map_err(|e| ContainDbError::Io {
            path: dest.to_path_buf(),
            source: e,
        })?;
        tracing::info!(%url, path = %dest.display(), bytes = bytes.len(), "download complete");
        Ok(bytes.len() as u64)
    }
}
