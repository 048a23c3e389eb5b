//! Whole-resource retrieval for script and reference locations.
//!
//! A location is either an `http(s)` URL, fetched with a single blocking-style
//! GET, or a local file path. There is no retry and no timeout beyond what the
//! HTTP client applies by default.

use std::fmt;
use std::path::{Path, PathBuf};

use reqwest::get;
use tracing::{debug, instrument};
use url::Url;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Http(Url),
    File(PathBuf),
}

impl Location {
    pub fn parse(raw: &str) -> Self {
        match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Location::Http(url),
            Ok(url) if url.scheme() == "file" => match url.to_file_path() {
                Ok(path) => Location::File(path),
                Err(()) => Location::File(PathBuf::from(raw)),
            },
            _ => Location::File(PathBuf::from(raw)),
        }
    }

    /// File extension of the last path segment, with the leading dot.
    pub fn extension(&self) -> Option<String> {
        let name = match self {
            Location::Http(url) => url.path_segments()?.next_back()?.to_string(),
            Location::File(path) => path.file_name()?.to_string_lossy().into_owned(),
        };
        Path::new(&name)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Http(url) => write!(f, "{url}"),
            Location::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Retrieve the full contents of `location`.
///
/// # Errors
///
/// Any transport failure, non-2xx status or file read failure is reported as
/// [`Error::Download`].
#[instrument(level = "info", skip_all, fields(location = %location))]
pub async fn fetch_bytes(location: &Location) -> Result<Vec<u8>> {
    let bytes = match location {
        Location::Http(url) => {
            let response = get(url.clone())
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| Error::download(location.to_string(), e))?;
            response
                .bytes()
                .await
                .map_err(|e| Error::download(location.to_string(), e))?
                .to_vec()
        }
        Location::File(path) => tokio::fs::read(path)
            .await
            .map_err(|e| Error::download(location.to_string(), e))?,
    };
    debug!(bytes = bytes.len(), "Fetched resource");
    Ok(bytes)
}
