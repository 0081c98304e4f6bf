//! URL canonicalization and path-or-URL classification
//!
//! Registry keys are `url::Url` values after parsing, which lowercases the
//! scheme and host, drops default ports and resolves dot segments. Fragments
//! never reach the server and are stripped as well.

use std::path::PathBuf;

use url::Url;

use crate::constants::http::FETCHABLE_SCHEMES;
use crate::errors::{RegistryError, RegistryResult};

/// Canonical registry key for a URL to be fetched
pub fn canonicalize(url: &str) -> RegistryResult<Url> {
    let mut parsed = Url::parse(url.trim()).map_err(|e| RegistryError::InvalidUrl {
        url: url.to_string(),
        error: e.to_string(),
    })?;

    if !FETCHABLE_SCHEMES.contains(&parsed.scheme()) {
        return Err(RegistryError::UnsupportedScheme {
            scheme: parsed.scheme().to_string(),
        });
    }

    parsed.set_fragment(None);
    Ok(parsed)
}

/// Canonical key if `path_or_url` names remote content, `None` for local paths
pub fn remote_url(path_or_url: &str) -> Option<Url> {
    canonicalize(path_or_url).ok()
}

/// Filesystem path named by `path_or_url`, decoding `file://` URLs
pub fn local_path(path_or_url: &str) -> PathBuf {
    match Url::parse(path_or_url) {
        Ok(url) if url.scheme() == "file" => url
            .to_file_path()
            .unwrap_or_else(|_| PathBuf::from(path_or_url)),
        _ => PathBuf::from(path_or_url),
    }
}
