//! Byte-fetch boundary: URI fetching, data URIs, progress reporting.
//!
//! Transport internals are an external collaborator; the engine only
//! depends on the [`UriFetcher`] trait. Base64 data URIs are ubiquitous in
//! real glTF and are decoded here so embedded buffers and images never
//! touch the fetcher.

use crate::error::{AssetError, Result};
use async_trait::async_trait;
use base64::Engine;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Bytes-loaded progress delivered at each byte-fetch boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub loaded: u64,
    /// Total expected bytes, when known (sum of declared buffer lengths).
    pub total: Option<u64>,
}

/// Callback invoked after each completed byte fetch.
pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

/// Byte-fetch function for any URI not already embedded in the document.
#[async_trait]
pub trait UriFetcher: Send + Sync {
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>>;
}

/// Fetcher resolving relative URIs against a base directory on disk.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    base: PathBuf,
}

impl FileFetcher {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

#[async_trait]
impl UriFetcher for FileFetcher {
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>> {
        let path = self.base.join(uri);
        log::debug!("fetching {}", path.display());
        let bytes = tokio::fs::read(&path).await?;
        Ok(bytes)
    }
}

/// In-memory fetcher for tests and pre-fetched assets.
#[derive(Debug, Clone, Default)]
pub struct MemoryFetcher {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, uri: impl Into<String>, bytes: Vec<u8>) {
        self.entries.insert(uri.into(), bytes);
    }
}

#[async_trait]
impl UriFetcher for MemoryFetcher {
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>> {
        self.entries
            .get(uri)
            .cloned()
            .ok_or_else(|| AssetError::Io(format!("no such entry: {uri}")))
    }
}

/// Decode a base64 data URI. Returns `Ok(None)` when `uri` does not use
/// the `data:` scheme, so callers can cheaply fall through to the fetcher.
pub fn decode_data_uri(uri: &str) -> Result<Option<Vec<u8>>> {
    let Some(rest) = uri.strip_prefix("data:") else {
        return Ok(None);
    };
    let Some((meta, payload)) = rest.split_once(',') else {
        return Err(AssetError::decode(uri, "malformed data URI"));
    };
    if !meta.ends_with(";base64") {
        return Err(AssetError::decode(uri, "only base64 data URIs are supported"));
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| AssetError::decode(uri, format!("invalid base64 payload: {e}")))?;
    Ok(Some(bytes))
}
