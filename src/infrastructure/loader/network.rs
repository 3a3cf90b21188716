//! Fetch stage for URL sources, with disk-cache side effects.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::entities::Request;
use crate::domain::errors::{LoadError, LoadResult};
use crate::domain::ports::{Fetched, Loader};
use crate::infrastructure::cache::DiskCache;

/// Loads URL-shaped sources over HTTP.
///
/// The disk tier is consulted first when the request opts into it; fetched
/// bytes are persisted back as a best-effort side effect.
pub struct NetworkLoader {
    client: reqwest::Client,
    disk: Arc<DiskCache>,
}

impl NetworkLoader {
    /// Creates a network loader sharing the context's HTTP client and disk
    /// cache.
    #[must_use]
    pub fn new(client: reqwest::Client, disk: Arc<DiskCache>) -> Self {
        Self { client, disk }
    }

    async fn download(&self, url: &str) -> LoadResult<bytes::Bytes> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LoadError::network(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::network(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| LoadError::network(format!("failed to read body: {e}")))
    }
}

impl std::fmt::Debug for NetworkLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkLoader").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Loader for NetworkLoader {
    fn is_valid(&self, request: &Request) -> bool {
        request.source().starts_with("http")
    }

    async fn load(&self, request: &Request) -> LoadResult<Option<Fetched>> {
        let use_disk = self.disk.is_valid(request);
        if use_disk
            && let Some(hit) = self.disk.load(request).await
        {
            return Ok(Some(hit));
        }

        let bytes = self.download(request.source()).await?;
        debug!(key = %request.key(), size = bytes.len(), "fetched image bytes");

        if use_disk
            && let Err(e) = self.disk.store(request, &bytes).await
        {
            // Best effort: the request still succeeds without the disk copy.
            warn!(key = %request.key(), error = %e, "failed to cache bytes to disk");
        }

        Ok(Some(Fetched::Bytes(bytes)))
    }
}
