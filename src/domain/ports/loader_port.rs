//! Port definition for fetch stages.

use bytes::Bytes;

use crate::domain::entities::{ImageData, Request};
use crate::domain::errors::LoadResult;

/// What a fetch stage produced for a request.
#[derive(Debug, Clone)]
pub enum Fetched {
    /// Raw encoded bytes; decode still has to run.
    Bytes(Bytes),
    /// A ready-made image; decode is skipped.
    Image(ImageData),
}

/// Port for obtaining raw bytes or a pre-decoded image for a request.
///
/// Loaders form a first-match chain: the first valid loader that returns
/// `Some` wins, `None` falls through to the next one, and an error is
/// terminal for the request.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Loader: Send + Sync {
    /// Whether this loader can handle the request at all.
    fn is_valid(&self, request: &Request) -> bool;

    /// Attempts to obtain the source, suspending for any I/O.
    ///
    /// # Errors
    /// Propagates I/O and network failures; these end the request.
    async fn load(&self, request: &Request) -> LoadResult<Option<Fetched>>;
}
