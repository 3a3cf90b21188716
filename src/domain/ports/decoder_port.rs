//! Port definition for decode stages.

use crate::domain::entities::{ImageData, Request};
use crate::domain::errors::LoadResult;

/// Port for turning raw bytes into a displayable image.
///
/// Decoders form a first-match chain. Decode is CPU-bound and synchronous;
/// the orchestrator moves it off the async workers.
pub trait Decoder: Send + Sync {
    /// Whether this decoder claims the request.
    fn is_valid(&self, request: &Request) -> bool;

    /// Decodes the bytes into a static or animated image.
    ///
    /// # Errors
    /// [`crate::domain::errors::LoadError::ImageSourceCreate`] when the bytes
    /// are not a parsable container,
    /// [`crate::domain::errors::LoadError::DecoderImageIsNil`] when the
    /// container yields no usable frames.
    fn decode(&self, request: &Request, data: &[u8]) -> LoadResult<ImageData>;
}
