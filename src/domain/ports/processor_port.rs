//! Port definition for transform stages.

use crate::domain::entities::{ImageData, Request};

/// Port for post-decode image transforms.
///
/// Unlike the first-match fetch/decode/cache-lookup chains, every valid
/// processor in the configured list is applied in sequence.
pub trait Processor: Send + Sync {
    /// Whether the request opts into this transform.
    fn is_valid(&self, request: &Request) -> bool;

    /// Transforms the image. Failures fall back to the input image rather
    /// than failing the request.
    fn process(&self, request: &Request, input: ImageData) -> ImageData;
}
