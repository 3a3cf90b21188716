//! Port definition for decoded-image cache tiers.

use std::sync::Arc;

use crate::domain::entities::{ImageData, Request};

/// Port for one tier of the cache chain.
///
/// Lookup walks the configured tiers in order and returns the first hit
/// among valid tiers; store writes to every valid tier.
pub trait CacheStore: Send + Sync {
    /// Whether the request opts into this tier.
    fn is_valid(&self, request: &Request) -> bool;

    /// Looks up a cached image equivalent to the request.
    fn get(&self, request: &Request) -> Option<Arc<ImageData>>;

    /// Stores a produced image for the request.
    fn put(&self, request: &Request, image: Arc<ImageData>);

    /// Drops everything in this tier.
    fn clear(&self);
}
