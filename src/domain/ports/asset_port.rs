//! Port definition for opaque asset sources.

use image::DynamicImage;

/// An opaque handle to an externally managed image asset (photo library,
/// bundled media store). The local loader resolves it to a rendered image
/// at a target size instead of reading bytes itself.
pub trait AssetHandle: Send + Sync {
    /// Intrinsic pixel dimensions of the asset, `(width, height)`.
    fn pixel_size(&self) -> (u32, u32);

    /// Renders the asset at the given target size, or `None` when the
    /// asset cannot be materialized.
    fn render(&self, target_width: u32, target_height: u32) -> Option<DynamicImage>;
}
