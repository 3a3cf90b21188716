//! The request descriptor that drives the pipeline.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use crate::application::Context;
use crate::domain::entities::ImageData;
use crate::domain::errors::LoadResult;
use crate::domain::ports::AssetHandle;

bitflags::bitflags! {
    /// Opt-in transform steps applied after decode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ProcessorFlags: u32 {
        /// Convert the image to a single-channel gray representation.
        const GRAYSCALE = 1 << 0;
        /// Resize/redraw the image to the target size ahead of display.
        const PREDRAWN = 1 << 1;
    }
}

bitflags::bitflags! {
    /// Cache tiers a request opts into.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CacheFlags: u32 {
        /// Bounded in-process cache of decoded images.
        const MEMORY = 1 << 0;
        /// Content-addressed on-disk byte store.
        const DISK = 1 << 1;
    }
}

/// How the image is fitted into the target size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentMode {
    /// Scale down to fully contain within the target, preserving aspect.
    Fit,
    /// Scale to fully cover the target, cropping overflow.
    #[default]
    Fill,
}

/// Whether a source should decode to an animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnimationIntent {
    /// Infer from the source extension (`.gif` animates).
    #[default]
    Auto,
    /// Decode every frame even if the extension says otherwise.
    Animated,
    /// Decode a single still frame even for animated containers.
    Static,
}

/// Requested output size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSize {
    /// Both dimensions fixed.
    Absolute {
        /// Target width in pixels.
        width: u32,
        /// Target height in pixels.
        height: u32,
    },
    /// Width fixed, height derived from the image aspect ratio.
    Width {
        /// Target width in pixels.
        width: u32,
        /// Height used when the aspect ratio is not yet known.
        default_height: u32,
    },
}

impl TargetSize {
    /// Fallback height for width-only sizes.
    pub const DEFAULT_HEIGHT: u32 = 44;

    /// Width-constrained size with the default fallback height.
    #[must_use]
    pub fn by_width(width: u32) -> Self {
        Self::Width {
            width,
            default_height: Self::DEFAULT_HEIGHT,
        }
    }

    /// Target width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        match self {
            Self::Absolute { width, .. } | Self::Width { width, .. } => *width,
        }
    }

    /// Explicit target height, if one was given.
    #[must_use]
    pub fn height(&self) -> Option<u32> {
        match self {
            Self::Absolute { height, .. } => Some(*height),
            Self::Width { .. } => None,
        }
    }

    /// Height to assume when none can be derived.
    #[must_use]
    pub fn default_height(&self) -> u32 {
        match self {
            Self::Absolute { height, .. } => *height,
            Self::Width { default_height, .. } => *default_height,
        }
    }
}

/// An immutable descriptor of one image to produce.
///
/// Two requests with identical key, resolved width and processor flags are
/// cache-equivalent regardless of their other fields.
#[derive(Clone)]
pub struct Request {
    key: String,
    source: String,
    asset: Option<Arc<dyn AssetHandle>>,
    size: TargetSize,
    mode: ContentMode,
    animation: AnimationIntent,
    processors: ProcessorFlags,
    caches: CacheFlags,
    context: Arc<Context>,
}

impl Request {
    /// Creates a request with the default policy: fill mode, predrawn
    /// resize, both cache tiers, animation inferred from the extension.
    #[must_use]
    pub fn new(source: impl Into<String>, size: TargetSize, context: Arc<Context>) -> Self {
        let source = source.into();
        Self {
            key: cache_key_for(&source),
            source,
            asset: None,
            size,
            mode: ContentMode::default(),
            animation: AnimationIntent::default(),
            processors: ProcessorFlags::PREDRAWN,
            caches: CacheFlags::MEMORY | CacheFlags::DISK,
            context,
        }
    }

    /// Overrides the derived cache key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Sets the content mode.
    #[must_use]
    pub fn with_mode(mut self, mode: ContentMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the animation intent.
    #[must_use]
    pub fn with_animation(mut self, animation: AnimationIntent) -> Self {
        self.animation = animation;
        self
    }

    /// Sets the transform steps to apply.
    #[must_use]
    pub fn with_processors(mut self, processors: ProcessorFlags) -> Self {
        self.processors = processors;
        self
    }

    /// Sets the cache tiers to use.
    #[must_use]
    pub fn with_caches(mut self, caches: CacheFlags) -> Self {
        self.caches = caches;
        self
    }

    /// Attaches an opaque asset handle resolved by the local loader.
    #[must_use]
    pub fn with_asset(mut self, asset: Arc<dyn AssetHandle>) -> Self {
        self.asset = Some(asset);
        self
    }

    /// Cache identity of the source.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Source string: absolute path, URL, or resource name.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Attached asset handle, if any.
    #[must_use]
    pub fn asset(&self) -> Option<&Arc<dyn AssetHandle>> {
        self.asset.as_ref()
    }

    /// Requested output size.
    #[must_use]
    pub fn size(&self) -> TargetSize {
        self.size
    }

    /// Requested content mode.
    #[must_use]
    pub fn mode(&self) -> ContentMode {
        self.mode
    }

    /// Requested transform steps.
    #[must_use]
    pub fn processors(&self) -> ProcessorFlags {
        self.processors
    }

    /// Requested cache tiers.
    #[must_use]
    pub fn caches(&self) -> CacheFlags {
        self.caches
    }

    /// The shared pipeline context this request runs against.
    #[must_use]
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Target width in pixels, used for cache variant matching.
    #[must_use]
    pub fn resolved_width(&self) -> u32 {
        self.size.width()
    }

    /// Whether decode should keep every frame of an animated container.
    ///
    /// An explicit intent always wins; `Auto` infers from a `.gif` extension.
    #[must_use]
    pub fn wants_animation(&self) -> bool {
        match self.animation {
            AnimationIntent::Animated => true,
            AnimationIntent::Static => false,
            AnimationIntent::Auto => source_extension(&self.source)
                .is_some_and(|ext| ext.eq_ignore_ascii_case("gif")),
        }
    }

    /// Hash of the cache key alone, indexing the width-variant table.
    #[must_use]
    pub fn source_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.key.hash(&mut hasher);
        hasher.finish()
    }

    /// Coalescing key: key + resolved width + processor flags.
    ///
    /// Requests differing only in content mode or cache tiers still coalesce.
    #[must_use]
    pub fn variant_key(&self) -> u64 {
        self.variant_key_with(self.resolved_width())
    }

    /// Variant key for an explicit width, used by the memory cache.
    #[must_use]
    pub fn variant_key_with(&self, width: u32) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.key.hash(&mut hasher);
        width.hash(&mut hasher);
        self.processors.bits().hash(&mut hasher);
        hasher.finish()
    }

    /// Derives a request for a new size, keeping identity and policy.
    #[must_use]
    pub fn make_request(&self, new_size: TargetSize) -> Self {
        let mut request = self.clone();
        request.size = new_size;
        request
    }

    /// Runs this request through its context's pipeline.
    ///
    /// # Errors
    /// Returns a [`crate::domain::errors::LoadError`] when no stage can
    /// produce an image for this request.
    pub async fn send(&self) -> LoadResult<Arc<ImageData>> {
        Arc::clone(&self.context).load(self.clone()).await
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("key", &self.key)
            .field("source", &self.source)
            .field("size", &self.size)
            .field("mode", &self.mode)
            .field("animation", &self.animation)
            .field("processors", &self.processors)
            .field("caches", &self.caches)
            .field("has_asset", &self.asset.is_some())
            .finish_non_exhaustive()
    }
}

/// Derives the cache key for a source: `md5(source) + "." + extension`,
/// defaulting the extension to `jpg` when the source has none.
#[must_use]
pub fn cache_key_for(source: &str) -> String {
    let ext = source_extension(source).unwrap_or_else(|| "jpg".to_string());
    format!("{:x}.{ext}", md5::compute(source.as_bytes()))
}

/// Extension of the path portion of a source string, query stripped.
fn source_extension(source: &str) -> Option<String> {
    let path = source
        .split(['?', '#'])
        .next()
        .unwrap_or(source)
        .rsplit('/')
        .next()
        .unwrap_or(source);
    let (stem, ext) = path.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_string())
}
