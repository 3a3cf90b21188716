//! pixfetch - An async image loading and caching pipeline.
//!
//! This crate resolves image requests through pluggable fetch, decode,
//! transform, and cache stages, coalescing concurrent requests for the same
//! image onto a single underlying load.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing the pipeline context and load handles.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing the built-in stage implementations.
pub mod infrastructure;

pub use application::{Context, ContextBuilder, ContextConfig, LoadState, LoadTask};
pub use domain::entities::{
    AnimatedImage, AnimationFrame, AnimationIntent, CacheFlags, ContentMode, ImageData,
    ProcessorFlags, Request, TargetSize, cache_key_for,
};
pub use domain::errors::{LoadError, LoadResult};
pub use domain::ports::{AssetHandle, CacheStore, Decoder, Fetched, Loader, Processor};

/// Current version of the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = "pixfetch";
