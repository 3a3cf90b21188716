//! Domain entities.

mod image;
mod request;

pub use image::{AnimatedImage, AnimationFrame, ImageData};
pub use request::{
    AnimationIntent, CacheFlags, ContentMode, ProcessorFlags, Request, TargetSize, cache_key_for,
};
