//! Stage capability ports implemented by the infrastructure layer.

mod asset_port;
mod cache_port;
mod decoder_port;
mod loader_port;
mod processor_port;

pub use asset_port::AssetHandle;
pub use cache_port::CacheStore;
pub use decoder_port::Decoder;
pub use loader_port::{Fetched, Loader};
pub use processor_port::Processor;

#[cfg(test)]
pub use loader_port::MockLoader;
