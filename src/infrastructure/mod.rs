//! Concrete stage implementations wired in by the default context.

pub mod cache;
pub mod decoder;
pub mod loader;
pub mod processor;
