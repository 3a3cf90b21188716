//! Built-in transform stages.

mod gray;
mod resize;

pub use gray::GrayProcessor;
pub use resize::ResizeProcessor;
