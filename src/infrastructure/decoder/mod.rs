//! Built-in decode stages.

mod frame;

pub use frame::{DEFAULT_FRAME_DELAY, FrameDecoder, MIN_FRAME_DELAY_MS, effective_delay};
