//! Built-in fetch stages.

mod local;
mod network;

pub use local::LocalLoader;
pub use network::NetworkLoader;
