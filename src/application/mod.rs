//! Orchestration: the pipeline context and observable load handles.

mod context;
mod load_task;

pub use context::{Context, ContextBuilder, ContextConfig};
pub use load_task::{LoadState, LoadTask};
