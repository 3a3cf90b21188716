//! Pipeline error taxonomy.

use thiserror::Error;

/// Result type for pipeline operations.
pub type LoadResult<T> = std::result::Result<T, LoadError>;

/// Terminal errors for a single request/coalescing group.
///
/// The pipeline never retries on its own; retry means issuing a new request.
/// `Clone` lets one settled result fan out to every coalesced waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// No fetch stage claimed the request.
    #[error("no loader claimed the request")]
    LoaderIsEmpty,

    /// No decode stage claimed the fetched bytes.
    #[error("no decoder claimed the request")]
    DecoderIsEmpty,

    /// The bytes are not a parsable image container.
    #[error("bytes are not a parsable image container")]
    ImageSourceCreate,

    /// The container parsed but yielded no usable frames.
    #[error("image container yielded no usable frames")]
    DecoderImageIsNil,

    /// I/O failure from a fetch or cache stage.
    #[error("io error: {0}")]
    Io(String),

    /// Network failure from the fetch stage.
    #[error("network error: {0}")]
    Network(String),

    /// A background task failed to complete.
    #[error("background task failed: {0}")]
    Task(String),
}

impl LoadError {
    /// Creates an I/O error.
    #[must_use]
    pub fn io(message: impl std::fmt::Display) -> Self {
        Self::Io(message.to_string())
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl std::fmt::Display) -> Self {
        Self::Network(message.to_string())
    }

    /// Creates a background-task error.
    #[must_use]
    pub fn task(message: impl std::fmt::Display) -> Self {
        Self::Task(message.to_string())
    }
}
