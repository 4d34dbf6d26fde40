/// Convenience alias used throughout the crate.
pub type ReelResult<T> = Result<T, ReelError>;

/// Error type for every stage of a log replay.
#[derive(thiserror::Error, Debug)]
pub enum ReelError {
    /// Invalid configuration or arguments.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unreadable or malformed log input.
    #[error("log error: {0}")]
    Log(String),

    /// The external layout command failed or produced no usable bitmap.
    #[error("graph layout error: {0}")]
    Layout(String),

    /// Text layout or frame composition failed.
    #[error("compose error: {0}")]
    Compose(String),

    /// Writing frames to the output failed.
    #[error("encode error: {0}")]
    Encode(String),

    /// Wrapped lower-level failure (I/O, image decoding, ...).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReelError {
    /// Build a [`ReelError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`ReelError::Log`].
    pub fn log(msg: impl Into<String>) -> Self {
        Self::Log(msg.into())
    }

    /// Build a [`ReelError::Layout`].
    pub fn layout(msg: impl Into<String>) -> Self {
        Self::Layout(msg.into())
    }

    /// Build a [`ReelError::Compose`].
    pub fn compose(msg: impl Into<String>) -> Self {
        Self::Compose(msg.into())
    }

    /// Build a [`ReelError::Encode`].
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }
}
