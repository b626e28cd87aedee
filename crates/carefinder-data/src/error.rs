use thiserror::Error;
pub type Result<T> = std::result::Result<T, DataError>;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DataError {
    /// True when the payload itself was unreadable, as opposed to a failure
    /// while reading it from its source.
    #[must_use]
    pub const fn is_malformed_input(&self) -> bool {
        matches!(self, Self::MalformedInput(_) | Self::Serde(_))
    }
}
