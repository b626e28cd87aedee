use thiserror::Error;

#[derive(Error, Debug)]
pub enum CarefinderError {
    #[error("Data error: {0}")]
    Data(#[from] carefinder_data::DataError),
    #[error("Filter error: {0}")]
    Filter(#[from] crate::filter::FilterError),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Init Logging error: {0}")]
    InitLoggingError(#[from] tracing_subscriber::filter::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CarefinderError {
    /// Whether the error came from an unreadable upstream payload.
    #[must_use]
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, Self::Data(err) if err.is_malformed_input())
    }
}

pub type Result<T> = std::result::Result<T, CarefinderError>;
