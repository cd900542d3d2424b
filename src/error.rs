use thiserror::Error;

/// Category of a [`TutorError`], for callers that branch on the kind of
/// failure rather than its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    TransportFailure,
    EmptyResponse,
}

#[derive(Error, Debug)]
pub enum TutorError {
    /// Missing credential or invalid setting. Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network, auth, rate-limit or timeout failure during a model call.
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    /// The model call succeeded but produced no usable text.
    #[error("The model returned no usable text")]
    EmptyResponse,
}

impl TutorError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::TransportFailure(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::TransportFailure(_) => ErrorKind::TransportFailure,
            Self::EmptyResponse => ErrorKind::EmptyResponse,
        }
    }
}

impl From<reqwest::Error> for TutorError {
    fn from(err: reqwest::Error) -> Self {
        // The request URL never appears in messages that may be logged or shown.
        let err = err.without_url();
        if err.is_timeout() {
            return Self::TransportFailure(format!("request timed out: {err}"));
        }
        Self::TransportFailure(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TutorError>;
