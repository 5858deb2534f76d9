use thiserror::Error;

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, NotifierError>;

/// Everything that can stop a sweep.
///
/// None of these are retried inside the crate; the caller decides whether an
/// error is fatal.
#[derive(Error, Debug)]
pub enum NotifierError {
    /// Missing credential or unusable config file.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport failure or non-success HTTP status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote API answered but rejected the request.
    #[error("API error from {service}: {message}")]
    Api {
        service: &'static str,
        message: String,
    },

    /// Response body or field that does not match the expected contract.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Seen-store I/O
    #[error("Seen store error: {0}")]
    Store(#[from] std::io::Error),
}

impl NotifierError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    pub fn api(service: &'static str, msg: impl Into<String>) -> Self {
        Self::Api {
            service,
            message: msg.into(),
        }
    }

    /// True for errors raised before any network call could be made.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
