//! Custom error types and result handling for Shiori operations.
//!
//! All operations return a [`Result<T>`] which is a type alias for `std::result::Result<T, Error>`.
//! The matching variants (`NoMatch`, `RateLimited`, `ProviderUnavailable`) are kept distinct from
//! generic failures so that a caller can decide whether a retry makes sense.
//!
use std::path::PathBuf;

/// Type alias for Results with Shiori errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all Shiori operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// No candidate met the search criteria on any configured provider
    #[error("No matching metadata found")]
    NoMatch,
    /// An upstream provider signaled throttling
    #[error("Provider '{0}' is rate limiting requests")]
    RateLimited(String),
    /// Network or transport failure while talking to a provider
    #[error("Provider '{0}' is unavailable: {1}")]
    ProviderUnavailable(String, String),
    /// A provider answered, but with something we could not use
    #[error("Provider '{0}' failed: {1}")]
    Provider(String, String),
    /// The container could not be parsed (missing container descriptor or metadata file)
    #[error("Malformed archive '{0:?}': {1}")]
    MalformedArchive(PathBuf, String),
    /// The temporary file could not be created, written, or installed
    #[error("Failed to write archive '{0:?}': {1}")]
    WriteFailure(PathBuf, String),
    /// Another rewrite of the same archive is still in flight
    #[error("A rewrite of '{0:?}' is already in progress")]
    RewriteInProgress(PathBuf),
    /// The caller cancelled the operation
    #[error("Operation was cancelled")]
    Cancelled,
    /// I/O errors from the standard library
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// ZIP file operation errors
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    /// Regular expression parsing errors
    #[error(transparent)]
    Regex(#[from] regex::Error),
    /// Async task join errors
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    ConfigBuilder(#[from] crate::engine::EngineConfigBuilderError),
    /// Invalid engine configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// Unsupported operations or formats (e.g., a PDF handed to the rewriter)
    #[error("Unsupported: {0}")]
    Unsupported(String),
    /// Other errors that don't fit into specific categories
    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Transport-level status a handler layer should answer with for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NoMatch => 404,
            Error::RateLimited(_) => 429,
            Error::RewriteInProgress(_) => 409,
            Error::Cancelled => 499,
            _ => 500,
        }
    }

    /// Whether repeating the same call later could reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::RateLimited(_) | Error::ProviderUnavailable(_, _)
        )
    }

    /// True for errors that represent a provider's definitive "nothing here" answer.
    pub(crate) fn is_no_match(&self) -> bool {
        matches!(self, Error::NoMatch)
    }
}

// Basic From<String> conversion for convenience
impl From<String> for Error {
    fn from(error: String) -> Self {
        Error::Other(error)
    }
}

impl From<&str> for Error {
    fn from(error: &str) -> Self {
        Error::Other(error.to_string())
    }
}

impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}
