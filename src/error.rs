use std::fmt;

/// The bulk read of a collection failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The platform could not be reached.
    Unavailable(String),
    /// The caller is not allowed to read the collection.
    Unauthorized(String),
    /// The platform answered with an error.
    Platform(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Unavailable(msg) => write!(f, "collection unavailable: {}", msg),
            FetchError::Unauthorized(msg) => {
                write!(f, "not authorized to read collection: {}", msg)
            }
            FetchError::Platform(msg) => write!(f, "fetch failed: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

/// A write was rejected before or by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// The payload failed local validation and was never sent.
    Invalid(String),
    /// The caller is not allowed to write to the collection.
    Unauthorized(String),
    /// The platform refused the write (constraint, policy, ...).
    Rejected(String),
    /// The platform could not be reached or failed internally.
    Platform(String),
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Invalid(msg) => write!(f, "invalid payload: {}", msg),
            SubmitError::Unauthorized(msg) => write!(f, "not authorized to write: {}", msg),
            SubmitError::Rejected(msg) => write!(f, "write rejected: {}", msg),
            SubmitError::Platform(msg) => write!(f, "submit failed: {}", msg),
        }
    }
}

impl std::error::Error for SubmitError {}
