use thiserror::Error;
use tracing::error;

/// Failure taxonomy surfaced to the UI layer. Messages are written to be
/// rendered verbatim; the underlying cause of an [`AccountError::Unknown`]
/// is kept for logging but never shown to the user.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Duplicate(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Authentication(String),
    #[error("something went wrong, please try again")]
    Unknown(#[source] anyhow::Error),
}

impl AccountError {
    /// Wrap an unexpected underlying failure, recording the cause.
    pub(crate) fn unknown(err: impl Into<anyhow::Error>) -> Self {
        let err = err.into();
        error!(error = %err, "unexpected internal error");
        AccountError::Unknown(err)
    }
}
