use thiserror::Error;
use uuid::Uuid;

use duo_types::{Table, ValidationError};

use crate::storage::StorageError;

/// Shown for any write the backend didn't accept for reasons the user
/// can't fix by editing the form.
pub const CONNECTION_HINT: &str = "Could not save. Check your connection and try again.";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("not found")]
    NotFound,

    #[error("not authorized")]
    Unauthorized,

    /// The backend understood the request and refused it
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend failure: {0}")]
    Internal(String),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Please enter your name")]
    EmptyName,

    #[error("The couple code must be exactly 6 characters")]
    CodeLength,

    #[error("Invalid couple code")]
    CodeNotFound,

    #[error("{0}")]
    Invalid(ValidationError),

    #[error("no couple session is active")]
    NoSession,

    #[error("no {0} row {1}")]
    UnknownRow(Table, Uuid),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("malformed row: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl From<ValidationError> for ClientError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::CodeLength => ClientError::CodeLength,
            other => ClientError::Invalid(other),
        }
    }
}

impl ClientError {
    /// True for errors raised before any network call was made.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ClientError::EmptyName | ClientError::CodeLength | ClientError::Invalid(_)
        )
    }

    /// Text fit for an inline form error or alert.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::EmptyName
            | ClientError::CodeLength
            | ClientError::CodeNotFound
            | ClientError::Invalid(_) => self.to_string(),
            ClientError::Backend(BackendError::Rejected(reason)) => reason.clone(),
            ClientError::NoSession => "Join or create a couple first.".to_string(),
            _ => CONNECTION_HINT.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_keep_their_text() {
        let err = ClientError::from(ValidationError::TooLong { field: "title", max: 100 });
        assert!(err.is_validation());
        assert_eq!(err.user_message(), "title must be at most 100 characters");
    }

    #[test]
    fn code_length_maps_to_its_own_variant() {
        let err = ClientError::from(ValidationError::CodeLength);
        assert!(matches!(err, ClientError::CodeLength));
    }

    #[test]
    fn transport_failures_get_the_connection_hint() {
        let err = ClientError::from(BackendError::Transport("connection refused".into()));
        assert!(!err.is_validation());
        assert_eq!(err.user_message(), CONNECTION_HINT);
    }
}
