//! Authentication Errors
//! Mission: One structured kind per failure the auth core can report

use thiserror::Error;

/// Failure kinds surfaced by the auth core to the transport layer.
///
/// Callers match on the variant, never on the rendered message.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email or wrong password. The two cases are indistinguishable.
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("user already exists with the given email")]
    UserAlreadyExists,

    #[error("user not found")]
    UserNotFound,

    /// Malformed, expired or wrongly signed token.
    #[error("invalid or expired token")]
    InvalidToken,

    #[error("missing or invalid authorization header")]
    MissingAuthHeader,

    #[error("invalid old password")]
    InvalidOldPassword,

    /// Hashing, persistence or timeout failure. The source is logged, not rendered.
    #[error("internal server error")]
    Internal(#[source] anyhow::Error),
}

impl AuthError {
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        AuthError::Internal(err.into())
    }
}

/// Token codec failures, kept distinct for logging only.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature or algorithm is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("failed to encode token: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),
}

/// Persistence failures reported by a [`UserRepository`](crate::auth::store::UserRepository).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Uniqueness constraint on email rejected the write.
    #[error("email already registered")]
    DuplicateEmail,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => AuthError::UserAlreadyExists,
            StoreError::Backend(e) => AuthError::Internal(e),
        }
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::Backend(anyhow::Error::new(err).context("storage task failed"))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                StoreError::DuplicateEmail
            }
            _ => StoreError::Backend(err.into()),
        }
    }
}
