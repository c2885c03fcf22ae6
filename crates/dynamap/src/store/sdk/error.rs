//! SDK error mapping.

use std::fmt::Display;

use crate::error::RepositoryError;

/// Wraps an SDK failure into `RepositoryError::Store`, keeping the SDK error.
pub fn store_error<E>(operation: &'static str, table: &str, err: E) -> RepositoryError
where
    E: Display,
    aws_sdk_dynamodb::Error: From<E>,
{
    tracing::warn!(operation, table, error = %err, "store request failed");
    RepositoryError::from(aws_sdk_dynamodb::Error::from(err))
}

/// Wraps a request builder failure.
pub fn build_error(err: impl Display) -> RepositoryError {
    RepositoryError::InvalidArgument(format!("malformed store request: {err}"))
}
