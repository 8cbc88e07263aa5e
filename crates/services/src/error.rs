//! Shared error types for the services crate.

use thiserror::Error;

use rehab_core::model::{SessionValidationError, UserError, UserId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `SessionRecorder`.
///
/// A missing user is deliberately not represented here: the recorder treats
/// it as a skip, not a failure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RecordError {
    #[error(transparent)]
    Validation(#[from] SessionValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressAggregator`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StatsError {
    #[error("user not found: {0}")]
    UserNotFound(UserId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    User(#[from] UserError),
}
