use std::sync::Arc;

use tracing::debug;

use rehab_core::model::{Profile, User, UserId};
use storage::repository::Storage;

use crate::Clock;
use crate::aggregator::ProgressAggregator;
use crate::error::AppServicesError;
use crate::recorder::SessionRecorder;

/// Assembles the app-facing services over one shared record store.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    storage: Storage,
    recorder: Arc<SessionRecorder>,
    aggregator: Arc<ProgressAggregator>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(storage, clock))
    }

    /// Build services over the in-memory store. Intended for tests and
    /// demos; nothing survives a restart.
    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_storage(Storage::in_memory(), clock)
    }

    /// Build services over an already-initialized store.
    #[must_use]
    pub fn from_storage(storage: Storage, clock: Clock) -> Self {
        let recorder = Arc::new(SessionRecorder::new(
            clock,
            Arc::clone(&storage.users),
            Arc::clone(&storage.sessions),
        ));
        let aggregator = Arc::new(ProgressAggregator::new(
            clock,
            Arc::clone(&storage.users),
            Arc::clone(&storage.sessions),
        ));

        Self {
            clock,
            storage,
            recorder,
            aggregator,
        }
    }

    /// Registers a new user with zeroed progress.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::User` when the username is blank, or
    /// `AppServicesError::Storage` when the insert fails.
    pub async fn register_user(
        &self,
        username: &str,
        profile: Profile,
    ) -> Result<User, AppServicesError> {
        let user = User::register(UserId::generate(), username, profile, self.clock.now())?;
        self.storage.users.insert_user(&user).await?;
        debug!(user = %user.id(), username = user.username(), "user registered");
        Ok(user)
    }

    #[must_use]
    pub fn recorder(&self) -> Arc<SessionRecorder> {
        Arc::clone(&self.recorder)
    }

    #[must_use]
    pub fn aggregator(&self) -> Arc<ProgressAggregator> {
        Arc::clone(&self.aggregator)
    }
}
