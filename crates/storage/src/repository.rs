use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rehab_core::model::{
    GameSession, GameType, ProgressDelta, SessionId, User, UserId, UserProgress,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A persisted session together with its storage row identity.
///
/// `GameSession` itself carries no id: the row id is assigned on insert and
/// only matters to callers that page through history.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRow {
    pub id: SessionId,
    pub session: GameSession,
}

impl SessionRow {
    #[must_use]
    pub fn new(id: SessionId, session: GameSession) -> Self {
        Self { id, session }
    }
}

/// Repository contract for immutable session records.
///
/// Sessions are append-only; there is deliberately no update or delete.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Append a session record and return its assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be stored.
    async fn insert_session(&self, session: &GameSession) -> Result<SessionId, StorageError>;

    /// Fetch one session by row id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_session(&self, id: SessionId) -> Result<GameSession, StorageError>;

    /// The user's most recent sessions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn list_recent(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<SessionRow>, StorageError>;

    /// The user's most recent sessions of one game type, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn list_recent_by_type(
        &self,
        user_id: UserId,
        game_type: GameType,
        limit: u32,
    ) -> Result<Vec<SessionRow>, StorageError>;

    /// All of the user's sessions recorded at or after `from`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn list_since(
        &self,
        user_id: UserId,
        from: DateTime<Utc>,
    ) -> Result<Vec<SessionRow>, StorageError>;

    /// Session counts per game type over the user's full history.
    ///
    /// Only game types with at least one session appear; the order is
    /// unspecified.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn count_by_game_type(
        &self,
        user_id: UserId,
    ) -> Result<Vec<(GameType, u64)>, StorageError>;
}

/// Repository contract for users and their progress aggregates.
///
/// Achievements are persisted through `add_achievement` only; the
/// achievements carried by a `User` passed to `insert_user` are ignored.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a newly registered user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id or username is already
    /// taken, or other storage errors.
    async fn insert_user(&self, user: &User) -> Result<(), StorageError>;

    /// Fetch a user by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError>;

    /// Atomically apply one session's increments to the stored aggregate
    /// and refresh `last_active`.
    ///
    /// All increments land in a single step, so concurrent calls never lose
    /// a session count or experience points. Returns the updated aggregate,
    /// or `None` when no such user exists; the caller decides whether that
    /// is an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the update fails.
    async fn apply_progress(
        &self,
        id: UserId,
        delta: &ProgressDelta,
        last_active: DateTime<Utc>,
    ) -> Result<Option<UserProgress>, StorageError>;

    /// Append an achievement to the user's earned set.
    ///
    /// Idempotent: returns false when the achievement was already earned.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user does not exist, or
    /// other storage errors.
    async fn add_achievement(
        &self,
        id: UserId,
        achievement: &str,
        earned_at: DateTime<Utc>,
    ) -> Result<bool, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    users: Arc<Mutex<HashMap<UserId, User>>>,
    sessions: Arc<Mutex<Vec<SessionRow>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: Arc::new(Mutex::new(HashMap::new())),
            sessions: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

fn lock_err<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn sorted_newest_first(mut rows: Vec<SessionRow>) -> Vec<SessionRow> {
    rows.sort_by(|a, b| {
        b.session
            .created_at()
            .cmp(&a.session.created_at())
            .then_with(|| b.id.value().cmp(&a.id.value()))
    });
    rows
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn insert_session(&self, session: &GameSession) -> Result<SessionId, StorageError> {
        let mut guard = self.sessions.lock().map_err(lock_err)?;
        let next = i64::try_from(guard.len() + 1)
            .map_err(|_| StorageError::Serialization("session id overflow".into()))?;
        let id = SessionId::new(next);
        guard.push(SessionRow::new(id, session.clone()));
        Ok(id)
    }

    async fn get_session(&self, id: SessionId) -> Result<GameSession, StorageError> {
        let guard = self.sessions.lock().map_err(lock_err)?;
        guard
            .iter()
            .find(|row| row.id == id)
            .map(|row| row.session.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn list_recent(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<SessionRow>, StorageError> {
        let guard = self.sessions.lock().map_err(lock_err)?;
        let rows: Vec<SessionRow> = guard
            .iter()
            .filter(|row| row.session.user_id() == user_id)
            .cloned()
            .collect();
        let mut rows = sorted_newest_first(rows);
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(rows)
    }

    async fn list_recent_by_type(
        &self,
        user_id: UserId,
        game_type: GameType,
        limit: u32,
    ) -> Result<Vec<SessionRow>, StorageError> {
        let guard = self.sessions.lock().map_err(lock_err)?;
        let rows: Vec<SessionRow> = guard
            .iter()
            .filter(|row| {
                row.session.user_id() == user_id && row.session.game_type() == game_type
            })
            .cloned()
            .collect();
        let mut rows = sorted_newest_first(rows);
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(rows)
    }

    async fn list_since(
        &self,
        user_id: UserId,
        from: DateTime<Utc>,
    ) -> Result<Vec<SessionRow>, StorageError> {
        let guard = self.sessions.lock().map_err(lock_err)?;
        let rows: Vec<SessionRow> = guard
            .iter()
            .filter(|row| row.session.user_id() == user_id && row.session.created_at() >= from)
            .cloned()
            .collect();
        Ok(sorted_newest_first(rows))
    }

    async fn count_by_game_type(
        &self,
        user_id: UserId,
    ) -> Result<Vec<(GameType, u64)>, StorageError> {
        let guard = self.sessions.lock().map_err(lock_err)?;
        let mut counts: HashMap<GameType, u64> = HashMap::new();
        for row in guard.iter().filter(|row| row.session.user_id() == user_id) {
            *counts.entry(row.session.game_type()).or_insert(0) += 1;
        }
        Ok(counts.into_iter().collect())
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn insert_user(&self, user: &User) -> Result<(), StorageError> {
        let mut guard = self.users.lock().map_err(lock_err)?;
        let taken = guard.contains_key(&user.id())
            || guard.values().any(|u| u.username() == user.username());
        if taken {
            return Err(StorageError::Conflict);
        }
        guard.insert(user.id(), user.clone());
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let guard = self.users.lock().map_err(lock_err)?;
        Ok(guard.get(&id).cloned())
    }

    async fn apply_progress(
        &self,
        id: UserId,
        delta: &ProgressDelta,
        last_active: DateTime<Utc>,
    ) -> Result<Option<UserProgress>, StorageError> {
        let mut guard = self.users.lock().map_err(lock_err)?;
        let Some(user) = guard.get_mut(&id) else {
            return Ok(None);
        };
        user.apply_progress(delta, last_active);
        Ok(Some(user.progress().clone()))
    }

    async fn add_achievement(
        &self,
        id: UserId,
        achievement: &str,
        _earned_at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let mut guard = self.users.lock().map_err(lock_err)?;
        let user = guard.get_mut(&id).ok_or(StorageError::NotFound)?;
        Ok(user.grant_achievement(achievement))
    }
}

/// Aggregates user and session repositories behind trait objects for easy
/// backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<dyn SessionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let users: Arc<dyn UserRepository> = Arc::new(repo.clone());
        let sessions: Arc<dyn SessionRepository> = Arc::new(repo);
        Self { users, sessions }
    }
}
