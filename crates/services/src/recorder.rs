use std::sync::Arc;

use tracing::{debug, warn};

use rehab_core::Clock;
use rehab_core::model::{ProgressDelta, SessionDraft, SessionId, UserId, UserProgress};
use storage::repository::{SessionRepository, UserRepository};

use crate::error::RecordError;

//
// ─── RECORD OUTCOME ────────────────────────────────────────────────────────────
//

/// Outcome of recording one finished session.
///
/// `progress` is `None` when the session was stored but no progress
/// aggregate exists for the user; the session record is kept either way.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    pub session_id: SessionId,
    pub progress: Option<UserProgress>,
}

impl RecordOutcome {
    /// True when the session was stored but the progress update was skipped.
    #[must_use]
    pub fn progress_skipped(&self) -> bool {
        self.progress.is_none()
    }
}

//
// ─── SESSION RECORDER ──────────────────────────────────────────────────────────
//

/// Validates and persists finished game sessions, then applies the
/// progression rules to the user's aggregate.
#[derive(Clone)]
pub struct SessionRecorder {
    clock: Clock,
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRepository>,
}

impl SessionRecorder {
    #[must_use]
    pub fn new(
        clock: Clock,
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            clock,
            users,
            sessions,
        }
    }

    /// Records one finished session.
    ///
    /// The draft is validated first; nothing is written when validation
    /// fails. The session record is inserted before the progress update, so
    /// a storage failure can lose the progress increment but never the
    /// session itself. A user without a progress aggregate is not an error:
    /// the session stays recorded and the outcome carries `progress: None`.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::Validation` when required fields are missing
    /// or out of range, or `RecordError::Storage` when the record store
    /// fails.
    pub async fn record_session(
        &self,
        user_id: UserId,
        draft: SessionDraft,
    ) -> Result<RecordOutcome, RecordError> {
        let now = self.clock.now();
        let session = draft.validate(user_id, now)?;
        let delta = ProgressDelta::for_session(session.session_data());

        let session_id = self.sessions.insert_session(&session).await?;
        let progress = self.users.apply_progress(user_id, &delta, now).await?;

        match &progress {
            Some(progress) => debug!(
                user = %user_id,
                session = %session_id,
                experience = progress.experience(),
                level = progress.current_level(),
                "session recorded"
            ),
            None => warn!(
                user = %user_id,
                session = %session_id,
                "session recorded but user has no progress aggregate"
            ),
        }

        Ok(RecordOutcome {
            session_id,
            progress,
        })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use rehab_core::model::{
        Difficulty, GameSession, GameType, PerformanceDraft, Profile, SessionDataDraft,
        SessionValidationError, User,
    };
    use rehab_core::time::{fixed_clock, fixed_now};
    use storage::repository::{InMemoryRepository, SessionRow, StorageError};

    fn draft(score: u32) -> SessionDraft {
        let now = fixed_now();
        SessionDraft {
            game_type: Some(GameType::LegStrength),
            session_data: Some(SessionDataDraft {
                duration: Some(300),
                score: Some(score),
                accuracy: Some(80),
                difficulty: Some(Difficulty::Easy),
                movements: vec![],
            }),
            performance: Some(PerformanceDraft {
                start_time: Some(now - Duration::minutes(5)),
                end_time: Some(now),
                breaks: vec![],
                energy_level: None,
                pain_level: None,
            }),
            feedback: None,
        }
    }

    fn recorder_over(repo: &InMemoryRepository) -> SessionRecorder {
        SessionRecorder::new(
            fixed_clock(),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
    }

    async fn registered_user(repo: &InMemoryRepository) -> User {
        let user =
            User::register(UserId::generate(), "remy", Profile::default(), fixed_now()).unwrap();
        repo.insert_user(&user).await.unwrap();
        user
    }

    #[tokio::test]
    async fn recording_updates_progress() {
        let repo = InMemoryRepository::new();
        let user = registered_user(&repo).await;
        let recorder = recorder_over(&repo);

        let outcome = recorder.record_session(user.id(), draft(850)).await.unwrap();

        assert!(!outcome.progress_skipped());
        let progress = outcome.progress.unwrap();
        assert_eq!(progress.total_sessions(), 1);
        assert_eq!(progress.total_time_secs(), 300);
        assert_eq!(progress.experience(), 85);
        assert_eq!(progress.current_level(), 1);

        let stored = repo.get_session(outcome.session_id).await.unwrap();
        assert_eq!(stored.session_data().score(), 850);
        assert_eq!(stored.created_at(), fixed_now());
    }

    #[tokio::test]
    async fn invalid_draft_writes_nothing() {
        let repo = InMemoryRepository::new();
        let user = registered_user(&repo).await;
        let recorder = recorder_over(&repo);

        let mut bad = draft(500);
        bad.performance = None;
        let err = recorder.record_session(user.id(), bad).await.unwrap_err();
        assert!(matches!(
            err,
            RecordError::Validation(SessionValidationError::MissingPerformance)
        ));

        let sessions = repo.list_recent(user.id(), 10).await.unwrap();
        assert!(sessions.is_empty());
        let unchanged = repo.get_user(user.id()).await.unwrap().unwrap();
        assert_eq!(unchanged.progress().total_sessions(), 0);
    }

    #[tokio::test]
    async fn unknown_user_keeps_session_and_skips_progress() {
        let repo = InMemoryRepository::new();
        let recorder = recorder_over(&repo);

        let ghost = UserId::generate();
        let outcome = recorder.record_session(ghost, draft(640)).await.unwrap();

        assert!(outcome.progress_skipped());
        let sessions = repo.list_recent(ghost, 10).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session.session_data().score(), 640);
    }

    struct FailingSessions;

    #[async_trait]
    impl SessionRepository for FailingSessions {
        async fn insert_session(
            &self,
            _session: &GameSession,
        ) -> Result<SessionId, StorageError> {
            Err(StorageError::Connection("disk gone".into()))
        }

        async fn get_session(&self, _id: SessionId) -> Result<GameSession, StorageError> {
            Err(StorageError::NotFound)
        }

        async fn list_recent(
            &self,
            _user_id: UserId,
            _limit: u32,
        ) -> Result<Vec<SessionRow>, StorageError> {
            Ok(vec![])
        }

        async fn list_recent_by_type(
            &self,
            _user_id: UserId,
            _game_type: GameType,
            _limit: u32,
        ) -> Result<Vec<SessionRow>, StorageError> {
            Ok(vec![])
        }

        async fn list_since(
            &self,
            _user_id: UserId,
            _from: chrono::DateTime<chrono::Utc>,
        ) -> Result<Vec<SessionRow>, StorageError> {
            Ok(vec![])
        }

        async fn count_by_game_type(
            &self,
            _user_id: UserId,
        ) -> Result<Vec<(GameType, u64)>, StorageError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn failed_insert_leaves_progress_untouched() {
        let repo = InMemoryRepository::new();
        let user = registered_user(&repo).await;
        let recorder = SessionRecorder::new(
            fixed_clock(),
            Arc::new(repo.clone()),
            Arc::new(FailingSessions),
        );

        let err = recorder
            .record_session(user.id(), draft(700))
            .await
            .unwrap_err();
        assert!(matches!(err, RecordError::Storage(_)));

        let unchanged = repo.get_user(user.id()).await.unwrap().unwrap();
        assert_eq!(unchanged.progress().total_sessions(), 0);
        assert_eq!(unchanged.progress().experience(), 0);
    }
}
