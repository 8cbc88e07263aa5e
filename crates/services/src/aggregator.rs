use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use rehab_core::Clock;
use rehab_core::model::{GameType, UserId};
use rehab_core::stats::{self, RECENT_SESSION_LIMIT, Stats, WEEKLY_WINDOW_DAYS};
use storage::repository::{SessionRepository, SessionRow, UserRepository};

use crate::error::StatsError;

/// Default number of history rows returned by `recent_sessions`.
pub const DEFAULT_HISTORY_LIMIT: u32 = 10;

/// Read-only statistics over stored sessions and the progress aggregate.
///
/// The aggregator never writes: it is safe to run concurrently with any
/// number of recorders.
#[derive(Clone)]
pub struct ProgressAggregator {
    clock: Clock,
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRepository>,
}

impl ProgressAggregator {
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

    /// Computes the stats bundle as of the service clock's current time.
    ///
    /// # Errors
    ///
    /// Same as [`compute_stats_as_of`](Self::compute_stats_as_of).
    pub async fn compute_stats(&self, user_id: UserId) -> Result<Stats, StatsError> {
        self.compute_stats_as_of(user_id, self.clock.now()).await
    }

    /// Computes the stats bundle as of an explicit reference time.
    ///
    /// Pure read-and-compute: identical stored data and `as_of` always
    /// yield an identical bundle. Streak and rolling average read the
    /// newest `RECENT_SESSION_LIMIT` sessions; the weekly window and the
    /// game type distribution read further back.
    ///
    /// # Errors
    ///
    /// Returns `StatsError::UserNotFound` when the user does not exist, or
    /// `StatsError::Storage` when the record store fails.
    pub async fn compute_stats_as_of(
        &self,
        user_id: UserId,
        as_of: DateTime<Utc>,
    ) -> Result<Stats, StatsError> {
        let user = self
            .users
            .get_user(user_id)
            .await?
            .ok_or(StatsError::UserNotFound(user_id))?;

        let recent = self
            .sessions
            .list_recent(user_id, RECENT_SESSION_LIMIT)
            .await?;
        let recent_times: Vec<DateTime<Utc>> = recent
            .iter()
            .map(|row| row.session.created_at())
            .collect();
        let current_streak = stats::current_streak(as_of, &recent_times);
        let average_score =
            stats::average_score(recent.iter().map(|row| row.session.session_data().score()));

        let counts = self.sessions.count_by_game_type(user_id).await?;
        let game_type_distribution = stats::game_type_distribution(counts);

        let week_start = as_of - Duration::days(WEEKLY_WINDOW_DAYS);
        let weekly_rows = self.sessions.list_since(user_id, week_start).await?;
        let weekly_sessions: Vec<_> = weekly_rows.into_iter().map(|row| row.session).collect();
        let weekly = stats::weekly_stats(&weekly_sessions);

        let progress = user.progress();
        debug!(
            user = %user_id,
            streak = current_streak,
            sessions = progress.total_sessions(),
            "stats computed"
        );

        Ok(Stats {
            total_sessions: progress.total_sessions(),
            total_time_secs: progress.total_time_secs(),
            current_streak,
            average_score,
            level: progress.current_level(),
            experience: progress.experience(),
            game_type_distribution,
            weekly,
            achievements: progress.achievements().to_vec(),
            last_active: user.last_active(),
        })
    }

    /// Recent session history, newest first, optionally filtered by game
    /// type. A `limit` of `None` uses `DEFAULT_HISTORY_LIMIT`.
    ///
    /// # Errors
    ///
    /// Returns `StatsError::Storage` when the record store fails.
    pub async fn recent_sessions(
        &self,
        user_id: UserId,
        game_type: Option<GameType>,
        limit: Option<u32>,
    ) -> Result<Vec<SessionRow>, StatsError> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        let rows = match game_type {
            Some(game_type) => {
                self.sessions
                    .list_recent_by_type(user_id, game_type, limit)
                    .await?
            }
            None => self.sessions.list_recent(user_id, limit).await?,
        };
        Ok(rows)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rehab_core::model::{
        Difficulty, Feedback, GameSession, Performance, Profile, ProgressDelta, SessionData, User,
    };
    use rehab_core::time::{fixed_clock, fixed_now};
    use storage::repository::InMemoryRepository;

    fn build_session(
        user_id: UserId,
        game_type: GameType,
        score: u32,
        created_at: DateTime<Utc>,
    ) -> GameSession {
        let data = SessionData::new(120, score, 75, Difficulty::Easy, vec![]).unwrap();
        let performance =
            Performance::new(created_at - Duration::minutes(2), created_at, vec![], None, None)
                .unwrap();
        GameSession::from_parts(
            user_id,
            game_type,
            data,
            performance,
            Feedback::default(),
            created_at,
        )
    }

    async fn seeded_user(repo: &InMemoryRepository) -> User {
        let user =
            User::register(UserId::generate(), "dana", Profile::default(), fixed_now()).unwrap();
        repo.insert_user(&user).await.unwrap();
        user
    }

    async fn record(repo: &InMemoryRepository, session: &GameSession) {
        repo.insert_session(session).await.unwrap();
        repo.apply_progress(
            session.user_id(),
            &ProgressDelta::for_session(session.session_data()),
            session.created_at(),
        )
        .await
        .unwrap();
    }

    fn aggregator_over(repo: &InMemoryRepository) -> ProgressAggregator {
        ProgressAggregator::new(
            fixed_clock(),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
    }

    #[tokio::test]
    async fn unknown_user_is_an_error() {
        let repo = InMemoryRepository::new();
        let aggregator = aggregator_over(&repo);

        let err = aggregator
            .compute_stats(UserId::generate())
            .await
            .unwrap_err();
        assert!(matches!(err, StatsError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn fresh_user_gets_zeroed_stats() {
        let repo = InMemoryRepository::new();
        let user = seeded_user(&repo).await;
        let aggregator = aggregator_over(&repo);

        let stats = aggregator.compute_stats(user.id()).await.unwrap();
        assert_eq!(stats.total_sessions, 0);
        assert_eq!(stats.current_streak, 0);
        assert_eq!(stats.average_score, 0);
        assert_eq!(stats.level, 1);
        assert!(stats.game_type_distribution.is_empty());
        assert_eq!(stats.weekly.sessions, 0);
        assert_eq!(stats.last_active, fixed_now());
    }

    #[tokio::test]
    async fn streak_and_average_follow_recent_sessions() {
        let repo = InMemoryRepository::new();
        let user = seeded_user(&repo).await;
        let now = fixed_now();

        // three consecutive days ending today, then a gap
        for day in 0..3 {
            let session = build_session(
                user.id(),
                GameType::Balance,
                80 + day,
                now - Duration::days(i64::from(day)),
            );
            record(&repo, &session).await;
        }
        let stale = build_session(user.id(), GameType::Balance, 10, now - Duration::days(5));
        record(&repo, &stale).await;

        let aggregator = aggregator_over(&repo);
        let stats = aggregator.compute_stats(user.id()).await.unwrap();

        assert_eq!(stats.total_sessions, 4);
        assert_eq!(stats.current_streak, 3);
        // (80 + 81 + 82 + 10) / 4 = 63.25 -> 63
        assert_eq!(stats.average_score, 63);
    }

    #[tokio::test]
    async fn average_reads_at_most_the_newest_thirty() {
        let repo = InMemoryRepository::new();
        let user = seeded_user(&repo).await;
        let now = fixed_now();

        // one old outlier, then thirty newer sessions at score 100
        let outlier = build_session(
            user.id(),
            GameType::Memory,
            0,
            now - Duration::days(40),
        );
        record(&repo, &outlier).await;
        for i in 0..30 {
            let session = build_session(
                user.id(),
                GameType::Memory,
                100,
                now - Duration::hours(i64::from(i)),
            );
            record(&repo, &session).await;
        }

        let aggregator = aggregator_over(&repo);
        let stats = aggregator.compute_stats(user.id()).await.unwrap();

        assert_eq!(stats.average_score, 100);
        // distribution still sees the full history
        assert_eq!(stats.game_type_distribution[0].count, 31);
    }

    #[tokio::test]
    async fn weekly_window_boundary_is_inclusive() {
        let repo = InMemoryRepository::new();
        let user = seeded_user(&repo).await;
        let now = fixed_now();

        let on_boundary = build_session(
            user.id(),
            GameType::Reaction,
            60,
            now - Duration::days(7),
        );
        record(&repo, &on_boundary).await;
        let just_outside = build_session(
            user.id(),
            GameType::Reaction,
            90,
            now - Duration::days(7) - Duration::seconds(1),
        );
        record(&repo, &just_outside).await;

        let aggregator = aggregator_over(&repo);
        let stats = aggregator.compute_stats(user.id()).await.unwrap();

        assert_eq!(stats.weekly.sessions, 1);
        assert_eq!(stats.weekly.total_time_secs, 120);
        assert_eq!(stats.weekly.average_score, 60);
    }

    #[tokio::test]
    async fn same_inputs_yield_identical_stats() {
        let repo = InMemoryRepository::new();
        let user = seeded_user(&repo).await;
        let now = fixed_now();
        for day in 0..4 {
            let session = build_session(
                user.id(),
                GameType::HandCoordination,
                70,
                now - Duration::days(i64::from(day)),
            );
            record(&repo, &session).await;
        }

        let aggregator = aggregator_over(&repo);
        let first = aggregator.compute_stats_as_of(user.id(), now).await.unwrap();
        let second = aggregator.compute_stats_as_of(user.id(), now).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn history_filter_and_default_limit() {
        let repo = InMemoryRepository::new();
        let user = seeded_user(&repo).await;
        let now = fixed_now();

        for i in 0..12 {
            let game_type = if i % 2 == 0 {
                GameType::Balance
            } else {
                GameType::Memory
            };
            let session =
                build_session(user.id(), game_type, 50, now - Duration::minutes(i64::from(i)));
            record(&repo, &session).await;
        }

        let aggregator = aggregator_over(&repo);

        let history = aggregator
            .recent_sessions(user.id(), None, None)
            .await
            .unwrap();
        assert_eq!(history.len(), usize::try_from(DEFAULT_HISTORY_LIMIT).unwrap());

        let memory_only = aggregator
            .recent_sessions(user.id(), Some(GameType::Memory), Some(3))
            .await
            .unwrap();
        assert_eq!(memory_only.len(), 3);
        assert!(
            memory_only
                .iter()
                .all(|row| row.session.game_type() == GameType::Memory)
        );
    }
}
