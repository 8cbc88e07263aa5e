use chrono::{DateTime, Utc};
use rehab_core::model::{GameSession, GameType, SessionId, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, map_session_row, parse_game_type, ser};
use crate::repository::{SessionRepository, SessionRow, StorageError};

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn insert_session(&self, session: &GameSession) -> Result<SessionId, StorageError> {
        let data = session.session_data();
        let performance = session.performance();
        let feedback = session.feedback();

        let movements = serde_json::to_string(data.movements()).map_err(ser)?;
        let breaks = serde_json::to_string(performance.breaks()).map_err(ser)?;

        let res = sqlx::query(
            r"
                INSERT INTO game_sessions (
                    user_id, game_type, duration_secs, score, accuracy,
                    difficulty, movements, started_at, ended_at, breaks,
                    energy_level, pain_level, enjoyment, feedback_difficulty,
                    comments, created_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            ",
        )
        .bind(session.user_id().to_string())
        .bind(session.game_type().as_str())
        .bind(i64::from(data.duration_secs()))
        .bind(i64::from(data.score()))
        .bind(i64::from(data.accuracy()))
        .bind(data.difficulty().as_str())
        .bind(movements)
        .bind(performance.started_at())
        .bind(performance.ended_at())
        .bind(breaks)
        .bind(performance.energy_level().map(i64::from))
        .bind(performance.pain_level().map(i64::from))
        .bind(feedback.enjoyment().map(i64::from))
        .bind(feedback.difficulty().map(i64::from))
        .bind(feedback.comments())
        .bind(session.created_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(SessionId::new(res.last_insert_rowid()))
    }

    async fn get_session(&self, id: SessionId) -> Result<GameSession, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    id, user_id, game_type, duration_secs, score, accuracy,
                    difficulty, movements, started_at, ended_at, breaks,
                    energy_level, pain_level, enjoyment, feedback_difficulty,
                    comments, created_at
                FROM game_sessions
                WHERE id = ?1
            ",
        )
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        Ok(map_session_row(&row)?.session)
    }

    async fn list_recent(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<SessionRow>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, user_id, game_type, duration_secs, score, accuracy,
                    difficulty, movements, started_at, ended_at, breaks,
                    energy_level, pain_level, enjoyment, feedback_difficulty,
                    comments, created_at
                FROM game_sessions
                WHERE user_id = ?1
                ORDER BY created_at DESC, id DESC
                LIMIT ?2
            ",
        )
        .bind(user_id.to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_session_row).collect()
    }

    async fn list_recent_by_type(
        &self,
        user_id: UserId,
        game_type: GameType,
        limit: u32,
    ) -> Result<Vec<SessionRow>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, user_id, game_type, duration_secs, score, accuracy,
                    difficulty, movements, started_at, ended_at, breaks,
                    energy_level, pain_level, enjoyment, feedback_difficulty,
                    comments, created_at
                FROM game_sessions
                WHERE user_id = ?1 AND game_type = ?2
                ORDER BY created_at DESC, id DESC
                LIMIT ?3
            ",
        )
        .bind(user_id.to_string())
        .bind(game_type.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_session_row).collect()
    }

    async fn list_since(
        &self,
        user_id: UserId,
        from: DateTime<Utc>,
    ) -> Result<Vec<SessionRow>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, user_id, game_type, duration_secs, score, accuracy,
                    difficulty, movements, started_at, ended_at, breaks,
                    energy_level, pain_level, enjoyment, feedback_difficulty,
                    comments, created_at
                FROM game_sessions
                WHERE user_id = ?1 AND created_at >= ?2
                ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(user_id.to_string())
        .bind(from)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_session_row).collect()
    }

    async fn count_by_game_type(
        &self,
        user_id: UserId,
    ) -> Result<Vec<(GameType, u64)>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT game_type, COUNT(*) AS session_count
                FROM game_sessions
                WHERE user_id = ?1
                GROUP BY game_type
            ",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter()
            .map(|row| {
                let game_type =
                    parse_game_type(row.try_get::<String, _>("game_type").map_err(ser)?.as_str())?;
                let count_i64: i64 = row.try_get("session_count").map_err(ser)?;
                let count = u64::try_from(count_i64).map_err(|_| {
                    StorageError::Serialization(format!("invalid session_count: {count_i64}"))
                })?;
                Ok((game_type, count))
            })
            .collect()
    }
}
