use chrono::{DateTime, Utc};
use rehab_core::model::{ProgressDelta, User, UserId, UserProgress, XP_PER_LEVEL};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, map_progress_row, map_user_row, ser};
use crate::repository::{StorageError, UserRepository};

fn u64_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn insert_err(e: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StorageError::Conflict;
        }
    }
    StorageError::Connection(e.to_string())
}

impl SqliteRepository {
    async fn achievements_for(&self, id: UserId) -> Result<Vec<String>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT achievement
                FROM achievements
                WHERE user_id = ?1
                ORDER BY earned_at, achievement
            ",
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("achievement").map_err(ser))
            .collect()
    }

    async fn user_exists(&self, id: UserId) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM users WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        Ok(row.is_some())
    }
}

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn insert_user(&self, user: &User) -> Result<(), StorageError> {
        let progress = user.progress();
        sqlx::query(
            r"
                INSERT INTO users (
                    id, username, condition, recovery_stage, created_at,
                    last_active, total_sessions, total_time_secs, experience,
                    current_level
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
        )
        .bind(user.id().to_string())
        .bind(user.username())
        .bind(user.profile().condition.as_str())
        .bind(user.profile().recovery_stage.as_str())
        .bind(user.created_at())
        .bind(user.last_active())
        .bind(i64::from(progress.total_sessions()))
        .bind(u64_to_i64("total_time_secs", progress.total_time_secs())?)
        .bind(u64_to_i64("experience", progress.experience())?)
        .bind(i64::from(progress.current_level()))
        .execute(&self.pool)
        .await
        .map_err(insert_err)?;

        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    id, username, condition, recovery_stage, created_at,
                    last_active, total_sessions, total_time_secs, experience,
                    current_level
                FROM users
                WHERE id = ?1
            ",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let achievements = self.achievements_for(id).await?;
        Ok(Some(map_user_row(&row, achievements)?))
    }

    async fn apply_progress(
        &self,
        id: UserId,
        delta: &ProgressDelta,
        last_active: DateTime<Utc>,
    ) -> Result<Option<UserProgress>, StorageError> {
        // One statement, increments computed against the pre-update row, so
        // concurrent recorders cannot lose a session count or experience.
        // SQLite integer division floors for the non-negative values here.
        let res = sqlx::query(
            r"
                UPDATE users SET
                    total_sessions = total_sessions + ?1,
                    total_time_secs = total_time_secs + ?2,
                    experience = experience + ?3,
                    current_level = MAX(current_level, (experience + ?3) / ?4 + 1),
                    last_active = ?5
                WHERE id = ?6
            ",
        )
        .bind(i64::from(delta.sessions))
        .bind(u64_to_i64("time_secs", delta.time_secs)?)
        .bind(u64_to_i64("experience", delta.experience)?)
        .bind(u64_to_i64("xp_per_level", XP_PER_LEVEL)?)
        .bind(last_active)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Ok(None);
        }

        let row = sqlx::query(
            r"
                SELECT total_sessions, total_time_secs, experience, current_level
                FROM users
                WHERE id = ?1
            ",
        )
        .bind(id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;

        let achievements = self.achievements_for(id).await?;
        Ok(Some(map_progress_row(&row, achievements)?))
    }

    async fn add_achievement(
        &self,
        id: UserId,
        achievement: &str,
        earned_at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        if !self.user_exists(id).await? {
            return Err(StorageError::NotFound);
        }

        let res = sqlx::query(
            r"
                INSERT OR IGNORE INTO achievements (user_id, achievement, earned_at)
                VALUES (?1, ?2, ?3)
            ",
        )
        .bind(id.to_string())
        .bind(achievement)
        .bind(earned_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.rows_affected() == 1)
    }
}
