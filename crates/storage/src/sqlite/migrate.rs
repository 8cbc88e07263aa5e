use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs a single, consolidated migration for the current schema.
///
/// Creates the full schema (users with their progress aggregate, session
/// records, earned achievements, and indexes).
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS users (
                    id TEXT PRIMARY KEY,
                    username TEXT NOT NULL UNIQUE,
                    condition TEXT NOT NULL,
                    recovery_stage TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    last_active TEXT NOT NULL,
                    total_sessions INTEGER NOT NULL CHECK (total_sessions >= 0),
                    total_time_secs INTEGER NOT NULL CHECK (total_time_secs >= 0),
                    experience INTEGER NOT NULL CHECK (experience >= 0),
                    current_level INTEGER NOT NULL CHECK (current_level >= 1)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        // No foreign key on user_id: a session record must survive even when
        // the user row is gone by the time it lands.
        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS game_sessions (
                    id INTEGER PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    game_type TEXT NOT NULL,
                    duration_secs INTEGER NOT NULL CHECK (duration_secs >= 0),
                    score INTEGER NOT NULL CHECK (score >= 0),
                    accuracy INTEGER NOT NULL CHECK (accuracy BETWEEN 0 AND 100),
                    difficulty TEXT NOT NULL,
                    movements TEXT NOT NULL,
                    started_at TEXT NOT NULL,
                    ended_at TEXT NOT NULL,
                    breaks TEXT NOT NULL,
                    energy_level INTEGER CHECK (energy_level BETWEEN 1 AND 10),
                    pain_level INTEGER CHECK (pain_level BETWEEN 1 AND 10),
                    enjoyment INTEGER CHECK (enjoyment BETWEEN 1 AND 5),
                    feedback_difficulty INTEGER CHECK (feedback_difficulty BETWEEN 1 AND 5),
                    comments TEXT,
                    created_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS achievements (
                    user_id TEXT NOT NULL,
                    achievement TEXT NOT NULL,
                    earned_at TEXT NOT NULL,
                    PRIMARY KEY (user_id, achievement),
                    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_game_sessions_user_created
                    ON game_sessions (user_id, created_at DESC, id DESC);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_game_sessions_user_type_created
                    ON game_sessions (user_id, game_type, created_at DESC);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
