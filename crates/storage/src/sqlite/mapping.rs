use std::str::FromStr;

use chrono::{DateTime, Utc};
use rehab_core::model::{
    Condition, Difficulty, Feedback, GameSession, GameType, Movement, Performance, Profile,
    RecoveryStage, SessionData, SessionId, User, UserId, UserProgress,
};
use sqlx::Row;

use crate::repository::{SessionRow, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn u64_from_i64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn u8_from_i64(field: &'static str, v: i64) -> Result<u8, StorageError> {
    u8::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn opt_u8_from_i64(field: &'static str, v: Option<i64>) -> Result<Option<u8>, StorageError> {
    v.map(|v| u8_from_i64(field, v)).transpose()
}

pub(crate) fn user_id_from_str(s: &str) -> Result<UserId, StorageError> {
    UserId::from_str(s).map_err(ser)
}

pub(crate) fn parse_game_type(s: &str) -> Result<GameType, StorageError> {
    GameType::from_str(s).map_err(ser)
}

fn parse_difficulty(s: &str) -> Result<Difficulty, StorageError> {
    Difficulty::from_str(s).map_err(ser)
}

fn parse_condition(s: &str) -> Result<Condition, StorageError> {
    Condition::from_str(s).map_err(ser)
}

fn parse_recovery_stage(s: &str) -> Result<RecoveryStage, StorageError> {
    RecoveryStage::from_str(s).map_err(ser)
}

/// Rebuilds a full session (with row id) from one `game_sessions` row.
///
/// Movements and breaks are stored as JSON columns; domain range checks run
/// again on the way out, so a hand-edited row cannot smuggle invalid data
/// into the domain.
pub(crate) fn map_session_row(row: &sqlx::sqlite::SqliteRow) -> Result<SessionRow, StorageError> {
    let id = SessionId::new(row.try_get::<i64, _>("id").map_err(ser)?);
    let user_id = user_id_from_str(row.try_get::<String, _>("user_id").map_err(ser)?.as_str())?;
    let game_type = parse_game_type(row.try_get::<String, _>("game_type").map_err(ser)?.as_str())?;

    let movements: Vec<Movement> =
        serde_json::from_str(row.try_get::<String, _>("movements").map_err(ser)?.as_str())
            .map_err(ser)?;
    let session_data = SessionData::new(
        u32_from_i64(
            "duration_secs",
            row.try_get::<i64, _>("duration_secs").map_err(ser)?,
        )?,
        u32_from_i64("score", row.try_get::<i64, _>("score").map_err(ser)?)?,
        u8_from_i64("accuracy", row.try_get::<i64, _>("accuracy").map_err(ser)?)?,
        parse_difficulty(row.try_get::<String, _>("difficulty").map_err(ser)?.as_str())?,
        movements,
    )
    .map_err(ser)?;

    let breaks: Vec<DateTime<Utc>> =
        serde_json::from_str(row.try_get::<String, _>("breaks").map_err(ser)?.as_str())
            .map_err(ser)?;
    let performance = Performance::new(
        row.try_get("started_at").map_err(ser)?,
        row.try_get("ended_at").map_err(ser)?,
        breaks,
        opt_u8_from_i64(
            "energy_level",
            row.try_get::<Option<i64>, _>("energy_level").map_err(ser)?,
        )?,
        opt_u8_from_i64(
            "pain_level",
            row.try_get::<Option<i64>, _>("pain_level").map_err(ser)?,
        )?,
    )
    .map_err(ser)?;

    let feedback = Feedback::new(
        opt_u8_from_i64(
            "enjoyment",
            row.try_get::<Option<i64>, _>("enjoyment").map_err(ser)?,
        )?,
        opt_u8_from_i64(
            "feedback_difficulty",
            row.try_get::<Option<i64>, _>("feedback_difficulty")
                .map_err(ser)?,
        )?,
        row.try_get::<Option<String>, _>("comments").map_err(ser)?,
    )
    .map_err(ser)?;

    let session = GameSession::from_parts(
        user_id,
        game_type,
        session_data,
        performance,
        feedback,
        row.try_get("created_at").map_err(ser)?,
    );
    Ok(SessionRow::new(id, session))
}

/// Rebuilds a user from one `users` row plus their achievement names.
pub(crate) fn map_user_row(
    row: &sqlx::sqlite::SqliteRow,
    achievements: Vec<String>,
) -> Result<User, StorageError> {
    let id = user_id_from_str(row.try_get::<String, _>("id").map_err(ser)?.as_str())?;
    let username: String = row.try_get("username").map_err(ser)?;
    let profile = Profile {
        condition: parse_condition(row.try_get::<String, _>("condition").map_err(ser)?.as_str())?,
        recovery_stage: parse_recovery_stage(
            row.try_get::<String, _>("recovery_stage")
                .map_err(ser)?
                .as_str(),
        )?,
    };
    let progress = map_progress_row(row, achievements)?;

    User::from_persisted(
        id,
        username,
        profile,
        progress,
        row.try_get("created_at").map_err(ser)?,
        row.try_get("last_active").map_err(ser)?,
    )
    .map_err(ser)
}

/// Rebuilds just the progress aggregate from a `users` row.
pub(crate) fn map_progress_row(
    row: &sqlx::sqlite::SqliteRow,
    achievements: Vec<String>,
) -> Result<UserProgress, StorageError> {
    Ok(UserProgress::from_persisted(
        u32_from_i64(
            "total_sessions",
            row.try_get::<i64, _>("total_sessions").map_err(ser)?,
        )?,
        u64_from_i64(
            "total_time_secs",
            row.try_get::<i64, _>("total_time_secs").map_err(ser)?,
        )?,
        u64_from_i64("experience", row.try_get::<i64, _>("experience").map_err(ser)?)?,
        u32_from_i64(
            "current_level",
            row.try_get::<i64, _>("current_level").map_err(ser)?,
        )?,
        achievements,
    ))
}
