use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::UserId;
use crate::model::progress::{ProgressDelta, UserProgress};

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Errors that can occur when building or decoding a user.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserError {
    #[error("username cannot be empty")]
    EmptyUsername,

    #[error("unknown condition: {0}")]
    UnknownCondition(String),

    #[error("unknown recovery stage: {0}")]
    UnknownRecoveryStage(String),
}

//
// ─── PROFILE ──────────────────────────────────────────────────────────────────
//

/// Body area or function the user is rehabilitating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Hand,
    Leg,
    Walking,
    #[default]
    General,
}

impl Condition {
    /// Returns the stable wire name for this condition.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Condition::Hand => "hand",
            Condition::Leg => "leg",
            Condition::Walking => "walking",
            Condition::General => "general",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Condition {
    type Err = UserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hand" => Ok(Condition::Hand),
            "leg" => Ok(Condition::Leg),
            "walking" => Ok(Condition::Walking),
            "general" => Ok(Condition::General),
            other => Err(UserError::UnknownCondition(other.to_string())),
        }
    }
}

/// How far along the recovery is, set at registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryStage {
    #[default]
    Early,
    Intermediate,
    Advanced,
}

impl RecoveryStage {
    /// Returns the stable wire name for this stage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RecoveryStage::Early => "early",
            RecoveryStage::Intermediate => "intermediate",
            RecoveryStage::Advanced => "advanced",
        }
    }
}

impl fmt::Display for RecoveryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RecoveryStage {
    type Err = UserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "early" => Ok(RecoveryStage::Early),
            "intermediate" => Ok(RecoveryStage::Intermediate),
            "advanced" => Ok(RecoveryStage::Advanced),
            other => Err(UserError::UnknownRecoveryStage(other.to_string())),
        }
    }
}

/// Rehabilitation profile captured at registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Profile {
    pub condition: Condition,
    pub recovery_stage: RecoveryStage,
}

//
// ─── USER ─────────────────────────────────────────────────────────────────────
//

/// A registered user together with their cumulative progress aggregate.
///
/// Identity (credentials, tokens) lives elsewhere; this type only carries
/// what the recorder and aggregator need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: UserId,
    username: String,
    profile: Profile,
    progress: UserProgress,
    created_at: DateTime<Utc>,
    last_active: DateTime<Utc>,
}

impl User {
    /// Creates a user at registration time with a zero-valued aggregate.
    ///
    /// # Errors
    ///
    /// Returns `UserError::EmptyUsername` if the username is blank.
    pub fn register(
        id: UserId,
        username: impl Into<String>,
        profile: Profile,
        now: DateTime<Utc>,
    ) -> Result<Self, UserError> {
        let username = username.into();
        if username.trim().is_empty() {
            return Err(UserError::EmptyUsername);
        }
        Ok(Self {
            id,
            username,
            profile,
            progress: UserProgress::zeroed(),
            created_at: now,
            last_active: now,
        })
    }

    /// Rehydrates a user from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `UserError::EmptyUsername` if the stored username is blank.
    pub fn from_persisted(
        id: UserId,
        username: impl Into<String>,
        profile: Profile,
        progress: UserProgress,
        created_at: DateTime<Utc>,
        last_active: DateTime<Utc>,
    ) -> Result<Self, UserError> {
        let username = username.into();
        if username.trim().is_empty() {
            return Err(UserError::EmptyUsername);
        }
        Ok(Self {
            id,
            username,
            profile,
            progress,
            created_at,
            last_active,
        })
    }

    /// Applies one session's increments and refreshes `last_active`.
    pub fn apply_progress(&mut self, delta: &ProgressDelta, at: DateTime<Utc>) {
        self.progress.apply(delta);
        self.last_active = at;
    }

    /// Appends an achievement; returns false if it was already earned.
    pub fn grant_achievement(&mut self, achievement: impl Into<String>) -> bool {
        self.progress.grant(achievement)
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn profile(&self) -> Profile {
        self.profile
    }

    #[must_use]
    pub fn progress(&self) -> &UserProgress {
        &self.progress
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Last time a session was recorded for this user (or registration time
    /// if none has been).
    #[must_use]
    pub fn last_active(&self) -> DateTime<Utc> {
        self.last_active
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    #[test]
    fn registration_starts_zeroed() {
        let now = fixed_now();
        let user = User::register(UserId::generate(), "aline", Profile::default(), now).unwrap();

        assert_eq!(user.progress().total_sessions(), 0);
        assert_eq!(user.progress().experience(), 0);
        assert_eq!(user.progress().current_level(), 1);
        assert_eq!(user.last_active(), now);
    }

    #[test]
    fn blank_username_is_rejected() {
        let err =
            User::register(UserId::generate(), "   ", Profile::default(), fixed_now()).unwrap_err();
        assert_eq!(err, UserError::EmptyUsername);
    }

    #[test]
    fn applying_progress_bumps_last_active() {
        let now = fixed_now();
        let mut user = User::register(UserId::generate(), "aline", Profile::default(), now).unwrap();

        let later = now + Duration::hours(2);
        user.apply_progress(
            &ProgressDelta {
                sessions: 1,
                time_secs: 240,
                experience: 42,
            },
            later,
        );

        assert_eq!(user.progress().total_sessions(), 1);
        assert_eq!(user.progress().experience(), 42);
        assert_eq!(user.last_active(), later);
    }

    #[test]
    fn profile_wire_names_roundtrip() {
        for condition in [
            Condition::Hand,
            Condition::Leg,
            Condition::Walking,
            Condition::General,
        ] {
            let parsed: Condition = condition.as_str().parse().unwrap();
            assert_eq!(parsed, condition);
        }
        for stage in [
            RecoveryStage::Early,
            RecoveryStage::Intermediate,
            RecoveryStage::Advanced,
        ] {
            let parsed: RecoveryStage = stage.as_str().parse().unwrap();
            assert_eq!(parsed, stage);
        }
    }
}
