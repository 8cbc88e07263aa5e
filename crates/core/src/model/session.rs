use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::game::{Difficulty, GameType};
use crate::model::ids::UserId;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Errors raised while turning a submitted session payload into a
/// `GameSession`. Nothing is persisted when validation fails.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionValidationError {
    #[error("game type is required")]
    MissingGameType,

    #[error("session data is required")]
    MissingSessionData,

    #[error("performance is required")]
    MissingPerformance,

    #[error("accuracy is required")]
    MissingAccuracy,

    #[error("difficulty is required")]
    MissingDifficulty,

    #[error("start time is required")]
    MissingStartTime,

    #[error("end time is required")]
    MissingEndTime,

    #[error("accuracy must be between 0 and 100, got {0}")]
    AccuracyOutOfRange(u8),

    #[error("end time is before start time")]
    InvalidTimeRange,

    #[error("energy level must be between 1 and 10, got {0}")]
    EnergyLevelOutOfRange(u8),

    #[error("pain level must be between 1 and 10, got {0}")]
    PainLevelOutOfRange(u8),

    #[error("enjoyment must be between 1 and 5, got {0}")]
    EnjoymentOutOfRange(u8),

    #[error("perceived difficulty must be between 1 and 5, got {0}")]
    PerceivedDifficultyOutOfRange(u8),
}

fn check_scale(
    value: Option<u8>,
    max: u8,
    err: fn(u8) -> SessionValidationError,
) -> Result<Option<u8>, SessionValidationError> {
    match value {
        Some(v) if !(1..=max).contains(&v) => Err(err(v)),
        other => Ok(other),
    }
}

//
// ─── MOVEMENT ─────────────────────────────────────────────────────────────────
//

/// One captured in-game movement event.
///
/// Movements are opaque to the progression rules; they are kept verbatim for
/// later clinical review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "timestamp")]
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub success: bool,
    #[serde(rename = "responseTime", skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u32>,
}

impl Movement {
    #[must_use]
    pub fn new(kind: impl Into<String>, occurred_at: DateTime<Utc>, success: bool) -> Self {
        Self {
            kind: kind.into(),
            occurred_at,
            success,
            response_time_ms: None,
        }
    }
}

//
// ─── SESSION DATA ─────────────────────────────────────────────────────────────
//

/// Outcome metrics reported by the mini-game for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionData {
    duration_secs: u32,
    score: u32,
    accuracy: u8,
    difficulty: Difficulty,
    movements: Vec<Movement>,
}

impl SessionData {
    /// Builds validated session metrics.
    ///
    /// # Errors
    ///
    /// Returns `SessionValidationError::AccuracyOutOfRange` if `accuracy`
    /// exceeds 100.
    pub fn new(
        duration_secs: u32,
        score: u32,
        accuracy: u8,
        difficulty: Difficulty,
        movements: Vec<Movement>,
    ) -> Result<Self, SessionValidationError> {
        if accuracy > 100 {
            return Err(SessionValidationError::AccuracyOutOfRange(accuracy));
        }
        Ok(Self {
            duration_secs,
            score,
            accuracy,
            difficulty,
            movements,
        })
    }

    /// Time spent playing, in seconds.
    #[must_use]
    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    /// Percentage of successful movements, 0-100.
    #[must_use]
    pub fn accuracy(&self) -> u8 {
        self.accuracy
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn movements(&self) -> &[Movement] {
        &self.movements
    }
}

//
// ─── PERFORMANCE ──────────────────────────────────────────────────────────────
//

/// Physical context of one session: when it ran, pauses taken, and how the
/// user reported feeling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Performance {
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    breaks: Vec<DateTime<Utc>>,
    energy_level: Option<u8>,
    pain_level: Option<u8>,
}

impl Performance {
    /// Builds a validated performance record.
    ///
    /// # Errors
    ///
    /// Returns `SessionValidationError::InvalidTimeRange` if `ended_at` is
    /// before `started_at`, or a range error if a self-reported level falls
    /// outside 1-10.
    pub fn new(
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        breaks: Vec<DateTime<Utc>>,
        energy_level: Option<u8>,
        pain_level: Option<u8>,
    ) -> Result<Self, SessionValidationError> {
        if ended_at < started_at {
            return Err(SessionValidationError::InvalidTimeRange);
        }
        let energy_level =
            check_scale(energy_level, 10, SessionValidationError::EnergyLevelOutOfRange)?;
        let pain_level = check_scale(pain_level, 10, SessionValidationError::PainLevelOutOfRange)?;
        Ok(Self {
            started_at,
            ended_at,
            breaks,
            energy_level,
            pain_level,
        })
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn ended_at(&self) -> DateTime<Utc> {
        self.ended_at
    }

    /// Timestamps at which the user paused the game.
    #[must_use]
    pub fn breaks(&self) -> &[DateTime<Utc>] {
        &self.breaks
    }

    /// Self-reported energy, 1-10.
    #[must_use]
    pub fn energy_level(&self) -> Option<u8> {
        self.energy_level
    }

    /// Self-reported pain, 1-10.
    #[must_use]
    pub fn pain_level(&self) -> Option<u8> {
        self.pain_level
    }
}

//
// ─── FEEDBACK ─────────────────────────────────────────────────────────────────
//

/// Optional post-session questionnaire answers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Feedback {
    enjoyment: Option<u8>,
    difficulty: Option<u8>,
    comments: Option<String>,
}

impl Feedback {
    /// Builds validated feedback; both ratings use a 1-5 scale.
    ///
    /// # Errors
    ///
    /// Returns a range error if a rating falls outside 1-5.
    pub fn new(
        enjoyment: Option<u8>,
        difficulty: Option<u8>,
        comments: Option<String>,
    ) -> Result<Self, SessionValidationError> {
        let enjoyment = check_scale(enjoyment, 5, SessionValidationError::EnjoymentOutOfRange)?;
        let difficulty = check_scale(
            difficulty,
            5,
            SessionValidationError::PerceivedDifficultyOutOfRange,
        )?;
        Ok(Self {
            enjoyment,
            difficulty,
            comments,
        })
    }

    #[must_use]
    pub fn enjoyment(&self) -> Option<u8> {
        self.enjoyment
    }

    /// How hard the session felt, 1-5. Distinct from the game's
    /// `Difficulty` setting.
    #[must_use]
    pub fn difficulty(&self) -> Option<u8> {
        self.difficulty
    }

    #[must_use]
    pub fn comments(&self) -> Option<&str> {
        self.comments.as_deref()
    }
}

//
// ─── GAME SESSION ─────────────────────────────────────────────────────────────
//

/// A completed play-through of a mini-game.
///
/// Sessions are append-only: once recorded they are never updated, and stats
/// are always recomputed from them rather than edited in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSession {
    user_id: UserId,
    game_type: GameType,
    session_data: SessionData,
    performance: Performance,
    feedback: Feedback,
    created_at: DateTime<Utc>,
}

impl GameSession {
    /// Assembles a session from already-validated parts.
    #[must_use]
    pub fn from_parts(
        user_id: UserId,
        game_type: GameType,
        session_data: SessionData,
        performance: Performance,
        feedback: Feedback,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            game_type,
            session_data,
            performance,
            feedback,
            created_at,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn game_type(&self) -> GameType {
        self.game_type
    }

    #[must_use]
    pub fn session_data(&self) -> &SessionData {
        &self.session_data
    }

    #[must_use]
    pub fn performance(&self) -> &Performance {
        &self.performance
    }

    #[must_use]
    pub fn feedback(&self) -> &Feedback {
        &self.feedback
    }

    /// When the session was recorded. Streaks and windows key off this.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

//
// ─── DRAFTS ───────────────────────────────────────────────────────────────────
//

/// Session payload as submitted by a game front-end.
///
/// Everything is optional at this boundary. `validate` decides which gaps
/// are defaults and which are errors: a missing `game_type`, `session_data`
/// or `performance` block rejects the payload, while a missing duration or
/// score inside `session_data` counts as zero.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDraft {
    pub game_type: Option<GameType>,
    pub session_data: Option<SessionDataDraft>,
    pub performance: Option<PerformanceDraft>,
    pub feedback: Option<FeedbackDraft>,
}

/// Unvalidated counterpart of [`SessionData`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDataDraft {
    /// Play time in seconds.
    pub duration: Option<u32>,
    pub score: Option<u32>,
    pub accuracy: Option<u8>,
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub movements: Vec<Movement>,
}

/// Unvalidated counterpart of [`Performance`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceDraft {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub breaks: Vec<DateTime<Utc>>,
    pub energy_level: Option<u8>,
    pub pain_level: Option<u8>,
}

/// Unvalidated counterpart of [`Feedback`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackDraft {
    pub enjoyment: Option<u8>,
    pub difficulty: Option<u8>,
    pub comments: Option<String>,
}

impl SessionDraft {
    /// Validates the draft and stamps it into an immutable `GameSession`.
    ///
    /// `created_at` is the recording time supplied by the caller's clock,
    /// not taken from the payload.
    ///
    /// # Errors
    ///
    /// Returns the first `SessionValidationError` encountered; the draft is
    /// consumed either way.
    pub fn validate(
        self,
        user_id: UserId,
        created_at: DateTime<Utc>,
    ) -> Result<GameSession, SessionValidationError> {
        let game_type = self
            .game_type
            .ok_or(SessionValidationError::MissingGameType)?;
        let data = self
            .session_data
            .ok_or(SessionValidationError::MissingSessionData)?;
        let perf = self
            .performance
            .ok_or(SessionValidationError::MissingPerformance)?;

        let session_data = SessionData::new(
            data.duration.unwrap_or(0),
            data.score.unwrap_or(0),
            data.accuracy.ok_or(SessionValidationError::MissingAccuracy)?,
            data.difficulty
                .ok_or(SessionValidationError::MissingDifficulty)?,
            data.movements,
        )?;

        let performance = Performance::new(
            perf.start_time
                .ok_or(SessionValidationError::MissingStartTime)?,
            perf.end_time.ok_or(SessionValidationError::MissingEndTime)?,
            perf.breaks,
            perf.energy_level,
            perf.pain_level,
        )?;

        let feedback = match self.feedback {
            Some(f) => Feedback::new(f.enjoyment, f.difficulty, f.comments)?,
            None => Feedback::default(),
        };

        Ok(GameSession::from_parts(
            user_id,
            game_type,
            session_data,
            performance,
            feedback,
            created_at,
        ))
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

    fn draft() -> SessionDraft {
        let now = fixed_now();
        SessionDraft {
            game_type: Some(GameType::HandCoordination),
            session_data: Some(SessionDataDraft {
                duration: Some(300),
                score: Some(850),
                accuracy: Some(92),
                difficulty: Some(Difficulty::Medium),
                movements: vec![Movement::new("grab", now, true)],
            }),
            performance: Some(PerformanceDraft {
                start_time: Some(now - Duration::minutes(5)),
                end_time: Some(now),
                breaks: vec![],
                energy_level: Some(7),
                pain_level: Some(2),
            }),
            feedback: Some(FeedbackDraft {
                enjoyment: Some(4),
                difficulty: Some(3),
                comments: Some("felt good today".to_string()),
            }),
        }
    }

    #[test]
    fn valid_draft_becomes_session() {
        let now = fixed_now();
        let session = draft().validate(UserId::generate(), now).unwrap();

        assert_eq!(session.game_type(), GameType::HandCoordination);
        assert_eq!(session.session_data().score(), 850);
        assert_eq!(session.session_data().duration_secs(), 300);
        assert_eq!(session.feedback().enjoyment(), Some(4));
        assert_eq!(session.created_at(), now);
    }

    #[test]
    fn missing_game_type_is_rejected() {
        let mut d = draft();
        d.game_type = None;
        let err = d.validate(UserId::generate(), fixed_now()).unwrap_err();
        assert_eq!(err, SessionValidationError::MissingGameType);
    }

    #[test]
    fn missing_session_data_is_rejected() {
        let mut d = draft();
        d.session_data = None;
        let err = d.validate(UserId::generate(), fixed_now()).unwrap_err();
        assert_eq!(err, SessionValidationError::MissingSessionData);
    }

    #[test]
    fn missing_performance_is_rejected() {
        let mut d = draft();
        d.performance = None;
        let err = d.validate(UserId::generate(), fixed_now()).unwrap_err();
        assert_eq!(err, SessionValidationError::MissingPerformance);
    }

    #[test]
    fn missing_duration_and_score_default_to_zero() {
        let mut d = draft();
        if let Some(data) = d.session_data.as_mut() {
            data.duration = None;
            data.score = None;
        }
        let session = d.validate(UserId::generate(), fixed_now()).unwrap();
        assert_eq!(session.session_data().duration_secs(), 0);
        assert_eq!(session.session_data().score(), 0);
    }

    #[test]
    fn missing_accuracy_is_rejected() {
        let mut d = draft();
        if let Some(data) = d.session_data.as_mut() {
            data.accuracy = None;
        }
        let err = d.validate(UserId::generate(), fixed_now()).unwrap_err();
        assert_eq!(err, SessionValidationError::MissingAccuracy);
    }

    #[test]
    fn accuracy_over_100_is_rejected() {
        let mut d = draft();
        if let Some(data) = d.session_data.as_mut() {
            data.accuracy = Some(101);
        }
        let err = d.validate(UserId::generate(), fixed_now()).unwrap_err();
        assert_eq!(err, SessionValidationError::AccuracyOutOfRange(101));
    }

    #[test]
    fn end_before_start_is_rejected() {
        let now = fixed_now();
        let mut d = draft();
        if let Some(perf) = d.performance.as_mut() {
            perf.start_time = Some(now);
            perf.end_time = Some(now - Duration::seconds(1));
        }
        let err = d.validate(UserId::generate(), now).unwrap_err();
        assert_eq!(err, SessionValidationError::InvalidTimeRange);
    }

    #[test]
    fn pain_level_out_of_range_is_rejected() {
        let mut d = draft();
        if let Some(perf) = d.performance.as_mut() {
            perf.pain_level = Some(11);
        }
        let err = d.validate(UserId::generate(), fixed_now()).unwrap_err();
        assert_eq!(err, SessionValidationError::PainLevelOutOfRange(11));
    }

    #[test]
    fn missing_feedback_defaults_to_empty() {
        let mut d = draft();
        d.feedback = None;
        let session = d.validate(UserId::generate(), fixed_now()).unwrap();
        assert_eq!(session.feedback(), &Feedback::default());
    }

    #[test]
    fn enjoyment_out_of_range_is_rejected() {
        let mut d = draft();
        if let Some(f) = d.feedback.as_mut() {
            f.enjoyment = Some(6);
        }
        let err = d.validate(UserId::generate(), fixed_now()).unwrap_err();
        assert_eq!(err, SessionValidationError::EnjoymentOutOfRange(6));
    }

    #[test]
    fn draft_deserializes_camel_case_payload() {
        let json = r#"{
            "gameType": "memory",
            "sessionData": {
                "score": 420,
                "accuracy": 88,
                "difficulty": "easy",
                "movements": [
                    {"type": "recall", "timestamp": "2024-01-15T11:58:00Z", "success": true, "responseTime": 450}
                ]
            },
            "performance": {
                "startTime": "2024-01-15T11:55:00Z",
                "endTime": "2024-01-15T12:00:00Z",
                "energyLevel": 6
            },
            "feedback": {"enjoyment": 5}
        }"#;

        let d: SessionDraft = serde_json::from_str(json).unwrap();
        assert_eq!(d.game_type, Some(GameType::Memory));
        let session = d.validate(UserId::generate(), fixed_now()).unwrap();
        // duration was omitted, so it defaults to zero
        assert_eq!(session.session_data().duration_secs(), 0);
        assert_eq!(session.session_data().score(), 420);
        assert_eq!(
            session.session_data().movements()[0].response_time_ms,
            Some(450)
        );
        assert_eq!(session.performance().energy_level(), Some(6));
        assert_eq!(session.performance().pain_level(), None);
    }
}
