use crate::model::session::SessionData;

/// Experience points needed to advance one account level.
pub const XP_PER_LEVEL: u64 = 1000;

/// Score points that earn one experience point.
pub const SCORE_PER_XP: u32 = 10;

/// Experience earned by a single session score (integer division, floor).
#[must_use]
pub fn xp_for_score(score: u32) -> u64 {
    u64::from(score / SCORE_PER_XP)
}

/// Account level implied by accumulated experience.
///
/// Level 1 starts at zero experience; every `XP_PER_LEVEL` points add one.
#[must_use]
pub fn level_for_experience(experience: u64) -> u32 {
    let level = experience / XP_PER_LEVEL + 1;
    u32::try_from(level).unwrap_or(u32::MAX)
}

//
// ─── PROGRESS DELTA ───────────────────────────────────────────────────────────
//

/// The increments one recorded session contributes to a user's aggregate.
///
/// A delta is computed once, from the validated session, and then applied to
/// the stored aggregate in a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressDelta {
    pub sessions: u32,
    pub time_secs: u64,
    pub experience: u64,
}

impl ProgressDelta {
    /// Delta for one completed session.
    #[must_use]
    pub fn for_session(data: &SessionData) -> Self {
        Self {
            sessions: 1,
            time_secs: u64::from(data.duration_secs()),
            experience: xp_for_score(data.score()),
        }
    }
}

//
// ─── USER PROGRESS ────────────────────────────────────────────────────────────
//

/// Cumulative per-user aggregate, mutated by every recorded session.
///
/// `current_level` only ever rises: it is kept at the maximum of its stored
/// value and the level the experience implies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProgress {
    total_sessions: u32,
    total_time_secs: u64,
    experience: u64,
    current_level: u32,
    achievements: Vec<String>,
}

impl UserProgress {
    /// Zero-valued aggregate for a freshly registered user.
    #[must_use]
    pub fn zeroed() -> Self {
        Self {
            total_sessions: 0,
            total_time_secs: 0,
            experience: 0,
            current_level: 1,
            achievements: Vec::new(),
        }
    }

    /// Rehydrates an aggregate from persisted storage.
    ///
    /// The stored level is clamped so it never falls below the level the
    /// stored experience implies.
    #[must_use]
    pub fn from_persisted(
        total_sessions: u32,
        total_time_secs: u64,
        experience: u64,
        current_level: u32,
        achievements: Vec<String>,
    ) -> Self {
        Self {
            total_sessions,
            total_time_secs,
            experience,
            current_level: current_level.max(level_for_experience(experience)),
            achievements,
        }
    }

    /// Applies one session's increments. The level never decreases.
    pub fn apply(&mut self, delta: &ProgressDelta) {
        self.total_sessions = self.total_sessions.saturating_add(delta.sessions);
        self.total_time_secs = self.total_time_secs.saturating_add(delta.time_secs);
        self.experience = self.experience.saturating_add(delta.experience);
        self.current_level = self.current_level.max(level_for_experience(self.experience));
    }

    /// Appends an achievement if it has not been earned yet.
    ///
    /// Returns false when the achievement was already present.
    pub fn grant(&mut self, achievement: impl Into<String>) -> bool {
        let achievement = achievement.into();
        if self.achievements.contains(&achievement) {
            return false;
        }
        self.achievements.push(achievement);
        true
    }

    #[must_use]
    pub fn total_sessions(&self) -> u32 {
        self.total_sessions
    }

    #[must_use]
    pub fn total_time_secs(&self) -> u64 {
        self.total_time_secs
    }

    #[must_use]
    pub fn experience(&self) -> u64 {
        self.experience
    }

    #[must_use]
    pub fn current_level(&self) -> u32 {
        self.current_level
    }

    /// Earned achievement names, in the order they were granted.
    #[must_use]
    pub fn achievements(&self) -> &[String] {
        &self.achievements
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
