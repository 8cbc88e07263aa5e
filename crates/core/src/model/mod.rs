mod game;
mod ids;
mod progress;
mod session;
mod user;

pub use game::{Difficulty, GameEnumError, GameType};
pub use ids::{ParseIdError, SessionId, UserId};

pub use progress::{
    ProgressDelta, SCORE_PER_XP, UserProgress, XP_PER_LEVEL, level_for_experience, xp_for_score,
};
pub use session::{
    Feedback, FeedbackDraft, GameSession, Movement, Performance, PerformanceDraft, SessionData,
    SessionDataDraft, SessionDraft, SessionValidationError,
};
pub use user::{Condition, Profile, RecoveryStage, User, UserError};
