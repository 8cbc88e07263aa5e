//! Pure functions behind the dashboard statistics.
//!
//! Everything here is deterministic: callers fetch the rows, pass them in
//! together with a reference time, and get the same answer for the same
//! inputs every time.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;

use crate::model::{GameSession, GameType};

/// How many of the newest sessions feed the streak and rolling average.
pub const RECENT_SESSION_LIMIT: u32 = 30;

/// Upper bound on how many calendar days a streak walk looks back.
pub const STREAK_LOOKBACK_DAYS: u32 = 30;

/// Length of the trailing summary window, in days.
pub const WEEKLY_WINDOW_DAYS: i64 = 7;

//
// ─── RESULT TYPES ─────────────────────────────────────────────────────────────
//

/// Session count for one game type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameTypeCount {
    pub game_type: GameType,
    pub count: u64,
}

/// Summary of the trailing seven-day window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WeeklyStats {
    pub sessions: u32,
    pub total_time_secs: u64,
    pub average_score: u32,
}

/// The full dashboard bundle for one user.
///
/// Totals, level and experience come straight from the stored aggregate;
/// the remaining fields are derived from session rows at read time.
#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub total_sessions: u32,
    pub total_time_secs: u64,
    pub current_streak: u32,
    pub average_score: u32,
    pub level: u32,
    pub experience: u64,
    pub game_type_distribution: Vec<GameTypeCount>,
    pub weekly: WeeklyStats,
    pub achievements: Vec<String>,
    pub last_active: DateTime<Utc>,
}

//
// ─── COMPUTATIONS ─────────────────────────────────────────────────────────────
//

/// Consecutive UTC calendar days with at least one session, ending on the
/// day of `as_of`.
///
/// Walks backward one day at a time and stops at the first day without a
/// session, or after `STREAK_LOOKBACK_DAYS` days. A session later today
/// keeps the walk going; yesterday's session alone means the streak is
/// already broken.
///
/// `session_times` is expected to hold the newest `RECENT_SESSION_LIMIT`
/// session timestamps; days older than that window cannot extend the
/// streak.
#[must_use]
pub fn current_streak(as_of: DateTime<Utc>, session_times: &[DateTime<Utc>]) -> u32 {
    if session_times.is_empty() {
        return 0;
    }
    let days: HashSet<NaiveDate> = session_times.iter().map(DateTime::date_naive).collect();

    let mut streak = 0;
    let mut day = as_of.date_naive();
    for _ in 0..STREAK_LOOKBACK_DAYS {
        if !days.contains(&day) {
            break;
        }
        streak += 1;
        let Some(prev) = day.pred_opt() else {
            break;
        };
        day = prev;
    }
    streak
}

/// Mean score rounded half away from zero; zero for an empty set.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[allow(clippy::cast_precision_loss)]
pub fn average_score<I: IntoIterator<Item = u32>>(scores: I) -> u32 {
    let mut sum: u64 = 0;
    let mut count: u64 = 0;
    for score in scores {
        sum += u64::from(score);
        count += 1;
    }
    if count == 0 {
        return 0;
    }
    ((sum as f64) / (count as f64)).round() as u32
}

/// Sessions grouped by game type, most played first.
///
/// Ties keep `GameType` declaration order. Game types with zero sessions
/// are omitted.
#[must_use]
pub fn game_type_distribution(
    counts: impl IntoIterator<Item = (GameType, u64)>,
) -> Vec<GameTypeCount> {
    let mut distribution: Vec<GameTypeCount> = counts
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(game_type, count)| GameTypeCount { game_type, count })
        .collect();
    distribution.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| type_rank(a.game_type).cmp(&type_rank(b.game_type)))
    });
    distribution
}

fn type_rank(game_type: GameType) -> usize {
    GameType::ALL
        .iter()
        .position(|candidate| *candidate == game_type)
        .unwrap_or(GameType::ALL.len())
}

/// Summary of the sessions inside the trailing window.
///
/// The caller is responsible for having already restricted `sessions` to
/// the window.
#[must_use]
pub fn weekly_stats(sessions: &[GameSession]) -> WeeklyStats {
    WeeklyStats {
        sessions: u32::try_from(sessions.len()).unwrap_or(u32::MAX),
        total_time_secs: sessions
            .iter()
            .map(|s| u64::from(s.session_data().duration_secs()))
            .sum(),
        average_score: average_score(sessions.iter().map(|s| s.session_data().score())),
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
