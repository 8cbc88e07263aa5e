use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Errors raised when decoding game enumerations from their wire names.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameEnumError {
    #[error("unknown game type: {0}")]
    UnknownGameType(String),

    #[error("unknown difficulty: {0}")]
    UnknownDifficulty(String),
}

//
// ─── GAME TYPE ────────────────────────────────────────────────────────────────
//

/// The fixed catalogue of rehabilitation mini-games.
///
/// Each game targets a different motor or cognitive skill. The wire names
/// (`hand-coordination`, `leg-strength`, ...) are also the stored names, so
/// renaming a variant is a data migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GameType {
    /// Fine motor control: catch and place targets with the affected hand.
    HandCoordination,
    /// Lower-body strength: timed sit-to-stand style repetitions.
    LegStrength,
    /// Static and dynamic balance hold exercises.
    Balance,
    /// Short-term memory sequence recall.
    Memory,
    /// Simple stimulus-response speed drills.
    Reaction,
}

impl GameType {
    /// All game types in declaration order.
    pub const ALL: [GameType; 5] = [
        GameType::HandCoordination,
        GameType::LegStrength,
        GameType::Balance,
        GameType::Memory,
        GameType::Reaction,
    ];

    /// Returns the stable wire name for this game type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            GameType::HandCoordination => "hand-coordination",
            GameType::LegStrength => "leg-strength",
            GameType::Balance => "balance",
            GameType::Memory => "memory",
            GameType::Reaction => "reaction",
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GameType {
    type Err = GameEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hand-coordination" => Ok(GameType::HandCoordination),
            "leg-strength" => Ok(GameType::LegStrength),
            "balance" => Ok(GameType::Balance),
            "memory" => Ok(GameType::Memory),
            "reaction" => Ok(GameType::Reaction),
            other => Err(GameEnumError::UnknownGameType(other.to_string())),
        }
    }
}

//
// ─── DIFFICULTY ───────────────────────────────────────────────────────────────
//

/// Difficulty the mini-game was played at.
///
/// This is the setting chosen inside the game for one session, not the
/// account level derived from experience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Returns the stable wire name for this difficulty.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = GameEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(GameEnumError::UnknownDifficulty(other.to_string())),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_type_wire_names_roundtrip() {
        for game_type in GameType::ALL {
            let parsed: GameType = game_type.as_str().parse().unwrap();
            assert_eq!(parsed, game_type);
        }
    }

    #[test]
    fn unknown_game_type_is_rejected() {
        let err = "juggling".parse::<GameType>().unwrap_err();
        assert!(matches!(err, GameEnumError::UnknownGameType(_)));
    }

    #[test]
    fn difficulty_wire_names_roundtrip() {
        for difficulty in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
            let parsed: Difficulty = difficulty.as_str().parse().unwrap();
            assert_eq!(parsed, difficulty);
        }
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&GameType::HandCoordination).unwrap();
        assert_eq!(json, "\"hand-coordination\"");
        let difficulty: Difficulty = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(difficulty, Difficulty::Medium);
    }
}
