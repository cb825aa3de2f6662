//! Bloom's Taxonomy levels and question kinds.
//!
//! A [`BloomLevel`] ranks the cognitive complexity of a question from
//! `Remember` (1) to `Create` (6). Levels are serialized as their ordinal,
//! matching the numeric levels stored in session logs.

use rand::Rng;
use serde::{Deserialize, Serialize};

// ============================================================================
// BloomLevel
// ============================================================================

/// A level of Bloom's Taxonomy, ordered from 1 (lowest) to 6 (highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BloomLevel {
    /// Level 1: recall facts and basic concepts.
    Remember,
    /// Level 2: explain ideas or concepts.
    Understand,
    /// Level 3: use information in new situations.
    Apply,
    /// Level 4: draw connections among ideas.
    Analyze,
    /// Level 5: justify a stand or decision.
    Evaluate,
    /// Level 6: produce new or original work.
    Create,
}

impl BloomLevel {
    /// All six levels in ascending order.
    pub const ALL: [Self; 6] = [
        Self::Remember,
        Self::Understand,
        Self::Apply,
        Self::Analyze,
        Self::Evaluate,
        Self::Create,
    ];

    /// Returns the ordinal of this level, from 1 to 6.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Remember => 1,
            Self::Understand => 2,
            Self::Apply => 3,
            Self::Analyze => 4,
            Self::Evaluate => 5,
            Self::Create => 6,
        }
    }

    /// Looks up a level by its ordinal (1 to 6).
    #[must_use]
    pub const fn from_u8(ordinal: u8) -> Option<Self> {
        match ordinal {
            1 => Some(Self::Remember),
            2 => Some(Self::Understand),
            3 => Some(Self::Apply),
            4 => Some(Self::Analyze),
            5 => Some(Self::Evaluate),
            6 => Some(Self::Create),
            _ => None,
        }
    }

    /// Returns the lowercase label used as a per-level counter key.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Remember => "remember",
            Self::Understand => "understand",
            Self::Apply => "apply",
            Self::Analyze => "analyze",
            Self::Evaluate => "evaluate",
            Self::Create => "create",
        }
    }

    /// Returns the next level up, clamped at `Create`.
    #[must_use]
    pub const fn up(self) -> Self {
        match Self::from_u8(self.as_u8() + 1) {
            Some(next) => next,
            None => Self::Create,
        }
    }

    /// Returns the next level down, clamped at `Remember`.
    #[must_use]
    pub const fn down(self) -> Self {
        match Self::from_u8(self.as_u8().saturating_sub(1)) {
            Some(prev) => prev,
            None => Self::Remember,
        }
    }

    /// Returns the next level up, wrapping from `Create` to `Remember`.
    #[must_use]
    pub const fn wrapping_up(self) -> Self {
        match self {
            Self::Create => Self::Remember,
            other => other.up(),
        }
    }

    /// Returns the next level down, wrapping from `Remember` to `Create`.
    #[must_use]
    pub const fn wrapping_down(self) -> Self {
        match self {
            Self::Remember => Self::Create,
            other => other.down(),
        }
    }

    /// Returns the zero-based index of this level, for per-level counter arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        (self.as_u8() - 1) as usize
    }

    /// Draws a uniformly random level.
    #[must_use]
    pub fn random() -> Self {
        let ordinal = rand::thread_rng().gen_range(1..=6);
        // gen_range(1..=6) always yields a valid ordinal
        Self::from_u8(ordinal).unwrap_or(Self::Remember)
    }
}

impl std::fmt::Display for BloomLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Serialize for BloomLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for BloomLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let ordinal = u8::deserialize(deserializer)?;
        Self::from_u8(ordinal).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid Bloom level '{ordinal}': expected an integer from 1 to 6"
            ))
        })
    }
}

// ============================================================================
// QuestionKind
// ============================================================================

/// The kind of question presented to the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QuestionKind {
    /// Multiple-choice question with four lettered options.
    Mcq,
    /// Short-answer question graded by the oracle.
    Saq,
}

impl QuestionKind {
    /// Draws a uniformly random question kind.
    ///
    /// The draw is stateless: it does not depend on the level or on any
    /// answer history.
    #[must_use]
    pub fn random() -> Self {
        if rand::thread_rng().gen_bool(0.5) {
            Self::Mcq
        } else {
            Self::Saq
        }
    }
}

impl std::fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mcq => write!(f, "MCQ"),
            Self::Saq => write!(f, "SAQ"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
