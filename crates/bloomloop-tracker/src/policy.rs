//! Level-selection policies.
//!
//! A [`LevelPolicy`] is a pure decision function: given the current level and
//! a summary of the recent answer history, it returns the next level to
//! probe. Policies never perform I/O and never leave the 1–6 range.
//!
//! Two variants exist and are selected through configuration:
//!
//! - [`LevelPolicy::Streak`] reacts to consecutive successes or failures at
//!   the current level, clamping at the range boundaries.
//! - [`LevelPolicy::Cumulative`] counts answers at the current level since it
//!   was entered and traverses the range with wraparound, raising its
//!   threshold after each full traversal.

use serde::{Deserialize, Serialize};

use crate::level::BloomLevel;

// ============================================================================
// Strategy
// ============================================================================

/// Direction policy for level progression.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strategy {
    /// Ascending: start at level 1 and climb on success (default).
    #[default]
    Default,
    /// Descending: start at level 6 and descend on success.
    Revert,
    /// Stochastic: start anywhere, jump to a random level on a trigger.
    Random,
}

impl Strategy {
    /// Parses a string into a `Strategy`, case-insensitively.
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "default" => Some(Self::Default),
            "revert" => Some(Self::Revert),
            "random" => Some(Self::Random),
            _ => None,
        }
    }

    /// Returns the initial level for this strategy.
    ///
    /// An explicitly configured level takes precedence; otherwise `Default`
    /// starts at the bottom, `Revert` at the top, and `Random` anywhere.
    #[must_use]
    pub fn initial_level(self, configured: Option<BloomLevel>) -> BloomLevel {
        if let Some(level) = configured {
            return level;
        }
        match self {
            Self::Default => BloomLevel::Remember,
            Self::Revert => BloomLevel::Create,
            Self::Random => BloomLevel::random(),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Revert => write!(f, "revert"),
            Self::Random => write!(f, "random"),
        }
    }
}

impl<'de> Deserialize<'de> for Strategy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid strategy '{s}': expected one of 'default', 'revert', 'random'"
            ))
        })
    }
}

impl Serialize for Strategy {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

// ============================================================================
// LevelPolicy
// ============================================================================

/// Summary of the answer history the policy decides over.
///
/// All counts are derived by the tracker from its ordered history log,
/// scanning from the most recent entry backward.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyInput {
    /// Consecutive correct answers at the current level (broken by a level
    /// change or an incorrect answer).
    pub consecutive_successes: u32,
    /// Consecutive incorrect answers at the current level (broken by a level
    /// change or a correct answer).
    pub consecutive_failures: u32,
    /// Answers at the current level since it was entered. When the
    /// cumulative policy is configured with `correct_only`, only correct
    /// answers are counted.
    pub answered_at_level: u32,
    /// Completed full traversals of the level range.
    pub loop_count: u32,
}

/// Outcome of a policy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// The next level to probe.
    pub level: BloomLevel,
    /// The (possibly incremented) traversal count.
    pub loop_count: u32,
}

/// A pure level-selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelPolicy {
    /// Threshold-streak variant: move after a run of identical outcomes at
    /// the current level, clamped at the range boundaries.
    Streak {
        /// Consecutive successes required to move in the success direction.
        min_success: u32,
        /// Consecutive failures required to move in the failure direction.
        max_fail: u32,
    },
    /// Cumulative variant: move once enough questions have been answered at
    /// the current level, wrapping around the range. The threshold is
    /// `min_questions_per_level * (1 + loop_count)`.
    Cumulative {
        /// Base number of questions per level before moving on.
        min_questions_per_level: u32,
        /// Count only correct answers toward the threshold.
        correct_only: bool,
    },
}

impl LevelPolicy {
    /// Decides the next level given the current level and history summary.
    ///
    /// This is a total function: it cannot fail and the returned level is
    /// always within 1–6.
    #[must_use]
    pub fn decide(self, strategy: Strategy, current: BloomLevel, input: PolicyInput) -> Decision {
        match self {
            Self::Streak {
                min_success,
                max_fail,
            } => Self::decide_streak(strategy, current, input, min_success, max_fail),
            Self::Cumulative {
                min_questions_per_level,
                ..
            } => Self::decide_cumulative(strategy, current, input, min_questions_per_level),
        }
    }

    fn decide_streak(
        strategy: Strategy,
        current: BloomLevel,
        input: PolicyInput,
        min_success: u32,
        max_fail: u32,
    ) -> Decision {
        let succeeded = input.consecutive_successes >= min_success;
        let failed = input.consecutive_failures >= max_fail;

        let level = match strategy {
            Strategy::Default => {
                if succeeded {
                    current.up()
                } else if failed {
                    current.down()
                } else {
                    current
                }
            }
            Strategy::Revert => {
                if succeeded {
                    current.down()
                } else if failed {
                    current.up()
                } else {
                    current
                }
            }
            Strategy::Random => {
                if succeeded || failed {
                    BloomLevel::random()
                } else {
                    current
                }
            }
        };

        Decision {
            level,
            loop_count: input.loop_count,
        }
    }

    fn decide_cumulative(
        strategy: Strategy,
        current: BloomLevel,
        input: PolicyInput,
        min_questions_per_level: u32,
    ) -> Decision {
        let threshold = min_questions_per_level * (1 + input.loop_count);
        if input.answered_at_level < threshold {
            return Decision {
                level: current,
                loop_count: input.loop_count,
            };
        }

        match strategy {
            Strategy::Default => {
                let level = current.wrapping_up();
                let loop_count = if current == BloomLevel::Create {
                    input.loop_count + 1
                } else {
                    input.loop_count
                };
                Decision { level, loop_count }
            }
            Strategy::Revert => {
                let level = current.wrapping_down();
                let loop_count = if current == BloomLevel::Remember {
                    input.loop_count + 1
                } else {
                    input.loop_count
                };
                Decision { level, loop_count }
            }
            // Every satisfied threshold jumps, even when the destination
            // equals the source, and always counts a traversal.
            Strategy::Random => Decision {
                level: BloomLevel::random(),
                loop_count: input.loop_count + 1,
            },
        }
    }

    /// Returns `true` when this policy counts only correct answers toward
    /// its cumulative threshold.
    #[must_use]
    pub const fn counts_correct_only(self) -> bool {
        matches!(
            self,
            Self::Cumulative {
                correct_only: true,
                ..
            }
        )
    }
}

impl Default for LevelPolicy {
    fn default() -> Self {
        Self::Streak {
            min_success: 2,
            max_fail: 2,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
