//! Answer history and aggregate counters.
//!
//! The history is an explicit append-only log: one [`Outcome`] per graded
//! answer, never mutated or removed after insertion. Streak and cumulative
//! counts are computed by scanning the log from the tail, so "consecutive"
//! is defined by insertion order rather than any incidental map ordering.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::level::{BloomLevel, QuestionKind};

// ============================================================================
// Outcome
// ============================================================================

/// One graded answer, appended to a session's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    /// The kind of question that was asked.
    pub question_type: QuestionKind,

    /// The question text as shown to the learner.
    pub question: String,

    /// The lettered choices, present only for multiple-choice questions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<BTreeMap<String, String>>,

    /// The correct choice letter, present only for multiple-choice questions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,

    /// The learner's submitted answer.
    pub user_answer: String,

    /// Whether the answer was graded correct.
    pub is_correct: bool,

    /// The Bloom level the question was calibrated to.
    pub level: BloomLevel,

    /// Seconds the learner spent before submitting, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_time: Option<f64>,
}

// ============================================================================
// AggregateCounters
// ============================================================================

/// Counters derived incrementally from the outcome stream.
///
/// Invariants: the per-level answered counts sum to `total_answered`, which
/// equals the history length, and every `*_correct` counter is bounded by
/// its `*_answered` counterpart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateCounters {
    /// Total questions answered.
    pub total_answered: u32,
    /// Total questions answered correctly.
    pub total_correct: u32,
    /// Multiple-choice questions answered.
    pub mcq_answered: u32,
    /// Multiple-choice questions answered correctly.
    pub mcq_correct: u32,
    /// Short-answer questions answered.
    pub saq_answered: u32,
    /// Short-answer questions answered correctly.
    pub saq_correct: u32,
    /// Questions answered per level, indexed by `BloomLevel::index`.
    pub answered_per_level: [u32; 6],
    /// Questions answered correctly per level, indexed by `BloomLevel::index`.
    pub correct_per_level: [u32; 6],
}

impl AggregateCounters {
    /// Updates every counter affected by one graded answer.
    pub fn record(&mut self, outcome: &Outcome) {
        self.total_answered += 1;
        self.answered_per_level[outcome.level.index()] += 1;

        if outcome.is_correct {
            self.total_correct += 1;
            self.correct_per_level[outcome.level.index()] += 1;
        }

        match outcome.question_type {
            QuestionKind::Mcq => {
                self.mcq_answered += 1;
                if outcome.is_correct {
                    self.mcq_correct += 1;
                }
            }
            QuestionKind::Saq => {
                self.saq_answered += 1;
                if outcome.is_correct {
                    self.saq_correct += 1;
                }
            }
        }
    }

    /// Returns the per-level answered counts keyed by level label.
    #[must_use]
    pub fn answered_by_label(&self) -> BTreeMap<&'static str, u32> {
        BloomLevel::ALL
            .iter()
            .map(|level| (level.label(), self.answered_per_level[level.index()]))
            .collect()
    }

    /// Returns the per-level correct counts keyed by level label.
    #[must_use]
    pub fn correct_by_label(&self) -> BTreeMap<&'static str, u32> {
        BloomLevel::ALL
            .iter()
            .map(|level| (level.label(), self.correct_per_level[level.index()]))
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn outcome(kind: QuestionKind, level: BloomLevel, is_correct: bool) -> Outcome {
        Outcome {
            question_type: kind,
            question: "What is ownership?".to_string(),
            choices: None,
            correct_answer: None,
            user_answer: "a move of responsibility".to_string(),
            is_correct,
            level,
            elapsed_time: Some(12.5),
        }
    }

    #[test]
    fn test_record_updates_totals_and_levels() {
        let mut counters = AggregateCounters::default();
        counters.record(&outcome(QuestionKind::Saq, BloomLevel::Remember, true));
        counters.record(&outcome(QuestionKind::Mcq, BloomLevel::Remember, false));
        counters.record(&outcome(QuestionKind::Mcq, BloomLevel::Apply, true));

        assert_eq!(counters.total_answered, 3);
        assert_eq!(counters.total_correct, 2);
        assert_eq!(counters.mcq_answered, 2);
        assert_eq!(counters.mcq_correct, 1);
        assert_eq!(counters.saq_answered, 1);
        assert_eq!(counters.saq_correct, 1);
        assert_eq!(counters.answered_per_level[BloomLevel::Remember.index()], 2);
        assert_eq!(counters.correct_per_level[BloomLevel::Remember.index()], 1);
        assert_eq!(counters.answered_per_level[BloomLevel::Apply.index()], 1);
    }

    #[test]
    fn test_per_level_sum_matches_total() {
        let mut counters = AggregateCounters::default();
        let levels = [
            BloomLevel::Remember,
            BloomLevel::Apply,
            BloomLevel::Apply,
            BloomLevel::Create,
            BloomLevel::Evaluate,
        ];
        for (i, level) in levels.iter().enumerate() {
            counters.record(&outcome(QuestionKind::Saq, *level, i % 2 == 0));
        }

        let per_level_sum: u32 = counters.answered_per_level.iter().sum();
        assert_eq!(per_level_sum, counters.total_answered);
        assert!(counters.total_correct <= counters.total_answered);
    }

    #[test]
    fn test_labelled_counters() {
        let mut counters = AggregateCounters::default();
        counters.record(&outcome(QuestionKind::Mcq, BloomLevel::Understand, true));

        let answered = counters.answered_by_label();
        assert_eq!(answered["understand"], 1);
        assert_eq!(answered["create"], 0);
        assert_eq!(answered.len(), 6);

        let correct = counters.correct_by_label();
        assert_eq!(correct["understand"], 1);
    }

    #[test]
    fn test_outcome_serialization_skips_mcq_fields_for_saq() {
        let json = serde_json::to_string(&outcome(
            QuestionKind::Saq,
            BloomLevel::Analyze,
            false,
        ))
        .unwrap();

        assert!(json.contains(r#""question_type":"SAQ""#));
        assert!(json.contains(r#""level":4"#));
        assert!(!json.contains("choices"));
        assert!(!json.contains("correct_answer"));
    }

    #[test]
    fn test_outcome_round_trip_with_choices() {
        let mut choices = BTreeMap::new();
        choices.insert("A".to_string(), "a borrow".to_string());
        choices.insert("B".to_string(), "a move".to_string());
        choices.insert("C".to_string(), "a copy".to_string());
        choices.insert("D".to_string(), "a clone".to_string());

        let original = Outcome {
            question_type: QuestionKind::Mcq,
            question: "What happens on assignment?".to_string(),
            choices: Some(choices),
            correct_answer: Some("B".to_string()),
            user_answer: "B".to_string(),
            is_correct: true,
            level: BloomLevel::Understand,
            elapsed_time: None,
        };

        let json = serde_json::to_string(&original).unwrap();
        let restored: Outcome = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.correct_answer.as_deref(), Some("B"));
        assert_eq!(restored.level, BloomLevel::Understand);
        assert!(restored.is_correct);
        assert!(restored.elapsed_time.is_none());
    }
}
