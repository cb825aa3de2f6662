//! Progress tracking for one learning session.
//!
//! [`ProgressTracker`] wraps a [`LevelPolicy`] with the mutable per-session
//! state: the append-only outcome history, aggregate counters, the current
//! level, and the traversal count used by cumulative policies.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::history::{AggregateCounters, Outcome};
use crate::level::{BloomLevel, QuestionKind};
use crate::policy::{LevelPolicy, PolicyInput, Strategy};

// ============================================================================
// ProgressTracker
// ============================================================================

/// Tracks a learner's progress and selects the next level to probe.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    session_id: Uuid,
    strategy: Strategy,
    policy: LevelPolicy,
    initial_level: Option<BloomLevel>,
    current_level: Option<BloomLevel>,
    loop_count: u32,
    history: Vec<Outcome>,
    counters: AggregateCounters,
    rating: Option<u8>,
    /// History length at the last policy evaluation. Random policies would
    /// otherwise jump again on every call, so evaluation happens at most
    /// once per recorded outcome.
    evaluated_len: usize,
}

impl ProgressTracker {
    /// Creates a tracker for a new session.
    ///
    /// The level is not chosen until the first call to [`Self::next_level`].
    #[must_use]
    pub fn new(
        session_id: Uuid,
        strategy: Strategy,
        policy: LevelPolicy,
        initial_level: Option<BloomLevel>,
    ) -> Self {
        Self {
            session_id,
            strategy,
            policy,
            initial_level,
            current_level: None,
            loop_count: 0,
            history: Vec::new(),
            counters: AggregateCounters::default(),
            rating: None,
            evaluated_len: 0,
        }
    }

    /// Returns the session this tracker belongs to.
    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Returns the configured strategy.
    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Returns the current level, or `None` before the first level request.
    #[must_use]
    pub const fn current_level(&self) -> Option<BloomLevel> {
        self.current_level
    }

    /// Returns the number of completed level-range traversals.
    #[must_use]
    pub const fn loop_count(&self) -> u32 {
        self.loop_count
    }

    /// Returns the ordered outcome history.
    #[must_use]
    pub fn history(&self) -> &[Outcome] {
        &self.history
    }

    /// Returns the aggregate counters.
    #[must_use]
    pub const fn counters(&self) -> &AggregateCounters {
        &self.counters
    }

    /// Returns the recorded satisfaction rating, if any.
    #[must_use]
    pub const fn rating(&self) -> Option<u8> {
        self.rating
    }

    /// Returns the level the next question should be calibrated to.
    ///
    /// The first call picks the strategy's initial level. Later calls apply
    /// the configured policy over the history; without new outcomes since
    /// the previous call the level is unchanged.
    pub fn next_level(&mut self) -> BloomLevel {
        let Some(current) = self.current_level else {
            let level = self.strategy.initial_level(self.initial_level);
            self.current_level = Some(level);
            return level;
        };

        if self.history.len() == self.evaluated_len {
            return current;
        }

        let input = PolicyInput {
            consecutive_successes: self.consecutive_successes(current),
            consecutive_failures: self.consecutive_failures(current),
            answered_at_level: self.answered_at_level(current),
            loop_count: self.loop_count,
        };
        let decision = self.policy.decide(self.strategy, current, input);

        self.current_level = Some(decision.level);
        self.loop_count = decision.loop_count;
        self.evaluated_len = self.history.len();
        decision.level
    }

    /// Draws the kind for the next question.
    #[must_use]
    pub fn next_question_kind(&self) -> QuestionKind {
        QuestionKind::random()
    }

    /// Appends a graded answer to the history and updates the counters.
    ///
    /// Must be called exactly once per graded answer, after grading and
    /// before the next level is computed.
    pub fn record_outcome(&mut self, outcome: Outcome) {
        self.counters.record(&outcome);
        self.history.push(outcome);
    }

    /// Records a final satisfaction rating. Last write wins.
    pub fn set_rating(&mut self, rating: u8) {
        self.rating = Some(rating);
    }

    /// Produces a serializable snapshot of the full tracker state.
    #[must_use]
    pub fn snapshot(&self) -> TrackerLog {
        TrackerLog {
            session_id: self.session_id,
            strategy: self.strategy,
            total_questions_answered: self.counters.total_answered,
            total_questions_correct: self.counters.total_correct,
            total_mcq_answered: self.counters.mcq_answered,
            total_mcq_correct: self.counters.mcq_correct,
            total_saq_answered: self.counters.saq_answered,
            total_saq_correct: self.counters.saq_correct,
            answered_per_level: self
                .counters
                .answered_by_label()
                .into_iter()
                .map(|(label, count)| (label.to_string(), count))
                .collect(),
            correct_per_level: self
                .counters
                .correct_by_label()
                .into_iter()
                .map(|(label, count)| (label.to_string(), count))
                .collect(),
            history: self.history.clone(),
            rating: self.rating,
        }
    }

    /// Counts consecutive correct answers at `level` from the tail of the
    /// history. A level change or an incorrect answer breaks the run.
    fn consecutive_successes(&self, level: BloomLevel) -> u32 {
        self.history
            .iter()
            .rev()
            .take_while(|entry| entry.level == level && entry.is_correct)
            .count() as u32
    }

    /// Counts consecutive incorrect answers at `level` from the tail of the
    /// history. A level change or a correct answer breaks the run.
    fn consecutive_failures(&self, level: BloomLevel) -> u32 {
        self.history
            .iter()
            .rev()
            .take_while(|entry| entry.level == level && !entry.is_correct)
            .count() as u32
    }

    /// Counts answers at `level` since it was last entered, honoring the
    /// policy's correct-only setting.
    fn answered_at_level(&self, level: BloomLevel) -> u32 {
        let correct_only = self.policy.counts_correct_only();
        self.history
            .iter()
            .rev()
            .take_while(|entry| entry.level == level)
            .filter(|entry| !correct_only || entry.is_correct)
            .count() as u32
    }
}

// ============================================================================
// TrackerLog
// ============================================================================

/// Serializable snapshot of a tracker, upserted to the persistence sink
/// when a session completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerLog {
    /// The session the log belongs to; conflict key for upserts.
    pub session_id: Uuid,
    /// The strategy the session ran with.
    pub strategy: Strategy,
    /// Total questions answered.
    pub total_questions_answered: u32,
    /// Total questions answered correctly.
    pub total_questions_correct: u32,
    /// Multiple-choice questions answered.
    pub total_mcq_answered: u32,
    /// Multiple-choice questions answered correctly.
    pub total_mcq_correct: u32,
    /// Short-answer questions answered.
    pub total_saq_answered: u32,
    /// Short-answer questions answered correctly.
    pub total_saq_correct: u32,
    /// Questions answered per level, keyed by level label.
    pub answered_per_level: BTreeMap<String, u32>,
    /// Questions answered correctly per level, keyed by level label.
    pub correct_per_level: BTreeMap<String, u32>,
    /// The full outcome history in insertion order.
    pub history: Vec<Outcome>,
    /// Final satisfaction rating, when submitted.
    pub rating: Option<u8>,
}

// ============================================================================
// Tests
// ============================================================================
