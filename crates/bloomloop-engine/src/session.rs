//! Per-session progression state machine.
//!
//! A session walks a fixed list of content chunks. Each step asks one
//! level-calibrated question; a correct answer advances, an incorrect
//! answer retries the same chunk with a fresh question, and the retry cap
//! force-advances so a learner is never blocked forever.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use bloomloop_tracker::{BloomLevel, Outcome, ProgressTracker, QuestionKind};

use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::oracle::{
    generate_validated, grade_mcq, shuffle_choices, Choice, Question, QuestionOracle,
};
use crate::persistence::LogSink;

/// Feedback prefix for a correct answer.
const FEEDBACK_CORRECT: &str = "Correct ✅.";
/// Feedback prefix for an incorrect answer.
const FEEDBACK_INCORRECT: &str = "Incorrect ❌.";

// ============================================================================
// Wire types
// ============================================================================

/// One unit of study content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// The chunk text shown to the learner.
    pub text: String,
    /// Optional image reference accompanying the text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Chunk {
    /// Returns `true` when this chunk carries an image.
    #[must_use]
    pub const fn is_image(&self) -> bool {
        self.image.is_some()
    }
}

/// Position within the session's chunk list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// Completed chunks.
    pub current: usize,
    /// Total chunks in the session.
    pub total: usize,
    /// Completion percentage, 0–100.
    pub percent: f32,
}

impl Progress {
    /// Computes progress for `current` of `total` chunks.
    #[must_use]
    pub fn new(current: usize, total: usize) -> Self {
        let percent = if total == 0 {
            100.0
        } else {
            (current as f32 / total as f32) * 100.0
        };
        Self {
            current,
            total,
            percent,
        }
    }
}

/// The question currently pending for a step.
#[derive(Debug, Clone)]
pub struct AskedQuestion {
    /// The generated question, answer key included.
    pub question: Question,
    /// The kind that was drawn for this step.
    pub kind: QuestionKind,
    /// The level the question was calibrated to.
    pub level: BloomLevel,
}

/// Learner-facing payload for one chunk step.
///
/// The answer key never leaves the server; MCQ responses carry only the
/// choice texts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkStep {
    /// The chunk content. `None` on a retry: the learner already has it.
    pub chunk: Option<Chunk>,
    /// The question text.
    pub question: String,
    /// MCQ choice texts keyed by letter; `None` for short answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<BTreeMap<Choice, String>>,
    /// The question kind.
    pub kind: QuestionKind,
    /// The Bloom level the question targets.
    pub level: BloomLevel,
    /// Whether the chunk carries an image.
    pub is_image: bool,
    /// Whether this is a repeat attempt at the same chunk.
    pub is_retry: bool,
    /// Session position.
    pub progress: Progress,
}

/// Learner-facing payload for one graded answer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerVerdict {
    /// Feedback text, prefixed with the verdict marker.
    pub feedback: String,
    /// Whether the answer was graded correct.
    pub is_correct: bool,
    /// Session position after this answer.
    pub progress: Progress,
    /// Whether the session just completed.
    pub is_last: bool,
}

// ============================================================================
// SessionState
// ============================================================================

/// Mutable state for one learning session.
#[derive(Debug)]
pub struct SessionState {
    tracker: ProgressTracker,
    chunks: Vec<Chunk>,
    /// Next chunk to serve. Equal to `chunks.len()` once complete.
    current_step: usize,
    /// Incorrect answers per step; cleared when the step is left.
    failed_attempts: HashMap<usize, u32>,
    /// Pending question per step; one slot per chunk.
    asked: Vec<Option<AskedQuestion>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SessionState {
    /// Creates a session over pre-chunked content.
    #[must_use]
    pub fn new(session_id: Uuid, chunks: Vec<Chunk>, config: &Config) -> Self {
        let now = Utc::now();
        let asked = vec![None; chunks.len()];
        Self {
            tracker: ProgressTracker::new(
                session_id,
                config.strategy,
                config.level_policy(),
                config.configured_initial_level(),
            ),
            chunks,
            current_step: 0,
            failed_attempts: HashMap::new(),
            asked,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the session identifier.
    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.tracker.session_id()
    }

    /// Returns `true` once every chunk has been answered.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.current_step >= self.chunks.len()
    }

    /// Returns the session's position.
    #[must_use]
    pub fn progress(&self) -> Progress {
        Progress::new(self.current_step, self.chunks.len())
    }

    /// Returns when the session was created.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the session was last touched.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Serves the current chunk with a freshly generated question.
    ///
    /// On a retry the previously asked question text is passed to the
    /// oracle as a must-differ hint and the chunk body is omitted from the
    /// response.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::SessionComplete` when every chunk is done, or
    /// an oracle error when generation fails. A failed generation leaves
    /// the session unchanged.
    pub async fn next_chunk(
        &mut self,
        oracle: &dyn QuestionOracle,
        config: &Config,
    ) -> Result<ChunkStep> {
        if self.is_complete() {
            return Err(EngineError::SessionComplete {
                total_chunks: self.chunks.len(),
            });
        }

        let step = self.current_step;
        let is_retry = self.failed_attempts.get(&step).copied().unwrap_or(0) > 0;
        let level = self.tracker.next_level();
        let kind = self.tracker.next_question_kind();

        let previous_question = if is_retry {
            self.asked[step].as_ref().map(|a| a.question.text().to_string())
        } else {
            None
        };

        let chunk = &self.chunks[step];
        let question = generate_validated(
            oracle,
            &chunk.text,
            kind,
            level,
            previous_question.as_deref(),
            config.max_generation_attempts,
        )
        .await?;

        let question = match question {
            Question::Mcq(mcq) => Question::Mcq(shuffle_choices(mcq)),
            saq @ Question::Saq(_) => saq,
        };
        // Trust the payload over the request in case the oracle switched kinds.
        let kind = question.kind();

        debug!(
            session_id = %self.session_id(),
            step,
            %kind,
            %level,
            is_retry,
            "serving chunk"
        );

        let response = ChunkStep {
            chunk: if is_retry {
                None
            } else {
                Some(chunk.clone())
            },
            question: question.text().to_string(),
            choices: match &question {
                Question::Mcq(mcq) => Some(mcq.choices.clone()),
                Question::Saq(_) => None,
            },
            kind,
            level,
            is_image: chunk.is_image(),
            is_retry,
            progress: self.progress(),
        };

        self.asked[step] = Some(AskedQuestion {
            question,
            kind,
            level,
        });
        self.touch();
        Ok(response)
    }

    /// Grades an answer to the pending question and moves the session.
    ///
    /// Correct answers advance. Incorrect answers retry the same chunk
    /// until the configured cap, which force-advances. On completion the
    /// tracker log is flushed to the sink; a flush failure is logged, not
    /// surfaced to the learner.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::SessionComplete` when every chunk is done,
    /// `EngineError::NoPendingQuestion` when no question was generated for
    /// the step, `EngineError::InvalidChoice` for MCQ answers outside A–D,
    /// or an oracle error when short-answer grading fails.
    pub async fn submit_answer(
        &mut self,
        answer: &str,
        elapsed_time: Option<f64>,
        oracle: &dyn QuestionOracle,
        sink: Option<&dyn LogSink>,
        config: &Config,
    ) -> Result<AnswerVerdict> {
        if self.is_complete() {
            return Err(EngineError::SessionComplete {
                total_chunks: self.chunks.len(),
            });
        }

        let step = self.current_step;
        let asked = self.asked[step]
            .as_ref()
            .ok_or(EngineError::NoPendingQuestion { step })?;

        let (is_correct, feedback) = match &asked.question {
            Question::Mcq(mcq) => {
                let correct = grade_mcq(mcq, answer)?;
                let feedback = if correct {
                    FEEDBACK_CORRECT.to_string()
                } else {
                    format!(
                        "{FEEDBACK_INCORRECT} The correct answer was {}.",
                        mcq.answer
                    )
                };
                (correct, feedback)
            }
            Question::Saq(saq) => {
                let chunk_text = self.chunks[step].text.clone();
                let grading = oracle.grade_saq(&chunk_text, saq, answer).await?;
                let prefix = if grading.is_correct {
                    FEEDBACK_CORRECT
                } else {
                    FEEDBACK_INCORRECT
                };
                (
                    grading.is_correct,
                    format!("{prefix} {}", grading.feedback),
                )
            }
        };

        let outcome = Outcome {
            question_type: asked.kind,
            question: asked.question.text().to_string(),
            choices: match &asked.question {
                Question::Mcq(mcq) => Some(
                    mcq.choices
                        .iter()
                        .map(|(letter, text)| (letter.to_string(), text.clone()))
                        .collect(),
                ),
                Question::Saq(_) => None,
            },
            // Short answers have no single answer key; only MCQ entries
            // record one.
            correct_answer: match &asked.question {
                Question::Mcq(mcq) => Some(mcq.answer.to_string()),
                Question::Saq(_) => None,
            },
            user_answer: answer.to_string(),
            is_correct,
            level: asked.level,
            elapsed_time,
        };
        self.tracker.record_outcome(outcome);

        if is_correct {
            self.advance(step);
        } else {
            let failures = {
                let count = self.failed_attempts.entry(step).or_insert(0);
                *count += 1;
                *count
            };
            if failures >= config.max_failed_attempts_per_chunk {
                info!(
                    session_id = %self.session_id(),
                    step,
                    failures,
                    "retry cap reached, advancing anyway"
                );
                self.advance(step);
            }
        }
        self.touch();

        let is_last = self.is_complete();
        if is_last {
            if let Err(e) = self.flush_logs(sink).await {
                warn!(session_id = %self.session_id(), error = %e, "log flush failed");
            }
        }

        Ok(AnswerVerdict {
            feedback,
            is_correct,
            progress: self.progress(),
            is_last,
        })
    }

    /// Records a final satisfaction rating.
    pub fn submit_rating(&mut self, rating: u8) {
        self.tracker.set_rating(rating);
        self.touch();
    }

    /// Upserts the tracker snapshot to the persistence sink.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::SinkNotConfigured` when no sink is attached,
    /// or the sink's own failure.
    pub async fn flush_logs(&self, sink: Option<&dyn LogSink>) -> Result<()> {
        let sink = sink.ok_or(EngineError::SinkNotConfigured)?;
        sink.upsert(self.session_id(), self.tracker.snapshot())
            .await
    }

    fn advance(&mut self, step: usize) {
        self.failed_attempts.remove(&step);
        self.current_step += 1;
    }
}

// ============================================================================
// Tests
// ============================================================================
