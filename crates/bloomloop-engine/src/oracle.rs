//! Question oracle contract and wire payload types.
//!
//! The oracle generates questions calibrated to a Bloom level and grades
//! free-text answers. Every payload passes a shape validation gate before
//! it reaches the learner; malformed payloads are retried up to the
//! configured cap and never advance progress.

use std::collections::BTreeMap;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use bloomloop_tracker::{BloomLevel, QuestionKind};

use crate::error::{EngineError, Result};

// ============================================================================
// Choices
// ============================================================================

/// One of the four multiple-choice letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Choice {
    /// Choice A.
    A,
    /// Choice B.
    B,
    /// Choice C.
    C,
    /// Choice D.
    D,
}

impl Choice {
    /// All four letters in order.
    pub const ALL: [Self; 4] = [Self::A, Self::B, Self::C, Self::D];

    /// Parses an answer string into a choice letter.
    ///
    /// Case-sensitive: only the exact uppercase letters are valid.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "A" => Some(Self::A),
            "B" => Some(Self::B),
            "C" => Some(Self::C),
            "D" => Some(Self::D),
            _ => None,
        }
    }

    /// Returns the letter as a string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

impl std::fmt::Display for Choice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Questions
// ============================================================================

/// A multiple-choice question with four labeled choices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McqQuestion {
    /// The question text.
    pub question: String,
    /// Choice texts keyed by letter. All four letters must be present.
    pub choices: BTreeMap<Choice, String>,
    /// The letter of the correct choice.
    pub answer: Choice,
}

impl McqQuestion {
    /// Validates the payload shape.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::MalformedPayload` when the question text is
    /// empty, a choice letter is missing, or a choice text is empty.
    pub fn validate(&self) -> Result<()> {
        if self.question.trim().is_empty() {
            return Err(EngineError::malformed("MCQ question text is empty"));
        }
        for letter in Choice::ALL {
            match self.choices.get(&letter) {
                None => {
                    return Err(EngineError::malformed(format!(
                        "MCQ is missing choice {letter}"
                    )));
                }
                Some(text) if text.trim().is_empty() => {
                    return Err(EngineError::malformed(format!(
                        "MCQ choice {letter} has empty text"
                    )));
                }
                Some(_) => {}
            }
        }
        // `answer` is a Choice by construction, so it is always in range.
        Ok(())
    }
}

/// A short-answer question with a model answer and a plausible distractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaqQuestion {
    /// The question text.
    pub question: String,
    /// The model correct answer, used for grading context.
    pub correct_answer: String,
    /// A plausible incorrect answer, used for grading context.
    pub incorrect_answer: String,
}

impl SaqQuestion {
    /// Validates the payload shape.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::MalformedPayload` when any field is empty.
    pub fn validate(&self) -> Result<()> {
        if self.question.trim().is_empty() {
            return Err(EngineError::malformed("SAQ question text is empty"));
        }
        if self.correct_answer.trim().is_empty() {
            return Err(EngineError::malformed("SAQ correct answer is empty"));
        }
        if self.incorrect_answer.trim().is_empty() {
            return Err(EngineError::malformed("SAQ incorrect answer is empty"));
        }
        Ok(())
    }
}

/// A generated question of either kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Question {
    /// Multiple-choice question.
    #[serde(rename = "MCQ")]
    Mcq(McqQuestion),
    /// Short-answer question.
    #[serde(rename = "SAQ")]
    Saq(SaqQuestion),
}

impl Question {
    /// Returns the kind of this question.
    #[must_use]
    pub const fn kind(&self) -> QuestionKind {
        match self {
            Self::Mcq(_) => QuestionKind::Mcq,
            Self::Saq(_) => QuestionKind::Saq,
        }
    }

    /// Returns the question text.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Mcq(q) => &q.question,
            Self::Saq(q) => &q.question,
        }
    }

    /// Validates the payload shape for the inner kind.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::MalformedPayload` if the inner payload fails
    /// its shape check.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Mcq(q) => q.validate(),
            Self::Saq(q) => q.validate(),
        }
    }
}

// ============================================================================
// Grading
// ============================================================================

/// The oracle's verdict on a short answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grading {
    /// Whether the answer was judged correct.
    pub is_correct: bool,
    /// Learner-facing feedback text.
    pub feedback: String,
}

impl Grading {
    /// Validates the payload shape.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::MalformedPayload` when the feedback is empty.
    pub fn validate(&self) -> Result<()> {
        if self.feedback.trim().is_empty() {
            return Err(EngineError::malformed("grading feedback is empty"));
        }
        Ok(())
    }
}

// ============================================================================
// Oracle trait
// ============================================================================

/// Generates level-calibrated questions and grades short answers.
#[async_trait]
pub trait QuestionOracle: Send + Sync {
    /// Generates one question of `kind` at `level` over `chunk`.
    ///
    /// `refine_hint` carries the previously asked question text on a retry;
    /// the new question must differ from it.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::MalformedPayload` for unparseable payloads and
    /// `EngineError::OracleUnavailable` for transport failures.
    async fn generate(
        &self,
        chunk: &str,
        kind: QuestionKind,
        level: BloomLevel,
        refine_hint: Option<&str>,
    ) -> Result<Question>;

    /// Grades a free-text answer to a short-answer question.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::MalformedPayload` for unparseable verdicts and
    /// `EngineError::OracleUnavailable` for transport failures.
    async fn grade_saq(&self, chunk: &str, question: &SaqQuestion, answer: &str)
        -> Result<Grading>;
}

// ============================================================================
// Generation and grading helpers
// ============================================================================

/// Generates a question, retrying on malformed payloads up to `max_attempts`.
///
/// Each rejected payload is logged and retried; only when the budget is
/// spent does the failure escalate. Progress is never advanced on failure.
///
/// # Errors
///
/// Returns `EngineError::GenerationExhausted` when every attempt produced a
/// malformed payload, or `EngineError::OracleUnavailable` immediately on a
/// transport failure.
pub async fn generate_validated(
    oracle: &dyn QuestionOracle,
    chunk: &str,
    kind: QuestionKind,
    level: BloomLevel,
    refine_hint: Option<&str>,
    max_attempts: u32,
) -> Result<Question> {
    for attempt in 1..=max_attempts {
        match oracle.generate(chunk, kind, level, refine_hint).await {
            Ok(question) => match question.validate() {
                Ok(()) => {
                    debug!(%kind, %level, attempt, "question generated");
                    return Ok(question);
                }
                Err(e) => {
                    warn!(%kind, %level, attempt, error = %e, "rejected malformed question");
                }
            },
            Err(e @ EngineError::MalformedPayload { .. }) => {
                warn!(%kind, %level, attempt, error = %e, "oracle payload failed to parse");
            }
            Err(e) => return Err(e),
        }
    }
    Err(EngineError::GenerationExhausted {
        attempts: max_attempts,
    })
}

/// Grades a multiple-choice answer locally.
///
/// # Errors
///
/// Returns `EngineError::InvalidChoice` when `answer` is not exactly one of
/// the four uppercase choice letters. An invalid letter is never graded as
/// incorrect.
pub fn grade_mcq(question: &McqQuestion, answer: &str) -> Result<bool> {
    let choice = Choice::parse(answer).ok_or_else(|| EngineError::invalid_choice(answer))?;
    Ok(choice == question.answer)
}

/// Uniformly permutes the choice texts and re-derives the answer letter.
///
/// Oracles tend to favor particular answer positions; shuffling removes
/// the positional tell without changing which text is correct.
#[must_use]
pub fn shuffle_choices(question: McqQuestion) -> McqQuestion {
    let correct_text = question.choices.get(&question.answer).cloned();

    let mut texts: Vec<String> = question.choices.into_values().collect();
    texts.shuffle(&mut rand::thread_rng());

    let mut choices = BTreeMap::new();
    let mut answer = question.answer;
    for (letter, text) in Choice::ALL.into_iter().zip(texts) {
        if Some(&text) == correct_text.as_ref() {
            answer = letter;
        }
        choices.insert(letter, text);
    }

    McqQuestion {
        question: question.question,
        choices,
        answer,
    }
}
