//! OpenAI-compatible question oracle.
//!
//! Talks to a chat completions endpoint, asks for strict JSON, and parses
//! the reply into the wire types in [`crate::oracle`]. Anything that fails
//! to parse is a malformed payload; the caller's retry budget handles it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use bloomloop_tracker::{BloomLevel, QuestionKind};

use crate::config::OracleConfig;
use crate::error::{EngineError, Result};
use crate::oracle::{Grading, McqQuestion, Question, QuestionOracle, SaqQuestion};

/// A [`QuestionOracle`] backed by an OpenAI-style chat completions API.
pub struct LlmOracle {
    config: OracleConfig,
    api_key: String,
    client: reqwest::Client,
}

// Manual impl: the API key must never appear in debug output.
impl std::fmt::Debug for LlmOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmOracle")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageContent,
}

#[derive(Debug, Deserialize)]
struct ChatMessageContent {
    content: String,
}

impl LlmOracle {
    /// Creates an oracle from its configuration, resolving the API key from
    /// the configured environment variable.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::ConfigValidation` when the key is missing, so
    /// startup fails fast instead of every request failing later.
    pub fn from_config(config: &OracleConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            EngineError::config_validation(
                format!("environment variable {} is not set", config.api_key_env),
                format!(
                    "Export {} with your oracle API key before starting the server",
                    config.api_key_env
                ),
            )
        })?;

        Ok(Self {
            config: config.clone(),
            api_key,
            client: reqwest::Client::new(),
        })
    }

    /// Builds the generation prompt for one question.
    fn generation_prompt(
        chunk: &str,
        kind: QuestionKind,
        level: BloomLevel,
        refine_hint: Option<&str>,
    ) -> String {
        let shape = match kind {
            QuestionKind::Mcq => {
                r#"{"question": "...", "choices": {"A": "...", "B": "...", "C": "...", "D": "..."}, "answer": "A"}"#
            }
            QuestionKind::Saq => {
                r#"{"question": "...", "correct_answer": "...", "incorrect_answer": "..."}"#
            }
        };

        let mut prompt = format!(
            "You are writing one {kind} study question testing the '{label}' level \
             of Bloom's taxonomy (level {ordinal} of 6) about the passage below.\n\n\
             Passage:\n{chunk}\n\n\
             Respond with ONLY a JSON object of this exact shape, no prose:\n{shape}\n",
            label = level.label(),
            ordinal = level.as_u8(),
        );
        if let Some(previous) = refine_hint {
            prompt.push_str(&format!(
                "\nThe learner already saw this question; write a different one:\n{previous}\n"
            ));
        }
        prompt
    }

    /// Builds the grading prompt for a short answer.
    fn grading_prompt(chunk: &str, question: &SaqQuestion, answer: &str) -> String {
        format!(
            "You are grading a learner's short answer about the passage below.\n\n\
             Passage:\n{chunk}\n\n\
             Question: {question}\n\
             A correct answer looks like: {correct}\n\
             An incorrect answer looks like: {incorrect}\n\
             Learner's answer: {answer}\n\n\
             Respond with ONLY a JSON object of this exact shape, no prose:\n\
             {{\"is_correct\": true, \"feedback\": \"one or two sentences\"}}\n",
            question = question.question,
            correct = question.correct_answer,
            incorrect = question.incorrect_answer,
        )
    }

    /// Sends one prompt and returns the raw completion text.
    async fn complete(&self, prompt: String) -> Result<String> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt,
            }],
        };

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        debug!(model = %self.config.model, "calling oracle endpoint");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::oracle_unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::oracle_unavailable(format!(
                "endpoint answered {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| EngineError::oracle_unavailable(format!("unreadable response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| EngineError::malformed("completion contained no choices"))
    }
}

/// Strips optional Markdown code fences around a JSON body.
///
/// Models routinely wrap JSON in ```json fences despite instructions.
fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

#[async_trait]
impl QuestionOracle for LlmOracle {
    async fn generate(
        &self,
        chunk: &str,
        kind: QuestionKind,
        level: BloomLevel,
        refine_hint: Option<&str>,
    ) -> Result<Question> {
        let prompt = Self::generation_prompt(chunk, kind, level, refine_hint);
        let completion = self.complete(prompt).await?;
        let body = extract_json(&completion);

        let question = match kind {
            QuestionKind::Mcq => {
                let q: McqQuestion = serde_json::from_str(body).map_err(|e| {
                    EngineError::malformed(format!("MCQ payload did not parse: {e}"))
                })?;
                Question::Mcq(q)
            }
            QuestionKind::Saq => {
                let q: SaqQuestion = serde_json::from_str(body).map_err(|e| {
                    EngineError::malformed(format!("SAQ payload did not parse: {e}"))
                })?;
                Question::Saq(q)
            }
        };
        Ok(question)
    }

    async fn grade_saq(
        &self,
        chunk: &str,
        question: &SaqQuestion,
        answer: &str,
    ) -> Result<Grading> {
        let prompt = Self::grading_prompt(chunk, question, answer);
        let completion = self.complete(prompt).await?;
        let body = extract_json(&completion);

        let grading: Grading = serde_json::from_str(body)
            .map_err(|e| EngineError::malformed(format!("grading payload did not parse: {e}")))?;
        grading.validate()?;
        Ok(grading)
    }
}
