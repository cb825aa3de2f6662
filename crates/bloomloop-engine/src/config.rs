//! Configuration types for the Bloomloop engine.
//!
//! Controls the level-selection policy, retry/advance limits, oracle
//! settings, and session lifecycle. Loaded from `bloomloop.json`; every
//! field has a default, and validation failures are fatal at startup.

use std::path::Path;

use serde::{Deserialize, Serialize};

use bloomloop_tracker::{BloomLevel, LevelPolicy, Strategy};

use crate::error::{EngineError, Result};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "bloomloop.json";

/// Default consecutive successes required before a level move.
const fn default_min_success() -> u32 {
    2
}

/// Default consecutive failures tolerated before a level move.
const fn default_max_fail() -> u32 {
    2
}

/// Default questions per level for the cumulative policy.
const fn default_min_questions_per_level() -> u32 {
    2
}

/// Default incorrect answers on one chunk before force-advancing.
const fn default_max_failed_attempts() -> u32 {
    2
}

/// Default cap on question-generation attempts per request.
const fn default_max_generation_attempts() -> u32 {
    3
}

/// Default idle time before a session is eligible for expiry, in seconds.
const fn default_session_ttl_secs() -> u64 {
    7200
}

/// Default oracle model.
fn default_model() -> String {
    "gpt-4o".to_string()
}

/// Default oracle endpoint.
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

/// Default environment variable holding the oracle API key.
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

/// Default sampling temperature for question generation.
const fn default_temperature() -> f32 {
    0.5
}

/// Main configuration for the Bloomloop engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Level progression strategy.
    #[serde(default)]
    pub strategy: Strategy,

    /// Level-selection policy variant and thresholds.
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Explicit starting level (1–6); overrides the strategy's default.
    #[serde(default)]
    pub initial_level: Option<u8>,

    /// Incorrect answers on one chunk before the learner is advanced anyway.
    #[serde(default = "default_max_failed_attempts")]
    pub max_failed_attempts_per_chunk: u32,

    /// Generation attempts per question before the request fails.
    #[serde(default = "default_max_generation_attempts")]
    pub max_generation_attempts: u32,

    /// Idle seconds before a session may be expired; 0 disables expiry.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// Question oracle settings.
    #[serde(default)]
    pub oracle: OracleConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            policy: PolicyConfig::default(),
            initial_level: None,
            max_failed_attempts_per_chunk: default_max_failed_attempts(),
            max_generation_attempts: default_max_generation_attempts(),
            session_ttl_secs: default_session_ttl_secs(),
            oracle: OracleConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `bloomloop.json`; when absent, returns the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON or
    /// invalid values.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            EngineError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from a specific directory.
    ///
    /// # Errors
    ///
    /// Returns an error if `bloomloop.json` exists but is invalid.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        Self::load_from_file(&config_path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::ConfigParse` for unreadable or syntactically
    /// invalid files and `EngineError::ConfigValidation` for invalid values.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(EngineError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| EngineError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::ConfigValidation` if any check fails.
    pub fn validate(&self) -> Result<()> {
        if let Some(level) = self.initial_level {
            if BloomLevel::from_u8(level).is_none() {
                return Err(EngineError::config_validation(
                    format!("initialLevel must be between 1 and 6, got {level}"),
                    "Set initialLevel to an integer from 1 to 6, or omit it",
                ));
            }
        }

        if self.max_failed_attempts_per_chunk < 2 {
            return Err(EngineError::config_validation(
                "maxFailedAttemptsPerChunk must be at least 2",
                "Set maxFailedAttemptsPerChunk to 2 or more so the learner gets at least one retry",
            ));
        }

        if self.max_generation_attempts == 0 {
            return Err(EngineError::config_validation(
                "maxGenerationAttempts must be greater than 0",
                "Set maxGenerationAttempts to at least 1 in your bloomloop.json",
            ));
        }

        self.policy.validate()?;
        self.oracle.validate()?;

        Ok(())
    }

    /// Builds the configured level policy.
    #[must_use]
    pub const fn level_policy(&self) -> LevelPolicy {
        match self.policy.kind {
            PolicyKind::Streak => LevelPolicy::Streak {
                min_success: self.policy.min_success_questions,
                max_fail: self.policy.max_fail_questions,
            },
            PolicyKind::Cumulative => LevelPolicy::Cumulative {
                min_questions_per_level: self.policy.min_questions_per_level,
                correct_only: self.policy.correct_only,
            },
        }
    }

    /// Returns the configured initial level, if any.
    ///
    /// Validation guarantees the stored ordinal is in range.
    #[must_use]
    pub fn configured_initial_level(&self) -> Option<BloomLevel> {
        self.initial_level.and_then(BloomLevel::from_u8)
    }
}

/// Level-selection policy variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PolicyKind {
    /// Threshold-streak policy (default): react to consecutive outcomes.
    #[default]
    Streak,
    /// Cumulative policy: traverse the level range with wraparound.
    Cumulative,
}

impl PolicyKind {
    /// Parses a string into a `PolicyKind`, case-insensitively.
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "streak" => Some(Self::Streak),
            "cumulative" => Some(Self::Cumulative),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for PolicyKind {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid policy kind '{s}': expected 'streak' or 'cumulative'"
            ))
        })
    }
}

impl Serialize for PolicyKind {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let s = match self {
            Self::Streak => "streak",
            Self::Cumulative => "cumulative",
        };
        serializer.serialize_str(s)
    }
}

/// Thresholds for the level-selection policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConfig {
    /// Which policy variant to run.
    #[serde(default)]
    pub kind: PolicyKind,

    /// Consecutive successes required before moving (streak policy).
    #[serde(default = "default_min_success")]
    pub min_success_questions: u32,

    /// Consecutive failures tolerated before moving (streak policy).
    #[serde(default = "default_max_fail")]
    pub max_fail_questions: u32,

    /// Base questions per level before moving on (cumulative policy).
    #[serde(default = "default_min_questions_per_level")]
    pub min_questions_per_level: u32,

    /// Count only correct answers toward the cumulative threshold.
    #[serde(default)]
    pub correct_only: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            kind: PolicyKind::default(),
            min_success_questions: default_min_success(),
            max_fail_questions: default_max_fail(),
            min_questions_per_level: default_min_questions_per_level(),
            correct_only: false,
        }
    }
}

impl PolicyConfig {
    fn validate(&self) -> Result<()> {
        if self.min_success_questions == 0 {
            return Err(EngineError::config_validation(
                "policy.minSuccessQuestions must be greater than 0",
                "Set policy.minSuccessQuestions to at least 1 in your bloomloop.json",
            ));
        }
        if self.max_fail_questions == 0 {
            return Err(EngineError::config_validation(
                "policy.maxFailQuestions must be greater than 0",
                "Set policy.maxFailQuestions to at least 1 in your bloomloop.json",
            ));
        }
        if self.min_questions_per_level == 0 {
            return Err(EngineError::config_validation(
                "policy.minQuestionsPerLevel must be greater than 0",
                "Set policy.minQuestionsPerLevel to at least 1 in your bloomloop.json",
            ));
        }
        Ok(())
    }
}

/// Question oracle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleConfig {
    /// Model identifier sent to the oracle endpoint.
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the OpenAI-compatible chat completions endpoint.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Sampling temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
        }
    }
}

impl OracleConfig {
    fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(EngineError::config_validation(
                "oracle.model must not be empty",
                "Provide a model identifier in your bloomloop.json",
            ));
        }
        if self.base_url.trim().is_empty() {
            return Err(EngineError::config_validation(
                "oracle.baseUrl must not be empty",
                "Provide the oracle endpoint URL in your bloomloop.json",
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(EngineError::config_validation(
                format!(
                    "oracle.temperature must be between 0.0 and 2.0, got {}",
                    self.temperature
                ),
                "Set oracle.temperature within [0.0, 2.0] in your bloomloop.json",
            ));
        }
        Ok(())
    }
}
