//! Bloomloop Session Engine
//!
//! Runs adaptive learning sessions: question generation and grading via
//! the oracle, per-chunk retry/advance progression, the session registry,
//! and the HTTP API.

pub mod api;
pub mod config;
pub mod error;
pub mod llm;
pub mod oracle;
pub mod persistence;
pub mod registry;
pub mod session;

pub use api::{
    create_router, AnswerRequest, AppState, CreateSessionRequest, CreateSessionResponse,
    ErrorResponse, ProgressResponse, RatingRequest, RatingResponse,
};
pub use config::{Config, OracleConfig, PolicyConfig, PolicyKind};
pub use error::{EngineError, Result};
pub use llm::LlmOracle;
pub use oracle::{
    generate_validated, grade_mcq, shuffle_choices, Choice, Grading, McqQuestion, Question,
    QuestionOracle, SaqQuestion,
};
pub use persistence::{LogSink, MemorySink};
pub use registry::SessionRegistry;
pub use session::{AnswerVerdict, AskedQuestion, Chunk, ChunkStep, Progress, SessionState};
