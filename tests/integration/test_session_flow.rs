//! End-to-end integration tests for Bloomloop sessions.
//!
//! These tests drive the full HTTP router with a scripted oracle: session
//! creation, chunk serving, answer grading, level movement, the retry cap,
//! rating submission, and the persisted session log.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use tower::util::ServiceExt;
use uuid::Uuid;

use bloomloop_engine::{
    create_router, AppState, Choice, Config, Grading, McqQuestion, MemorySink, Question,
    QuestionOracle, Result, SaqQuestion,
};
use bloomloop_tracker::{BloomLevel, QuestionKind};

/// Oracle that always generates the same MCQ with "alpha" as the correct
/// text, regardless of the kind the tracker drew. Deterministic grading
/// keeps the level trajectory predictable.
struct ScriptedOracle;

#[async_trait]
impl QuestionOracle for ScriptedOracle {
    async fn generate(
        &self,
        _chunk: &str,
        _kind: QuestionKind,
        level: BloomLevel,
        refine_hint: Option<&str>,
    ) -> Result<Question> {
        let suffix = if refine_hint.is_some() { " (retry)" } else { "" };
        Ok(Question::Mcq(McqQuestion {
            question: format!("Level {} question{suffix}", level.as_u8()),
            choices: BTreeMap::from([
                (Choice::A, "alpha".to_string()),
                (Choice::B, "beta".to_string()),
                (Choice::C, "gamma".to_string()),
                (Choice::D, "delta".to_string()),
            ]),
            answer: Choice::A,
        }))
    }

    async fn grade_saq(
        &self,
        _chunk: &str,
        _question: &SaqQuestion,
        _answer: &str,
    ) -> Result<Grading> {
        Ok(Grading {
            is_correct: true,
            feedback: "Good.".to_string(),
        })
    }
}

/// Streak config matching the canonical walkthrough: one success advances,
/// two failures regress, two failed attempts force-advance a chunk.
fn scenario_config() -> Config {
    serde_json::from_str(
        r#"{
            "strategy": "default",
            "policy": {
                "kind": "streak",
                "minSuccessQuestions": 1,
                "maxFailQuestions": 2
            },
            "maxFailedAttemptsPerChunk": 2
        }"#,
    )
    .expect("scenario config is valid")
}

fn build_app(config: Config) -> (Router, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let state = AppState::new(config, Arc::new(ScriptedOracle), Some(sink.clone()));
    (create_router(state), sink)
}

async fn request(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(builder.body(body).expect("request builds"))
        .await
        .expect("router responds");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    let json = serde_json::from_slice(&bytes).expect("body is JSON");
    (status, json)
}

async fn create_session(router: &Router, texts: &[&str]) -> Uuid {
    let chunks: Vec<serde_json::Value> = texts
        .iter()
        .map(|t| serde_json::json!({ "text": t }))
        .collect();
    let (status, body) = request(
        router,
        Method::POST,
        "/api/session",
        Some(serde_json::json!({ "chunks": chunks })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["sessionId"]
        .as_str()
        .and_then(|s| s.parse().ok())
        .expect("session id in response")
}

async fn get_chunk(router: &Router, id: Uuid) -> serde_json::Value {
    let (status, body) = request(
        router,
        Method::GET,
        &format!("/api/session/{id}/chunk"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

/// Finds the shuffled letter whose text is "alpha" (the correct choice).
fn correct_letter(chunk: &serde_json::Value) -> String {
    chunk["choices"]
        .as_object()
        .expect("choices present")
        .iter()
        .find(|(_, text)| text.as_str() == Some("alpha"))
        .map(|(letter, _)| letter.clone())
        .expect("correct text present")
}

/// Any letter other than the correct one.
fn wrong_letter(chunk: &serde_json::Value) -> String {
    let correct = correct_letter(chunk);
    ["A", "B", "C", "D"]
        .iter()
        .find(|l| **l != correct)
        .map(|l| (*l).to_string())
        .expect("three wrong letters exist")
}

async fn answer(router: &Router, id: Uuid, letter: &str) -> serde_json::Value {
    let (status, body) = request(
        router,
        Method::POST,
        &format!("/api/session/{id}/answer"),
        Some(serde_json::json!({ "answer": letter, "elapsedTime": 1.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

/// The canonical three-chunk walkthrough: advance on success, hold the
/// step on the first failure, force-advance on the second, finish.
#[tokio::test]
async fn test_full_session_walkthrough() {
    let (router, sink) = build_app(scenario_config());
    let id = create_session(&router, &["intro", "middle", "finale"]).await;

    // Step 0: level 1, answered correctly.
    let chunk = get_chunk(&router, id).await;
    assert_eq!(chunk["level"], 1);
    assert_eq!(chunk["isRetry"], false);
    assert_eq!(chunk["chunk"]["text"], "intro");

    let verdict = answer(&router, id, &correct_letter(&chunk)).await;
    assert_eq!(verdict["isCorrect"], true);
    assert_eq!(verdict["progress"]["current"], 1);

    // Step 1: one success advanced the level to 2. First failure holds.
    let chunk = get_chunk(&router, id).await;
    assert_eq!(chunk["level"], 2);
    assert_eq!(chunk["chunk"]["text"], "middle");

    let verdict = answer(&router, id, &wrong_letter(&chunk)).await;
    assert_eq!(verdict["isCorrect"], false);
    assert_eq!(verdict["progress"]["current"], 1, "first failure retries");

    // Step 1 retry: chunk body omitted, question regenerated with the
    // previous text as a must-differ hint. Second failure hits the cap
    // and force-advances.
    let chunk = get_chunk(&router, id).await;
    assert_eq!(chunk["isRetry"], true);
    assert!(chunk["chunk"].is_null());
    assert!(chunk["question"]
        .as_str()
        .expect("question text")
        .contains("(retry)"));

    let verdict = answer(&router, id, &wrong_letter(&chunk)).await;
    assert_eq!(verdict["isCorrect"], false);
    assert_eq!(
        verdict["progress"]["current"], 2,
        "retry cap force-advances"
    );

    // Step 2: two consecutive failures at level 2 regressed to level 1.
    let chunk = get_chunk(&router, id).await;
    assert_eq!(chunk["level"], 1);
    assert_eq!(chunk["isRetry"], false);
    assert_eq!(chunk["chunk"]["text"], "finale");

    let verdict = answer(&router, id, &correct_letter(&chunk)).await;
    assert_eq!(verdict["isCorrect"], true);
    assert_eq!(verdict["isLast"], true);
    assert_eq!(verdict["progress"]["percent"], 100.0);

    // Completion flushed the full log to the sink.
    let log = sink.get(id).await.expect("log was flushed");
    assert_eq!(log.total_questions_answered, 4);
    assert_eq!(log.total_questions_correct, 2);
    assert_eq!(log.history.len(), 4);
    assert_eq!(log.rating, None);
}

#[tokio::test]
async fn test_rating_after_completion_lands_in_log() {
    let (router, sink) = build_app(scenario_config());
    let id = create_session(&router, &["only"]).await;

    let chunk = get_chunk(&router, id).await;
    let verdict = answer(&router, id, &correct_letter(&chunk)).await;
    assert_eq!(verdict["isLast"], true);

    let (status, body) = request(
        &router,
        Method::POST,
        &format!("/api/session/{id}/rating"),
        Some(serde_json::json!({ "rating": 4 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["acknowledged"], true);

    // The re-flushed log replaces the first upsert, rating included.
    let log = sink.get(id).await.expect("log present");
    assert_eq!(log.rating, Some(4));
    assert_eq!(log.total_questions_answered, 1);
}

#[tokio::test]
async fn test_completed_session_rejects_further_requests() {
    let (router, _) = build_app(scenario_config());
    let id = create_session(&router, &["only"]).await;

    let chunk = get_chunk(&router, id).await;
    answer(&router, id, &correct_letter(&chunk)).await;

    let (status, _) = request(
        &router,
        Method::GET,
        &format!("/api/session/{id}/chunk"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = request(
        &router,
        Method::POST,
        &format!("/api/session/{id}/answer"),
        Some(serde_json::json!({ "answer": "A" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_progress_endpoint_tracks_the_walkthrough() {
    let (router, _) = build_app(scenario_config());
    let id = create_session(&router, &["one", "two"]).await;

    let (status, body) = request(
        &router,
        Method::GET,
        &format!("/api/session/{id}/progress"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["progress"]["current"], 0);
    assert_eq!(body["progress"]["total"], 2);
    assert_eq!(body["isComplete"], false);

    let chunk = get_chunk(&router, id).await;
    answer(&router, id, &correct_letter(&chunk)).await;

    let (_, body) = request(
        &router,
        Method::GET,
        &format!("/api/session/{id}/progress"),
        None,
    )
    .await;
    assert_eq!(body["progress"]["current"], 1);
    assert_eq!(body["progress"]["percent"], 50.0);
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let (router, _) = build_app(scenario_config());
    let first = create_session(&router, &["a", "b"]).await;
    let second = create_session(&router, &["x"]).await;

    let chunk = get_chunk(&router, first).await;
    answer(&router, first, &correct_letter(&chunk)).await;

    // Progress in the first session is invisible to the second.
    let (_, body) = request(
        &router,
        Method::GET,
        &format!("/api/session/{second}/progress"),
        None,
    )
    .await;
    assert_eq!(body["progress"]["current"], 0);
    assert_eq!(body["progress"]["total"], 1);
}
