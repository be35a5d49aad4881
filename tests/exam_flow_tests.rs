// tests/exam_flow_tests.rs

mod common;

use common::{correct_answers, sample_bank, spawn_app};
use serde_json::{Value, json};

#[tokio::test]
async fn meta_unknown_token_404() {
    let app = spawn_app(sample_bank(), 600).await;

    for action in ["meta", "questions"] {
        assert_eq!(app.get("no-such-token", action).await.status().as_u16(), 404);
    }
    assert_eq!(app.start("no-such-token").await.status().as_u16(), 404);
    let submit = app
        .post("no-such-token", "submit", json!({ "answers": [] }))
        .await;
    assert_eq!(submit.status().as_u16(), 404);
}

#[tokio::test]
async fn meta_before_start() {
    let app = spawn_app(sample_bank(), 600).await;
    let token = app.issue(1.0).await;

    let meta: Value = app.get(&token, "meta").await.json().await.unwrap();
    assert_eq!(meta["status"], "issued");
    assert_eq!(meta["durationSec"], 600);
    assert_eq!(meta["remainingSec"], Value::Null);
    assert_eq!(meta["startedAt"], Value::Null);
    assert_eq!(meta["invalidated"], false);
    assert!(meta["serverNow"].is_string());
    assert!(meta["expiresAt"].is_string());
}

#[tokio::test]
async fn full_flow_all_correct_passes() {
    // Arrange
    let app = spawn_app(sample_bank(), 600).await;
    let token = app.issue(1.0).await;

    // 1. Start
    let start = app.start(&token).await;
    assert_eq!(start.status().as_u16(), 200);
    let started: Value = start.json().await.unwrap();
    assert_eq!(started["durationSec"], 600);
    assert!(started["startedAt"].is_string());

    let meta: Value = app.get(&token, "meta").await.json().await.unwrap();
    assert_eq!(meta["status"], "started");
    let remaining = meta["remainingSec"].as_i64().unwrap();
    assert!(remaining > 590 && remaining <= 600);

    // 2. Fetch paper
    let paper: Value = app.get(&token, "questions").await.json().await.unwrap();
    assert_eq!(paper["title"], "Integration Exam");
    assert_eq!(paper["durationSec"], 600);

    // 3. Submit all-correct answers
    let submit = app.post(&token, "submit", correct_answers(&paper)).await;
    assert_eq!(submit.status().as_u16(), 200);
    let result: Value = submit.json().await.unwrap();
    assert_eq!(result["score"], 100);
    assert_eq!(result["passed"], true);
    assert!(result["attemptId"].is_i64());
    assert!(result["submittedAt"].is_string());
    assert!(result["elapsedSec"].as_i64().unwrap() < 5);

    // 4. State is final
    let meta: Value = app.get(&token, "meta").await.json().await.unwrap();
    assert_eq!(meta["status"], "submitted");
    assert_eq!(meta["remainingSec"], Value::Null);

    let again = app.post(&token, "submit", correct_answers(&paper)).await;
    assert_eq!(again.status().as_u16(), 409);

    let restart = app.start(&token).await;
    assert_eq!(restart.status().as_u16(), 409);

    let audit = app.audit(&token).await;
    assert_eq!(audit["attempt"]["score"], 100);
    assert_eq!(audit["issue"]["status"], "submitted");
}

#[tokio::test]
async fn partial_answers_fail_threshold() {
    let app = spawn_app(sample_bank(), 600).await;
    let token = app.issue(1.0).await;
    app.start(&token).await;

    let paper: Value = app.get(&token, "questions").await.json().await.unwrap();
    let mut answers = correct_answers(&paper);
    // Keep only the first section's two problems (60 points), add an unknown id.
    let list = answers["answers"].as_array_mut().unwrap();
    list.truncate(2);
    list.push(json!({ "id": "made_up", "value": 0 }));

    let result: Value = app.post(&token, "submit", answers).await.json().await.unwrap();
    assert_eq!(result["score"], 60);
    assert_eq!(result["passed"], false);
}

#[tokio::test]
async fn start_twice_conflicts_and_keeps_started_at() {
    let app = spawn_app(sample_bank(), 600).await;
    let token = app.issue(1.0).await;

    let first: Value = app.start(&token).await.json().await.unwrap();
    let second = app.start(&token).await;
    assert_eq!(second.status().as_u16(), 409);

    let meta: Value = app.get(&token, "meta").await.json().await.unwrap();
    assert_eq!(meta["startedAt"], first["startedAt"]);
}

#[tokio::test]
async fn concurrent_starts_exactly_one_wins() {
    let app = spawn_app(sample_bank(), 600).await;
    let token = app.issue(1.0).await;

    let (a, b) = tokio::join!(app.start(&token), app.start(&token));
    let mut statuses = vec![a.status().as_u16(), b.status().as_u16()];
    statuses.sort();
    assert_eq!(statuses, vec![200, 409]);
}

#[tokio::test]
async fn submit_before_start_rejected() {
    let app = spawn_app(sample_bank(), 600).await;
    let token = app.issue(1.0).await;

    let submit = app.post(&token, "submit", json!({ "answers": [] })).await;
    assert_eq!(submit.status().as_u16(), 400);

    let meta: Value = app.get(&token, "meta").await.json().await.unwrap();
    assert_eq!(meta["status"], "issued");
}

#[tokio::test]
async fn questions_assign_variants_once() {
    let app = spawn_app(sample_bank(), 600).await;
    let token = app.issue(1.0).await;

    // Fetch before any start
    let first: Value = app.get(&token, "questions").await.json().await.unwrap();
    let chosen = app.audit(&token).await["issue"]["chosenVariants"].clone();
    assert!(chosen.is_object());
    assert_eq!(chosen.as_object().unwrap().len(), 2);

    for _ in 0..5 {
        let again: Value = app.get(&token, "questions").await.json().await.unwrap();
        assert_eq!(again["questions"], first["questions"]);
    }
    assert_eq!(app.audit(&token).await["issue"]["chosenVariants"], chosen);

    let headings: Vec<&str> = first["questions"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|q| q["type"] == "heading")
        .map(|q| q["stem"].as_str().unwrap())
        .collect();
    assert_eq!(headings.len(), 2);
    assert!(headings[0].starts_with("Reading / Set "));
    assert!(headings[0].ends_with("(60 points)"));
}

#[tokio::test]
async fn concurrent_first_fetches_agree() {
    let app = spawn_app(sample_bank(), 600).await;
    let token = app.issue(1.0).await;

    let (a, b) = tokio::join!(app.get(&token, "questions"), app.get(&token, "questions"));
    let a: Value = a.json().await.unwrap();
    let b: Value = b.json().await.unwrap();
    assert_eq!(a["questions"], b["questions"]);
}

#[tokio::test]
async fn questions_never_leak_answers() {
    let app = spawn_app(sample_bank(), 600).await;
    let token = app.issue(1.0).await;

    let raw = app.get(&token, "questions").await.text().await.unwrap();
    assert!(!raw.contains("\"answer"));
    assert!(!raw.contains("correct"));

    let paper: Value = serde_json::from_str(&raw).unwrap();
    for q in paper["questions"].as_array().unwrap() {
        assert!(q.get("answer").is_none());
    }
}

#[tokio::test]
async fn submit_after_duration_is_time_over() {
    let app = spawn_app(sample_bank(), 1).await;
    let token = app.issue(1.0).await;
    app.start(&token).await;
    let paper: Value = app.get(&token, "questions").await.json().await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(1_200)).await;

    let submit = app.post(&token, "submit", correct_answers(&paper)).await;
    assert_eq!(submit.status().as_u16(), 400);
    let body: Value = submit.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("time over"));

    let meta: Value = app.get(&token, "meta").await.json().await.unwrap();
    assert_eq!(meta["status"], "expired");
    assert!(app.audit(&token).await["attempt"].is_null());
}

#[tokio::test]
async fn link_past_deadline_expires_lazily() {
    let app = spawn_app(sample_bank(), 600).await;
    // Roughly 0.7 seconds.
    let token = app.issue(0.0002).await;

    tokio::time::sleep(std::time::Duration::from_millis(1_000)).await;

    let questions = app.get(&token, "questions").await;
    assert_eq!(questions.status().as_u16(), 410);

    let meta: Value = app.get(&token, "meta").await.json().await.unwrap();
    assert_eq!(meta["status"], "expired");

    let start = app.start(&token).await;
    assert_eq!(start.status().as_u16(), 400);
}
