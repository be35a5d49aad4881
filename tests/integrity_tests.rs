// tests/integrity_tests.rs

mod common;

use chrono::{Duration, Utc};
use common::{correct_answers, sample_bank, spawn_app};
use serde_json::{Value, json};

fn segment(seconds: i64) -> Value {
    let ended = Utc::now();
    let started = ended - Duration::seconds(seconds);
    json!({
        "startedAt": started.to_rfc3339(),
        "endedAt": ended.to_rfc3339(),
        "durationMs": seconds * 1000,
        "reason": "visibility"
    })
}

#[tokio::test]
async fn second_long_absence_invalidates() {
    let app = spawn_app(sample_bank(), 600).await;
    let token = app.issue(1.0).await;
    app.start(&token).await;
    let paper: Value = app.get(&token, "questions").await.json().await.unwrap();

    // First strike: short absence only warns.
    let first: Value = app.post(&token, "away", segment(5)).await.json().await.unwrap();
    assert_eq!(first["ok"], true);
    assert_eq!(first["invalidated"], false);

    let second: Value = app.post(&token, "away", segment(130)).await.json().await.unwrap();
    assert_eq!(second["ok"], true);
    assert_eq!(second["invalidated"], true);

    let meta: Value = app.get(&token, "meta").await.json().await.unwrap();
    assert_eq!(meta["invalidated"], true);
    assert_eq!(meta["invalidReason"], "away_too_long");

    let submit = app.post(&token, "submit", correct_answers(&paper)).await;
    assert_eq!(submit.status().as_u16(), 400);
    let body: Value = submit.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("invalidated"));

    let audit = app.audit(&token).await;
    assert_eq!(audit["awayLogs"].as_array().unwrap().len(), 2);
    assert!(audit["attempt"].is_null());
}

#[tokio::test]
async fn single_long_absence_is_only_a_warning() {
    let app = spawn_app(sample_bank(), 600).await;
    let token = app.issue(1.0).await;
    app.start(&token).await;

    let first: Value = app.post(&token, "away", segment(300)).await.json().await.unwrap();
    assert_eq!(first["invalidated"], false);

    let paper: Value = app.get(&token, "questions").await.json().await.unwrap();
    let submit = app.post(&token, "submit", correct_answers(&paper)).await;
    assert_eq!(submit.status().as_u16(), 200);
}

#[tokio::test]
async fn short_latest_absence_does_not_invalidate() {
    let app = spawn_app(sample_bank(), 600).await;
    let token = app.issue(1.0).await;
    app.start(&token).await;

    app.post(&token, "away", segment(200)).await;
    let second: Value = app.post(&token, "away", segment(10)).await.json().await.unwrap();
    assert_eq!(second["invalidated"], false);

    let meta: Value = app.get(&token, "meta").await.json().await.unwrap();
    assert_eq!(meta["invalidated"], false);
}

#[tokio::test]
async fn duration_derived_when_not_reported() {
    let app = spawn_app(sample_bank(), 600).await;
    let token = app.issue(1.0).await;
    app.start(&token).await;

    let ended = Utc::now();
    let body = json!({
        "startedAt": (ended - Duration::seconds(3)).to_rfc3339(),
        "endedAt": ended.to_rfc3339()
    });
    let resp = app.post(&token, "away", body).await;
    assert_eq!(resp.status().as_u16(), 200);

    let audit = app.audit(&token).await;
    assert_eq!(audit["awayLogs"][0]["durationMs"], 3000);
}

#[tokio::test]
async fn malformed_segments_rejected() {
    let app = spawn_app(sample_bank(), 600).await;
    let token = app.issue(1.0).await;
    app.start(&token).await;

    let now = Utc::now().to_rfc3339();
    let cases = vec![
        json!({ "startedAt": now, "endedAt": now }),
        json!({ "startedAt": Utc::now().to_rfc3339(), "endedAt": (Utc::now() - Duration::seconds(5)).to_rfc3339() }),
        json!({ "startedAt": "yesterday", "endedAt": "today" }),
        json!({ "endedAt": now }),
    ];

    for body in cases {
        let resp = app.post(&token, "away", body.clone()).await;
        assert_eq!(resp.status().as_u16(), 400, "payload {} should be rejected", body);
    }

    assert!(app.audit(&token).await["awayLogs"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn away_for_unknown_token_404() {
    let app = spawn_app(sample_bank(), 600).await;

    let resp = app.post("no-such-token", "away", segment(5)).await;
    assert_eq!(resp.status().as_u16(), 404);
}
