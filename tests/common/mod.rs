// tests/common/mod.rs

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use exam_gate::{
    config::Config,
    repository::{ExamStore, MemoryExamStore, PgExamStore},
    routes,
    services::{
        exam::{ExamService, ExamSettings},
        question_bank::QuestionBank,
    },
    state::AppState,
};
use serde_json::{Value, json};
use sqlx::postgres::PgPoolOptions;

pub const ADMIN_SECRET: &str = "test_admin_secret";

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

/// Two sections, two variants each, 100 points in total.
/// The correct choice index is encoded in every stem ("pick N").
pub fn sample_bank() -> QuestionBank {
    let problem = |answer: usize, points: u32| {
        json!({
            "stem": format!("pick {}", answer),
            "choices": ["a", "b", "c"],
            "answer": answer,
            "points": points
        })
    };
    QuestionBank::from_value(&json!({
        "title": "Integration Exam",
        "sections": [
            {
                "id": "s1",
                "title": "Reading",
                "variants": [
                    { "key": "A", "title": "Set A", "intro": "Read first.", "problems": [problem(0, 30), problem(1, 30)] },
                    { "key": "B", "title": "Set B", "intro": "Read first.", "problems": [problem(2, 30), problem(0, 30)] }
                ]
            },
            {
                "id": "s2",
                "title": "Listening",
                "variants": [
                    { "key": "A", "title": "Set A", "problems": [problem(1, 40)] },
                    { "key": "B", "title": "Set B", "problems": [problem(2, 40)] }
                ]
            }
        ]
    }))
    .expect("sample bank must parse")
}

fn test_config(duration_sec: i64, database_url: Option<&str>) -> Config {
    let mut env = HashMap::new();
    env.insert("ADMIN_SECRET", ADMIN_SECRET.to_string());
    match database_url {
        Some(url) => env.insert("DATABASE_URL", url.to_string()),
        None => env.insert("EXAM_STORE", "memory".to_string()),
    };
    env.insert("PUBLIC_BASE_URL", "https://exams.example.com".to_string());
    env.insert("EXAM_DURATION_SEC", duration_sec.to_string());
    env.insert("RUST_LOG", "error".to_string());
    Config::from_lookup(|key| env.get(key).cloned()).expect("test config")
}

/// Spawns the app on a random port, backed by the in-memory store.
pub async fn spawn_app(bank: QuestionBank, duration_sec: i64) -> TestApp {
    let config = test_config(duration_sec, None);
    serve(config, Arc::new(MemoryExamStore::new()), bank).await
}

/// Spawns the app against the PostgreSQL database named by `DATABASE_URL`.
///
/// Returns `None` when the variable is unset so the suite still runs
/// without a database.
pub async fn spawn_pg_app(bank: QuestionBank, duration_sec: i64) -> Option<TestApp> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping PostgreSQL test");
        return None;
    };

    // Several connections, so concurrent requests really contend on row locks.
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Make sure DATABASE_URL is set.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = test_config(duration_sec, Some(&database_url));
    Some(serve(config, Arc::new(PgExamStore::new(pool)), bank).await)
}

async fn serve(config: Config, store: Arc<dyn ExamStore>, bank: QuestionBank) -> TestApp {
    let exam = ExamService::new(store, Arc::new(bank), ExamSettings::from(&config));
    let state = AppState { exam, config };
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub async fn issue(&self, hours: f64) -> String {
        let resp = self
            .client
            .post(format!("{}/admin/issue", self.address))
            .header("x-admin-secret", ADMIN_SECRET)
            .json(&json!({ "email": "candidate@example.com", "hours": hours }))
            .send()
            .await
            .expect("Issue request failed");
        assert_eq!(resp.status().as_u16(), 201);
        let body: Value = resp.json().await.unwrap();
        body["token"].as_str().expect("token").to_string()
    }

    pub async fn get(&self, token: &str, action: &str) -> reqwest::Response {
        self.client
            .get(format!("{}/exam/{}/{}", self.address, token, action))
            .send()
            .await
            .expect("Request failed")
    }

    pub async fn post(&self, token: &str, action: &str, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}/exam/{}/{}", self.address, token, action))
            .json(&body)
            .send()
            .await
            .expect("Request failed")
    }

    pub async fn start(&self, token: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/exam/{}/start", self.address, token))
            .send()
            .await
            .expect("Start request failed")
    }

    pub async fn audit(&self, token: &str) -> Value {
        self.client
            .get(format!("{}/admin/issues/{}", self.address, token))
            .header("x-admin-secret", ADMIN_SECRET)
            .send()
            .await
            .expect("Audit request failed")
            .json()
            .await
            .unwrap()
    }
}

/// Builds all-correct answers from a fetched paper using the "pick N" stems.
pub fn correct_answers(paper: &Value) -> Value {
    let answers: Vec<Value> = paper["questions"]
        .as_array()
        .expect("questions array")
        .iter()
        .filter(|q| q["type"] == "single")
        .map(|q| {
            let stem = q["stem"].as_str().unwrap();
            let index: u64 = stem.trim_start_matches("pick ").parse().unwrap();
            json!({ "id": q["id"], "value": index })
        })
        .collect();
    json!({ "answers": answers })
}
