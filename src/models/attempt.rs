// src/models/attempt.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};

/// One submitted answer. `value` is the chosen choice index as sent by the
/// client; anything that is not that exact integer simply does not match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub id: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Represents the 'exam_attempts' table in the database.
/// At most one row per issue, written at submission and never updated.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: i64,
    pub issue_id: i64,
    pub answers: Json<Vec<SubmittedAnswer>>,
    pub score: i64,
    pub total_points: i64,
    pub passed: bool,
    pub duration_sec: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub issue_id: i64,
    pub answers: Vec<SubmittedAnswer>,
    pub score: i64,
    pub total_points: i64,
    pub passed: bool,
    pub duration_sec: i64,
    pub created_at: DateTime<Utc>,
}

/// DTO for submitting an exam.
#[derive(Debug, Deserialize)]
pub struct SubmitExamRequest {
    #[serde(default)]
    pub answers: Vec<SubmittedAnswer>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitExamResponse {
    pub attempt_id: i64,
    pub submitted_at: DateTime<Utc>,
    pub elapsed_sec: i64,
    pub score: i64,
    pub total_points: i64,
    pub passed: bool,
}
