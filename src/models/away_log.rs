// src/models/away_log.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'exam_away_logs' table in the database.
/// One completed absence segment reported by the candidate's browser.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwayLog {
    pub id: i64,
    pub issue_id: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAwayLog {
    pub issue_id: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// DTO for `POST /exam/{token}/away`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwayRequest {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Client-measured duration, used when finite and non-negative.
    pub duration_ms: Option<f64>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AwayResponse {
    pub ok: bool,
    pub invalidated: bool,
}
