// src/models/issue.rs

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

use crate::error::ExamError;

/// Section id -> variant key. Assigned once per issue.
pub type ChosenVariants = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueStatus {
    Issued,
    Started,
    Submitted,
    Expired,
}

impl IssueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Issued => "issued",
            IssueStatus::Started => "started",
            IssueStatus::Submitted => "submitted",
            IssueStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueStatus {
    type Err = ExamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "issued" => Ok(IssueStatus::Issued),
            "started" => Ok(IssueStatus::Started),
            "submitted" => Ok(IssueStatus::Submitted),
            "expired" => Ok(IssueStatus::Expired),
            other => Err(ExamError::Storage(format!("unknown issue status '{}'", other))),
        }
    }
}

/// One exam assignment and its lifecycle.
///
/// Transitions are monotonic: issued -> started -> submitted. `expired` is
/// terminal and reachable from issued or started. Invalidation is a sticky
/// annotation on a started issue and does not change `status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: i64,
    pub token: String,
    pub email: String,
    pub level: Option<String>,
    pub status: IssueStatus,
    pub expires_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub invalidated_at: Option<DateTime<Utc>>,
    pub invalid_reason: Option<String>,
    pub chosen_variants: Option<ChosenVariants>,
    pub created_at: DateTime<Utc>,
}

impl Issue {
    pub fn is_invalidated(&self) -> bool {
        self.invalidated_at.is_some()
    }

    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_due_for_expiry(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, IssueStatus::Issued | IssueStatus::Started) && self.is_past_deadline(now)
    }

    /// Lazy expiry: moves an unsubmitted issue past its deadline to `expired`.
    ///
    /// Returns `true` when the status changed and must be persisted.
    pub fn expire_if_due(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_due_for_expiry(now) {
            self.status = IssueStatus::Expired;
            true
        } else {
            false
        }
    }

    /// Single-use start. Deadline must already have been checked with
    /// [`Issue::expire_if_due`].
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), ExamError> {
        match self.status {
            IssueStatus::Issued => {
                self.status = IssueStatus::Started;
                self.started_at = Some(now);
                Ok(())
            }
            IssueStatus::Started => Err(ExamError::AlreadyStarted),
            IssueStatus::Submitted => Err(ExamError::AlreadySubmitted),
            IssueStatus::Expired => Err(ExamError::Expired),
        }
    }

    /// Seconds left on the clock. Only defined while the exam is running.
    pub fn remaining_sec(&self, now: DateTime<Utc>, duration_sec: i64) -> Option<i64> {
        match (self.status, self.started_at) {
            (IssueStatus::Started, Some(started_at)) => {
                let elapsed = (now - started_at).num_seconds();
                Some((duration_sec - elapsed).max(0))
            }
            _ => None,
        }
    }

    /// Gatekeeper for submission. Returns the elapsed whole seconds on success.
    ///
    /// When the clock or the deadline has run out, the issue is moved to
    /// `expired` and `TimeOver` is returned; the caller must persist that
    /// transition before reporting the error.
    pub fn begin_submission(
        &mut self,
        now: DateTime<Utc>,
        duration_sec: i64,
    ) -> Result<i64, ExamError> {
        if self.is_invalidated() {
            return Err(ExamError::Invalidated);
        }
        match self.status {
            IssueStatus::Submitted => return Err(ExamError::AlreadySubmitted),
            IssueStatus::Expired => return Err(ExamError::TimeOver),
            IssueStatus::Issued => return Err(ExamError::NotStarted),
            IssueStatus::Started => {}
        }
        let Some(started_at) = self.started_at else {
            return Err(ExamError::NotStarted);
        };

        let elapsed_ms = (now - started_at).num_milliseconds().max(0);
        if elapsed_ms > duration_sec * 1000 || self.is_past_deadline(now) {
            self.status = IssueStatus::Expired;
            return Err(ExamError::TimeOver);
        }
        Ok(elapsed_ms / 1000)
    }

    pub fn complete_submission(&mut self, now: DateTime<Utc>) {
        self.status = IssueStatus::Submitted;
        self.submitted_at = Some(now);
    }

    /// First writer wins. Only a running exam can be invalidated.
    ///
    /// Returns `true` if this call set the flag.
    pub fn invalidate(&mut self, now: DateTime<Utc>, reason: &str) -> bool {
        if self.is_invalidated() || self.status != IssueStatus::Started {
            return false;
        }
        self.invalidated_at = Some(now);
        self.invalid_reason = Some(reason.to_string());
        true
    }
}

/// Represents the 'exam_issues' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct IssueRow {
    pub id: i64,
    pub token: String,
    pub email: String,
    pub level: Option<String>,
    pub status: String,
    pub expires_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub invalidated_at: Option<DateTime<Utc>>,
    pub invalid_reason: Option<String>,
    pub chosen_variants: Option<Json<ChosenVariants>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<IssueRow> for Issue {
    type Error = ExamError;

    fn try_from(row: IssueRow) -> Result<Self, Self::Error> {
        Ok(Issue {
            id: row.id,
            token: row.token,
            email: row.email,
            level: row.level,
            status: row.status.parse()?,
            expires_at: row.expires_at,
            started_at: row.started_at,
            submitted_at: row.submitted_at,
            invalidated_at: row.invalidated_at,
            invalid_reason: row.invalid_reason,
            chosen_variants: row.chosen_variants.map(|Json(map)| map),
            created_at: row.created_at,
        })
    }
}

/// Insert payload for a freshly issued exam.
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub token: String,
    pub email: String,
    pub level: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// DTO for `POST /admin/issue`.
#[derive(Debug, Deserialize, Validate)]
pub struct IssueExamRequest {
    #[validate(email(message = "email must be a valid address"), length(max = 255))]
    pub email: String,
    #[validate(range(exclusive_min = 0.0, max = 8760.0, message = "hours must be a positive number"))]
    pub hours: f64,
    #[validate(length(max = 50))]
    pub level: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueExamResponse {
    pub url: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Response of `GET /exam/{token}/meta`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamMeta {
    pub status: IssueStatus,
    pub duration_sec: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub remaining_sec: Option<i64>,
    pub server_now: DateTime<Utc>,
    pub invalidated: bool,
    pub invalid_reason: Option<String>,
}

/// Response of `POST /exam/{token}/start`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub started_at: DateTime<Utc>,
    pub duration_sec: i64,
}
