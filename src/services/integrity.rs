// src/services/integrity.rs

use chrono::{DateTime, Utc};

use crate::{
    error::ExamError,
    models::{
        away_log::{AwayRequest, NewAwayLog},
        issue::Issue,
    },
    repository::IssueTx,
};

/// A second or later absence at least this long invalidates the exam.
pub const AWAY_INVALIDATION_MS: i64 = 120_000;

pub const AWAY_INVALID_REASON: &str = "away_too_long";

const MAX_REASON_LEN: usize = 32;

/// Validated absence segment, ready to be logged.
#[derive(Debug, Clone, PartialEq)]
pub struct AwaySegment {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub reason: Option<String>,
}

impl TryFrom<AwayRequest> for AwaySegment {
    type Error = ExamError;

    fn try_from(req: AwayRequest) -> Result<Self, Self::Error> {
        if req.ended_at <= req.started_at {
            return Err(ExamError::Validation(
                "endedAt must be after startedAt".to_string(),
            ));
        }

        let derived = (req.ended_at - req.started_at).num_milliseconds();
        let duration_ms = match req.duration_ms {
            Some(reported) if reported.is_finite() && reported >= 0.0 => reported.round() as i64,
            _ => derived,
        };

        let reason = req
            .reason
            .map(|r| r.trim().chars().take(MAX_REASON_LEN).collect::<String>())
            .filter(|r| !r.is_empty());

        Ok(Self {
            started_at: req.started_at,
            ended_at: req.ended_at,
            duration_ms,
            reason,
        })
    }
}

/// One strike warns, the second strike penalizes: invalidate once at least
/// two segments exist and the latest one reached the threshold.
pub fn should_invalidate(durations_in_order: &[i64]) -> bool {
    match durations_in_order {
        [_, .., latest] => *latest >= AWAY_INVALIDATION_MS,
        _ => false,
    }
}

/// Appends the segment and applies the invalidation rule over every segment
/// recorded for the issue. Runs under the issue's row lock.
///
/// Returns whether the issue is invalidated after this report.
pub async fn record_away_segment(
    tx: &mut dyn IssueTx,
    issue: &mut Issue,
    segment: AwaySegment,
    now: DateTime<Utc>,
) -> Result<bool, ExamError> {
    tx.insert_away_log(&NewAwayLog {
        issue_id: issue.id,
        started_at: segment.started_at,
        ended_at: segment.ended_at,
        duration_ms: segment.duration_ms,
        reason: segment.reason,
        created_at: now,
    })
    .await?;

    if issue.is_invalidated() {
        return Ok(true);
    }

    let durations = tx.away_durations(issue.id).await?;
    if should_invalidate(&durations) && issue.invalidate(now, AWAY_INVALID_REASON) {
        tx.update_issue(issue).await?;
        tracing::warn!(
            issue_id = issue.id,
            segments = durations.len(),
            duration_ms = segment.duration_ms,
            "Exam invalidated after repeated absence"
        );
    }

    Ok(issue.is_invalidated())
}
