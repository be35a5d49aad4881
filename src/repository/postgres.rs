// src/repository/postgres.rs

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction, types::Json};

use crate::{
    error::ExamError,
    models::{
        attempt::{Attempt, NewAttempt},
        away_log::{AwayLog, NewAwayLog},
        issue::{Issue, IssueRow, NewIssue},
    },
    repository::{ExamStore, IssueTx},
};

const ISSUE_COLUMNS: &str = "\
    id, token, email, level, status, expires_at, started_at, submitted_at, \
    invalidated_at, invalid_reason, chosen_variants, created_at";

const AWAY_COLUMNS: &str = "id, issue_id, started_at, ended_at, duration_ms, reason, created_at";

const ATTEMPT_COLUMNS: &str =
    "id, issue_id, answers, score, total_points, passed, duration_sec, created_at";

/// PostgreSQL-backed exam store.
#[derive(Clone)]
pub struct PgExamStore {
    pool: PgPool,
}

impl PgExamStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExamStore for PgExamStore {
    async fn begin(&self) -> Result<Box<dyn IssueTx>, ExamError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgIssueTx { tx }))
    }

    async fn find_issue(&self, token: &str) -> Result<Option<Issue>, ExamError> {
        let row = sqlx::query_as::<_, IssueRow>(&format!(
            "SELECT {ISSUE_COLUMNS} FROM exam_issues WHERE token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Issue::try_from).transpose()
    }

    async fn list_away_logs(&self, issue_id: i64) -> Result<Vec<AwayLog>, ExamError> {
        let logs = sqlx::query_as::<_, AwayLog>(&format!(
            "SELECT {AWAY_COLUMNS} FROM exam_away_logs WHERE issue_id = $1 ORDER BY id ASC"
        ))
        .bind(issue_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }

    async fn find_attempt(&self, issue_id: i64) -> Result<Option<Attempt>, ExamError> {
        let attempt = sqlx::query_as::<_, Attempt>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM exam_attempts WHERE issue_id = $1"
        ))
        .bind(issue_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(attempt)
    }

    async fn ping(&self) -> Result<(), ExamError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// One database transaction. Rolled back by sqlx when dropped uncommitted.
pub struct PgIssueTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl IssueTx for PgIssueTx {
    async fn insert_issue(&mut self, issue: &NewIssue) -> Result<Issue, ExamError> {
        let row = sqlx::query_as::<_, IssueRow>(&format!(
            r#"
            INSERT INTO exam_issues (token, email, level, status, expires_at, created_at)
            VALUES ($1, $2, $3, 'issued', $4, $5)
            RETURNING {ISSUE_COLUMNS}
            "#
        ))
        .bind(&issue.token)
        .bind(&issue.email)
        .bind(&issue.level)
        .bind(issue.expires_at)
        .bind(issue.created_at)
        .fetch_one(&mut *self.tx)
        .await?;

        Issue::try_from(row)
    }

    async fn lock_issue(&mut self, token: &str) -> Result<Option<Issue>, ExamError> {
        let row = sqlx::query_as::<_, IssueRow>(&format!(
            "SELECT {ISSUE_COLUMNS} FROM exam_issues WHERE token = $1 FOR UPDATE"
        ))
        .bind(token)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Issue::try_from).transpose()
    }

    async fn update_issue(&mut self, issue: &Issue) -> Result<(), ExamError> {
        sqlx::query(
            r#"
            UPDATE exam_issues SET
                status = $2,
                started_at = $3,
                submitted_at = $4,
                invalidated_at = $5,
                invalid_reason = $6,
                chosen_variants = $7
            WHERE id = $1
            "#,
        )
        .bind(issue.id)
        .bind(issue.status.as_str())
        .bind(issue.started_at)
        .bind(issue.submitted_at)
        .bind(issue.invalidated_at)
        .bind(&issue.invalid_reason)
        .bind(issue.chosen_variants.as_ref().map(Json))
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_away_log(&mut self, log: &NewAwayLog) -> Result<AwayLog, ExamError> {
        let row = sqlx::query_as::<_, AwayLog>(&format!(
            r#"
            INSERT INTO exam_away_logs (issue_id, started_at, ended_at, duration_ms, reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {AWAY_COLUMNS}
            "#
        ))
        .bind(log.issue_id)
        .bind(log.started_at)
        .bind(log.ended_at)
        .bind(log.duration_ms)
        .bind(&log.reason)
        .bind(log.created_at)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row)
    }

    async fn away_durations(&mut self, issue_id: i64) -> Result<Vec<i64>, ExamError> {
        let durations = sqlx::query_scalar::<_, i64>(
            "SELECT duration_ms FROM exam_away_logs WHERE issue_id = $1 ORDER BY id ASC",
        )
        .bind(issue_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(durations)
    }

    async fn insert_attempt(&mut self, attempt: &NewAttempt) -> Result<Attempt, ExamError> {
        let row = sqlx::query_as::<_, Attempt>(&format!(
            r#"
            INSERT INTO exam_attempts (issue_id, answers, score, total_points, passed, duration_sec, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ATTEMPT_COLUMNS}
            "#
        ))
        .bind(attempt.issue_id)
        .bind(Json(&attempt.answers))
        .bind(attempt.score)
        .bind(attempt.total_points)
        .bind(attempt.passed)
        .bind(attempt.duration_sec)
        .bind(attempt.created_at)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row)
    }

    async fn commit(self: Box<Self>) -> Result<(), ExamError> {
        self.tx.commit().await?;
        Ok(())
    }
}
