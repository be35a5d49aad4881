// src/repository/memory.rs

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::types::Json;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    error::ExamError,
    models::{
        attempt::{Attempt, NewAttempt},
        away_log::{AwayLog, NewAwayLog},
        issue::{Issue, IssueStatus, NewIssue},
    },
    repository::{ExamStore, IssueTx},
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    issues: Vec<Issue>,
    away_logs: Vec<AwayLog>,
    attempts: Vec<Attempt>,
}

/// Process-local store used when no database is configured, and by tests.
///
/// A transaction holds the whole store's lock and works on a staged copy,
/// which replaces the shared state only on commit.
#[derive(Clone, Default)]
pub struct MemoryExamStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryExamStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExamStore for MemoryExamStore {
    async fn begin(&self) -> Result<Box<dyn IssueTx>, ExamError> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryIssueTx { guard, staged }))
    }

    async fn find_issue(&self, token: &str) -> Result<Option<Issue>, ExamError> {
        let state = self.state.lock().await;
        Ok(state.issues.iter().find(|i| i.token == token).cloned())
    }

    async fn list_away_logs(&self, issue_id: i64) -> Result<Vec<AwayLog>, ExamError> {
        let state = self.state.lock().await;
        Ok(state
            .away_logs
            .iter()
            .filter(|log| log.issue_id == issue_id)
            .cloned()
            .collect())
    }

    async fn find_attempt(&self, issue_id: i64) -> Result<Option<Attempt>, ExamError> {
        let state = self.state.lock().await;
        Ok(state.attempts.iter().find(|a| a.issue_id == issue_id).cloned())
    }

    async fn ping(&self) -> Result<(), ExamError> {
        Ok(())
    }
}

pub struct MemoryIssueTx {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl IssueTx for MemoryIssueTx {
    async fn insert_issue(&mut self, issue: &NewIssue) -> Result<Issue, ExamError> {
        if self.staged.issues.iter().any(|i| i.token == issue.token) {
            return Err(ExamError::Storage("duplicate issue token".to_string()));
        }
        let issue = Issue {
            id: self.staged.issues.len() as i64 + 1,
            token: issue.token.clone(),
            email: issue.email.clone(),
            level: issue.level.clone(),
            status: IssueStatus::Issued,
            expires_at: issue.expires_at,
            started_at: None,
            submitted_at: None,
            invalidated_at: None,
            invalid_reason: None,
            chosen_variants: None,
            created_at: issue.created_at,
        };
        self.staged.issues.push(issue.clone());
        Ok(issue)
    }

    async fn lock_issue(&mut self, token: &str) -> Result<Option<Issue>, ExamError> {
        Ok(self.staged.issues.iter().find(|i| i.token == token).cloned())
    }

    async fn update_issue(&mut self, issue: &Issue) -> Result<(), ExamError> {
        let slot = self
            .staged
            .issues
            .iter_mut()
            .find(|i| i.id == issue.id)
            .ok_or_else(|| ExamError::Storage(format!("issue {} vanished", issue.id)))?;
        *slot = issue.clone();
        Ok(())
    }

    async fn insert_away_log(&mut self, log: &NewAwayLog) -> Result<AwayLog, ExamError> {
        let row = AwayLog {
            id: self.staged.away_logs.len() as i64 + 1,
            issue_id: log.issue_id,
            started_at: log.started_at,
            ended_at: log.ended_at,
            duration_ms: log.duration_ms,
            reason: log.reason.clone(),
            created_at: log.created_at,
        };
        self.staged.away_logs.push(row.clone());
        Ok(row)
    }

    async fn away_durations(&mut self, issue_id: i64) -> Result<Vec<i64>, ExamError> {
        Ok(self
            .staged
            .away_logs
            .iter()
            .filter(|log| log.issue_id == issue_id)
            .map(|log| log.duration_ms)
            .collect())
    }

    async fn insert_attempt(&mut self, attempt: &NewAttempt) -> Result<Attempt, ExamError> {
        if self.staged.attempts.iter().any(|a| a.issue_id == attempt.issue_id) {
            return Err(ExamError::Storage("attempt already recorded".to_string()));
        }
        let row = Attempt {
            id: self.staged.attempts.len() as i64 + 1,
            issue_id: attempt.issue_id,
            answers: Json(attempt.answers.clone()),
            score: attempt.score,
            total_points: attempt.total_points,
            passed: attempt.passed,
            duration_sec: attempt.duration_sec,
            created_at: attempt.created_at,
        };
        self.staged.attempts.push(row.clone());
        Ok(row)
    }

    async fn commit(self: Box<Self>) -> Result<(), ExamError> {
        let MemoryIssueTx { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}
