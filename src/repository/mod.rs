// src/repository/mod.rs

//! Storage seam for exam state.
//!
//! Every mutation goes through an [`IssueTx`]: lock the issue, decide, write,
//! commit. Dropping a transaction without committing discards all of its writes.

use async_trait::async_trait;

use crate::{
    error::ExamError,
    models::{
        attempt::{Attempt, NewAttempt},
        away_log::{AwayLog, NewAwayLog},
        issue::{Issue, NewIssue},
    },
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryExamStore;
pub use postgres::PgExamStore;

#[async_trait]
pub trait ExamStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn IssueTx>, ExamError>;

    /// Unlocked read, for paths that do not mutate.
    async fn find_issue(&self, token: &str) -> Result<Option<Issue>, ExamError>;

    async fn list_away_logs(&self, issue_id: i64) -> Result<Vec<AwayLog>, ExamError>;

    async fn find_attempt(&self, issue_id: i64) -> Result<Option<Attempt>, ExamError>;

    async fn ping(&self) -> Result<(), ExamError>;
}

#[async_trait]
pub trait IssueTx: Send {
    async fn insert_issue(&mut self, issue: &NewIssue) -> Result<Issue, ExamError>;

    /// Loads the issue and holds an exclusive lock on it until commit or drop.
    async fn lock_issue(&mut self, token: &str) -> Result<Option<Issue>, ExamError>;

    /// Writes back every mutable column of the issue.
    async fn update_issue(&mut self, issue: &Issue) -> Result<(), ExamError>;

    async fn insert_away_log(&mut self, log: &NewAwayLog) -> Result<AwayLog, ExamError>;

    /// Durations of all away segments for the issue, in creation order.
    async fn away_durations(&mut self, issue_id: i64) -> Result<Vec<i64>, ExamError>;

    async fn insert_attempt(&mut self, attempt: &NewAttempt) -> Result<Attempt, ExamError>;

    async fn commit(self: Box<Self>) -> Result<(), ExamError>;
}
