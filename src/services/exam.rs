// src/services/exam.rs

//! Exam issue lifecycle: issuance, lazy expiry, start, paper delivery,
//! absence reporting and submission.
//!
//! All session state lives in the store, so any instance can serve any
//! request. Mutations run as one transaction over the issue's locked row.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::{
    config::Config,
    error::ExamError,
    models::{
        attempt::{Attempt, NewAttempt, SubmitExamResponse, SubmittedAnswer},
        away_log::{AwayLog, AwayResponse},
        issue::{ExamMeta, Issue, IssueExamResponse, IssueStatus, NewIssue, StartResponse},
        question::PaperResponse,
    },
    repository::{ExamStore, IssueTx},
    services::{
        answer_key::build_answer_key,
        integrity::{AwaySegment, record_away_segment},
        question_bank::QuestionBank,
        scoring::{PassPolicy, score_answers},
        variants::{select_or_load_variants, strip_answers},
    },
    utils::token::generate_token,
};

/// Settings the lifecycle needs, lifted out of [`Config`].
#[derive(Debug, Clone)]
pub struct ExamSettings {
    pub duration_sec: i64,
    pub pass_policy: PassPolicy,
    pub title: String,
}

impl From<&Config> for ExamSettings {
    fn from(config: &Config) -> Self {
        Self {
            duration_sec: config.exam_duration_sec,
            pass_policy: PassPolicy {
                threshold: config.pass_score,
                rate: config.pass_rate,
            },
            title: config.exam_title.clone(),
        }
    }
}

/// Full record of one issue, for the admin audit view.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueAudit {
    pub issue: Issue,
    pub away_logs: Vec<AwayLog>,
    pub attempt: Option<Attempt>,
}

#[derive(Clone)]
pub struct ExamService {
    store: Arc<dyn ExamStore>,
    bank: Arc<QuestionBank>,
    settings: ExamSettings,
}

impl ExamService {
    pub fn new(store: Arc<dyn ExamStore>, bank: Arc<QuestionBank>, settings: ExamSettings) -> Self {
        Self {
            store,
            bank,
            settings,
        }
    }

    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    pub async fn ping(&self) -> Result<(), ExamError> {
        self.store.ping().await
    }

    async fn lock(tx: &mut dyn IssueTx, token: &str) -> Result<Issue, ExamError> {
        tx.lock_issue(token).await?.ok_or(ExamError::NotFound)
    }

    /// Creates a new issue. `url_for` turns the token into the candidate link.
    pub async fn issue(
        &self,
        email: &str,
        hours: f64,
        level: Option<String>,
        now: DateTime<Utc>,
        url_for: impl Fn(&str) -> String,
    ) -> Result<IssueExamResponse, ExamError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ExamError::Validation("email is required".to_string()));
        }
        if !hours.is_finite() || hours <= 0.0 {
            return Err(ExamError::Validation("hours must be a positive number".to_string()));
        }

        let expires_at = now + Duration::milliseconds((hours * 3_600_000.0).round() as i64);
        let level = level.map(|l| l.trim().to_string()).filter(|l| !l.is_empty());

        let mut tx = self.store.begin().await?;
        let issue = tx
            .insert_issue(&NewIssue {
                token: generate_token(),
                email: email.to_string(),
                level,
                expires_at,
                created_at: now,
            })
            .await?;
        tx.commit().await?;

        tracing::info!(issue_id = issue.id, expires_at = %issue.expires_at, "Exam issued");

        Ok(IssueExamResponse {
            url: url_for(&issue.token),
            token: issue.token,
            expires_at: issue.expires_at,
        })
    }

    /// Side-effecting read: returns the issue, first moving it to `expired`
    /// (and persisting that) when its deadline has passed.
    pub async fn load_with_lazy_expiry(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Issue, ExamError> {
        let issue = self.store.find_issue(token).await?.ok_or(ExamError::NotFound)?;
        if !issue.is_due_for_expiry(now) {
            return Ok(issue);
        }

        let mut tx = self.store.begin().await?;
        let mut issue = Self::lock(tx.as_mut(), token).await?;
        if issue.expire_if_due(now) {
            tx.update_issue(&issue).await?;
            tx.commit().await?;
            tracing::info!(issue_id = issue.id, "Exam expired past deadline");
        }
        Ok(issue)
    }

    pub async fn meta(&self, token: &str, now: DateTime<Utc>) -> Result<ExamMeta, ExamError> {
        let issue = self.load_with_lazy_expiry(token, now).await?;
        let duration_sec = self.settings.duration_sec;

        Ok(ExamMeta {
            status: issue.status,
            duration_sec,
            started_at: issue.started_at,
            expires_at: issue.expires_at,
            remaining_sec: issue.remaining_sec(now, duration_sec),
            server_now: now,
            invalidated: issue.is_invalidated(),
            invalid_reason: issue.invalid_reason,
        })
    }

    pub async fn start(&self, token: &str, now: DateTime<Utc>) -> Result<StartResponse, ExamError> {
        let mut tx = self.store.begin().await?;
        let mut issue = Self::lock(tx.as_mut(), token).await?;

        if issue.expire_if_due(now) {
            tx.update_issue(&issue).await?;
            tx.commit().await?;
            return Err(ExamError::Expired);
        }

        issue.start(now)?;
        tx.update_issue(&issue).await?;
        tx.commit().await?;

        tracing::info!(issue_id = issue.id, "Exam started");

        Ok(StartResponse {
            started_at: now,
            duration_sec: self.settings.duration_sec,
        })
    }

    /// Candidate paper with answers stripped. Assigns variants on first fetch.
    pub async fn questions(&self, token: &str, now: DateTime<Utc>) -> Result<PaperResponse, ExamError> {
        let issue = self.load_with_lazy_expiry(token, now).await?;
        if issue.status == IssueStatus::Expired {
            return Err(ExamError::Expired);
        }
        if self.bank.is_empty() {
            return Err(ExamError::NoQuestions);
        }

        let chosen = match issue.chosen_variants {
            Some(chosen) => chosen,
            None => {
                let mut tx = self.store.begin().await?;
                let mut issue = Self::lock(tx.as_mut(), token).await?;
                let chosen =
                    select_or_load_variants(tx.as_mut(), &mut issue, &self.bank.sections).await?;
                tx.commit().await?;
                chosen
            }
        };

        let paper = self.bank.paper_for(&chosen);
        Ok(PaperResponse {
            title: self
                .bank
                .title
                .clone()
                .unwrap_or_else(|| self.settings.title.clone()),
            duration_sec: self.settings.duration_sec,
            questions: strip_answers(&paper),
        })
    }

    pub async fn record_away(
        &self,
        token: &str,
        segment: AwaySegment,
        now: DateTime<Utc>,
    ) -> Result<AwayResponse, ExamError> {
        let mut tx = self.store.begin().await?;
        let mut issue = Self::lock(tx.as_mut(), token).await?;

        let invalidated = record_away_segment(tx.as_mut(), &mut issue, segment, now).await?;
        tx.commit().await?;

        Ok(AwayResponse {
            ok: true,
            invalidated,
        })
    }

    pub async fn submit(
        &self,
        token: &str,
        answers: Vec<SubmittedAnswer>,
        now: DateTime<Utc>,
    ) -> Result<SubmitExamResponse, ExamError> {
        if self.bank.is_empty() {
            return Err(ExamError::NoQuestions);
        }

        let mut tx = self.store.begin().await?;
        let mut issue = Self::lock(tx.as_mut(), token).await?;

        let elapsed_sec = match issue.begin_submission(now, self.settings.duration_sec) {
            Ok(elapsed) => elapsed,
            Err(ExamError::TimeOver) => {
                tx.update_issue(&issue).await?;
                tx.commit().await?;
                tracing::info!(issue_id = issue.id, "Submission rejected, time over");
                return Err(ExamError::TimeOver);
            }
            Err(e) => return Err(e),
        };

        let chosen = select_or_load_variants(tx.as_mut(), &mut issue, &self.bank.sections).await?;
        let key = build_answer_key(&self.bank.paper_for(&chosen));
        let score = score_answers(&answers, &key);
        let total_points = key.total_points();
        let passed = self.settings.pass_policy.passed(score, total_points);

        let attempt = tx
            .insert_attempt(&NewAttempt {
                issue_id: issue.id,
                answers,
                score: stored_points(score)?,
                total_points: stored_points(total_points)?,
                passed,
                duration_sec: elapsed_sec,
                created_at: now,
            })
            .await?;

        issue.complete_submission(now);
        tx.update_issue(&issue).await?;
        tx.commit().await?;

        tracing::info!(
            issue_id = issue.id,
            attempt_id = attempt.id,
            score,
            total_points,
            passed,
            "Exam submitted"
        );

        Ok(SubmitExamResponse {
            attempt_id: attempt.id,
            submitted_at: now,
            elapsed_sec,
            score: attempt.score,
            total_points: attempt.total_points,
            passed,
        })
    }

    pub async fn audit(&self, token: &str) -> Result<IssueAudit, ExamError> {
        let issue = self.store.find_issue(token).await?.ok_or(ExamError::NotFound)?;
        let away_logs = self.store.list_away_logs(issue.id).await?;
        let attempt = self.store.find_attempt(issue.id).await?;

        Ok(IssueAudit {
            issue,
            away_logs,
            attempt,
        })
    }
}

/// Point sums are stored as BIGINT.
fn stored_points(points: u64) -> Result<i64, ExamError> {
    i64::try_from(points)
        .map_err(|_| ExamError::Storage(format!("point total {} exceeds storage range", points)))
}
