// src/handlers/exam.rs

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    response::IntoResponse,
};
use chrono::Utc;

use crate::{
    error::AppError,
    models::{attempt::SubmitExamRequest, away_log::AwayRequest},
    services::{exam::ExamService, integrity::AwaySegment},
};

/// Status and clock for the candidate page. Safe to poll.
///
/// Expires the issue as a side effect once its deadline has passed.
pub async fn get_meta(
    State(exam): State<ExamService>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let meta = exam.meta(&token, Utc::now()).await?;
    Ok(Json(meta))
}

/// Starts the exam clock. Single use.
pub async fn start_exam(
    State(exam): State<ExamService>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let started = exam.start(&token, Utc::now()).await?;
    Ok(Json(started))
}

/// Candidate paper, answers stripped.
pub async fn get_questions(
    State(exam): State<ExamService>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let paper = exam
        .questions(&token, Utc::now())
        .await
        .map_err(AppError::gone_if_expired)?;
    Ok(Json(paper))
}

/// Records one completed absence segment.
pub async fn record_away(
    State(exam): State<ExamService>,
    Path(token): Path<String>,
    payload: Result<Json<AwayRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let segment = AwaySegment::try_from(payload)?;

    let outcome = exam.record_away(&token, segment, Utc::now()).await?;
    Ok(Json(outcome))
}

/// Scores and finalizes the exam.
pub async fn submit_exam(
    State(exam): State<ExamService>,
    Path(token): Path<String>,
    payload: Result<Json<SubmitExamRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;

    let result = exam.submit(&token, payload.answers, Utc::now()).await?;
    Ok(Json(result))
}
