// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    config::Config, error::AppError, models::issue::IssueExamRequest,
    services::exam::ExamService,
};

/// Issues a single-use exam link.
/// Admin only.
pub async fn issue_exam(
    State(exam): State<ExamService>,
    State(config): State<Config>,
    payload: Result<Json<IssueExamRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;

    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let issued = exam
        .issue(
            &payload.email,
            payload.hours,
            payload.level,
            Utc::now(),
            |token| config.exam_url(token),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(issued)))
}

/// Returns one issue with its away log and attempt.
/// Admin only.
pub async fn get_issue(
    State(exam): State<ExamService>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let audit = exam.audit(&token).await?;
    Ok(Json(audit))
}
