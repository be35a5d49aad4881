// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, exam, health},
    state::AppState,
    utils::admin::{ADMIN_SECRET_HEADER, admin_middleware},
};

/// Request bodies are small JSON documents.
const BODY_LIMIT_BYTES: usize = 20 * 1024;

/// Assembles the main application router.
///
/// * Merges the exam, admin and health routes.
/// * Applies global middleware (Trace, CORS, body limit).
/// * Injects global state (exam service and configuration).
pub fn create_router(state: AppState) -> Router {
    let origin = state.config.public_base_url.origin().ascii_serialization();
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(ADMIN_SECRET_HEADER),
        ]);
    match HeaderValue::from_str(&origin) {
        Ok(value) => cors = cors.allow_origin(value),
        Err(_) => tracing::warn!(origin = %origin, "Public base URL has no usable origin, CORS disabled"),
    }

    let exam_routes = Router::new()
        .route("/{token}/meta", get(exam::get_meta))
        .route("/{token}/start", post(exam::start_exam))
        .route("/{token}/questions", get(exam::get_questions))
        .route("/{token}/away", post(exam::record_away))
        .route("/{token}/submit", post(exam::submit_exam));

    let admin_routes = Router::new()
        .route("/issue", post(admin::issue_exam))
        .route("/issues/{token}", get(admin::get_issue))
        .layer(middleware::from_fn_with_state(state.clone(), admin_middleware));

    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/version", get(health::version))
        .nest("/exam", exam_routes)
        .nest("/admin", admin_routes)
        .fallback(health::not_found)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        // Global Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
