//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the course endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::auth::{AuthResponse, LoginRequest, SignupRequest};
use crate::web::protocol::{read_submission, rejection, Rejection, SubmissionResponse};
use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use course_builder_core::quota::TRIAL_LIMIT;
use course_builder_core::{Author, Course, CourseCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        submit_course_handler,
        get_course_handler,
        quota_handler,
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
    ),
    components(
        schemas(SubmissionResponse, QuotaResponse, SignupRequest, LoginRequest, AuthResponse)
    ),
    tags(
        (name = "Course Builder API", description = "Course authoring submission endpoints.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The author's trial quota usage.
#[derive(Serialize, ToSchema)]
pub struct QuotaResponse {
    pub used: u32,
    pub limit: u32,
    pub entitled: bool,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Submit a finished course.
///
/// Accepts a multipart/form-data request with a `course` JSON part, a
/// `thumbnail` part and one `lecture_file.<id>` / `activity_file.<id>` part per
/// file leaf, each stream in traversal order.
#[utoipa::path(
    post,
    path = "/courses",
    request_body(content_type = "multipart/form-data", description = "The course document and its files."),
    responses(
        (status = 201, description = "Course created", body = SubmissionResponse),
        (status = 400, description = "The submission is incomplete or malformed", body = SubmissionResponse),
        (status = 402, description = "Trial quota exhausted", body = SubmissionResponse),
        (status = 409, description = "The course code is taken or the submission was already accepted", body = SubmissionResponse),
        (status = 502, description = "A file could not be stored", body = SubmissionResponse),
        (status = 500, description = "Internal server error", body = SubmissionResponse)
    )
)]
pub async fn submit_course_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(author): Extension<Author>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, Rejection> {
    let submission = read_submission(&mut multipart).await?;
    let submission_id = submission.submission_id;

    match app_state.pipeline.submit(&author, submission).await {
        Ok(course) => {
            info!(%submission_id, course_id = %course.id, "Course submission accepted");
            let response = SubmissionResponse::Success {
                reference: course.id,
                code: course.code.to_string(),
            };
            Ok((StatusCode::CREATED, Json(response)))
        }
        Err(e) => {
            warn!(%submission_id, kind = ?e.kind(), "Course submission rejected: {}", e);
            Err(rejection(&e))
        }
    }
}

/// Fetch a persisted course by its code.
#[utoipa::path(
    get,
    path = "/courses/{code}",
    params(("code" = String, Path, description = "The course code.")),
    responses(
        (status = 200, description = "The persisted course", content_type = "application/json"),
        (status = 400, description = "Malformed course code"),
        (status = 404, description = "No course has this code")
    )
)]
pub async fn get_course_handler(
    State(app_state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<Course>, (StatusCode, String)> {
    let code = CourseCode::parse(&code).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    match app_state.courses.find_by_code(&code).await {
        Ok(Some(course)) => Ok(Json(course)),
        Ok(None) => Err((StatusCode::NOT_FOUND, format!("No course with code {}", code))),
        Err(e) => {
            error!("Failed to load course {}: {:?}", code, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load course".to_string(),
            ))
        }
    }
}

/// Report the acting author's trial quota.
#[utoipa::path(
    get,
    path = "/quota",
    responses(
        (status = 200, description = "Quota usage", body = QuotaResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn quota_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(author): Extension<Author>,
) -> Result<Json<QuotaResponse>, (StatusCode, String)> {
    let used = app_state.quota.charged_count(author.id).await.map_err(|e| {
        error!("Failed to read quota for {}: {:?}", author.id, e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to read quota".to_string(),
        )
    })?;
    Ok(Json(QuotaResponse {
        used,
        limit: TRIAL_LIMIT,
        entitled: author.entitled,
    }))
}
