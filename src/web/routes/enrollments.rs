use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    model::{
        CrudRepository, ResourceTyped,
        entity::{Course, Enrollment},
    },
    web::{
        AppState, ErrorResponse, RequestContext, WebError, WebResult, dto::enrollments::ProgressBody,
        middlewares,
    },
};

/// Enrollment actions live under `/api/v1/courses/`.
pub fn course_routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/{id}/enroll", post(enrollments_enroll_handler))
        .route("/{id}/progress", put(enrollments_progress_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/", get(enrollments_list_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

#[utoipa::path(
    post,
    path = "/api/v1/courses/{id}/enroll",
    description = "Enrolls the caller into a published course. Enrolling twice is harmless",
    params(
        ("id" = Uuid, Path, description = "ID of the course")
    ),
    responses(
        (status = 201, description = "Enrolled", body = Enrollment),
        (status = 401, description = "You're not authorized", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "enrollments"
)]
async fn enrollments_enroll_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let course = Course::find_by_id(state.pool(), user, id)
        .await
        .map_err(|e| WebError::resource_fetch_error(Course::get_resource_type(), e))?
        .filter(|c| c.is_published() || c.instructor_id() == user.user_id() || user.is_admin())
        .ok_or_else(|| WebError::resource_not_found(Course::get_resource_type()))?;

    let enrollment = Enrollment::enroll(state.pool(), user, user.user_id(), course.id())
        .await
        .map_err(|e| WebError::resource_fetch_error(Enrollment::get_resource_type(), e))?;

    tracing::info!(user_id = %user.user_id(), course_id = %course.id(), "enrolled");
    Ok((StatusCode::CREATED, Json(enrollment)))
}

#[utoipa::path(
    put,
    path = "/api/v1/courses/{id}/progress",
    request_body = ProgressBody,
    description = "Records the caller's progress; 100 marks the course completed",
    params(
        ("id" = Uuid, Path, description = "ID of the course")
    ),
    responses(
        (status = 200, description = "Progress saved", body = Enrollment),
        (status = 401, description = "You're not authorized", body = ErrorResponse),
        (status = 404, description = "You're not enrolled in this course", body = ErrorResponse),
        (status = 422, description = "Progress out of range", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "enrollments"
)]
async fn enrollments_progress_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProgressBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    payload.validate()?;

    let enrollment = Enrollment::find(state.pool(), user, user.user_id(), id)
        .await
        .map_err(|e| WebError::resource_fetch_error(Enrollment::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(Enrollment::get_resource_type()))?;

    let updated = enrollment
        .update_progress(state.pool(), user, payload.progress)
        .await
        .map_err(|e| WebError::resource_fetch_error(Enrollment::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(updated)))
}

#[utoipa::path(
    get,
    path = "/api/v1/enrollments/",
    description = "The caller's enrollments, most recent first",
    responses(
        (status = 200, description = "Enrollments", body = Vec<Enrollment>),
        (status = 401, description = "You're not authorized", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "enrollments"
)]
async fn enrollments_list_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let enrollments = Enrollment::list_by_user(state.pool(), user, user.user_id())
        .await
        .map_err(|e| WebError::resource_fetch_error(Enrollment::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(enrollments)))
}
