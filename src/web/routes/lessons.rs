use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    model::{
        CrudRepository, ResourceTyped, can_view_course, check_manage,
        entity::{Course, Lesson, LessonCreate, LessonVideo},
    },
    storage::{Disk, TEMP_VIDEO_PREFIX, is_temp_path},
    utils::slug::{is_valid_slug, slugify},
    web::{
        AppState, AuthenticatedUser, ErrorResponse, RequestContext, WebError, WebResult,
        dto::lessons::{LessonBody, LessonResponse},
        middlewares,
    },
};

/// Lesson creation lives under `/api/v1/courses/`.
pub fn course_routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/{id}/lessons", post(lessons_create_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route(
            "/{id}",
            get(lessons_get_handler)
                .put(lessons_update_handler)
                .delete(lessons_delete_handler),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

/// What a create or update request does to the lesson video.
#[derive(Debug, PartialEq)]
enum VideoChange {
    Keep,
    Replace(LessonVideo),
}

impl VideoChange {
    fn apply(self, current: LessonVideo) -> LessonVideo {
        match self {
            Self::Keep => current,
            Self::Replace(video) => video,
        }
    }
}

/// Rejects inconsistent video fields before anything is written.
async fn check_video_fields(state: &AppState, body: &LessonBody) -> WebResult<()> {
    if body.video_url.is_some() && body.temp_video_path.is_some() {
        return Err(WebError::validation(
            "video_url",
            "video_url and temp_video_path are mutually exclusive",
        ));
    }

    if let Some(path) = &body.temp_video_path {
        if !is_temp_path(TEMP_VIDEO_PREFIX, path) || !state.storage().is_file(Disk::Local, path).await {
            return Err(WebError::validation(
                "temp_video_path",
                "temp_video_path does not point at an uploaded video",
            ));
        }
    }

    Ok(())
}

/// Turns the request's video fields into a change, transcoding uploads on the way.
///
/// A failed transcode keeps whatever video the lesson had (none for a new lesson).
async fn resolve_video(state: &AppState, body: &LessonBody, slug: &str) -> VideoChange {
    if let Some(path) = &body.temp_video_path {
        return match state.transcoder().transcode(path, slug).await {
            Some(master) => VideoChange::Replace(LessonVideo::ProcessedAsset {
                disk: Disk::Secure,
                path: master,
            }),
            None => {
                tracing::warn!(%slug, "lesson saved without the uploaded video");
                VideoChange::Keep
            }
        };
    }

    if let Some(url) = &body.video_url {
        return VideoChange::Replace(LessonVideo::ExternalUrl { url: url.clone() });
    }

    if body.remove_video {
        return VideoChange::Replace(LessonVideo::None);
    }

    VideoChange::Keep
}

async fn check_slug(
    state: &AppState,
    user: &AuthenticatedUser,
    slug: &str,
    except: Option<Uuid>,
) -> WebResult<()> {
    if !is_valid_slug(slug) {
        return Err(WebError::validation(
            "slug",
            "slug must be lowercase letters, digits and dashes",
        ));
    }

    let taken = Lesson::slug_taken(state.pool(), user, slug, except)
        .await
        .map_err(|e| WebError::resource_fetch_error(Lesson::get_resource_type(), e))?;
    if taken {
        return Err(WebError::resource_conflict(Lesson::get_resource_type()));
    }
    Ok(())
}

/// Drops an export that was produced for a record that never got saved.
async fn discard_new_export(state: &AppState, video: &LessonVideo) {
    if let Some((disk, path)) = video.processed() {
        state.storage().delete_video_export(disk, path).await;
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/courses/{id}/lessons",
    request_body = LessonBody,
    description = "Adds a lesson to the course. A `temp_video_path` is transcoded into an \
                   encrypted HLS export before the lesson is saved",
    params(
        ("id" = Uuid, Path, description = "ID of the course")
    ),
    responses(
        (status = 201, description = "Lesson created", body = LessonResponse),
        (status = 401, description = "You're not authorized", body = ErrorResponse),
        (status = 403, description = "You don't own this course", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 409, description = "Slug is taken", body = ErrorResponse),
        (status = 422, description = "Invalid lesson fields", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "lessons"
)]
async fn lessons_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Json(payload): Json<LessonBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let course = Course::find_by_id(state.pool(), user, course_id)
        .await
        .map_err(|e| WebError::resource_fetch_error(Course::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(Course::get_resource_type()))?;

    check_manage(state.pool(), user, &course)
        .await
        .map_err(|e| WebError::from_database(Course::get_resource_type(), e))?;

    payload.validate()?;
    let slug = payload.slug.clone().unwrap_or_else(|| slugify(&payload.title));
    check_slug(&state, user, &slug, None).await?;
    check_video_fields(&state, &payload).await?;

    let order_index = match payload.order_index {
        Some(index) => index,
        None => Lesson::next_order_index(state.pool(), user, course.id())
            .await
            .map_err(|e| WebError::resource_fetch_error(Lesson::get_resource_type(), e))?,
    };

    let video = resolve_video(&state, &payload, &slug)
        .await
        .apply(LessonVideo::None);

    let data = LessonCreate {
        course_id: course.id(),
        title: payload.title,
        slug,
        content: payload.content,
        order_index,
        video: video.clone(),
    };

    let lesson = match Lesson::create(state.pool(), user, data).await {
        Ok(lesson) => lesson,
        Err(e) => {
            discard_new_export(&state, &video).await;
            return Err(WebError::from_database(Lesson::get_resource_type(), e));
        }
    };

    tracing::info!(lesson_id = %lesson.id(), course_id = %course.id(), "lesson created");
    Ok((StatusCode::CREATED, Json(LessonResponse::from(&lesson))))
}

#[utoipa::path(
    get,
    path = "/api/v1/lessons/{id}",
    description = "Fetch a lesson with its content and video",
    params(
        ("id" = Uuid, Path, description = "ID of the lesson")
    ),
    responses(
        (status = 200, description = "Lesson found", body = LessonResponse),
        (status = 401, description = "You're not authorized", body = ErrorResponse),
        (status = 403, description = "You're not enrolled in this course", body = ErrorResponse),
        (status = 404, description = "Lesson not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "lessons"
)]
async fn lessons_get_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let lesson = find_viewable_lesson(&state, user, id).await?;

    Ok((StatusCode::OK, Json(LessonResponse::from(&lesson))))
}

/// Loads a lesson the caller may watch: admin, the course's instructor or an enrolled student.
pub(super) async fn find_viewable_lesson(
    state: &AppState,
    user: &AuthenticatedUser,
    id: Uuid,
) -> WebResult<Lesson> {
    let lesson = Lesson::find_by_id(state.pool(), user, id)
        .await
        .map_err(|e| WebError::resource_fetch_error(Lesson::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(Lesson::get_resource_type()))?;

    let course = Course::find_by_id(state.pool(), user, lesson.course_id())
        .await
        .map_err(|e| WebError::resource_fetch_error(Course::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(Course::get_resource_type()))?;

    let allowed = can_view_course(state.pool(), user, &course)
        .await
        .map_err(|e| WebError::resource_fetch_error(Course::get_resource_type(), e))?;
    if !allowed {
        return Err(WebError::resource_forbidden(Lesson::get_resource_type()));
    }

    Ok(lesson)
}

#[utoipa::path(
    put,
    path = "/api/v1/lessons/{id}",
    request_body = LessonBody,
    description = "Updates a lesson. A replaced processed video is deleted once the new \
                   record is saved; a failed transcode keeps the current video",
    params(
        ("id" = Uuid, Path, description = "ID of the lesson")
    ),
    responses(
        (status = 200, description = "Lesson updated", body = LessonResponse),
        (status = 401, description = "You're not authorized", body = ErrorResponse),
        (status = 403, description = "You don't own this course", body = ErrorResponse),
        (status = 404, description = "Lesson not found", body = ErrorResponse),
        (status = 409, description = "Slug is taken", body = ErrorResponse),
        (status = 422, description = "Invalid lesson fields", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "lessons"
)]
async fn lessons_update_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<LessonBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let lesson = Lesson::find_by_id(state.pool(), user, id)
        .await
        .map_err(|e| WebError::resource_fetch_error(Lesson::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(Lesson::get_resource_type()))?;

    check_manage(state.pool(), user, &lesson)
        .await
        .map_err(|e| WebError::from_database(Lesson::get_resource_type(), e))?;

    payload.validate()?;
    let slug = payload
        .slug
        .clone()
        .unwrap_or_else(|| lesson.slug().to_string());
    check_slug(&state, user, &slug, Some(lesson.id())).await?;
    check_video_fields(&state, &payload).await?;

    let previous = lesson.video().clone();
    let video = resolve_video(&state, &payload, &slug)
        .await
        .apply(previous.clone());

    let mut data = LessonCreate::from_lesson(&lesson);
    data.title = payload.title;
    data.slug = slug;
    data.content = payload.content;
    if let Some(index) = payload.order_index {
        data.order_index = index;
    }
    data.video = video.clone();

    let updated = match lesson.update(state.pool(), user, data).await {
        Ok(updated) => updated,
        Err(e) => {
            if video != previous {
                discard_new_export(&state, &video).await;
            }
            return Err(WebError::from_database(Lesson::get_resource_type(), e));
        }
    };

    if video != previous {
        if let Some((disk, path)) = previous.processed() {
            state.storage().delete_video_export(disk, path).await;
        }
    }

    tracing::info!(lesson_id = %updated.id(), "lesson updated");
    Ok((StatusCode::OK, Json(LessonResponse::from(&updated))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/lessons/{id}",
    description = "Deletes the lesson, its quizzes and its processed video directory",
    params(
        ("id" = Uuid, Path, description = "ID of the lesson")
    ),
    responses(
        (status = 200, description = "Lesson deleted"),
        (status = 401, description = "You're not authorized", body = ErrorResponse),
        (status = 403, description = "You don't own this course", body = ErrorResponse),
        (status = 404, description = "Lesson not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "lessons"
)]
async fn lessons_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let lesson = Lesson::find_by_id(state.pool(), user, id)
        .await
        .map_err(|e| WebError::resource_fetch_error(Lesson::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(Lesson::get_resource_type()))?;

    check_manage(state.pool(), user, &lesson)
        .await
        .map_err(|e| WebError::from_database(Lesson::get_resource_type(), e))?;

    let video = lesson.video().clone();
    lesson
        .delete(state.pool(), user)
        .await
        .map_err(|e| WebError::resource_fetch_error(Lesson::get_resource_type(), e))?;

    if let Some((disk, path)) = video.processed() {
        state.storage().delete_video_directory(disk, path).await;
    }

    tracing::info!(lesson_id = %id, "lesson deleted");
    Ok(StatusCode::OK)
}
