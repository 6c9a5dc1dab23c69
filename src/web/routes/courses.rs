use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::get,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    model::{
        CrudRepository, PaginatableRepository, ResourceTyped, can_view_course, check_manage,
        entity::{Category, Course, CourseCreate, Lesson},
    },
    utils::slug::{is_valid_slug, slugify},
    web::{
        AppState, AuthenticatedUser, ErrorResponse, RequestContext, WebError, WebResult,
        dto::{
            courses::{CourseCreateBody, CourseDetailResponse},
            lessons::LessonResponse,
        },
        middlewares,
        routes::PaginationQuery,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/", get(courses_page_handler).post(courses_create_handler))
        .route(
            "/{id}",
            get(courses_get_handler).delete(courses_delete_handler),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

#[utoipa::path(
    post,
    path = "/api/v1/courses/",
    request_body = CourseCreateBody,
    description = "Creates a course owned by the caller",
    responses(
        (status = 201, description = "Course created", body = Course),
        (status = 401, description = "You're not authorized", body = ErrorResponse),
        (status = 403, description = "Only instructors can author courses", body = ErrorResponse),
        (status = 404, description = "Category not found", body = ErrorResponse),
        (status = 409, description = "Slug is taken", body = ErrorResponse),
        (status = 422, description = "Invalid course fields", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "courses"
)]
async fn courses_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(payload): Json<CourseCreateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    if !user.user_role().can_author() {
        return Err(WebError::resource_forbidden(Course::get_resource_type()));
    }
    payload.validate()?;

    let slug = payload.slug.unwrap_or_else(|| slugify(&payload.title));
    if !is_valid_slug(&slug) {
        return Err(WebError::validation(
            "slug",
            "slug must be lowercase letters, digits and dashes",
        ));
    }

    let taken = Course::slug_taken(state.pool(), user, &slug)
        .await
        .map_err(|e| WebError::resource_fetch_error(Course::get_resource_type(), e))?;
    if taken {
        return Err(WebError::resource_conflict(Course::get_resource_type()));
    }

    if let Some(category_id) = payload.category_id {
        Category::find_by_id(state.pool(), user, category_id)
            .await
            .map_err(|e| WebError::resource_fetch_error(Category::get_resource_type(), e))?
            .ok_or_else(|| WebError::resource_not_found(Category::get_resource_type()))?;
    }

    let data = CourseCreate {
        instructor_id: user.user_id(),
        category_id: payload.category_id,
        title: payload.title,
        slug,
        description: payload.description,
        price_cents: payload.price_cents,
        is_published: payload.is_published,
    };

    let course = Course::create(state.pool(), user, data)
        .await
        .map_err(|e| WebError::from_database(Course::get_resource_type(), e))?;

    tracing::info!(course_id = %course.id(), instructor_id = %user.user_id(), "course created");
    Ok((StatusCode::CREATED, Json(course)))
}

#[utoipa::path(
    get,
    path = "/api/v1/courses/",
    params(PaginationQuery),
    description = "Page of published courses, newest first",
    responses(
        (status = 200, description = "Returns requested page", body = crate::model::Page<Course>),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "courses"
)]
async fn courses_page_handler(
    State(state): State<AppState>,
    Query(page): Query<PaginationQuery>,
) -> WebResult<impl IntoResponse> {
    // the published catalogue is public
    let courses = Course::page(state.pool(), &AuthenticatedUser::admin(), page.limit(), page.offset())
        .await
        .map_err(|e| WebError::resource_fetch_error(Course::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(courses)))
}

#[utoipa::path(
    get,
    path = "/api/v1/courses/{id}",
    description = "Course with its ordered lessons. Lesson content and videos are only \
                   included for the instructor, admins and enrolled students",
    params(
        ("id" = Uuid, Path, description = "ID of the course")
    ),
    responses(
        (status = 200, description = "Course found", body = CourseDetailResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "courses"
)]
async fn courses_get_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ctx: RequestContext,
) -> WebResult<impl IntoResponse> {
    let admin = AuthenticatedUser::admin();
    let course = Course::find_by_id(state.pool(), &admin, id)
        .await
        .map_err(|e| WebError::resource_fetch_error(Course::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(Course::get_resource_type()))?;

    let can_view = match ctx.maybe_user() {
        Some(user) => can_view_course(state.pool(), user, &course)
            .await
            .map_err(|e| WebError::resource_fetch_error(Course::get_resource_type(), e))?,
        None => false,
    };

    if !course.is_published() && !can_view {
        return Err(WebError::resource_not_found(Course::get_resource_type()));
    }

    let lessons = Lesson::all_by_course(state.pool(), &admin, course.id())
        .await
        .map_err(|e| WebError::resource_fetch_error(Lesson::get_resource_type(), e))?;

    let lessons = lessons
        .iter()
        .map(LessonResponse::from)
        .map(|lesson| if can_view { lesson } else { lesson.outline() })
        .collect();

    Ok((StatusCode::OK, Json(CourseDetailResponse { course, lessons })))
}

#[utoipa::path(
    delete,
    path = "/api/v1/courses/{id}",
    description = "Deletes the course, its lessons, quizzes and every processed lesson video",
    params(
        ("id" = Uuid, Path, description = "ID of the course to delete")
    ),
    responses(
        (status = 200, description = "Course deleted"),
        (status = 401, description = "You're not authorized", body = ErrorResponse),
        (status = 403, description = "You don't own this course", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "courses"
)]
async fn courses_delete_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ctx: RequestContext,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let course = Course::find_by_id(state.pool(), user, id)
        .await
        .map_err(|e| WebError::resource_fetch_error(Course::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(Course::get_resource_type()))?;

    check_manage(state.pool(), user, &course)
        .await
        .map_err(|e| WebError::from_database(Course::get_resource_type(), e))?;

    let lessons = Lesson::all_by_course(state.pool(), user, course.id())
        .await
        .map_err(|e| WebError::resource_fetch_error(Lesson::get_resource_type(), e))?;

    course
        .delete(state.pool(), user)
        .await
        .map_err(|e| WebError::resource_fetch_error(Course::get_resource_type(), e))?;

    for lesson in &lessons {
        if let Some((disk, path)) = lesson.video().processed() {
            state.storage().delete_video_directory(disk, path).await;
        }
    }

    tracing::info!(course_id = %id, lessons = lessons.len(), "course deleted");
    Ok(StatusCode::OK)
}
