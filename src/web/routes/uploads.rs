use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::Field},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::post,
};

use crate::{
    model::ResourceType,
    storage::{Disk, StorageError, TEMP_VIDEO_PREFIX, TempUpload, is_temp_path},
    web::{
        AppState, ErrorResponse, RequestContext, WebError, WebResult,
        dto::uploads::{UploadDeleteBody, UploadResponse},
        middlewares,
    },
};

/// Accepted video content types and the extension they are stored under.
const VIDEO_TYPES: &[(&str, &str)] = &[
    ("video/mp4", "mp4"),
    ("video/mpeg", "mpeg"),
    ("video/quicktime", "mov"),
    ("video/webm", "webm"),
    ("video/x-msvideo", "avi"),
    ("video/x-flv", "flv"),
];

/// Multipart framing on top of the file itself.
pub(super) const MULTIPART_OVERHEAD: u64 = 64 * 1024;

pub fn video_extension(content_type: &str) -> Option<&'static str> {
    VIDEO_TYPES
        .iter()
        .find(|(ct, _)| ct.eq_ignore_ascii_case(content_type))
        .map(|(_, ext)| *ext)
}

pub fn routes<S>(state: AppState) -> Router<S> {
    let body_limit = usize::try_from(state.max_video_bytes() + MULTIPART_OVERHEAD).unwrap_or(usize::MAX);

    Router::new()
        .route(
            "/videos",
            post(uploads_video_handler).delete(uploads_video_delete_handler),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

/// Streams one multipart field into a temporary file on the private disk.
///
/// An oversized or broken upload is removed and reported against `field_name`.
pub(super) async fn store_field(
    state: &AppState,
    mut field: Field<'_>,
    field_name: &str,
    prefix: &str,
    extension: &str,
    limit: u64,
) -> WebResult<String> {
    let mut upload = TempUpload::begin(state.storage(), prefix, extension, limit)
        .await
        .map_err(WebError::server_storage_error)?;

    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                upload.abort().await;
                return Err(WebError::validation(field_name, format!("upload interrupted: {e}")));
            }
        };

        if let Err(e) = upload.write(&chunk).await {
            upload.abort().await;
            return Err(match e {
                StorageError::TooLarge { limit } => {
                    WebError::validation(field_name, format!("file exceeds {limit} bytes"))
                }
                e => WebError::server_storage_error(e),
            });
        }
    }

    upload.finish().await.map_err(WebError::server_storage_error)
}

#[utoipa::path(
    post,
    path = "/api/v1/uploads/videos",
    description = "Stores a raw lesson video until a lesson references it",
    request_body(content_type = "multipart/form-data", description = "Form with a single `video` file field"),
    responses(
        (status = 201, description = "Video stored", body = UploadResponse),
        (status = 401, description = "You're not authorized", body = ErrorResponse),
        (status = 403, description = "Only instructors can upload videos", body = ErrorResponse),
        (status = 413, description = "Request body too large"),
        (status = 422, description = "Missing, oversized or unsupported video", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "uploads"
)]
async fn uploads_video_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    if !user.user_role().can_author() {
        return Err(WebError::resource_forbidden(ResourceType::Upload));
    }

    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| WebError::validation("video", format!("malformed form: {e}")))?;
        let Some(field) = field else {
            return Err(WebError::validation("video", "video file is required"));
        };

        if field.name() != Some("video") {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        let Some(extension) = video_extension(&content_type) else {
            return Err(WebError::validation(
                "video",
                format!("unsupported video type `{content_type}`"),
            ));
        };

        let path = store_field(
            &state,
            field,
            "video",
            TEMP_VIDEO_PREFIX,
            extension,
            state.max_video_bytes(),
        )
        .await?;

        tracing::info!(user_id = %user.user_id(), %path, "video uploaded");
        return Ok((StatusCode::CREATED, Json(UploadResponse { path })));
    }
}

#[utoipa::path(
    delete,
    path = "/api/v1/uploads/videos",
    description = "Discards a raw video that was never attached to a lesson",
    request_body = UploadDeleteBody,
    responses(
        (status = 200, description = "Video deleted"),
        (status = 401, description = "You're not authorized", body = ErrorResponse),
        (status = 403, description = "Path is outside the temporary video area", body = ErrorResponse),
        (status = 404, description = "No such upload", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "uploads"
)]
async fn uploads_video_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(payload): Json<UploadDeleteBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    if !user.user_role().can_author() || !is_temp_path(TEMP_VIDEO_PREFIX, &payload.path) {
        return Err(WebError::resource_forbidden(ResourceType::Upload));
    }

    if !state.storage().is_file(Disk::Local, &payload.path).await {
        return Err(WebError::resource_not_found(ResourceType::Upload));
    }

    state
        .storage()
        .delete(Disk::Local, &payload.path)
        .await
        .map_err(WebError::server_storage_error)?;

    Ok(StatusCode::OK)
}
