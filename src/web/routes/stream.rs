use axum::{
    Router,
    body::Body,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::{
    model::ResourceType,
    video::{StreamTarget, locate_asset},
    web::{
        AppState, ErrorResponse, RequestContext, WebError, WebResult, middlewares,
        routes::lessons::find_viewable_lesson,
    },
};

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct StreamQuery {
    /// Serve the master playlist
    #[serde(default)]
    playlist: bool,
}

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/{id}/stream", get(stream_master_handler))
        .route("/{id}/stream/", get(stream_master_handler))
        .route("/{id}/stream/{file}", get(stream_file_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/api/v1/lessons/{id}/stream/",
    description = "Master playlist of the lesson's encrypted HLS export",
    params(
        ("id" = Uuid, Path, description = "ID of the lesson"),
        StreamQuery,
    ),
    responses(
        (status = 200, description = "Master playlist (application/vnd.apple.mpegurl)"),
        (status = 401, description = "You're not authorized", body = ErrorResponse),
        (status = 403, description = "You may not watch this lesson", body = ErrorResponse),
        (status = 404, description = "No processed video", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "stream"
)]
async fn stream_master_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<StreamQuery>,
) -> WebResult<impl IntoResponse> {
    serve(&ctx, &state, id, StreamTarget::resolve(query.playlist, None)).await
}

#[utoipa::path(
    get,
    path = "/api/v1/lessons/{id}/stream/{file}",
    description = "Variant playlist, decryption key or segment of the lesson's HLS export",
    params(
        ("id" = Uuid, Path, description = "ID of the lesson"),
        ("file" = String, Path, description = "File name taken from a playlist"),
    ),
    responses(
        (status = 200, description = "Requested file"),
        (status = 401, description = "You're not authorized", body = ErrorResponse),
        (status = 403, description = "You may not watch this lesson", body = ErrorResponse),
        (status = 404, description = "Unknown or missing file", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "stream"
)]
async fn stream_file_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path((id, file)): Path<(Uuid, String)>,
) -> WebResult<impl IntoResponse> {
    serve(&ctx, &state, id, StreamTarget::resolve(false, Some(&file))).await
}

async fn serve(
    ctx: &RequestContext,
    state: &AppState,
    id: Uuid,
    target: StreamTarget,
) -> WebResult<Response> {
    let user = ctx.user()?;
    let lesson = find_viewable_lesson(state, user, id).await?;

    let Some(asset) = locate_asset(state.storage(), lesson.video(), &target).await else {
        tracing::warn!(lesson_id = %id, ?target, "requested stream file is not available");
        return Err(WebError::resource_not_found(ResourceType::LessonVideo));
    };

    let file = state
        .storage()
        .open(asset.disk, &asset.path)
        .await
        .map_err(WebError::server_storage_error)?;

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, asset.content_type),
            (header::CACHE_CONTROL, asset.cache_control),
        ],
        body,
    )
        .into_response())
}
