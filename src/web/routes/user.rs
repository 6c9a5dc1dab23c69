use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde::Deserialize;
use tower_cookies::{Cookie, Cookies, cookie::SameSite};
use uuid::Uuid;
use validator::Validate;

use crate::{
    Config,
    auth::{self, hash_password, verify_password},
    model::{
        CrudRepository, PaginatableRepository, ResourceTyped, check_access,
        entity::{UserEntity, UserEntityCreateUpdate},
    },
    web::{
        AppState, AuthenticatedUser, ErrorResponse, RequestContext, UserRole, WebError, WebResult,
        middlewares::{self, AUTH_TOKEN},
        routes::PaginationQuery,
    },
};

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct UserCreateUpdateBody {
    #[validate(length(min = 3, max = 64, message = "username must be 3 to 64 characters"))]
    pub username: String,
    #[validate(length(min = 4, message = "password must be at least 4 characters"))]
    pub password: String,
    /// `student` (default) or `instructor`; admins are created with the CLI
    pub role: Option<UserRole>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UserSigninBody {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UserRenameBody {
    pub username: String,
}

pub fn routes<S>(state: AppState) -> Router<S> {
    let protected = Router::new()
        .route("/page", get(user_list_handler))
        .route("/verify", get(user_verify_handler))
        .route(
            "/{id}",
            put(user_update_handler).delete(user_delete_handler),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ));

    Router::new()
        .route("/signup", post(user_signup_handler))
        .route("/signin", post(user_signin_handler))
        .merge(protected)
        .with_state(state)
}

async fn set_session_cookie(cookies: &Cookies, user_id: Uuid) -> WebResult<()> {
    let secret = Config::get_or_init(false).await.app().jwt();
    let token = auth::issue_session_token(user_id, secret)
        .map_err(|e| WebError::server_crypt_error(e.into()))?;

    let mut cookie = Cookie::new(AUTH_TOKEN, token);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_http_only(true);
    cookie.set_path("/");
    cookies.add(cookie);
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/v1/account/signup",
    request_body = UserCreateUpdateBody,
    description = "Creates new user in database",
    responses(
        (status = 200, description = "User created successfully", body = UserEntity),
        (status = 400, description = "Requested role cannot be self-assigned", body = ErrorResponse),
        (status = 409, description = "User already exists", body = ErrorResponse),
        (status = 422, description = "Invalid username or password", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "account"
)]
async fn user_signup_handler(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<UserCreateUpdateBody>,
) -> WebResult<impl IntoResponse> {
    payload.validate()?;

    let role = payload.role.unwrap_or(UserRole::Student);
    if role == UserRole::Admin {
        return Err(WebError::resource_bad_request(UserEntity::get_resource_type()));
    }

    let admin = AuthenticatedUser::admin();
    let found = UserEntity::find_by_username(state.pool(), &admin, &payload.username)
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?;

    if found.is_some() {
        return Err(WebError::registration_conflict());
    }

    let hash = hash_password(&payload.password).map_err(WebError::server_crypt_error)?;
    let payload = UserEntityCreateUpdate {
        username: payload.username,
        password_hash: hash,
        role,
    };

    let created = UserEntity::create(state.pool(), &admin, payload)
        .await
        .map_err(|e| {
            if e.is_unique_violation() {
                WebError::registration_conflict()
            } else {
                WebError::resource_fetch_error(UserEntity::get_resource_type(), e)
            }
        })?;

    set_session_cookie(&cookies, created.id()).await?;
    tracing::info!(user_id = %created.id(), %role, "user signed up");

    Ok((StatusCode::OK, Json(created)))
}

#[utoipa::path(
    post,
    path = "/api/v1/account/signin",
    description = "Authorizes user in the system",
    request_body = UserSigninBody,
    responses(
        (status = 200, description = "User signed in", body = UserEntity),
        (status = 401, description = "Credentials invalid", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "account",
)]
async fn user_signin_handler(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<UserSigninBody>,
) -> WebResult<impl IntoResponse> {
    let admin = AuthenticatedUser::admin();
    let found = UserEntity::find_by_username(state.pool(), &admin, &payload.username)
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?
        .ok_or_else(WebError::auth_invalid_credentials)?;

    let is_verified =
        verify_password(found.hash(), &payload.password).map_err(WebError::server_crypt_error)?;

    if !is_verified {
        return Err(WebError::auth_invalid_credentials());
    }

    set_session_cookie(&cookies, found.id()).await?;

    Ok((StatusCode::OK, Json(found)))
}

async fn user_verify_handler(ctx: RequestContext) -> WebResult<impl IntoResponse> {
    let user = ctx.maybe_user();

    if user.is_none() {
        return Ok(StatusCode::UNAUTHORIZED);
    }

    Ok(StatusCode::OK)
}

#[utoipa::path(
    get,
    path = "/api/v1/account/page",
    params(PaginationQuery),
    responses(
        (status = 200, description = "Returns requested page", body = crate::model::Page<UserEntity>),
        (status = 401, description = "You're not authorized", body = ErrorResponse),
        (status = 403, description = "You're not an admin to do this", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "account",
    security(
        ("cookie" = [])
    )
)]
async fn user_list_handler(
    ctx: RequestContext,
    Query(page): Query<PaginationQuery>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    if !user.is_admin() {
        return Err(WebError::resource_forbidden(UserEntity::get_resource_type()));
    }

    let users = UserEntity::page(state.pool(), user, page.limit(), page.offset())
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(users)))
}

#[utoipa::path(
    put,
    path = "/api/v1/account/{id}",
    request_body = UserRenameBody,
    params(
        ("id" = Uuid, Path, description = "ID of the user to rename")
    ),
    responses(
        (status = 200, description = "User updated successfully", body = UserEntity),
        (status = 401, description = "You're not authorized to do this", body = ErrorResponse),
        (status = 403, description = "You don't have enough permissions to do this", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 409, description = "Username is taken", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "account",
    security(
        ("cookie" = [])
    )
)]
async fn user_update_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UserRenameBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;

    let found = UserEntity::find_by_id(state.pool(), user, id)
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(UserEntity::get_resource_type()))?;

    check_access(state.pool(), user, &found, user.user_id())
        .await
        .map_err(|e| WebError::from_database(UserEntity::get_resource_type(), e))?;

    let conflict_found = UserEntity::find_by_username(state.pool(), user, &payload.username)
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?;

    if conflict_found.is_some() {
        return Err(WebError::registration_conflict());
    }

    let role = found.role();
    let payload = UserEntityCreateUpdate {
        username: payload.username,
        password_hash: String::new(), // not in use
        role,
    };

    let updated = found
        .update(state.pool(), user, payload)
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/account/{id}",
    description = "Deletes specified user",
    params(
        ("id" = Uuid, Path, description = "ID of the user to delete")
    ),
    responses(
        (status = 200, description = "User deleted successfully"),
        (status = 401, description = "You're not authorized", body = ErrorResponse),
        (status = 403, description = "You're not allowed to do this", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "account",
    security(
        ("cookie" = [])
    )
)]
async fn user_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;

    let found = UserEntity::find_by_id(state.pool(), user, id)
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(UserEntity::get_resource_type()))?;

    check_access(state.pool(), user, &found, user.user_id())
        .await
        .map_err(|e| WebError::from_database(UserEntity::get_resource_type(), e))?;

    found
        .delete(state.pool(), user)
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?;

    Ok(StatusCode::OK)
}
