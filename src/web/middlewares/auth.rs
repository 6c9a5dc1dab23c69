use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;

use crate::{
    Config, auth,
    model::{CrudRepository, ResourceTyped, entity::UserEntity},
    web::{AppState, RequestContext, context::AuthenticatedUser, error::WebError},
};

pub static AUTH_TOKEN: &str = "SID";

/// Resolves the session cookie into a [`RequestContext`]. Requests without a
/// cookie, or whose user no longer exists, continue anonymously.
pub async fn extract_context_fn(
    State(state): State<AppState>,
    cookies: Cookies,
    mut req: Request,
    next: Next,
) -> Result<Response, WebError> {
    let token = match cookies.get(AUTH_TOKEN) {
        Some(token) => token,
        None => {
            req.extensions_mut().insert(RequestContext::new(None));
            return Ok(next.run(req).await);
        }
    };

    let claims = auth::process_token(token.value(), Config::get_or_init(false).await.app().jwt())
        .map_err(|e| WebError::auth_cookie_invalid(AUTH_TOKEN, e))?;

    let Some(id) = claims.claims.user_id() else {
        tracing::warn!("session cookie carries a malformed subject");
        req.extensions_mut().insert(RequestContext::new(None));
        return Ok(next.run(req).await);
    };

    let user = UserEntity::find_by_id(state.pool(), &AuthenticatedUser::admin(), id)
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?;

    let ctx = match user {
        Some(user) => RequestContext::new(Some(user.as_actor())),
        None => RequestContext::new(None),
    };
    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}
