use crate::{web::{doc::ApiDoc, AppState}, Config};
use axum::Router;
use serde::Deserialize;
use tower_cookies::CookieManagerLayer;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod user;
pub mod courses;
pub mod lessons;
pub mod stream;
pub mod uploads;
pub mod quizzes;
pub mod enrollments;

const DEFAULT_PAGE_LIMIT: i64 = 20;
const MAX_PAGE_LIMIT: i64 = 100;

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema, utoipa::IntoParams)]
pub struct PaginationQuery {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    DEFAULT_PAGE_LIMIT
}

impl PaginationQuery {
    pub fn limit(&self) -> i64 {
        self.limit.clamp(1, MAX_PAGE_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.max(0)
    }
}

pub fn build_app<S: Send + Sync + Clone + 'static>(state: AppState, config: &Config) -> Router<S> {
    let courses = courses::routes(state.clone())
        .merge(lessons::course_routes(state.clone()))
        .merge(enrollments::course_routes(state.clone()));

    let lessons = lessons::routes(state.clone())
        .merge(stream::routes(state.clone()))
        .merge(quizzes::lesson_routes(state.clone()));

    let mut router = Router::new()
        .nest("/api/v1/account/", user::routes(state.clone()))
        .nest("/api/v1/courses/", courses)
        .nest("/api/v1/lessons/", lessons)
        .nest("/api/v1/quizzes/", quizzes::routes(state.clone()))
        .nest("/api/v1/uploads/", uploads::routes(state.clone()))
        .nest("/api/v1/enrollments/", enrollments::routes(state.clone()))
        .layer(CookieManagerLayer::default())
        .layer(CorsLayer::very_permissive())
        .with_state(state);

    if config.app().docs() {
        let openapi = ApiDoc::openapi();

        router = router
            .merge(
                SwaggerUi::new("/api/v1/docs")
                    .url("/api-doc/openapi.json", openapi),
            );
    }

    router
}
