use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::web::middlewares::AUTH_TOKEN;

pub struct CookieAuthModifier;

impl Modify for CookieAuthModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(schema) = openapi.components.as_mut() {
            schema.add_security_scheme(
                "cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    AUTH_TOKEN,
                    "JWT session of the current user",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::routes::user::user_signup_handler,
        crate::web::routes::user::user_signin_handler,
        crate::web::routes::user::user_list_handler,
        crate::web::routes::user::user_update_handler,
        crate::web::routes::user::user_delete_handler,
        crate::web::routes::courses::courses_create_handler,
        crate::web::routes::courses::courses_page_handler,
        crate::web::routes::courses::courses_get_handler,
        crate::web::routes::courses::courses_delete_handler,
        crate::web::routes::lessons::lessons_create_handler,
        crate::web::routes::lessons::lessons_get_handler,
        crate::web::routes::lessons::lessons_update_handler,
        crate::web::routes::lessons::lessons_delete_handler,
        crate::web::routes::stream::stream_master_handler,
        crate::web::routes::stream::stream_file_handler,
        crate::web::routes::uploads::uploads_video_handler,
        crate::web::routes::uploads::uploads_video_delete_handler,
        crate::web::routes::quizzes::quizzes_create_handler,
        crate::web::routes::quizzes::quizzes_generate_handler,
        crate::web::routes::quizzes::quizzes_get_handler,
        crate::web::routes::quizzes::questions_replace_handler,
        crate::web::routes::quizzes::quizzes_delete_handler,
        crate::web::routes::enrollments::enrollments_enroll_handler,
        crate::web::routes::enrollments::enrollments_progress_handler,
        crate::web::routes::enrollments::enrollments_list_handler,
    ),
    modifiers(&CookieAuthModifier),
    tags(
        (name = "account", description = "Sign up, sign in and user administration"),
        (name = "courses", description = "Course catalogue and authoring"),
        (name = "lessons", description = "Lessons and their videos"),
        (name = "stream", description = "Encrypted HLS delivery"),
        (name = "uploads", description = "Temporary video uploads"),
        (name = "quizzes", description = "Manual and AI-generated quizzes"),
        (name = "enrollments", description = "Enrollment and progress"),
    ),
)]
pub struct ApiDoc;
