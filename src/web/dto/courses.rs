use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::model::entity::Course;
use crate::web::dto::lessons::LessonResponse;

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct CourseCreateBody {
    #[validate(length(min = 1, max = 200, message = "title must be 1 to 200 characters"))]
    pub title: String,
    /// Defaults to the slugified title
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    #[validate(range(min = 0, message = "price must not be negative"))]
    pub price_cents: i64,
    #[serde(default)]
    pub is_published: bool,
}

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct CourseDetailResponse {
    pub course: Course,
    pub lessons: Vec<LessonResponse>,
}
