use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::model::entity::Lesson;
use crate::storage::Disk;

#[derive(Debug, Default, Deserialize, Validate, utoipa::ToSchema)]
pub struct LessonBody {
    #[validate(length(min = 1, max = 200, message = "title must be 1 to 200 characters"))]
    pub title: String,
    /// Defaults to the slugified title
    pub slug: Option<String>,
    pub content: Option<String>,
    #[validate(url(message = "video_url must be a valid URL"))]
    pub video_url: Option<String>,
    /// Path returned by the video upload endpoint
    pub temp_video_path: Option<String>,
    pub order_index: Option<i32>,
    /// Drops the current video without providing a new one
    #[serde(default)]
    pub remove_video: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct LessonResponse {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: Option<String>,
    pub order_index: i32,
    pub video_url: Option<String>,
    pub video_disk: Option<Disk>,
    /// Master playlist of the processed video, when there is one
    pub stream_url: Option<String>,
}

/// Trailing slash keeps relative playlist entries under `/stream/`.
pub fn stream_url(lesson_id: Uuid) -> String {
    format!("/api/v1/lessons/{lesson_id}/stream/?playlist=true")
}

impl LessonResponse {
    /// Title and position only, for callers who may not view the course content.
    pub fn outline(self) -> Self {
        Self {
            content: None,
            video_url: None,
            video_disk: None,
            stream_url: None,
            ..self
        }
    }
}

impl From<&Lesson> for LessonResponse {
    fn from(lesson: &Lesson) -> Self {
        let video = lesson.video();
        Self {
            id: lesson.id(),
            course_id: lesson.course_id(),
            title: lesson.title().to_string(),
            slug: lesson.slug().to_string(),
            content: lesson.content().map(str::to_string),
            order_index: lesson.order_index(),
            video_url: video.video_url().map(str::to_string),
            video_disk: video.disk(),
            stream_url: video.processed().map(|_| stream_url(lesson.id())),
        }
    }
}
