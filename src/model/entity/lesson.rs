use crate::model::access::HasOwner;
use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult, repo::CrudRepository};
use crate::storage::Disk;
use crate::video::LESSONS_DIR;
use crate::web::AuthenticatedUser;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::prelude::{FromRow, Row};
use thiserror::Error;
use uuid::Uuid;

/// Where a lesson's video comes from. At most one source is active at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LessonVideo {
    #[default]
    None,
    ExternalUrl {
        url: String,
    },
    /// Transcoded HLS output; `path` points at the master playlist.
    ProcessedAsset {
        disk: Disk,
        path: String,
    },
}

#[derive(Debug, Error)]
pub enum LessonVideoError {
    #[error("lesson row has inconsistent video columns")]
    InconsistentColumns,
    #[error("lesson row references unknown disk `{0}`")]
    UnknownDisk(String),
}

impl LessonVideo {
    pub fn from_columns(
        url: Option<String>,
        disk: Option<String>,
        path: Option<String>,
    ) -> Result<Self, LessonVideoError> {
        match (url, disk, path) {
            (None, None, None) => Ok(Self::None),
            (Some(url), None, None) => Ok(Self::ExternalUrl { url }),
            (None, Some(disk), Some(path)) => {
                let disk = disk
                    .parse::<Disk>()
                    .map_err(|_| LessonVideoError::UnknownDisk(disk))?;
                Ok(Self::ProcessedAsset { disk, path })
            }
            _ => Err(LessonVideoError::InconsistentColumns),
        }
    }

    /// `(video_url, video_disk, video_path)` as stored in the `lessons` table.
    pub fn columns(&self) -> (Option<&str>, Option<&'static str>, Option<&str>) {
        match self {
            Self::None => (None, None, None),
            Self::ExternalUrl { url } => (Some(url), None, None),
            Self::ProcessedAsset { disk, path } => (None, Some(disk.as_str()), Some(path)),
        }
    }

    pub fn video_url(&self) -> Option<&str> {
        match self {
            Self::ExternalUrl { url } => Some(url),
            _ => None,
        }
    }

    pub fn disk(&self) -> Option<Disk> {
        match self {
            Self::ProcessedAsset { disk, .. } => Some(*disk),
            _ => None,
        }
    }

    pub fn processed(&self) -> Option<(Disk, &str)> {
        match self {
            Self::ProcessedAsset { disk, path } => Some((*disk, path)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Lesson {
    id: Uuid,
    course_id: Uuid,
    title: String,
    slug: String,
    content: Option<String>,
    order_index: i32,
    video: LessonVideo,
}

impl<'r> FromRow<'r, PgRow> for Lesson {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let video = LessonVideo::from_columns(
            row.try_get("video_url")?,
            row.try_get("video_disk")?,
            row.try_get("video_path")?,
        )
        .map_err(|e| sqlx::Error::ColumnDecode {
            index: String::from("video_disk"),
            source: Box::new(e),
        })?;

        Ok(Self {
            id: row.try_get("id")?,
            course_id: row.try_get("course_id")?,
            title: row.try_get("title")?,
            slug: row.try_get("slug")?,
            content: row.try_get("content")?,
            order_index: row.try_get("order_index")?,
            video,
        })
    }
}

impl ResourceTyped for Lesson {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Lesson
    }
}

impl Lesson {
    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    pub fn course_id(&self) -> uuid::Uuid {
        self.course_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn order_index(&self) -> i32 {
        self.order_index
    }

    pub fn video(&self) -> &LessonVideo {
        &self.video
    }
}

#[derive(Debug, Clone)]
pub struct LessonCreate {
    pub course_id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: Option<String>,
    pub order_index: i32,
    pub video: LessonVideo,
}

impl LessonCreate {
    /// Carries every field of `lesson` over, so callers only override what changed.
    pub fn from_lesson(lesson: &Lesson) -> Self {
        Self {
            course_id: lesson.course_id,
            title: lesson.title.clone(),
            slug: lesson.slug.clone(),
            content: lesson.content.clone(),
            order_index: lesson.order_index,
            video: lesson.video.clone(),
        }
    }
}

#[async_trait]
impl CrudRepository<Lesson, LessonCreate, uuid::Uuid> for Lesson {
    async fn create(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: LessonCreate,
    ) -> DatabaseResult<Self> {
        let id = Uuid::new_v4();
        let (video_url, video_disk, video_path) = data.video.columns();
        sqlx::query(
            r#"
            INSERT INTO lessons (id, course_id, title, slug, content, order_index, video_url, video_disk, video_path)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
            "#,
        )
        .bind(id)
        .bind(data.course_id)
        .bind(&data.title)
        .bind(&data.slug)
        .bind(&data.content)
        .bind(data.order_index)
        .bind(video_url)
        .bind(video_disk)
        .bind(video_path)
        .execute(mm.executor())
        .await?;

        Ok(Lesson {
            id,
            course_id: data.course_id,
            title: data.title,
            slug: data.slug,
            content: data.content,
            order_index: data.order_index,
            video: data.video,
        })
    }

    async fn update(
        mut self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: LessonCreate,
    ) -> DatabaseResult<Self> {
        let (video_url, video_disk, video_path) = data.video.columns();
        sqlx::query(
            r#"
            UPDATE lessons
            SET title = $1, slug = $2, content = $3, order_index = $4,
                video_url = $5, video_disk = $6, video_path = $7
            WHERE id = $8
            "#,
        )
        .bind(&data.title)
        .bind(&data.slug)
        .bind(&data.content)
        .bind(data.order_index)
        .bind(video_url)
        .bind(video_disk)
        .bind(video_path)
        .bind(self.id)
        .execute(mm.executor())
        .await?;

        self.title = data.title;
        self.slug = data.slug;
        self.content = data.content;
        self.order_index = data.order_index;
        self.video = data.video;
        Ok(self)
    }

    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM lessons WHERE id = $1")
            .bind(self.id)
            .execute(mm.executor())
            .await?;
        Ok(())
    }

    async fn find_by_id(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        id: uuid::Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM lessons WHERE id = $1")
            .bind(id)
            .fetch_one(mm.executor())
            .await;
        if let Err(sqlx::Error::RowNotFound) = result {
            return Ok(None);
        }

        Ok(Some(result?))
    }

    async fn list(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as("SELECT * FROM lessons ORDER BY course_id, order_index LIMIT $1 OFFSET $2")
            .bind(limit)
            .bind(offset)
            .fetch_all(mm.executor())
            .await?;
        Ok(result)
    }

    async fn count(mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<i64> {
        let result: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lessons")
            .fetch_one(mm.executor())
            .await?;

        Ok(result)
    }
}

impl Lesson {
    pub async fn all_by_course(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        course_id: Uuid,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as("SELECT * FROM lessons WHERE course_id = $1 ORDER BY order_index, title")
            .bind(course_id)
            .fetch_all(mm.executor())
            .await?;
        Ok(result)
    }

    /// Slugs name the video output directory, so they are unique across all courses.
    ///
    /// A slug is also taken while another lesson's processed video still lives in
    /// `lessons/<slug>/`, which happens after that lesson was renamed.
    pub async fn slug_taken(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        slug: &str,
        except: Option<Uuid>,
    ) -> DatabaseResult<bool> {
        let taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM lessons
                WHERE (slug = $1 OR video_path LIKE $3)
                  AND ($2::uuid IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(slug)
        .bind(except)
        .bind(format!("{LESSONS_DIR}/{slug}/%"))
        .fetch_one(mm.executor())
        .await?;
        Ok(taken)
    }

    pub async fn next_order_index(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        course_id: Uuid,
    ) -> DatabaseResult<i32> {
        let next: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(order_index) + 1, 0) FROM lessons WHERE course_id = $1",
        )
        .bind(course_id)
        .fetch_one(mm.executor())
        .await?;
        Ok(next)
    }
}

#[async_trait]
impl HasOwner for Lesson {
    type OwnerId = uuid::Uuid;

    async fn get_owner_id(
        &self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
    ) -> DatabaseResult<Self::OwnerId> {
        let owner: Uuid = sqlx::query_scalar("SELECT instructor_id FROM courses WHERE id = $1")
            .bind(self.course_id)
            .fetch_one(mm.executor())
            .await?;
        Ok(owner)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn video_columns_round_trip() {
        let cases = [
            LessonVideo::None,
            LessonVideo::ExternalUrl {
                url: String::from("https://youtu.be/abc"),
            },
            LessonVideo::ProcessedAsset {
                disk: Disk::Secure,
                path: String::from("lessons/intro/abc.m3u8"),
            },
        ];

        for video in cases {
            let (url, disk, path) = video.columns();
            let restored = LessonVideo::from_columns(
                url.map(str::to_string),
                disk.map(str::to_string),
                path.map(str::to_string),
            )
            .unwrap();
            assert_eq!(restored, video);
        }
    }

    #[test]
    fn sources_are_mutually_exclusive() {
        let processed = LessonVideo::ProcessedAsset {
            disk: Disk::Secure,
            path: String::from("lessons/intro/abc.m3u8"),
        };
        assert_eq!(processed.video_url(), None);
        assert_eq!(processed.disk(), Some(Disk::Secure));

        let (url, _, _) = processed.columns();
        assert!(url.is_none());

        let external = LessonVideo::ExternalUrl {
            url: String::from("https://example.com/v.mp4"),
        };
        assert_eq!(external.disk(), None);
        assert!(external.processed().is_none());
    }

    #[test]
    fn inconsistent_columns_are_rejected() {
        assert!(matches!(
            LessonVideo::from_columns(
                Some(String::from("https://x")),
                Some(String::from("secure")),
                Some(String::from("lessons/a/b.m3u8")),
            ),
            Err(LessonVideoError::InconsistentColumns)
        ));
        assert!(matches!(
            LessonVideo::from_columns(None, Some(String::from("secure")), None),
            Err(LessonVideoError::InconsistentColumns)
        ));
        assert!(matches!(
            LessonVideo::from_columns(None, Some(String::from("s3")), Some(String::from("a/b"))),
            Err(LessonVideoError::UnknownDisk(_))
        ));
    }

    #[test]
    fn video_serializes_as_tagged_variant() {
        let video = LessonVideo::ProcessedAsset {
            disk: Disk::Secure,
            path: String::from("lessons/intro/abc.m3u8"),
        };
        let json = serde_json::to_value(&video).unwrap();
        assert_eq!(json["kind"], "processed_asset");
        assert_eq!(json["disk"], "secure");
    }
}
