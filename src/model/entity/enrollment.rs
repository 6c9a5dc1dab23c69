use crate::model::access::HasOwner;
use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult};
use crate::web::AuthenticatedUser;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

pub const PROGRESS_COMPLETE: i32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Enrollment {
    id: Uuid,
    user_id: Uuid,
    course_id: Uuid,
    progress: i32,
    completed_at: Option<DateTime<Utc>>,
    enrolled_at: DateTime<Utc>,
}

impl ResourceTyped for Enrollment {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Enrollment
    }
}

impl Enrollment {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn course_id(&self) -> Uuid {
        self.course_id
    }

    pub fn progress(&self) -> i32 {
        self.progress
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn enrolled_at(&self) -> DateTime<Utc> {
        self.enrolled_at
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

impl Enrollment {
    /// Enrolls `user_id` into `course_id`. Enrolling twice returns the existing row.
    pub async fn enroll(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        user_id: Uuid,
        course_id: Uuid,
    ) -> DatabaseResult<Self> {
        let enrollment = sqlx::query_as(
            r#"
            INSERT INTO enrollments (id, user_id, course_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, course_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(course_id)
        .fetch_one(mm.executor())
        .await?;
        Ok(enrollment)
    }

    pub async fn is_enrolled(
        mm: &ModelManager,
        user_id: Uuid,
        course_id: Uuid,
    ) -> DatabaseResult<bool> {
        let enrolled: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM enrollments WHERE user_id = $1 AND course_id = $2)",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(mm.executor())
        .await?;
        Ok(enrolled)
    }

    pub async fn find(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        user_id: Uuid,
        course_id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM enrollments WHERE user_id = $1 AND course_id = $2")
            .bind(user_id)
            .bind(course_id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    /// Reaching 100 stamps `completed_at` once; dropping below clears it.
    pub async fn update_progress(
        self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        progress: i32,
    ) -> DatabaseResult<Self> {
        let progress = progress.clamp(0, PROGRESS_COMPLETE);
        let updated = sqlx::query_as(
            r#"
            UPDATE enrollments
            SET progress = $1,
                completed_at = CASE
                    WHEN $1 >= 100 THEN COALESCE(completed_at, now())
                    ELSE NULL
                END
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(progress)
        .bind(self.id)
        .fetch_one(mm.executor())
        .await?;
        Ok(updated)
    }

    pub async fn list_by_user(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        user_id: Uuid,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            "SELECT * FROM enrollments WHERE user_id = $1 ORDER BY enrolled_at DESC",
        )
        .bind(user_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }
}

#[async_trait]
impl HasOwner for Enrollment {
    type OwnerId = Uuid;

    async fn get_owner_id(
        &self,
        _mm: &ModelManager,
        _actor: &AuthenticatedUser,
    ) -> DatabaseResult<Self::OwnerId> {
        Ok(self.user_id)
    }
}
