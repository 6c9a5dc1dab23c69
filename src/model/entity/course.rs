use crate::impl_paginatable_for;
use crate::model::access::HasOwner;
use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult, repo::CrudRepository};
use crate::web::AuthenticatedUser;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Course {
    id: Uuid,
    instructor_id: Uuid,
    category_id: Option<Uuid>,
    title: String,
    slug: String,
    description: String,
    price_cents: i64,
    is_published: bool,
    created_at: DateTime<Utc>,
}

impl ResourceTyped for Course {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Course
    }
}

impl Course {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn instructor_id(&self) -> Uuid {
        self.instructor_id
    }

    pub fn category_id(&self) -> Option<Uuid> {
        self.category_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn price_cents(&self) -> i64 {
        self.price_cents
    }

    pub fn is_published(&self) -> bool {
        self.is_published
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Clone)]
pub struct CourseCreate {
    pub instructor_id: Uuid,
    pub category_id: Option<Uuid>,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub price_cents: i64,
    pub is_published: bool,
}

#[async_trait]
impl CrudRepository<Course, CourseCreate, Uuid> for Course {
    async fn create(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: CourseCreate,
    ) -> DatabaseResult<Self> {
        let course = sqlx::query_as(
            r#"
            INSERT INTO courses (id, instructor_id, category_id, title, slug, description, price_cents, is_published)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.instructor_id)
        .bind(data.category_id)
        .bind(&data.title)
        .bind(&data.slug)
        .bind(&data.description)
        .bind(data.price_cents)
        .bind(data.is_published)
        .fetch_one(mm.executor())
        .await?;

        Ok(course)
    }

    /// Ownership never changes through an update; `instructor_id` is ignored.
    async fn update(
        mut self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: CourseCreate,
    ) -> DatabaseResult<Self> {
        sqlx::query(
            r#"
            UPDATE courses
            SET category_id = $1, title = $2, slug = $3, description = $4, price_cents = $5, is_published = $6
            WHERE id = $7
            "#,
        )
        .bind(data.category_id)
        .bind(&data.title)
        .bind(&data.slug)
        .bind(&data.description)
        .bind(data.price_cents)
        .bind(data.is_published)
        .bind(self.id)
        .execute(mm.executor())
        .await?;

        self.category_id = data.category_id;
        self.title = data.title;
        self.slug = data.slug;
        self.description = data.description;
        self.price_cents = data.price_cents;
        self.is_published = data.is_published;
        Ok(self)
    }

    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(self.id)
            .execute(mm.executor())
            .await?;
        Ok(())
    }

    async fn find_by_id(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM courses WHERE id = $1")
            .bind(id)
            .fetch_one(mm.executor())
            .await;
        if let Err(sqlx::Error::RowNotFound) = result {
            return Ok(None);
        }

        Ok(Some(result?))
    }

    /// Published catalogue, newest first.
    async fn list(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            "SELECT * FROM courses WHERE is_published ORDER BY created_at DESC, id LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    async fn count(mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<i64> {
        let result: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM courses WHERE is_published")
            .fetch_one(mm.executor())
            .await?;

        Ok(result)
    }
}

impl_paginatable_for!(Course, CourseCreate, Uuid);

#[async_trait]
impl HasOwner for Course {
    type OwnerId = Uuid;

    async fn get_owner_id(
        &self,
        _mm: &ModelManager,
        _actor: &AuthenticatedUser,
    ) -> DatabaseResult<Self::OwnerId> {
        Ok(self.instructor_id)
    }
}

impl Course {
    pub async fn all_by_instructor(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        instructor_id: Uuid,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            "SELECT * FROM courses WHERE instructor_id = $1 ORDER BY created_at DESC",
        )
        .bind(instructor_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn slug_taken(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        slug: &str,
    ) -> DatabaseResult<bool> {
        let taken: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM courses WHERE slug = $1)")
            .bind(slug)
            .fetch_one(mm.executor())
            .await?;
        Ok(taken)
    }
}
