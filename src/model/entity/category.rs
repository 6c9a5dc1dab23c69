use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult, repo::CrudRepository};
use crate::web::AuthenticatedUser;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Category {
    id: Uuid,
    name: String,
    slug: String,
}

impl ResourceTyped for Category {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Category
    }
}

impl Category {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }
}

#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CategoryCreate {
    pub name: String,
    pub slug: String,
}

#[async_trait]
impl CrudRepository<Category, CategoryCreate, Uuid> for Category {
    async fn create(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: CategoryCreate,
    ) -> DatabaseResult<Self> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO categories (id, name, slug) VALUES ($1,$2,$3)")
            .bind(id)
            .bind(&data.name)
            .bind(&data.slug)
            .execute(mm.executor())
            .await?;

        Ok(Category {
            id,
            name: data.name,
            slug: data.slug,
        })
    }

    async fn update(
        mut self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: CategoryCreate,
    ) -> DatabaseResult<Self> {
        sqlx::query("UPDATE categories SET name = $1, slug = $2 WHERE id = $3")
            .bind(&data.name)
            .bind(&data.slug)
            .bind(self.id)
            .execute(mm.executor())
            .await?;

        self.name = data.name;
        self.slug = data.slug;
        Ok(self)
    }

    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM categories WHERE id = $1")
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
        let result = sqlx::query_as("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    async fn list(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as("SELECT * FROM categories ORDER BY name LIMIT $1 OFFSET $2")
            .bind(limit)
            .bind(offset)
            .fetch_all(mm.executor())
            .await?;
        Ok(result)
    }

    async fn count(mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<i64> {
        let result: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(mm.executor())
            .await?;

        Ok(result)
    }
}

impl Category {
    pub async fn find_by_slug(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        slug: &str,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM categories WHERE slug = $1")
            .bind(slug)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }
}
