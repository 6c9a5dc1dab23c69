use crate::impl_paginatable_for;
use crate::model::access::HasOwner;
use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult, repo::CrudRepository};
use crate::web::{AuthenticatedUser, UserRole};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

/// An account. Students, instructors and admins share the table and differ by `role`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct UserEntity {
    id: Uuid,
    username: String,
    #[serde(skip)]
    password_hash: String,
    #[schema(value_type = UserRole)]
    role: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct UserEntityCreateUpdate {
    pub username: String,
    pub password_hash: String,
    pub role: UserRole,
}

impl ResourceTyped for UserEntity {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::User
    }
}

impl UserEntity {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn hash(&self) -> &str {
        &self.password_hash
    }

    /// Unknown stored roles read as [`UserRole::Student`].
    pub fn role(&self) -> UserRole {
        UserRole::from(self.role.as_str())
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The identity this account acts with.
    pub fn as_actor(&self) -> AuthenticatedUser {
        AuthenticatedUser::new(self.id, self.role())
    }
}

#[async_trait]
impl CrudRepository<UserEntity, UserEntityCreateUpdate, Uuid> for UserEntity {
    async fn create(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: UserEntityCreateUpdate,
    ) -> DatabaseResult<Self> {
        let user = sqlx::query_as(
            r#"
            INSERT INTO users (id, username, password_hash, role)
            VALUES ($1,$2,$3,$4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.username)
        .bind(&data.password_hash)
        .bind(data.role.to_string())
        .fetch_one(mm.executor())
        .await?;

        Ok(user)
    }

    /// Renames the account. Password and role have their own paths.
    async fn update(
        mut self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: UserEntityCreateUpdate,
    ) -> DatabaseResult<Self> {
        sqlx::query("UPDATE users SET username = $1 WHERE id = $2")
            .bind(&data.username)
            .bind(self.id)
            .execute(mm.executor())
            .await?;

        self.username = data.username;
        Ok(self)
    }

    /// Courses of an instructor go with the account (`ON DELETE CASCADE`).
    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
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
        let user = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(user)
    }

    async fn list(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<Vec<Self>> {
        let users = sqlx::query_as(
            "SELECT * FROM users ORDER BY created_at, username LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(mm.executor())
        .await?;
        Ok(users)
    }

    async fn count(mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(mm.executor())
            .await?;
        Ok(total)
    }
}

impl_paginatable_for!(UserEntity, UserEntityCreateUpdate, Uuid);

#[async_trait]
impl HasOwner for UserEntity {
    type OwnerId = Uuid;

    async fn get_owner_id(
        &self,
        _mm: &ModelManager,
        _actor: &AuthenticatedUser,
    ) -> DatabaseResult<Self::OwnerId> {
        Ok(self.id) // an account owns itself
    }
}

impl UserEntity {
    pub async fn find_by_username(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        username: &str,
    ) -> DatabaseResult<Option<Self>> {
        let user = sqlx::query_as("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(mm.executor())
            .await?;
        Ok(user)
    }

    /// Promotes or demotes the account; only reachable from the CLI.
    pub async fn set_role(
        mut self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        role: UserRole,
    ) -> DatabaseResult<Self> {
        let role = role.to_string();
        sqlx::query("UPDATE users SET role = $1 WHERE id = $2")
            .bind(&role)
            .bind(self.id)
            .execute(mm.executor())
            .await?;

        self.role = role;
        Ok(self)
    }
}
