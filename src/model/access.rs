use crate::{
    model::{
        ModelManager,
        entity::{Course, Enrollment},
        error::{DatabaseError, DatabaseResult},
    },
    web::{AuthenticatedUser, UserRole},
};

#[async_trait::async_trait]
pub trait HasOwner {
    type OwnerId: PartialEq + Send + Sync;
    async fn get_owner_id(
        &self,
        mm: &ModelManager,
        ctx: &AuthenticatedUser,
    ) -> DatabaseResult<Self::OwnerId>;
}

pub async fn check_access<T: HasOwner<OwnerId = O>, O: PartialEq + Send + Sync>(
    mm: &ModelManager,
    ctx: &AuthenticatedUser,
    resource: &T,
    expected: O,
) -> DatabaseResult<()> {
    // admin can get all resources
    if ctx.user_role() == UserRole::Admin {
        return Ok(());
    }

    let actual_owner = resource.get_owner_id(mm, ctx).await?;

    if actual_owner == expected {
        Ok(())
    } else {
        Err(DatabaseError::Forbidden)
    }
}

/// Course content may be changed by its instructor or an admin.
pub async fn check_manage<T: HasOwner<OwnerId = uuid::Uuid>>(
    mm: &ModelManager,
    ctx: &AuthenticatedUser,
    resource: &T,
) -> DatabaseResult<()> {
    check_access(mm, ctx, resource, ctx.user_id()).await
}

/// Course content may be viewed by an admin, the owning instructor or an enrolled student.
pub async fn can_view_course(
    mm: &ModelManager,
    ctx: &AuthenticatedUser,
    course: &Course,
) -> DatabaseResult<bool> {
    if ctx.user_role() == UserRole::Admin || course.instructor_id() == ctx.user_id() {
        return Ok(true);
    }

    Enrollment::is_enrolled(mm, ctx.user_id(), course.id()).await
}
