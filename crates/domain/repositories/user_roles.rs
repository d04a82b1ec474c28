use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::value_objects::enums::roles::Role;

#[automock]
#[async_trait]
pub trait UserRoleRepository {
    /// Users without a row are learners.
    async fn find_role(&self, user_id: Uuid) -> Result<Role>;
}
