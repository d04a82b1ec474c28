use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::entitlements::{EntitlementEntity, UpsertEntitlementEntity};

#[automock]
#[async_trait]
pub trait EntitlementRepository {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<EntitlementEntity>>;

    async fn upsert(&self, entitlement: UpsertEntitlementEntity) -> Result<EntitlementEntity>;

    /// Returns `false` when the user has no entitlement row.
    async fn deactivate(&self, user_id: Uuid) -> Result<bool>;
}
