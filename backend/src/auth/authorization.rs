use anyhow::Result;
use skillforge_core::domain::{
    repositories::user_roles::UserRoleRepository,
    value_objects::enums::roles::{Capability, Role},
};
use tracing::{info, warn};
use uuid::Uuid;

/// The single authorization decision for privileged operations.
///
/// Roles are data (`user_roles`), so granting or removing admin access never needs
/// a deploy. `Ok(None)` means the caller is authenticated but not permitted.
pub async fn authorize<R>(
    role_repository: &R,
    user_id: Uuid,
    capability: Capability,
) -> Result<Option<Role>>
where
    R: UserRoleRepository + Send + Sync + ?Sized,
{
    let role = role_repository.find_role(user_id).await?;

    if role.has_capability(capability) {
        info!(%user_id, role = %role, capability = ?capability, "authorization: granted");
        Ok(Some(role))
    } else {
        warn!(%user_id, role = %role, capability = ?capability, "authorization: denied");
        Ok(None)
    }
}
