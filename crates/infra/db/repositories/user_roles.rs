use anyhow::{Context, Result};
use async_trait::async_trait;
use diesel::{RunQueryDsl, prelude::*};
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

use crate::{
    domain::{repositories::user_roles::UserRoleRepository, value_objects::enums::roles::Role},
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::user_roles},
};

pub struct UserRolePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl UserRolePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UserRoleRepository for UserRolePostgres {
    async fn find_role(&self, user_id: Uuid) -> Result<Role> {
        let db_pool = Arc::clone(&self.db_pool);

        let role = task::spawn_blocking(move || -> Result<Option<String>> {
            let mut conn = db_pool.get().context("user_roles: no pooled connection")?;

            let role = user_roles::table
                .find(user_id)
                .select(user_roles::role)
                .first::<String>(&mut conn)
                .optional()?;

            Ok(role)
        })
        .await??;

        Ok(role.as_deref().map(Role::from_str).unwrap_or_default())
    }
}
