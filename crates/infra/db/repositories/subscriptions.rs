use anyhow::Result;
use async_trait::async_trait;
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::subscriptions::{SubscriptionEntity, SubscriptionRow, UpsertSubscriptionEntity},
        repositories::subscriptions::SubscriptionRepository,
    },
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::subscriptions},
};

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = subscriptions::table
            .filter(subscriptions::user_id.eq(user_id))
            .select(SubscriptionRow::as_select())
            .first::<SubscriptionRow>(&mut conn)
            .optional()?;

        Ok(row.map(SubscriptionEntity::from))
    }

    async fn upsert_subscription(&self, upsert_entity: UpsertSubscriptionEntity) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // No version check: concurrent checkouts for one user are last-write-wins.
        insert_into(subscriptions::table)
            .values(&upsert_entity)
            .on_conflict(subscriptions::user_id)
            .do_update()
            .set(&upsert_entity)
            .execute(&mut conn)?;

        Ok(())
    }
}
