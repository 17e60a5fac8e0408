use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::subscriptions::{SubscriptionEntity, UpsertSubscriptionEntity};

#[automock]
#[async_trait]
pub trait SubscriptionRepository {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>>;

    /// Inserts the row or overwrites the existing one for the same `user_id`.
    async fn upsert_subscription(&self, upsert_entity: UpsertSubscriptionEntity) -> Result<()>;
}
