use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::{
        enums::{subscription_statuses::SubscriptionStatus, subscription_tiers::SubscriptionTier},
        plans::PlanFeatures,
    },
    infra::db::postgres::schema::subscriptions,
};

#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tier: Option<SubscriptionTier>,
    pub status: SubscriptionStatus,
    pub stripe_customer_id: Option<String>,
    pub features: Option<PlanFeatures>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw row used for Diesel queries. Features stay as JSON and are parsed into PlanFeatures.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = subscriptions)]
pub struct SubscriptionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tier: String,
    pub status: String,
    pub stripe_customer_id: Option<String>,
    pub features: serde_json::Value,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SubscriptionRow> for SubscriptionEntity {
    fn from(row: SubscriptionRow) -> Self {
        // Rows written by other tooling may carry partial feature blobs.
        let features = serde_json::from_value(row.features).ok();

        Self {
            id: row.id,
            user_id: row.user_id,
            tier: SubscriptionTier::parse(&row.tier),
            status: SubscriptionStatus::from_str(&row.status),
            stripe_customer_id: row.stripe_customer_id,
            features,
            trial_ends_at: row.trial_ends_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Insert-or-update payload keyed by `user_id`.
#[derive(Debug, Clone, PartialEq, Insertable, AsChangeset)]
#[diesel(table_name = subscriptions)]
pub struct UpsertSubscriptionEntity {
    pub user_id: Uuid,
    pub tier: String,
    pub status: String,
    pub stripe_customer_id: Option<String>,
    pub features: serde_json::Value,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl UpsertSubscriptionEntity {
    pub fn trial(
        user_id: Uuid,
        tier: SubscriptionTier,
        stripe_customer_id: String,
        features: PlanFeatures,
        trial_ends_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self> {
        Ok(Self {
            user_id,
            tier: tier.to_string(),
            status: SubscriptionStatus::Trial.to_string(),
            stripe_customer_id: Some(stripe_customer_id),
            features: serde_json::to_value(features).context("failed to encode plan features")?,
            trial_ends_at: Some(trial_ends_at),
            updated_at,
        })
    }
}
