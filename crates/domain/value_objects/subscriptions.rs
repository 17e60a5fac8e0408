use serde::{Deserialize, Serialize};

use super::enums::subscription_tiers::SubscriptionTier;

/// Body of a create-subscription call. Required fields are optional here so that
/// a missing value surfaces as a validation error rather than a decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateSubscriptionRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub return_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CreateSubscriptionResponse {
    pub checkout_url: String,
    pub session_id: String,
    pub customer_id: String,
    pub tier: SubscriptionTier,
    pub trial_days: i64,
}
