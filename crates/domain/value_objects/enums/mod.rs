pub mod subscription_statuses;
pub mod subscription_tiers;
