use serde::{Deserialize, Serialize};

use super::enums::subscription_tiers::SubscriptionTier;

/// Length of the free trial granted by every paid checkout.
pub const TRIAL_PERIOD_DAYS: i64 = 14;

/// `lessons_limit` sentinel for plans without a lesson cap.
pub const UNLIMITED_LESSONS: i32 = -1;

/// Limits and feature flags attached to a plan. Stored as JSONB in the database.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanFeatures {
    pub lessons_limit: i32,
    pub advanced_simulations: bool,
    pub certification_exams: bool,
    pub mentorship: bool,
    pub downloadable_materials: bool,
}

impl PlanFeatures {
    pub fn has_unlimited_lessons(&self) -> bool {
        self.lessons_limit == UNLIMITED_LESSONS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanCatalogEntry {
    pub tier: SubscriptionTier,
    pub price_id: &'static str,
    pub features: PlanFeatures,
}

pub const PLAN_CATALOG: [PlanCatalogEntry; 3] = [
    PlanCatalogEntry {
        tier: SubscriptionTier::Premium,
        price_id: "price_premium_monthly",
        features: PlanFeatures {
            lessons_limit: UNLIMITED_LESSONS,
            advanced_simulations: true,
            certification_exams: false,
            mentorship: false,
            downloadable_materials: true,
        },
    },
    PlanCatalogEntry {
        tier: SubscriptionTier::Professional,
        price_id: "price_professional_monthly",
        features: PlanFeatures {
            lessons_limit: UNLIMITED_LESSONS,
            advanced_simulations: true,
            certification_exams: true,
            mentorship: false,
            downloadable_materials: true,
        },
    },
    PlanCatalogEntry {
        tier: SubscriptionTier::Enterprise,
        price_id: "price_enterprise_monthly",
        features: PlanFeatures {
            lessons_limit: UNLIMITED_LESSONS,
            advanced_simulations: true,
            certification_exams: true,
            mentorship: true,
            downloadable_materials: true,
        },
    },
];

pub fn plan_for(tier: SubscriptionTier) -> &'static PlanCatalogEntry {
    match tier {
        SubscriptionTier::Premium => &PLAN_CATALOG[0],
        SubscriptionTier::Professional => &PLAN_CATALOG[1],
        SubscriptionTier::Enterprise => &PLAN_CATALOG[2],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tier_maps_to_its_own_entry() {
        for tier in SubscriptionTier::ALL {
            assert_eq!(plan_for(tier).tier, tier);
        }
    }

    #[test]
    fn higher_tiers_unlock_more_features() {
        let premium = plan_for(SubscriptionTier::Premium).features;
        let professional = plan_for(SubscriptionTier::Professional).features;
        let enterprise = plan_for(SubscriptionTier::Enterprise).features;

        assert!(!premium.certification_exams);
        assert!(professional.certification_exams);
        assert!(!professional.mentorship);
        assert!(enterprise.mentorship);
        assert!(enterprise.has_unlimited_lessons());
    }

    #[test]
    fn features_serialize_as_flat_json() {
        let value = serde_json::to_value(plan_for(SubscriptionTier::Premium).features).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "lessons_limit": -1,
                "advanced_simulations": true,
                "certification_exams": false,
                "mentorship": false,
                "downloadable_materials": true,
            })
        );
    }
}
