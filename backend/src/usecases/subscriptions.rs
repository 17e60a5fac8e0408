use std::{collections::HashMap, sync::Arc};

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use crates::{
    domain::{
        entities::{profiles::ProfileEntity, subscriptions::UpsertSubscriptionEntity},
        repositories::{profiles::ProfileRepository, subscriptions::SubscriptionRepository},
        value_objects::{
            enums::subscription_tiers::SubscriptionTier,
            plans::{PlanCatalogEntry, TRIAL_PERIOD_DAYS, plan_for},
            subscriptions::{CreateSubscriptionRequest, CreateSubscriptionResponse},
        },
    },
    payments::stripe_client::{
        CheckoutSessionParams, StripeCheckoutSession, StripeClient, StripeCustomer,
    },
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StripeGateway: Send + Sync {
    async fn create_customer(
        &self,
        email: Option<String>,
        name: Option<String>,
        user_id: Uuid,
    ) -> AnyResult<String>;

    async fn retrieve_customer(&self, customer_id: &str) -> AnyResult<StripeCustomer>;

    async fn create_checkout_session(
        &self,
        params: CheckoutSessionParams,
    ) -> AnyResult<StripeCheckoutSession>;
}

#[async_trait]
impl StripeGateway for StripeClient {
    async fn create_customer(
        &self,
        email: Option<String>,
        name: Option<String>,
        user_id: Uuid,
    ) -> AnyResult<String> {
        self.create_customer(email.as_deref(), name.as_deref(), user_id)
            .await
    }

    async fn retrieve_customer(&self, customer_id: &str) -> AnyResult<StripeCustomer> {
        self.retrieve_customer(customer_id).await
    }

    async fn create_checkout_session(
        &self,
        params: CheckoutSessionParams,
    ) -> AnyResult<StripeCheckoutSession> {
        self.create_checkout_session(&params).await
    }
}

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("Missing required fields: user_id and tier")]
    MissingField,
    #[error("Invalid subscription tier")]
    UnknownTier,
    #[error("User profile not found")]
    ProfileNotFound,
    #[error("{0}")]
    Provider(anyhow::Error),
    #[error("{0}")]
    Store(anyhow::Error),
}

impl SubscriptionError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            SubscriptionError::MissingField | SubscriptionError::UnknownTier => {
                StatusCode::BAD_REQUEST
            }
            SubscriptionError::ProfileNotFound => StatusCode::NOT_FOUND,
            SubscriptionError::Provider(_) | SubscriptionError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, SubscriptionError>;

/// Request fields after presence checks; nothing is parsed yet.
#[derive(Debug)]
struct ValidatedRequest {
    user_id: String,
    tier: String,
    return_url: Option<String>,
}

/// Builds the Checkout redirect pair from a return URL. `{CHECKOUT_SESSION_ID}` is
/// substituted by Stripe and must stay unescaped.
pub fn checkout_redirect_urls(base: &str) -> (String, String) {
    let separator = if base.contains('?') { '&' } else { '?' };
    (
        format!("{base}{separator}success=true&session_id={{CHECKOUT_SESSION_ID}}"),
        format!("{base}{separator}canceled=true"),
    )
}

pub struct SubscriptionUseCase<P, S, Stripe>
where
    P: ProfileRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    profile_repo: Arc<P>,
    subscription_repo: Arc<S>,
    stripe_client: Arc<Stripe>,
    default_return_url: String,
}

impl<P, S, Stripe> SubscriptionUseCase<P, S, Stripe>
where
    P: ProfileRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    pub fn new(
        profile_repo: Arc<P>,
        subscription_repo: Arc<S>,
        stripe_client: Arc<Stripe>,
        default_return_url: String,
    ) -> Self {
        Self {
            profile_repo,
            subscription_repo,
            stripe_client,
            default_return_url,
        }
    }

    /// Starts a trial subscription: validate, load profile, pick plan, resolve the
    /// Stripe customer, open a Checkout session and mirror the trial locally.
    pub async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> UseCaseResult<CreateSubscriptionResponse> {
        let request = Self::validate_request(request)?;
        info!(
            user_id = %request.user_id,
            tier = %request.tier,
            "subscriptions: create subscription requested"
        );

        let profile = self.load_profile(&request.user_id).await?;
        let plan = Self::lookup_plan(&request.tier, profile.id)?;
        let customer_id = self.resolve_customer(&profile).await?;

        let session = self
            .create_checkout(&profile, plan, &customer_id, request.return_url.as_deref())
            .await?;
        let now = Utc::now();

        self.record_trial_subscription(profile.id, plan, &customer_id, now)
            .await;

        info!(
            user_id = %profile.id,
            tier = %plan.tier,
            session_id = %session.id,
            %customer_id,
            "subscriptions: checkout session created successfully"
        );

        Ok(CreateSubscriptionResponse {
            checkout_url: session.url,
            session_id: session.id,
            customer_id,
            tier: plan.tier,
            trial_days: TRIAL_PERIOD_DAYS,
        })
    }

    fn validate_request(request: CreateSubscriptionRequest) -> UseCaseResult<ValidatedRequest> {
        let present = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        match (present(request.user_id), present(request.tier)) {
            (Some(user_id), Some(tier)) => Ok(ValidatedRequest {
                user_id,
                tier,
                return_url: present(request.return_url),
            }),
            _ => {
                let err = SubscriptionError::MissingField;
                warn!(
                    status = err.status_code().as_u16(),
                    "subscriptions: request missing user_id or tier"
                );
                Err(err)
            }
        }
    }

    async fn load_profile(&self, raw_user_id: &str) -> UseCaseResult<ProfileEntity> {
        // Profile ids are UUIDs, so anything else cannot match a row.
        let user_id = Uuid::parse_str(raw_user_id).map_err(|_| {
            let err = SubscriptionError::ProfileNotFound;
            warn!(
                user_id = %raw_user_id,
                status = err.status_code().as_u16(),
                "subscriptions: user_id is not a valid profile id"
            );
            err
        })?;

        self.profile_repo
            .find_by_id(user_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    db_error = ?err,
                    "subscriptions: failed to load user profile"
                );
                SubscriptionError::Store(err)
            })?
            .ok_or_else(|| {
                let err = SubscriptionError::ProfileNotFound;
                warn!(
                    %user_id,
                    status = err.status_code().as_u16(),
                    "subscriptions: user profile not found"
                );
                err
            })
    }

    fn lookup_plan(raw_tier: &str, user_id: Uuid) -> UseCaseResult<&'static PlanCatalogEntry> {
        SubscriptionTier::parse(raw_tier).map(plan_for).ok_or_else(|| {
            let err = SubscriptionError::UnknownTier;
            warn!(
                %user_id,
                tier = %raw_tier,
                status = err.status_code().as_u16(),
                "subscriptions: unknown subscription tier"
            );
            err
        })
    }

    async fn resolve_customer(&self, profile: &ProfileEntity) -> UseCaseResult<String> {
        let user_id = profile.id;
        let existing = self
            .subscription_repo
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    db_error = ?err,
                    "subscriptions: failed to load existing subscription"
                );
                SubscriptionError::Store(err)
            })?
            .and_then(|subscription| subscription.stripe_customer_id);

        if let Some(stored_customer_id) = existing {
            info!(
                %user_id,
                customer_id = %stored_customer_id,
                "subscriptions: reusing stored stripe customer"
            );
            // Trusted as-is; no fallback to creating a fresh customer.
            let customer = self
                .stripe_client
                .retrieve_customer(&stored_customer_id)
                .await
                .map_err(|err| {
                    error!(
                        %user_id,
                        customer_id = %stored_customer_id,
                        error = ?err,
                        "subscriptions: failed to retrieve stripe customer"
                    );
                    SubscriptionError::Provider(err)
                })?;
            if customer.deleted {
                warn!(
                    %user_id,
                    customer_id = %customer.id,
                    "subscriptions: stored stripe customer is deleted at stripe, using it anyway"
                );
            }
            return Ok(customer.id);
        }

        info!(%user_id, "subscriptions: creating stripe customer");
        self.stripe_client
            .create_customer(profile.email.clone(), profile.full_name.clone(), user_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    error = ?err,
                    "subscriptions: failed to create stripe customer"
                );
                SubscriptionError::Provider(err)
            })
    }

    async fn create_checkout(
        &self,
        profile: &ProfileEntity,
        plan: &PlanCatalogEntry,
        customer_id: &str,
        return_url: Option<&str>,
    ) -> UseCaseResult<StripeCheckoutSession> {
        let user_id = profile.id;
        let base_url = return_url.unwrap_or(&self.default_return_url);
        let (success_url, cancel_url) = checkout_redirect_urls(base_url);

        let params = CheckoutSessionParams {
            customer_id: customer_id.to_string(),
            price_id: plan.price_id.to_string(),
            success_url,
            cancel_url,
            trial_period_days: TRIAL_PERIOD_DAYS,
            metadata: HashMap::from([
                ("user_id".to_string(), user_id.to_string()),
                ("tier".to_string(), plan.tier.to_string()),
            ]),
        };

        info!(
            %user_id,
            tier = %plan.tier,
            price_id = %plan.price_id,
            %customer_id,
            "subscriptions: creating checkout session"
        );

        self.stripe_client
            .create_checkout_session(params)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    tier = %plan.tier,
                    price_id = %plan.price_id,
                    %customer_id,
                    error = ?err,
                    "subscriptions: stripe checkout session creation failed"
                );
                SubscriptionError::Provider(err)
            })
    }

    /// Mirrors the trial locally. Failures are logged only: the session already
    /// exists and the webhook is expected to reconcile the row.
    async fn record_trial_subscription(
        &self,
        user_id: Uuid,
        plan: &PlanCatalogEntry,
        customer_id: &str,
        now: DateTime<Utc>,
    ) {
        let trial_ends_at = now + Duration::days(TRIAL_PERIOD_DAYS);

        let upsert_entity = match UpsertSubscriptionEntity::trial(
            user_id,
            plan.tier,
            customer_id.to_string(),
            plan.features,
            trial_ends_at,
            now,
        ) {
            Ok(entity) => entity,
            Err(err) => {
                error!(
                    %user_id,
                    error = ?err,
                    "subscriptions: failed to build trial subscription record"
                );
                return;
            }
        };

        match self.subscription_repo.upsert_subscription(upsert_entity).await {
            Ok(()) => info!(
                %user_id,
                tier = %plan.tier,
                %trial_ends_at,
                "subscriptions: trial subscription recorded"
            ),
            Err(err) => error!(
                %user_id,
                tier = %plan.tier,
                %customer_id,
                db_error = ?err,
                "subscriptions: failed to upsert trial subscription, checkout continues"
            ),
        }
    }
}
