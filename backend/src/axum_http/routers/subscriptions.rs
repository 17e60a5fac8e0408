use crate::{
    axum_http::error_responses::error_response,
    config::config_model::DotEnvyConfig,
    usecases::subscriptions::{StripeGateway, SubscriptionUseCase},
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use crates::{
    domain::{
        repositories::{profiles::ProfileRepository, subscriptions::SubscriptionRepository},
        value_objects::subscriptions::CreateSubscriptionRequest,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{profiles::ProfilePostgres, subscriptions::SubscriptionPostgres},
    },
    payments::stripe_client::StripeClient,
};
use std::sync::Arc;
use tracing::error;

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    stripe_client: Arc<StripeClient>,
    config: Arc<DotEnvyConfig>,
) -> Router {
    let profile_repository = ProfilePostgres::new(Arc::clone(&db_pool));
    let subscription_repository = SubscriptionPostgres::new(Arc::clone(&db_pool));
    let subscriptions_usecase = SubscriptionUseCase::new(
        Arc::new(profile_repository),
        Arc::new(subscription_repository),
        stripe_client,
        config.checkout.default_return_url.clone(),
    );

    router(Arc::new(subscriptions_usecase))
}

pub fn router<P, S, G>(subscriptions_usecase: Arc<SubscriptionUseCase<P, S, G>>) -> Router
where
    P: ProfileRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    Router::new()
        .route(
            "/",
            post(create_subscription::<P, S, G>).options(preflight),
        )
        .with_state(subscriptions_usecase)
}

/// `OPTIONS` fallback for when the router is mounted without the CORS layer.
pub async fn preflight() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn create_subscription<P, S, G>(
    State(subscriptions_usecase): State<Arc<SubscriptionUseCase<P, S, G>>>,
    body: Bytes,
) -> Response
where
    P: ProfileRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    let request: CreateSubscriptionRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            error!(error = %err, "subscriptions: request body is not valid JSON");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
        }
    };

    match subscriptions_usecase.create_subscription(request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => err.into_response(),
    }
}
