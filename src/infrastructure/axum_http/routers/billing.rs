use std::sync::Arc;

use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};
use tracing::info;

use crate::{
    application::{
        interfaces::payments::StripeGateway,
        usecases::{billing::BillingUseCase, token_ledger::TokenLedgerUseCase},
    },
    config::config_model::DotEnvyConfig,
    domain::{
        repositories::{
            user_contents::UserContentRepository, user_subscriptions::UserSubscriptionRepository,
        },
        value_objects::billing::CreateCheckoutRequest,
    },
    infrastructure::{
        axum_http::auth::AuthUser,
        payments::stripe_client::StripeClient,
        postgres::{
            postgres_connection::PgPoolSquad,
            repositories::{
                user_contents::UserContentPostgres, user_subscriptions::UserSubscriptionPostgres,
            },
        },
    },
};

pub fn routes(db_pool: Arc<PgPoolSquad>, config: Arc<DotEnvyConfig>) -> Router {
    let subscription_repository = UserSubscriptionPostgres::new(Arc::clone(&db_pool));
    let content_repository = UserContentPostgres::new(Arc::clone(&db_pool));
    let ledger = TokenLedgerUseCase::new(
        Arc::new(subscription_repository),
        Arc::new(content_repository),
    );
    let stripe_client = StripeClient::from_config(&config.stripe);

    let billing_usecase = BillingUseCase::new(Arc::new(ledger), Arc::new(stripe_client));

    Router::new()
        .route("/checkout", post(create_checkout_session))
        .route("/portal", post(create_portal_session))
        .with_state(Arc::new(billing_usecase))
}

pub async fn create_checkout_session<S, C, G>(
    State(billing_usecase): State<Arc<BillingUseCase<S, C, G>>>,
    auth: AuthUser,
    Json(request): Json<CreateCheckoutRequest>,
) -> impl IntoResponse
where
    S: UserSubscriptionRepository + Send + Sync + 'static,
    C: UserContentRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    info!(user_id = %auth.user_id, price_id = %request.price_id, "billing: checkout requested");

    match billing_usecase
        .create_checkout_session(&auth.user_id, auth.email(), &request.price_id)
        .await
    {
        Ok(session) => Json(session).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn create_portal_session<S, C, G>(
    State(billing_usecase): State<Arc<BillingUseCase<S, C, G>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    S: UserSubscriptionRepository + Send + Sync + 'static,
    C: UserContentRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    match billing_usecase.create_portal_session(&user_id).await {
        Ok(portal) => Json(portal).into_response(),
        Err(err) => err.into_response(),
    }
}
