use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::post,
};
use serde_json::json;

use crate::{
    application::{
        interfaces::payments::StripeGateway,
        usecases::{
            stripe_webhook::{StripeWebhookUseCase, WebhookOutcome},
            token_ledger::TokenLedgerUseCase,
        },
    },
    config::config_model::DotEnvyConfig,
    domain::repositories::{
        user_contents::UserContentRepository, user_subscriptions::UserSubscriptionRepository,
        webhook_events::WebhookEventRepository,
    },
    infrastructure::{
        payments::stripe_client::StripeClient,
        postgres::{
            postgres_connection::PgPoolSquad,
            repositories::{
                user_contents::UserContentPostgres, user_subscriptions::UserSubscriptionPostgres,
                webhook_events::WebhookEventPostgres,
            },
        },
    },
};

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

pub fn routes(db_pool: Arc<PgPoolSquad>, config: Arc<DotEnvyConfig>) -> Router {
    let subscription_repository = UserSubscriptionPostgres::new(Arc::clone(&db_pool));
    let content_repository = UserContentPostgres::new(Arc::clone(&db_pool));
    let webhook_repository = WebhookEventPostgres::new(Arc::clone(&db_pool));
    let ledger = TokenLedgerUseCase::new(
        Arc::new(subscription_repository),
        Arc::new(content_repository),
    );

    let webhook_usecase = StripeWebhookUseCase::new(
        Arc::new(ledger),
        Arc::new(webhook_repository),
        Arc::new(StripeClient::from_config(&config.stripe)),
        config.ledger.token_grants.clone(),
    );

    Router::new()
        .route("/", post(stripe_webhook))
        .with_state(Arc::new(webhook_usecase))
}

/// The raw body is what Stripe signed, so it is taken as bytes.
pub async fn stripe_webhook<S, C, W, G>(
    State(webhook_usecase): State<Arc<StripeWebhookUseCase<S, C, W, G>>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse
where
    S: UserSubscriptionRepository + Send + Sync + 'static,
    C: UserContentRepository + Send + Sync + 'static,
    W: WebhookEventRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    match webhook_usecase.handle_stripe_webhook(&body, signature).await {
        Ok(WebhookOutcome::Duplicate(_)) => {
            Json(json!({ "received": true, "duplicate": true })).into_response()
        }
        Ok(_) => Json(json!({ "received": true })).into_response(),
        Err(err) => err.into_response(),
    }
}
