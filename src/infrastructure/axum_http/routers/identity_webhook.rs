use std::sync::Arc;

use anyhow::Result;
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
        interfaces::identity::IdentityWebhookVerifier,
        usecases::{identity_webhook::IdentityWebhookUseCase, token_ledger::TokenLedgerUseCase},
    },
    config::config_model::DotEnvyConfig,
    domain::{
        repositories::{
            user_contents::UserContentRepository, user_subscriptions::UserSubscriptionRepository,
        },
        value_objects::identity_events::IdentityWebhookHeaders,
    },
    infrastructure::{
        identity::svix::SvixVerifier,
        postgres::{
            postgres_connection::PgPoolSquad,
            repositories::{
                user_contents::UserContentPostgres, user_subscriptions::UserSubscriptionPostgres,
            },
        },
    },
};

pub fn routes(db_pool: Arc<PgPoolSquad>, config: Arc<DotEnvyConfig>) -> Result<Router> {
    let subscription_repository = UserSubscriptionPostgres::new(Arc::clone(&db_pool));
    let content_repository = UserContentPostgres::new(Arc::clone(&db_pool));
    let ledger = TokenLedgerUseCase::new(
        Arc::new(subscription_repository),
        Arc::new(content_repository),
    );
    let verifier = SvixVerifier::new(&config.identity.webhook_secret)?;

    let webhook_usecase = IdentityWebhookUseCase::new(Arc::new(ledger), Arc::new(verifier));

    Ok(Router::new()
        .route("/", post(identity_webhook))
        .with_state(Arc::new(webhook_usecase)))
}

pub async fn identity_webhook<S, C, V>(
    State(webhook_usecase): State<Arc<IdentityWebhookUseCase<S, C, V>>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse
where
    S: UserSubscriptionRepository + Send + Sync + 'static,
    C: UserContentRepository + Send + Sync + 'static,
    V: IdentityWebhookVerifier + Send + Sync + 'static,
{
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    let delivery = IdentityWebhookHeaders {
        id: header("svix-id"),
        timestamp: header("svix-timestamp"),
        signature: header("svix-signature"),
    };

    match webhook_usecase
        .handle_identity_webhook(&delivery, &body)
        .await
    {
        Ok(_) => Json(json!({ "received": true })).into_response(),
        Err(err) => err.into_response(),
    }
}
