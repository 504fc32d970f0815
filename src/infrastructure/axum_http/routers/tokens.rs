use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use tracing::info;

use crate::{
    application::usecases::token_ledger::TokenLedgerUseCase,
    domain::{
        repositories::{
            user_contents::UserContentRepository, user_subscriptions::UserSubscriptionRepository,
        },
        value_objects::token_ledger::TokenBalanceDto,
    },
    infrastructure::{
        axum_http::auth::AuthUser,
        postgres::{
            postgres_connection::PgPoolSquad,
            repositories::{
                user_contents::UserContentPostgres, user_subscriptions::UserSubscriptionPostgres,
            },
        },
    },
};

pub fn routes(db_pool: Arc<PgPoolSquad>) -> Router {
    let subscription_repository = UserSubscriptionPostgres::new(Arc::clone(&db_pool));
    let content_repository = UserContentPostgres::new(Arc::clone(&db_pool));
    let ledger = TokenLedgerUseCase::new(
        Arc::new(subscription_repository),
        Arc::new(content_repository),
    );

    Router::new()
        .route("/", get(get_balance))
        .route("/init", post(init_balance))
        .with_state(Arc::new(ledger))
}

pub async fn get_balance<S, C>(
    State(ledger): State<Arc<TokenLedgerUseCase<S, C>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    S: UserSubscriptionRepository + Send + Sync + 'static,
    C: UserContentRepository + Send + Sync + 'static,
{
    match ledger.balance_or_provision(&user_id).await {
        Ok(token_count) => Json(TokenBalanceDto { token_count }).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn init_balance<S, C>(
    State(ledger): State<Arc<TokenLedgerUseCase<S, C>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    S: UserSubscriptionRepository + Send + Sync + 'static,
    C: UserContentRepository + Send + Sync + 'static,
{
    info!(%user_id, "tokens: init requested");
    match ledger.provision(&user_id).await {
        Ok(subscription) => Json(TokenBalanceDto {
            token_count: subscription.token,
        })
        .into_response(),
        Err(err) => err.into_response(),
    }
}
