use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};
use tracing::info;

use crate::{
    application::usecases::token_ledger::{TokenLedgerUseCase, content_from_json},
    domain::{
        repositories::{
            user_contents::UserContentRepository, user_subscriptions::UserSubscriptionRepository,
        },
        value_objects::token_ledger::{
            ContentListDto, CreateContentRequest, CreatedContentDto, DeletedContentDto,
        },
    },
    infrastructure::{
        axum_http::{auth::AuthUser, error_responses::error_response},
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
        .route("/", get(list_contents).post(create_content))
        .route("/:id", delete(delete_content))
        .with_state(Arc::new(ledger))
}

pub async fn create_content<S, C>(
    State(ledger): State<Arc<TokenLedgerUseCase<S, C>>>,
    auth: AuthUser,
    Json(request): Json<CreateContentRequest>,
) -> impl IntoResponse
where
    S: UserSubscriptionRepository + Send + Sync + 'static,
    C: UserContentRepository + Send + Sync + 'static,
{
    let content = match content_from_json(request.content) {
        Ok(content) => content,
        Err(err) => return err.into_response(),
    };

    match ledger
        .debit_and_create_content(&auth.user_id, &content, &auth.display_name())
        .await
    {
        Ok((content, remaining_tokens)) => Json(CreatedContentDto {
            success: true,
            content,
            remaining_tokens,
        })
        .into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn list_contents<S, C>(
    State(ledger): State<Arc<TokenLedgerUseCase<S, C>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    S: UserSubscriptionRepository + Send + Sync + 'static,
    C: UserContentRepository + Send + Sync + 'static,
{
    match ledger.list_content(&user_id).await {
        Ok(content) => Json(ContentListDto { content }).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn delete_content<S, C>(
    State(ledger): State<Arc<TokenLedgerUseCase<S, C>>>,
    AuthUser { user_id, .. }: AuthUser,
    Path(raw_id): Path<String>,
) -> impl IntoResponse
where
    S: UserSubscriptionRepository + Send + Sync + 'static,
    C: UserContentRepository + Send + Sync + 'static,
{
    let Ok(content_id) = raw_id.trim().parse::<i32>() else {
        info!(%user_id, %raw_id, "contents: non-numeric content id");
        return error_response(StatusCode::BAD_REQUEST, "Invalid content ID");
    };

    match ledger.delete_content(content_id, &user_id).await {
        Ok(deleted_content) => Json(DeletedContentDto {
            success: true,
            deleted_content,
        })
        .into_response(),
        Err(err) => err.into_response(),
    }
}
