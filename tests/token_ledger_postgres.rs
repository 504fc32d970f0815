//! Runs against a throwaway database named by `TEST_DATABASE_URL`; skipped when unset.
//! The schema is dropped and recreated once per run.

use std::sync::{
    Arc, OnceLock,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use anyhow::bail;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use diesel::{RunQueryDsl, connection::SimpleConnection, prelude::*};
use serde_json::json;
use token_dash::{
    application::{
        interfaces::payments::MockStripeGateway,
        usecases::{
            stripe_webhook::{
                INVOICE_PAYMENT_SUCCEEDED, StripeWebhookUseCase, WebhookError, WebhookOutcome,
            },
            token_ledger::{LedgerError, TokenLedgerUseCase},
        },
    },
    domain::{
        entities::webhook_events::{InsertWebhookEventEntity, WebhookEventEntity},
        repositories::webhook_events::WebhookEventRepository,
        value_objects::{
            enums::webhook_event_statuses::WebhookEventStatus,
            stripe::StripeEvent,
            token_grants::TokenGrants,
            token_ledger::SubscriptionMetadataModel,
            webhook_events::WebhookClaim,
        },
    },
    infrastructure::postgres::{
        postgres_connection::{PgPoolSquad, establish_connection},
        repositories::{
            user_contents::UserContentPostgres, user_subscriptions::UserSubscriptionPostgres,
            webhook_events::WebhookEventPostgres,
        },
        schema::{user_contents, user_subscriptions, webhook_events},
    },
};

type Ledger = TokenLedgerUseCase<UserSubscriptionPostgres, UserContentPostgres>;

static POOL: OnceLock<Option<Arc<PgPoolSquad>>> = OnceLock::new();
static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

fn pool() -> Option<Arc<PgPoolSquad>> {
    POOL.get_or_init(|| {
        dotenvy::dotenv().ok();
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let pool = establish_connection(&url).expect("test database must be reachable");

        let mut conn = pool.get().expect("test connection");
        conn.batch_execute(include_str!(
            "../migrations/2025-01-01-000000_create_token_ledger/down.sql"
        ))
        .expect("drop schema");
        conn.batch_execute(include_str!(
            "../migrations/2025-01-01-000000_create_token_ledger/up.sql"
        ))
        .expect("create schema");

        Some(Arc::new(pool))
    })
    .clone()
}

fn unique(prefix: &str) -> String {
    format!(
        "{prefix}_{}_{}",
        Utc::now().timestamp_micros(),
        NEXT_ID.fetch_add(1, Ordering::SeqCst)
    )
}

fn ledger(pool: &Arc<PgPoolSquad>) -> Ledger {
    TokenLedgerUseCase::new(
        Arc::new(UserSubscriptionPostgres::new(Arc::clone(pool))),
        Arc::new(UserContentPostgres::new(Arc::clone(pool))),
    )
}

fn set_balance(pool: &Arc<PgPoolSquad>, user_id: &str, token: i32) {
    let mut conn = pool.get().unwrap();
    diesel::update(user_subscriptions::table.filter(user_subscriptions::user_id.eq(user_id)))
        .set(user_subscriptions::token.eq(token))
        .execute(&mut conn)
        .unwrap();
}

fn content_count(pool: &Arc<PgPoolSquad>, user_id: &str) -> i64 {
    let mut conn = pool.get().unwrap();
    user_contents::table
        .filter(user_contents::user_id.eq(user_id))
        .count()
        .get_result(&mut conn)
        .unwrap()
}

#[tokio::test]
async fn new_user_scenario() {
    let Some(pool) = pool() else { return };
    let ledger = ledger(&pool);
    let user_id = unique("U1");

    ledger.provision(&user_id).await.unwrap();
    assert_eq!(ledger.get_balance(&user_id).await.unwrap(), 10);

    let (content, remaining) = ledger
        .debit_and_create_content(&user_id, "hello", "Ada Lovelace")
        .await
        .unwrap();
    assert_eq!(content.content, "hello");
    assert_eq!(content.user_id, user_id);
    assert_eq!(remaining, 9);
    assert_eq!(ledger.get_balance(&user_id).await.unwrap(), 9);
    assert_eq!(content_count(&pool, &user_id), 1);
}

#[tokio::test]
async fn provision_twice_keeps_one_row() {
    let Some(pool) = pool() else { return };
    let ledger = ledger(&pool);
    let user_id = unique("prov");

    let first = ledger.provision(&user_id).await.unwrap();
    set_balance(&pool, &user_id, 4);
    let second = ledger.provision(&user_id).await.unwrap();

    assert_eq!(first.token, 10);
    assert_eq!(first.id, second.id);
    assert_eq!(second.token, 4);
}

#[tokio::test]
async fn empty_balance_refuses_without_writing_content() {
    let Some(pool) = pool() else { return };
    let ledger = ledger(&pool);
    let user_id = unique("empty");

    ledger.provision(&user_id).await.unwrap();
    set_balance(&pool, &user_id, 0);

    let err = ledger
        .debit_and_create_content(&user_id, "hello", "Ada")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientTokens));
    assert_eq!(content_count(&pool, &user_id), 0);
    assert_eq!(ledger.get_balance(&user_id).await.unwrap(), 0);
}

#[tokio::test]
async fn unprovisioned_debit_is_distinct_from_empty_balance() {
    let Some(pool) = pool() else { return };
    let ledger = ledger(&pool);

    let err = ledger
        .debit_and_create_content(&unique("ghost"), "hello", "Ada")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotProvisioned));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_debits_on_last_token_admit_exactly_one() {
    let Some(pool) = pool() else { return };
    let ledger = Arc::new(ledger(&pool));
    let user_id = unique("race");

    ledger.provision(&user_id).await.unwrap();
    set_balance(&pool, &user_id, 1);

    let handles: Vec<_> = (0..2)
        .map(|i| {
            let ledger = Arc::clone(&ledger);
            let user_id = user_id.clone();
            tokio::spawn(async move {
                ledger
                    .debit_and_create_content(&user_id, &format!("attempt {i}"), "Ada")
                    .await
            })
        })
        .collect();

    let mut succeeded = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(LedgerError::InsufficientTokens) => refused += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!((succeeded, refused), (1, 1));
    assert_eq!(ledger.get_balance(&user_id).await.unwrap(), 0);
    assert_eq!(content_count(&pool, &user_id), 1);
}

#[tokio::test]
async fn credit_clamps_at_the_ceiling() {
    let Some(pool) = pool() else { return };
    let ledger = ledger(&pool);
    let user_id = unique("clamp");

    ledger.provision(&user_id).await.unwrap();
    set_balance(&pool, &user_id, 99_995);

    let subscription = ledger.credit_tokens(&user_id, 10).await.unwrap();
    assert_eq!(subscription.token, 100_000);
}

#[tokio::test]
async fn metadata_upsert_creates_then_updates() {
    let Some(pool) = pool() else { return };
    let ledger = ledger(&pool);
    let user_id = unique("U2");
    let customer_id = unique("cus");

    let created = ledger
        .upsert_subscription_metadata(
            &user_id,
            SubscriptionMetadataModel {
                stripe_customer_id: Some(customer_id.clone()),
                stripe_subscription_id: Some("sub_1".to_string()),
                stripe_subscription_price_id: Some("price_pro".to_string()),
                stripe_subscription_status: Some("active".to_string()),
                stripe_subscription_current_period_end: Some(1_702_592_000),
            },
        )
        .await
        .unwrap();
    assert_eq!(created.token, 10);

    let updated = ledger
        .upsert_subscription_metadata(
            &user_id,
            SubscriptionMetadataModel {
                stripe_subscription_status: Some("past_due".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.stripe_customer_id.as_deref(), Some(customer_id.as_str()));
    assert_eq!(updated.stripe_subscription_status.as_deref(), Some("past_due"));

    let by_customer = ledger
        .find_subscription_by_customer(&customer_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_customer.user_id, user_id);

    ledger.delete_subscription(&user_id).await.unwrap();
    assert!(matches!(
        ledger.get_balance(&user_id).await,
        Err(LedgerError::NotProvisioned)
    ));
}

#[tokio::test]
async fn foreign_content_is_not_deleted() {
    let Some(pool) = pool() else { return };
    let ledger = ledger(&pool);
    let owner = unique("U4");
    let intruder = unique("U3");

    ledger.provision(&owner).await.unwrap();
    let (content, _) = ledger
        .debit_and_create_content(&owner, "mine", "Owner")
        .await
        .unwrap();

    let err = ledger.delete_content(content.id, &intruder).await.unwrap_err();
    assert!(matches!(err, LedgerError::ContentNotFound));
    assert_eq!(content_count(&pool, &owner), 1);

    let deleted = ledger.delete_content(content.id, &owner).await.unwrap();
    assert_eq!(deleted.id, content.id);
    assert_eq!(content_count(&pool, &owner), 0);
}

#[tokio::test]
async fn content_is_listed_newest_first() {
    let Some(pool) = pool() else { return };
    let ledger = ledger(&pool);
    let user_id = unique("list");

    ledger.provision(&user_id).await.unwrap();
    for content in ["first", "second", "third"] {
        ledger
            .debit_and_create_content(&user_id, content, "Ada")
            .await
            .unwrap();
    }

    let listed: Vec<_> = ledger
        .list_content(&user_id)
        .await
        .unwrap()
        .into_iter()
        .map(|content| content.content)
        .collect();
    assert_eq!(listed, vec!["third", "second", "first"]);
}

#[tokio::test]
async fn webhook_claim_lifecycle() {
    let Some(pool) = pool() else { return };
    let webhook_repo = WebhookEventPostgres::new(Arc::clone(&pool));
    let event_id = unique("evt");
    let now = Utc::now();
    let event = InsertWebhookEventEntity {
        id: event_id.clone(),
        event_type: "checkout.session.completed".to_string(),
        status: WebhookEventStatus::Processing.to_string(),
        metadata: None,
        claimed_at: now,
    };

    assert_eq!(
        webhook_repo.claim(event.clone()).await.unwrap(),
        WebhookClaim::Claimed
    );
    assert_eq!(
        webhook_repo.claim(event.clone()).await.unwrap(),
        WebhookClaim::Duplicate(WebhookEventStatus::Processing)
    );

    webhook_repo.mark_failed(&event_id).await.unwrap();
    assert_eq!(
        webhook_repo.claim(event.clone()).await.unwrap(),
        WebhookClaim::Reclaimed
    );

    webhook_repo.backfill_user_id(&event_id, "U2").await.unwrap();
    webhook_repo.mark_processed(&event_id).await.unwrap();

    let stored: WebhookEventEntity = {
        let mut conn = pool.get().unwrap();
        webhook_events::table
            .find(&event_id)
            .select(WebhookEventEntity::as_select())
            .first(&mut conn)
            .unwrap()
    };
    assert_eq!(stored.user_id.as_deref(), Some("U2"));
    assert_eq!(stored.status, WebhookEventStatus::Processed.to_string());
    assert!(stored.processed_at.is_some());
    assert_eq!(
        webhook_repo.claim(event.clone()).await.unwrap(),
        WebhookClaim::Duplicate(WebhookEventStatus::Processed)
    );

    // An unfinished `processing` row is never taken over, however old.
    let stuck_id = unique("evt_stuck");
    let stuck = InsertWebhookEventEntity {
        id: stuck_id,
        claimed_at: now - Duration::seconds(3600),
        ..event
    };
    assert_eq!(
        webhook_repo.claim(stuck.clone()).await.unwrap(),
        WebhookClaim::Claimed
    );
    assert_eq!(
        webhook_repo
            .claim(InsertWebhookEventEntity {
                claimed_at: now,
                ..stuck
            })
            .await
            .unwrap(),
        WebhookClaim::Duplicate(WebhookEventStatus::Processing)
    );
}

/// Postgres event store whose next `mark_processed` fails, as when the
/// connection drops right after the ledger effects commit.
struct LosesNextCompletion {
    inner: WebhookEventPostgres,
    fail_next: AtomicBool,
}

#[async_trait]
impl WebhookEventRepository for LosesNextCompletion {
    async fn claim(&self, event: InsertWebhookEventEntity) -> anyhow::Result<WebhookClaim> {
        self.inner.claim(event).await
    }

    async fn backfill_user_id(&self, event_id: &str, user_id: &str) -> anyhow::Result<()> {
        self.inner.backfill_user_id(event_id, user_id).await
    }

    async fn mark_processed(&self, event_id: &str) -> anyhow::Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            bail!("connection reset");
        }
        self.inner.mark_processed(event_id).await
    }

    async fn mark_failed(&self, event_id: &str) -> anyhow::Result<()> {
        self.inner.mark_failed(event_id).await
    }
}

#[tokio::test]
async fn renewal_credited_but_not_recorded_is_never_credited_again() {
    let Some(pool) = pool() else { return };
    let ledger = Arc::new(ledger(&pool));
    let user_id = unique("renew");
    let event_id = unique("evt_renew");

    ledger.provision(&user_id).await.unwrap();

    let mut gateway = MockStripeGateway::new();
    let event: StripeEvent = serde_json::from_value(json!({
        "id": event_id,
        "type": INVOICE_PAYMENT_SUCCEEDED,
        "created": 1_700_000_000,
        "livemode": false,
        "data": { "object": {
            "id": "in_1",
            "customer": "cus_renew",
            "billing_reason": "subscription_cycle",
            "subscription": "sub_renew"
        } }
    }))
    .unwrap();
    gateway
        .expect_verify_webhook_signature()
        .returning(move |_, _| Ok(event.clone()));
    gateway.expect_retrieve_subscription().returning(|_| {
        Ok(serde_json::from_value(json!({
            "id": "sub_renew",
            "customer": "cus_renew",
            "status": "active",
            "items": { "data": [{ "price": { "id": "price_pro" } }] }
        }))
        .unwrap())
    });
    let customer_user_id = user_id.clone();
    gateway.expect_retrieve_customer().returning(move |_| {
        Ok(serde_json::from_value(json!({
            "id": "cus_renew",
            "metadata": { "userId": customer_user_id }
        }))
        .unwrap())
    });

    let usecase = StripeWebhookUseCase::new(
        Arc::clone(&ledger),
        Arc::new(LosesNextCompletion {
            inner: WebhookEventPostgres::new(Arc::clone(&pool)),
            fail_next: AtomicBool::new(true),
        }),
        Arc::new(gateway),
        TokenGrants::default(),
    );

    let first = usecase.handle_stripe_webhook(b"{}", "sig").await;
    assert!(matches!(first, Err(WebhookError::Store(_))));
    assert_eq!(ledger.get_balance(&user_id).await.unwrap(), 110);

    {
        let mut conn = pool.get().unwrap();
        diesel::update(webhook_events::table.find(&event_id))
            .set(webhook_events::claimed_at.eq(Utc::now() - Duration::seconds(400)))
            .execute(&mut conn)
            .unwrap();
    }

    let replay = usecase.handle_stripe_webhook(b"{}", "sig").await.unwrap();
    assert_eq!(
        replay,
        WebhookOutcome::Duplicate(WebhookEventStatus::Processing)
    );
    assert_eq!(ledger.get_balance(&user_id).await.unwrap(), 110);
}
