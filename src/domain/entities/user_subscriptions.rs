use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::infrastructure::postgres::schema::user_subscriptions;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = user_subscriptions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserSubscriptionEntity {
    pub id: i32,
    pub user_id: String,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_subscription_price_id: Option<String>,
    pub stripe_subscription_status: Option<String>,
    pub stripe_subscription_current_period_end: Option<i64>,
    pub token: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row inserted by provisioning or by the first metadata upsert. `token` is left
/// to the column default.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = user_subscriptions)]
pub struct InsertUserSubscriptionEntity {
    pub user_id: String,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_subscription_price_id: Option<String>,
    pub stripe_subscription_status: Option<String>,
    pub stripe_subscription_current_period_end: Option<i64>,
}

/// Billing fields only. `None` leaves the stored value untouched.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = user_subscriptions)]
pub struct UserSubscriptionMetadataChangeset {
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_subscription_price_id: Option<String>,
    pub stripe_subscription_status: Option<String>,
    pub stripe_subscription_current_period_end: Option<i64>,
    pub updated_at: DateTime<Utc>,
}
