pub mod axum_http;
pub mod identity;
pub mod payments;
pub mod postgres;
