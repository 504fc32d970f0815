use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::application::usecases::{
    billing::BillingError, identity_webhook::IdentityWebhookError, stripe_webhook::WebhookError,
    token_ledger::LedgerError,
};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let message = if status.is_server_error() {
        // Internal detail stays in the logs.
        "Internal server error".to_string()
    } else {
        message.into()
    };

    let body = Json(ErrorResponse {
        code: status.as_u16(),
        message,
    });

    (status, body).into_response()
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        error_response(self.status_code(), self.to_string())
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        error_response(self.status_code(), self.to_string())
    }
}

impl IntoResponse for IdentityWebhookError {
    fn into_response(self) -> Response {
        error_response(self.status_code(), self.to_string())
    }
}

impl IntoResponse for BillingError {
    fn into_response(self) -> Response {
        error_response(self.status_code(), self.to_string())
    }
}
