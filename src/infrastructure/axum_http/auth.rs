use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::config_loader;

use super::error_responses::error_response;

pub const UNKNOWN_USER: &str = "Unknown User";

/// Session token claims issued by the identity provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sub: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub exp: usize,
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

impl AuthUser {
    /// Author label stored on new content.
    pub fn display_name(&self) -> String {
        let first = non_empty(self.first_name.as_deref());
        let last = non_empty(self.last_name.as_deref());

        match (first, last) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            _ => non_empty(self.email.as_deref())
                .unwrap_or(UNKNOWN_USER)
                .to_string(),
        }
    }

    pub fn email(&self) -> Option<&str> {
        non_empty(self.email.as_deref())
    }
}

impl From<IdentityClaims> for AuthUser {
    fn from(claims: IdentityClaims) -> Self {
        Self {
            user_id: claims.sub,
            first_name: claims.first_name,
            last_name: claims.last_name,
            email: claims.email,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn validate_identity_jwt(token: &str, secret: &str) -> anyhow::Result<IdentityClaims> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::new(Algorithm::HS256);

    let token_data = decode::<IdentityClaims>(token, &decoding_key, &validation)
        .map_err(|e| anyhow::anyhow!("JWT validation failed: {}", e))?;

    if token_data.claims.sub.trim().is_empty() {
        anyhow::bail!("JWT subject is empty");
    }

    Ok(token_data.claims)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "Unauthorized"))?;

        let token = auth_header
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                error_response(StatusCode::UNAUTHORIZED, "Invalid Authorization header")
            })?;

        let secret = config_loader::get_identity_jwt_secret().map_err(|err| {
            warn!(error = %err, "auth: identity jwt secret unavailable");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        })?;

        let claims = validate_identity_jwt(token, &secret).map_err(|err| {
            warn!(error = %err, "auth: bearer token rejected");
            error_response(StatusCode::UNAUTHORIZED, "Unauthorized")
        })?;

        Ok(AuthUser::from(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    const SECRET: &str = "identity-jwt-secret-for-unit-tests";

    fn token(sub: &str, exp: usize, secret: &str) -> String {
        let claims = IdentityClaims {
            sub: sub.to_string(),
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            email: Some("ada@example.com".to_string()),
            exp,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn user(first: Option<&str>, last: Option<&str>, email: Option<&str>) -> AuthUser {
        AuthUser {
            user_id: "user_1".to_string(),
            first_name: first.map(str::to_string),
            last_name: last.map(str::to_string),
            email: email.map(str::to_string),
        }
    }

    #[test]
    fn valid_token_yields_claims() {
        let claims = validate_identity_jwt(&token("user_1", 9_999_999_999, SECRET), SECRET).unwrap();
        assert_eq!(claims.sub, "user_1");
        assert_eq!(claims.email.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn expired_token_is_rejected() {
        assert!(validate_identity_jwt(&token("user_1", 1, SECRET), SECRET).is_err());
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        assert!(validate_identity_jwt(&token("user_1", 9_999_999_999, "wrongsecret"), SECRET).is_err());
    }

    #[test]
    fn empty_subject_is_rejected() {
        assert!(validate_identity_jwt(&token(" ", 9_999_999_999, SECRET), SECRET).is_err());
    }

    #[test]
    fn display_name_prefers_full_name_then_email() {
        assert_eq!(
            user(Some("Ada"), Some("Lovelace"), Some("ada@example.com")).display_name(),
            "Ada Lovelace"
        );
        assert_eq!(
            user(Some("Ada"), None, Some("ada@example.com")).display_name(),
            "ada@example.com"
        );
        assert_eq!(user(None, None, None).display_name(), UNKNOWN_USER);
    }
}
