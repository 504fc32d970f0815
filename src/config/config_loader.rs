use anyhow::{Context, Result};

use crate::domain::value_objects::token_grants::{DEFAULT_TOKEN_GRANT, TokenGrants};

use super::config_model::{Database, DotEnvyConfig, Identity, Ledger, Server, Stripe};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let server = Server {
        port: required("SERVER_PORT")?
            .parse()
            .context("SERVER_PORT is invalid")?,
        body_limit: required("SERVER_BODY_LIMIT")?
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: required("SERVER_TIMEOUT")?
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
    };

    let stripe = Stripe {
        secret_key: required("STRIPE_SECRET_KEY")?,
        webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
        base_url: required("BASE_URL")?,
    };

    let identity = Identity {
        jwt_secret: get_identity_jwt_secret()?,
        webhook_secret: required("IDENTITY_WEBHOOK_SECRET")?,
    };

    let default_grant = match optional("TOKEN_GRANT_DEFAULT") {
        Some(raw) => raw.parse().context("TOKEN_GRANT_DEFAULT is invalid")?,
        None => DEFAULT_TOKEN_GRANT,
    };
    let token_grants = TokenGrants::parse(default_grant, &optional("TOKEN_GRANTS").unwrap_or_default())
        .context("TOKEN_GRANTS is invalid")?;

    Ok(DotEnvyConfig {
        server,
        database,
        stripe,
        identity,
        ledger: Ledger { token_grants },
    })
}

/// HS256 secret for bearer tokens issued by the identity provider.
pub fn get_identity_jwt_secret() -> Result<String> {
    dotenvy::dotenv().ok();

    required("IDENTITY_JWT_SECRET")
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} is invalid"))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
