use crate::domain::value_objects::token_grants::TokenGrants;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub server: Server,
    pub database: Database,
    pub stripe: Stripe,
    pub identity: Identity,
    pub ledger: Ledger,
}

#[derive(Debug, Clone)]
pub struct Server {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Stripe {
    pub secret_key: String,
    pub webhook_secret: String,
    pub base_url: String,
}

impl Stripe {
    pub fn success_url(&self) -> String {
        format!("{}/dashboard/billing?success=true", self.base_url.trim_end_matches('/'))
    }

    pub fn cancel_url(&self) -> String {
        format!("{}/dashboard/billing?canceled=true", self.base_url.trim_end_matches('/'))
    }

    pub fn portal_return_url(&self) -> String {
        format!("{}/dashboard/billing", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone)]
pub struct Identity {
    pub jwt_secret: String,
    pub webhook_secret: String,
}

#[derive(Debug, Clone)]
pub struct Ledger {
    pub token_grants: TokenGrants,
}
