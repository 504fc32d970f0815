use std::collections::HashMap;

use anyhow::{Context, Result, bail};

use super::token_ledger::MAX_CREDIT_AMOUNT;

pub const DEFAULT_TOKEN_GRANT: i32 = 100;

/// Tokens credited per Stripe price, on first checkout and on every renewal.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenGrants {
    default_grant: i32,
    per_price: HashMap<String, i32>,
}

impl Default for TokenGrants {
    fn default() -> Self {
        Self {
            default_grant: DEFAULT_TOKEN_GRANT,
            per_price: HashMap::new(),
        }
    }
}

impl TokenGrants {
    pub fn new(default_grant: i32, per_price: HashMap<String, i32>) -> Self {
        Self {
            default_grant,
            per_price,
        }
    }

    /// Parses `price_a=100,price_b=500`. Blank input yields no overrides.
    /// Every amount must be a credit the ledger accepts.
    pub fn parse(default_grant: i32, raw: &str) -> Result<Self> {
        check_amount("default", default_grant)?;
        let mut per_price = HashMap::new();

        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (price_id, amount) = entry
                .split_once('=')
                .with_context(|| format!("token grant `{entry}` must look like price_id=amount"))?;
            let price_id = price_id.trim();
            if price_id.is_empty() {
                bail!("token grant `{entry}` has an empty price id");
            }
            let amount: i32 = amount
                .trim()
                .parse()
                .with_context(|| format!("token grant `{entry}` has a non-numeric amount"))?;
            check_amount(price_id, amount)?;
            per_price.insert(price_id.to_string(), amount);
        }

        Ok(Self::new(default_grant, per_price))
    }

    pub fn grant_for(&self, price_id: &str) -> i32 {
        self.per_price
            .get(price_id)
            .copied()
            .unwrap_or(self.default_grant)
    }
}

fn check_amount(price_id: &str, amount: i32) -> Result<()> {
    if !(1..=MAX_CREDIT_AMOUNT).contains(&amount) {
        bail!("token grant for `{price_id}` must be between 1 and {MAX_CREDIT_AMOUNT}, got {amount}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_price_falls_back_to_default() {
        let grants = TokenGrants::default();
        assert_eq!(grants.grant_for("price_anything"), DEFAULT_TOKEN_GRANT);
    }

    #[test]
    fn parses_per_price_overrides() {
        let grants = TokenGrants::parse(100, " price_basic=100, price_pro=500 ,").unwrap();
        assert_eq!(grants.grant_for("price_pro"), 500);
        assert_eq!(grants.grant_for("price_basic"), 100);
        assert_eq!(grants.grant_for("price_other"), 100);
    }

    #[test]
    fn rejects_malformed_entries() {
        assert!(TokenGrants::parse(100, "price_pro").is_err());
        assert!(TokenGrants::parse(100, "=5").is_err());
        assert!(TokenGrants::parse(100, "price_pro=lots").is_err());
        assert!(TokenGrants::parse(100, "price_pro=0").is_err());
        assert!(TokenGrants::parse(100, "price_pro=10001").is_err());
        assert!(TokenGrants::parse(0, "").is_err());
    }
}
