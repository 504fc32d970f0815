use anyhow::{Context, Result, bail};
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{
    application::interfaces::identity::IdentityWebhookVerifier,
    domain::value_objects::identity_events::{IdentityEvent, IdentityWebhookHeaders},
};

type HmacSha256 = Hmac<Sha256>;

const SECRET_PREFIX: &str = "whsec_";
pub const TIMESTAMP_TOLERANCE_SECONDS: i64 = 300;

/// Verifies identity-provider webhooks signed with the Svix scheme.
pub struct SvixVerifier {
    key: Vec<u8>,
}

impl SvixVerifier {
    /// `secret` is the dashboard value, with or without the `whsec_` prefix.
    pub fn new(secret: &str) -> Result<Self> {
        let encoded = secret.trim();
        let encoded = encoded.strip_prefix(SECRET_PREFIX).unwrap_or(encoded);
        let key = STANDARD
            .decode(encoded)
            .context("identity webhook secret is not valid base64")?;

        Ok(Self { key })
    }

    pub fn verify_at(
        &self,
        headers: &IdentityWebhookHeaders,
        payload: &[u8],
        now: i64,
    ) -> Result<IdentityEvent> {
        if headers.id.is_empty() || headers.timestamp.is_empty() || headers.signature.is_empty() {
            bail!("missing svix headers");
        }

        let issued_at: i64 = headers
            .timestamp
            .trim()
            .parse()
            .context("non-numeric svix-timestamp")?;
        if (now - issued_at).abs() > TIMESTAMP_TOLERANCE_SECONDS {
            bail!("svix-timestamp outside tolerance");
        }

        let mut mac = HmacSha256::new_from_slice(&self.key)?;
        mac.update(headers.id.as_bytes());
        mac.update(b".");
        mac.update(headers.timestamp.trim().as_bytes());
        mac.update(b".");
        mac.update(payload);

        // `v1,<base64> v1,<base64>`; other versions are skipped.
        let matched = headers
            .signature
            .split_whitespace()
            .filter_map(|entry| entry.split_once(','))
            .filter(|(version, _)| *version == "v1")
            .filter_map(|(_, signature)| STANDARD.decode(signature).ok())
            .any(|provided| mac.clone().verify_slice(&provided).is_ok());
        if !matched {
            bail!("no matching svix signature");
        }

        let event: IdentityEvent = serde_json::from_slice(payload)?;
        Ok(event)
    }
}

impl IdentityWebhookVerifier for SvixVerifier {
    fn verify(&self, headers: &IdentityWebhookHeaders, payload: &[u8]) -> Result<IdentityEvent> {
        self.verify_at(headers, payload, Utc::now().timestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn secret() -> String {
        format!("whsec_{}", STANDARD.encode(b"identity-signing-key"))
    }

    fn signed_headers(payload: &[u8], timestamp: i64) -> IdentityWebhookHeaders {
        let mut mac = HmacSha256::new_from_slice(b"identity-signing-key").unwrap();
        mac.update(format!("msg_1.{timestamp}.").as_bytes());
        mac.update(payload);
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        IdentityWebhookHeaders {
            id: "msg_1".to_string(),
            timestamp: timestamp.to_string(),
            signature: format!("v1,{signature}"),
        }
    }

    const PAYLOAD: &[u8] = br#"{"type":"user.created","data":{"id":"user_123"}}"#;

    #[test]
    fn accepts_a_valid_delivery() {
        let verifier = SvixVerifier::new(&secret()).unwrap();

        let event = verifier
            .verify_at(&signed_headers(PAYLOAD, NOW), PAYLOAD, NOW)
            .unwrap();
        assert_eq!(event.subject_id(), Some("user_123"));
    }

    #[test]
    fn any_listed_signature_may_match() {
        let verifier = SvixVerifier::new(&secret()).unwrap();
        let mut headers = signed_headers(PAYLOAD, NOW);
        headers.signature = format!("v1,AAAA v2,ignored {}", headers.signature);

        assert!(verifier.verify_at(&headers, PAYLOAD, NOW).is_ok());
    }

    #[test]
    fn rejects_wrong_secret_and_tampered_body() {
        let other = SvixVerifier::new(&format!("whsec_{}", STANDARD.encode(b"other"))).unwrap();
        assert!(
            other
                .verify_at(&signed_headers(PAYLOAD, NOW), PAYLOAD, NOW)
                .is_err()
        );

        let verifier = SvixVerifier::new(&secret()).unwrap();
        let tampered = br#"{"type":"user.created","data":{"id":"user_999"}}"#;
        assert!(
            verifier
                .verify_at(&signed_headers(PAYLOAD, NOW), tampered, NOW)
                .is_err()
        );
    }

    #[test]
    fn rejects_timestamps_outside_tolerance() {
        let verifier = SvixVerifier::new(&secret()).unwrap();
        let headers = signed_headers(PAYLOAD, NOW);

        assert!(verifier.verify_at(&headers, PAYLOAD, NOW + 301).is_err());
        assert!(verifier.verify_at(&headers, PAYLOAD, NOW - 301).is_err());
    }

    #[test]
    fn rejects_a_secret_that_is_not_base64() {
        assert!(SvixVerifier::new("whsec_***").is_err());
    }
}
