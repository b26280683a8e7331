// common/src/utils.rs
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Setup tracing for consistent logging across the workspace
pub fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Claims the dashboard reads from the auth service's bearer token
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed bearer token: {0}")]
    Malformed(#[from] jsonwebtoken::errors::Error),
    #[error("token expiry {0} is out of range")]
    InvalidExpiry(i64),
}

/// Read the expiry claim of a bearer token.
///
/// The signing key belongs to the auth service, so the signature is not
/// checked here. Expired tokens are returned as-is; the caller decides.
pub fn token_expiry(token: &str) -> Result<DateTime<Utc>, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;

    let data = decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)?;

    DateTime::<Utc>::from_timestamp(data.claims.exp, 0)
        .ok_or(TokenError::InvalidExpiry(data.claims.exp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token_with_exp(exp: i64) -> String {
        encode(
            &Header::default(),
            &TokenClaims { exp },
            &EncodingKey::from_secret(b"auth-service-secret"),
        )
        .unwrap()
    }

    #[test]
    fn test_token_expiry_reads_claim() {
        let token = token_with_exp(1_900_000_000);
        let expiry = token_expiry(&token).unwrap();
        assert_eq!(expiry.timestamp(), 1_900_000_000);
    }

    #[test]
    fn test_expired_token_still_decodes() {
        let token = token_with_exp(1_000);
        assert_eq!(token_expiry(&token).unwrap().timestamp(), 1_000);
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(matches!(token_expiry("not-a-jwt"), Err(TokenError::Malformed(_))));
    }
}
