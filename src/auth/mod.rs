use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

/// Session token claims. `workspace` pins the session to one membership
/// when a user belongs to several workspaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<Uuid>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, workspace: Option<Uuid>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            workspace,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("JWT secret not configured")]
    InvalidSecret,

    #[error("JWT generation error: {0}")]
    Generation(String),

    #[error("Invalid session token: {0}")]
    Invalid(String),
}

pub fn issue_session_token(secret: &str, claims: &Claims) -> Result<String, TokenError> {
    if secret.is_empty() {
        return Err(TokenError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key).map_err(|e| TokenError::Generation(e.to_string()))
}

pub fn verify_session_token(secret: &str, token: &str) -> Result<Claims, TokenError> {
    if secret.is_empty() {
        return Err(TokenError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let token_data = decode::<Claims>(token, &decoding_key, &Validation::default())
        .map_err(|e| TokenError::Invalid(e.to_string()))?;

    Ok(token_data.claims)
}

/// A freshly minted API key. `plaintext` is shown to the caller once and never stored.
#[derive(Debug, Clone)]
pub struct GeneratedKey {
    pub plaintext: String,
    pub display_prefix: String,
    pub hash: String,
}

pub fn generate_api_key(prefix: &str) -> GeneratedKey {
    let secret = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
    let plaintext = format!("{}{}", prefix, secret);
    let display_prefix = plaintext.chars().take(prefix.len() + 8).collect();
    let hash = hash_api_key(&plaintext);

    GeneratedKey {
        plaintext,
        display_prefix,
        hash,
    }
}

/// SHA-256 hex digest; the only form in which keys are persisted
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_token_round_trip() {
        let claims = Claims::new(Uuid::new_v4(), Some(Uuid::new_v4()), Duration::hours(1));
        let token = issue_session_token("secret", &claims).unwrap();
        let decoded = verify_session_token("secret", &token).unwrap();
        assert_eq!(decoded, claims);
    }

    #[test]
    fn rejects_wrong_secret_and_expired_tokens() {
        let claims = Claims::new(Uuid::new_v4(), None, Duration::hours(1));
        let token = issue_session_token("secret", &claims).unwrap();
        assert!(matches!(verify_session_token("other", &token), Err(TokenError::Invalid(_))));

        let expired = Claims::new(Uuid::new_v4(), None, Duration::hours(-2));
        let token = issue_session_token("secret", &expired).unwrap();
        assert!(verify_session_token("secret", &token).is_err());
    }

    #[test]
    fn empty_secret_is_refused() {
        let claims = Claims::new(Uuid::new_v4(), None, Duration::hours(1));
        assert!(matches!(issue_session_token("", &claims), Err(TokenError::InvalidSecret)));
    }

    #[test]
    fn generated_keys_carry_prefix_and_stable_hash() {
        let key = generate_api_key("lg_");
        assert!(key.plaintext.starts_with("lg_"));
        assert_eq!(key.display_prefix.len(), 11);
        assert_eq!(key.hash, hash_api_key(&key.plaintext));
        assert_eq!(key.hash.len(), 64);
        assert_ne!(generate_api_key("lg_").plaintext, key.plaintext);
    }
}
