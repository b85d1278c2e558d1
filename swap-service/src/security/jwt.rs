/// JWT token generation and validation using HS256.
/// A single bearer token carries the user id and role.
use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Role: "user" or "admin"
    pub role: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

// Thread-safe storage for JWT keys loaded from configuration
lazy_static! {
    static ref JWT_KEYS: RwLock<Option<(EncodingKey, DecodingKey)>> = RwLock::new(None);
}

/// Initialize JWT keys from the shared secret.
/// Must be called during application startup before any JWT operations.
pub fn initialize_keys(secret: &str) -> Result<()> {
    if secret.len() < 32 {
        return Err(anyhow!("JWT secret must be at least 32 bytes"));
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());

    let mut keys = JWT_KEYS
        .write()
        .map_err(|e| anyhow!("Failed to acquire write lock on JWT keys: {}", e))?;
    *keys = Some((encoding_key, decoding_key));

    Ok(())
}

fn get_encoding_key() -> Result<EncodingKey> {
    let keys = JWT_KEYS
        .read()
        .map_err(|e| anyhow!("Failed to acquire read lock on JWT keys: {}", e))?;

    keys.as_ref()
        .map(|(enc, _)| enc.clone())
        .ok_or_else(|| anyhow!("JWT keys not initialized. Call initialize_keys() during startup"))
}

fn get_decoding_key() -> Result<DecodingKey> {
    let keys = JWT_KEYS
        .read()
        .map_err(|e| anyhow!("Failed to acquire read lock on JWT keys: {}", e))?;

    keys.as_ref()
        .map(|(_, dec)| dec.clone())
        .ok_or_else(|| anyhow!("JWT keys not initialized. Call initialize_keys() during startup"))
}

/// Generate a bearer token for the given user.
pub fn generate_token(user_id: Uuid, role: &str, ttl_secs: i64) -> Result<String> {
    let now = Utc::now();
    let expiry = now + Duration::seconds(ttl_secs);

    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_string(),
        iat: now.timestamp(),
        exp: expiry.timestamp(),
    };

    let encoding_key = get_encoding_key()?;
    encode(
        &Header::new(jsonwebtoken::Algorithm::HS256),
        &claims,
        &encoding_key,
    )
    .map_err(|e| anyhow!("Failed to generate token: {}", e))
}

/// Validate and decode a token.
pub fn validate_token(token: &str) -> Result<TokenData<Claims>> {
    let decoding_key = get_decoding_key()?;
    decode::<Claims>(
        token,
        &decoding_key,
        &Validation::new(jsonwebtoken::Algorithm::HS256),
    )
    .map_err(|e| anyhow!("Token validation failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "test-secret-for-unit-tests-0123456789abcdef";

    fn init() {
        initialize_keys(TEST_SECRET).expect("Failed to initialize test keys");
    }

    #[test]
    fn test_generate_token() {
        init();
        let user_id = Uuid::new_v4();

        let token = generate_token(user_id, "user", 3600);
        assert!(token.is_ok());

        let token_str = token.unwrap();
        assert!(!token_str.is_empty());
        // JWT tokens have 3 parts separated by dots
        assert_eq!(token_str.matches('.').count(), 2);
    }

    #[test]
    fn test_validate_valid_token() {
        init();
        let user_id = Uuid::new_v4();

        let token = generate_token(user_id, "admin", 3600).expect("Failed to generate token");

        let validation = validate_token(&token);
        assert!(validation.is_ok());

        let token_data = validation.unwrap();
        assert_eq!(token_data.claims.sub, user_id.to_string());
        assert_eq!(token_data.claims.role, "admin");
    }

    #[test]
    fn test_validate_invalid_token() {
        init();
        let result = validate_token("not.a.valid.token");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_corrupted_token() {
        init();
        let corrupted = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.corrupted.signature";
        let result = validate_token(corrupted);
        assert!(result.is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        init();
        let user_id = Uuid::new_v4();

        let token = generate_token(user_id, "user", -3600).expect("Failed to generate token");

        let result = validate_token(&token);
        assert!(result.is_err());
    }

    #[test]
    fn test_short_secret_rejected() {
        let result = initialize_keys("too-short");
        assert!(result.is_err());
    }

    #[test]
    fn test_token_contains_all_required_claims() {
        init();
        let user_id = Uuid::new_v4();

        let token = generate_token(user_id, "user", 3600).expect("Failed to generate token");

        let claims = validate_token(&token).expect("Failed to validate token").claims;
        assert!(!claims.sub.is_empty());
        assert!(claims.iat > 0);
        assert!(claims.exp > claims.iat);
        assert_eq!(claims.role, "user");
    }
}
