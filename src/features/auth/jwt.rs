//! Access-token issuing/validation and refresh-token helpers.
//!
//! Access tokens are HS256-signed JWTs carrying [`AccessClaims`]. Refresh tokens
//! are opaque random strings; only their SHA-256 hash is stored in `sessions`.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::core::config::AuthConfig;
use crate::core::error::AppError;
use crate::features::auth::model::{AccessClaims, AuthenticatedUser};
use crate::features::users::models::UserRole;

/// Random bytes in a refresh token, hex-encoded on the wire
const REFRESH_TOKEN_BYTES: usize = 32;

/// A freshly signed access token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    /// Lifetime in seconds
    pub expires_in: i64,
}

pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expiry_mins: i64,
    refresh_token_expiry_days: i64,
}

impl JwtManager {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            access_token_expiry_mins: config.access_token_expiry_mins,
            refresh_token_expiry_days: config.refresh_token_expiry_days,
        }
    }

    pub fn issue_access_token(
        &self,
        user_id: Uuid,
        username: &str,
        role: UserRole,
    ) -> Result<IssuedToken, AppError> {
        let now = chrono::Utc::now().timestamp();
        let expires_in = self.access_token_expiry_mins * 60;

        let claims = AccessClaims {
            sub: user_id,
            username: username.to_string(),
            role,
            exp: now + expires_in,
            iat: now,
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign access token: {}", e)))?;

        Ok(IssuedToken { token, expires_in })
    }

    /// Validate signature and expiry, returning the embedded claims
    pub fn decode(&self, token: &str) -> Result<AccessClaims, jsonwebtoken::errors::Error> {
        let data = decode::<AccessClaims>(token, &self.decoding_key, &Validation::default())?;
        Ok(data.claims)
    }

    pub fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        self.decode(token).map(AuthenticatedUser::from).map_err(|e| {
            tracing::debug!("Rejected access token: {}", e);
            AppError::Unauthorized("Invalid or expired token".to_string())
        })
    }

    pub fn refresh_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.refresh_token_expiry_days)
    }
}

/// Generate a random refresh token.
///
/// Returns `(plaintext, sha256_hex)`. Only the hash is persisted.
pub fn generate_refresh_token() -> (String, String) {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    rand::rng().fill(&mut bytes);
    let plaintext = hex::encode(bytes);
    let hash = hash_refresh_token(&plaintext);
    (plaintext, hash)
}

pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(secret: &str) -> JwtManager {
        JwtManager::new(&AuthConfig {
            jwt_secret: secret.to_string(),
            access_token_expiry_mins: 15,
            refresh_token_expiry_days: 7,
            admin_username: None,
            admin_password: None,
        })
    }

    #[test]
    fn test_issue_and_authenticate() {
        let jwt = manager("test-secret-that-is-long-enough");
        let user_id = Uuid::new_v4();
        let issued = jwt
            .issue_access_token(user_id, "juan", UserRole::Reporter)
            .unwrap();
        assert_eq!(issued.expires_in, 15 * 60);

        let user = jwt.authenticate(&issued.token).unwrap();
        assert_eq!(user.user_id, user_id);
        assert_eq!(user.username, "juan");
        assert_eq!(user.role, UserRole::Reporter);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let jwt = manager("test-secret-that-is-long-enough");
        let now = chrono::Utc::now().timestamp();
        let claims = AccessClaims {
            sub: Uuid::new_v4(),
            username: "juan".to_string(),
            role: UserRole::Reporter,
            // Well past the default 60 second leeway
            exp: now - 600,
            iat: now - 1200,
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(&Header::default(), &claims, &jwt.encoding_key).unwrap();

        assert!(matches!(
            jwt.authenticate(&token),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let issuer = manager("secret-alpha-0123456789");
        let verifier = manager("secret-bravo-0123456789");
        let issued = issuer
            .issue_access_token(Uuid::new_v4(), "admin", UserRole::Admin)
            .unwrap();

        assert!(verifier.authenticate(&issued.token).is_err());
    }

    #[test]
    fn test_refresh_token_hash_is_stable() {
        let (plaintext, hash) = generate_refresh_token();
        assert_eq!(hash, hash_refresh_token(&plaintext));
        assert_eq!(hash.len(), 64);

        let (other, _) = generate_refresh_token();
        assert_ne!(plaintext, other);
    }

    #[test]
    fn test_refresh_token_is_hex_encoded_random_bytes() {
        let (plaintext, _) = generate_refresh_token();
        assert_eq!(plaintext.len(), REFRESH_TOKEN_BYTES * 2);
        let bytes = hex::decode(&plaintext).unwrap();
        assert_eq!(bytes.len(), REFRESH_TOKEN_BYTES);
        assert!(bytes.iter().any(|b| *b != 0));
    }
}
