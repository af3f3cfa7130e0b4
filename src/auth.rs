//! Authentication Service
//!
//! Stateless bearer tokens (JWT, HS256) issued after an API key or a
//! username/password check.
//!
//! # Security Features
//!
//! - **Password hashing**: Argon2id PHC strings
//! - **JWT tokens**: HS256 only; any other `alg` (including `none`) is rejected
//! - **Expiry**: enforced with zero leeway
//! - **No enumeration**: unknown usernames cost the same hash verification as
//!   known ones
//! - **Guarded login**: no token is issued unless credentials are configured
//!   and one of them matched

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Signing algorithm; tokens declaring anything else are refused
const TOKEN_ALGORITHM: Algorithm = Algorithm::HS256;

/// Hash verified for unknown usernames so lookups take constant work
static DUMMY_HASH: Lazy<Option<String>> = Lazy::new(|| {
    let filler: String = (0..32)
        .map(|_| {
            let idx = rand::random::<usize>() % 62;
            b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789"[idx] as char
        })
        .collect();
    AuthService::hash_password(&filler).ok()
});

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Authentication not configured")]
    NotConfigured,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// JWT claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub authorized: bool,
    /// Issued at
    pub iat: i64,
    /// Expiration
    pub exp: i64,
}

/// A freshly signed token
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Credential presented at login
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    ApiKey(String),
    Password { username: String, password: String },
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::ApiKey(_) => f.write_str("ApiKey(..)"),
            Credential::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

/// Credential material loaded at startup
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    pub api_keys: Vec<String>,
    /// username -> Argon2 PHC hash
    pub users: HashMap<String, String>,
}

/// Authentication service
pub struct AuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_ttl: Duration,
    api_keys: HashSet<String>,
    users: HashMap<String, String>,
}

impl AuthService {
    /// Create the service; credential sets are fixed from here on
    pub fn new(jwt_secret: &str, token_ttl: std::time::Duration, credentials: CredentialStore) -> Self {
        let mut validation = Validation::new(TOKEN_ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = true;

        let api_keys = credentials
            .api_keys
            .into_iter()
            .filter(|key| !key.is_empty())
            .collect();

        let users = credentials
            .users
            .into_iter()
            .filter(|(username, hash)| !username.is_empty() && !hash.is_empty())
            .collect();

        Self {
            encoding_key: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            validation,
            token_ttl: Duration::from_std(token_ttl).unwrap_or(Duration::hours(24)),
            api_keys,
            users,
        }
    }

    /// Hash a password using Argon2id
    pub fn hash_password(password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Verify a password against a hash
    pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AuthError::Internal(format!("Invalid password hash: {}", e)))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Sign a new token valid for the configured lifetime
    pub fn generate_token(&self) -> Result<IssuedToken, AuthError> {
        let now = Utc::now();
        let expires_at = now + self.token_ttl;

        let claims = Claims {
            authorized: true,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(TOKEN_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Failed to encode token: {}", e)))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Verify signature, algorithm and expiry
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })?;

        Ok(token_data.claims)
    }

    /// Constant-time-ish set membership; the empty key never matches
    pub fn validate_api_key(&self, api_key: &str) -> bool {
        !api_key.is_empty() && self.api_keys.contains(api_key)
    }

    /// Check a username/password pair without revealing which part was wrong
    pub fn validate_credentials(&self, username: &str, password: &str) -> bool {
        match self.users.get(username) {
            Some(hash) => match Self::verify_password(password, hash) {
                Ok(valid) => valid,
                Err(e) => {
                    tracing::warn!(username = %username, error = %e, "Stored password hash is unusable");
                    false
                }
            },
            None => {
                if let Some(dummy) = DUMMY_HASH.as_deref() {
                    let _ = Self::verify_password(password, dummy);
                }
                false
            }
        }
    }

    /// True if at least one API key or user is configured
    pub fn has_auth_configured(&self) -> bool {
        !self.api_keys.is_empty() || !self.users.is_empty()
    }

    /// Single entry point for login credential checks
    pub fn authenticate(&self, credential: &Credential) -> Result<(), AuthError> {
        if !self.has_auth_configured() {
            return Err(AuthError::NotConfigured);
        }

        match credential {
            Credential::ApiKey(key) => {
                if self.validate_api_key(key) {
                    Ok(())
                } else {
                    Err(AuthError::InvalidApiKey)
                }
            }
            Credential::Password { username, password } => {
                if self.validate_credentials(username, password) {
                    Ok(())
                } else {
                    Err(AuthError::InvalidCredentials)
                }
            }
        }
    }

    /// Authenticate then issue a token
    pub fn login(&self, credential: &Credential) -> Result<IssuedToken, AuthError> {
        self.authenticate(credential)?;
        self.generate_token()
    }
}
