//! Token service: issues and validates time-bounded bearer tokens.
//!
//! Tokens are HS256-signed JWTs carrying a subject claim. They are never
//! persisted; validity is entirely a function of signature and expiry.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Fallback token lifetime when the caller does not specify one.
pub const DEFAULT_TTL_MINUTES: i64 = 15;

/// Authentication failure taxonomy.
///
/// Every variant surfaces as a rejected request; they are kept distinct so
/// the gateway can log the reason without leaking it to the client.
#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    UserNotFound,
    BadPassword,
    Expired,
    InvalidSignature,
    MalformedToken,
    /// The credential store itself failed (distinct from bad credentials).
    Store(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::UserNotFound => write!(f, "user not found"),
            AuthError::BadPassword => write!(f, "password mismatch"),
            AuthError::Expired => write!(f, "token expired"),
            AuthError::InvalidSignature => write!(f, "token signature verification failed"),
            AuthError::MalformedToken => write!(f, "malformed token"),
            AuthError::Store(e) => write!(f, "credential store failure: {}", e),
        }
    }
}

impl std::error::Error for AuthError {}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Issues and validates signed bearer tokens from a shared secret.
#[derive(Clone)]
pub struct TokenService {
    secret: String,
    algorithm: Algorithm,
}

impl TokenService {
    pub fn new(secret: String) -> anyhow::Result<Self> {
        if secret.len() < 32 {
            anyhow::bail!("token secret must be at least 32 characters");
        }
        Ok(Self {
            secret,
            algorithm: Algorithm::HS256,
        })
    }

    /// Encode `subject` + expiry into a signed opaque string.
    ///
    /// `ttl` defaults to [`DEFAULT_TTL_MINUTES`] when unspecified.
    pub fn issue(&self, subject: &str, ttl: Option<Duration>) -> anyhow::Result<String> {
        let now = Utc::now();
        let ttl = ttl.unwrap_or_else(|| Duration::minutes(DEFAULT_TTL_MINUTES));
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        let header = Header::new(self.algorithm);
        let key = EncodingKey::from_secret(self.secret.as_bytes());
        Ok(encode(&header, &claims, &key)?)
    }

    /// Verify signature and expiry; return the embedded subject.
    pub fn validate(&self, token: &str) -> Result<String, AuthError> {
        let key = DecodingKey::from_secret(self.secret.as_bytes());
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        validation.leeway = 0;

        match decode::<Claims>(token, &key, &validation) {
            Ok(data) => Ok(data.claims.sub),
            Err(e) => Err(match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::MalformedToken,
            }),
        }
    }
}
