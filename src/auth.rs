//! Token issuing, token verification and password hashing.
//!
//! Handlers reach these through the [`TokenAuthority`] and [`PasswordScheme`]
//! traits held by [`crate::state::State`], so tests can swap them out.

use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use jwt::{RegisteredClaims, SignWithKey, VerifyWithKey};
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::{Params, Pbkdf2};
use sha2::Sha256;
use tonic::metadata::MetadataMap;

use crate::db::Id;

pub const AUTHORIZATION: &str = "authorization";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing authorization token")]
    MissingToken,

    #[error("malformed authorization header")]
    MalformedHeader,

    #[error("invalid token: {0}")]
    InvalidToken(#[from] jwt::Error),

    #[error("token has no usable subject")]
    BadSubject,

    #[error("token expired")]
    Expired,

    #[error("invalid signing key")]
    Key,

    #[error("password hashing failed: {0}")]
    Hash(password_hash::Error),
}

impl From<password_hash::Error> for AuthError {
    fn from(err: password_hash::Error) -> AuthError {
        AuthError::Hash(err)
    }
}

pub trait TokenAuthority: Send + Sync {
    fn issue(&self, user: Id) -> Result<String, AuthError>;
    fn verify(&self, token: &str) -> Result<Id, AuthError>;
}

pub trait PasswordScheme: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, AuthError>;
    fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError>;
}

/// Pulls the caller's user id out of the `authorization` metadata entry.
///
/// Accepts `Token <jwt>` as well as `Bearer <jwt>`.
pub fn resolve_caller(tokens: &dyn TokenAuthority, metadata: &MetadataMap) -> Result<Id, AuthError> {
    let header = metadata
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;
    let token = header
        .strip_prefix("Token ")
        .or_else(|| header.strip_prefix("Bearer "))
        .ok_or(AuthError::MalformedHeader)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    tokens.verify(token)
}

fn unix_now() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or_default()
}

/// HS256 tokens whose subject is the decimal user id.
#[derive(Clone)]
pub struct JwtAuthority {
    key: Hmac<Sha256>,
    ttl: Duration,
}

impl JwtAuthority {
    pub fn new(secret: &[u8], ttl: Duration) -> Result<Self, AuthError> {
        let key = Hmac::new_from_slice(secret).map_err(|_| AuthError::Key)?;
        Ok(JwtAuthority { key, ttl })
    }
}

impl TokenAuthority for JwtAuthority {
    fn issue(&self, user: Id) -> Result<String, AuthError> {
        let now = unix_now();
        let claims = RegisteredClaims {
            subject: Some(user.to_string()),
            issued_at: Some(now),
            expiration: Some(now + self.ttl.as_secs()),
            ..Default::default()
        };
        Ok(claims.sign_with_key(&self.key)?)
    }

    fn verify(&self, token: &str) -> Result<Id, AuthError> {
        let claims: RegisteredClaims = token.verify_with_key(&self.key)?;
        match claims.expiration {
            Some(exp) if exp > unix_now() => {}
            _ => return Err(AuthError::Expired),
        }
        claims
            .subject
            .and_then(|sub| sub.parse().ok())
            .ok_or(AuthError::BadSubject)
    }
}

/// PBKDF2-SHA256 stored as a PHC string, so the round count travels with
/// each hash.
#[derive(Debug, Clone)]
pub struct Pbkdf2Scheme {
    rounds: u32,
}

impl Pbkdf2Scheme {
    pub fn new(rounds: u32) -> Self {
        Pbkdf2Scheme { rounds }
    }
}

impl PasswordScheme for Pbkdf2Scheme {
    fn hash(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let params = Params {
            rounds: self.rounds,
            ..Params::default()
        };
        let hash = Pbkdf2.hash_password_customized(password.as_bytes(), None, None, params, &salt)?;
        Ok(hash.to_string())
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(hash)?;
        Ok(Pbkdf2.verify_password(password.as_bytes(), &parsed).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::metadata::MetadataValue;

    fn authority() -> JwtAuthority {
        JwtAuthority::new(b"test secret", Duration::from_secs(60)).unwrap()
    }

    fn metadata(value: &str) -> MetadataMap {
        let mut metadata = MetadataMap::new();
        metadata.insert(AUTHORIZATION, MetadataValue::try_from(value).unwrap());
        metadata
    }

    #[test]
    fn issued_tokens_resolve_to_their_user() {
        let tokens = authority();
        let token = tokens.issue(7).unwrap();
        assert_eq!(tokens.verify(&token).unwrap(), 7);
        assert_eq!(
            resolve_caller(&tokens, &metadata(&format!("Token {}", token))).unwrap(),
            7
        );
        assert_eq!(
            resolve_caller(&tokens, &metadata(&format!("Bearer {}", token))).unwrap(),
            7
        );
    }

    #[test]
    fn missing_and_malformed_headers_are_rejected() {
        let tokens = authority();
        assert!(matches!(
            resolve_caller(&tokens, &MetadataMap::new()),
            Err(AuthError::MissingToken)
        ));
        assert!(matches!(
            resolve_caller(&tokens, &metadata("Basic abc")),
            Err(AuthError::MalformedHeader)
        ));
        assert!(matches!(
            resolve_caller(&tokens, &metadata("Token not.a.jwt")),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn tokens_from_another_key_are_rejected() {
        let other = JwtAuthority::new(b"other secret", Duration::from_secs(60)).unwrap();
        let token = other.issue(1).unwrap();
        assert!(authority().verify(&token).is_err());
    }

    #[test]
    fn issued_tokens_carry_wall_clock_times() {
        let tokens = authority();
        let before = Utc::now().timestamp() as u64;
        let token = tokens.issue(3).unwrap();
        let claims: RegisteredClaims = token.as_str().verify_with_key(&tokens.key).unwrap();
        let issued_at = claims.issued_at.unwrap();
        assert!(issued_at >= before && issued_at <= before + 1);
        assert_eq!(claims.expiration, Some(issued_at + 60));
        assert_eq!(claims.subject.as_deref(), Some("3"));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let tokens = JwtAuthority::new(b"test secret", Duration::ZERO).unwrap();
        let token = tokens.issue(1).unwrap();
        assert!(matches!(tokens.verify(&token), Err(AuthError::Expired)));
    }

    #[test]
    fn passwords_verify_against_their_hash() {
        let scheme = Pbkdf2Scheme::new(1_000);
        let hash = scheme.hash("Passw0rd!").unwrap();
        assert!(hash.starts_with("$pbkdf2-sha256$"));
        assert!(scheme.verify("Passw0rd!", &hash).unwrap());
        assert!(!scheme.verify("passw0rd!", &hash).unwrap());
        assert!(scheme.verify("Passw0rd!", "not a hash").is_err());
    }
}
