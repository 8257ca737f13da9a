//! Signed, expiring identity tokens.
//!
//! Tokens are HS256 JWTs carrying the [`IdentityPayload`] plus `iat`/`exp`.
//! Expiry is checked here against an injected [`Clock`] rather than by
//! `jsonwebtoken`, so tests can move time without sleeping.

use super::error::TokenError;
use crate::domain::IdentityPayload;
use crate::ports::{CredentialVerifier, VerifiedToken};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Source of "now" for token issue and expiry checks, in Unix seconds.
pub trait Clock: Send + Sync {
    fn now_epoch_secs(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(epoch_secs: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(epoch_secs)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_secs() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_epoch_secs(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    username: String,
    iat: i64,
    exp: i64,
}

/// Issues and verifies identity tokens with one process-wide secret.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        Self::with_clock(secret, Arc::new(SystemClock))
    }

    pub fn with_clock(secret: &[u8], clock: Arc<dyn Clock>) -> Self {
        // Signature only; exp is checked in `verify` against our clock.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;
        validation.required_spec_claims = HashSet::from(["exp".to_string()]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            clock,
        }
    }

    /// Sign `payload` into a token that expires `ttl` from now.
    ///
    /// Sub-second TTLs round up to one second, the resolution of `exp`.
    pub fn issue(&self, payload: &IdentityPayload, ttl: Duration) -> Result<String, TokenError> {
        let now = self.clock.now_epoch_secs();
        let ttl_secs = ttl.as_millis().div_ceil(1000).max(1) as i64;

        let claims = Claims {
            sub: payload.id.clone(),
            username: payload.username.clone(),
            iat: now,
            exp: now + ttl_secs,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<VerifiedToken, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!("Token rejected: {}", e);
                TokenError::InvalidToken
            })?
            .claims;

        let now = self.clock.now_epoch_secs();
        if now >= claims.exp {
            return Err(TokenError::ExpiredToken);
        }

        Ok(VerifiedToken {
            identity: IdentityPayload::new(claims.sub, claims.username),
            remaining: Duration::from_secs((claims.exp - now) as u64),
        })
    }
}

impl CredentialVerifier for TokenCodec {
    fn verify(&self, token: &str) -> Result<VerifiedToken, TokenError> {
        TokenCodec::verify(self, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"unit-test-secret-with-enough-bytes";
    const START: i64 = 1_704_067_200; // 2024-01-01T00:00:00Z

    fn codec() -> (TokenCodec, ManualClock) {
        let clock = ManualClock::new(START);
        let codec = TokenCodec::with_clock(SECRET, Arc::new(clock.clone()));
        (codec, clock)
    }

    fn payload() -> IdentityPayload {
        IdentityPayload::new("4f1c", "ada")
    }

    #[test]
    fn test_round_trip_returns_same_payload() {
        let (codec, _) = codec();

        let token = codec.issue(&payload(), Duration::from_secs(1800)).unwrap();
        let verified = codec.verify(&token).unwrap();

        assert_eq!(verified.identity, payload());
        assert_eq!(verified.remaining, Duration::from_secs(1800));
    }

    #[test]
    fn test_expired_after_ttl() {
        let (codec, clock) = codec();
        let token = codec.issue(&payload(), Duration::from_secs(60)).unwrap();

        clock.advance(Duration::from_secs(59));
        assert_eq!(codec.verify(&token).unwrap().remaining, Duration::from_secs(1));

        clock.advance(Duration::from_secs(1));
        assert_eq!(codec.verify(&token), Err(TokenError::ExpiredToken));
    }

    #[test]
    fn test_sub_second_ttl_rounds_up() {
        let (codec, clock) = codec();
        let token = codec.issue(&payload(), Duration::from_millis(10)).unwrap();

        assert!(codec.verify(&token).is_ok());
        clock.advance(Duration::from_secs(1));
        assert_eq!(codec.verify(&token), Err(TokenError::ExpiredToken));
    }

    #[test]
    fn test_any_altered_character_is_rejected() {
        let (codec, _) = codec();
        let token = codec.issue(&payload(), Duration::from_secs(600)).unwrap();

        for position in 0..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[position] = if bytes[position] == b'A' { b'B' } else { b'A' };
            let altered = String::from_utf8(bytes).unwrap();

            assert_eq!(
                codec.verify(&altered),
                Err(TokenError::InvalidToken),
                "altering position {} was accepted",
                position
            );
        }
    }

    #[test]
    fn test_other_secret_is_rejected() {
        let (codec, clock) = codec();
        let other = TokenCodec::with_clock(b"a-completely-different-secret", Arc::new(clock));

        let token = other.issue(&payload(), Duration::from_secs(600)).unwrap();

        assert_eq!(codec.verify(&token), Err(TokenError::InvalidToken));
    }

    #[test]
    fn test_garbage_is_rejected() {
        let (codec, _) = codec();

        for garbage in ["", "not-a-token", "a.b.c", "....", "Bearer x"] {
            assert_eq!(codec.verify(garbage), Err(TokenError::InvalidToken));
        }
    }

    #[test]
    fn test_expired_and_tampered_is_invalid_not_expired() {
        let (codec, clock) = codec();
        let token = codec.issue(&payload(), Duration::from_secs(5)).unwrap();
        clock.advance(Duration::from_secs(10));

        let mut tampered = token.clone();
        tampered.push('x');

        assert_eq!(codec.verify(&tampered), Err(TokenError::InvalidToken));
        assert_eq!(codec.verify(&token), Err(TokenError::ExpiredToken));
    }

    #[test]
    fn test_system_clock_round_trip() {
        let codec = TokenCodec::new(SECRET);
        let token = codec.issue(&payload(), Duration::from_secs(30)).unwrap();

        assert_eq!(codec.verify(&token).unwrap().identity, payload());
    }
}
