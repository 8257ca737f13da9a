//! Per-request identity resolution.
//!
//! Order is fixed: session, then the signed token cookie, then the bearer
//! header. The first source that yields a token decides the outcome; a bad
//! cookie token is not rescued by a good bearer token.

use crate::domain::IdentityPayload;
use crate::ports::CredentialVerifier;
use std::sync::Arc;
use std::time::Duration;
use storage_engine::ExpiringStore;
use thiserror::Error;
use tracing::debug;

const TOKEN_SUFFIX_LEN: usize = 32;

/// Cache key for a token: a fixed-length suffix, never the whole token.
///
/// The suffix lies inside the signature segment, so distinct tokens collide
/// only if their signatures share their last 32 characters.
pub fn token_cache_key(token: &str) -> String {
    let start = token
        .char_indices()
        .rev()
        .nth(TOKEN_SUFFIX_LEN - 1)
        .map(|(index, _)| index)
        .unwrap_or(0);
    format!("identity:{}", &token[start..])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("no credential presented")]
    NoCredential,
    #[error("credential could not be verified")]
    InvalidCredential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Session,
    Cookie,
    BearerHeader,
}

/// Raw tokens a request carried, already pulled out of cookie and header.
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialSources<'a> {
    pub cookie_token: Option<&'a str>,
    pub bearer_token: Option<&'a str>,
}

impl<'a> CredentialSources<'a> {
    fn candidate(&self) -> Option<(&'a str, CredentialSource)> {
        match (self.cookie_token, self.bearer_token) {
            (Some(token), _) if !token.is_empty() => Some((token, CredentialSource::Cookie)),
            (_, Some(token)) if !token.is_empty() => Some((token, CredentialSource::BearerHeader)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub identity: IdentityPayload,
    pub source: CredentialSource,
    /// The session slot was empty and has been filled by this resolution.
    pub session_backfilled: bool,
}

pub struct IdentityResolver {
    verifier: Arc<dyn CredentialVerifier>,
    cache: ExpiringStore<IdentityPayload>,
    revoked: ExpiringStore<()>,
    cache_ttl: Duration,
}

impl IdentityResolver {
    pub fn new(
        verifier: Arc<dyn CredentialVerifier>,
        cache: ExpiringStore<IdentityPayload>,
        revoked: ExpiringStore<()>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            verifier,
            cache,
            revoked,
            cache_ttl,
        }
    }

    /// Resolve the caller's identity.
    ///
    /// `session` is the identity slot of the caller's session, if it has one.
    /// When a token resolves and the slot is empty it is filled in place, and
    /// `Resolved::session_backfilled` tells the caller to persist it.
    pub fn resolve(
        &self,
        session: &mut Option<IdentityPayload>,
        sources: CredentialSources<'_>,
    ) -> Result<Resolved, Rejection> {
        if let Some(identity) = session.as_ref() {
            return Ok(Resolved {
                identity: identity.clone(),
                source: CredentialSource::Session,
                session_backfilled: false,
            });
        }

        let (token, source) = sources.candidate().ok_or(Rejection::NoCredential)?;
        let key = token_cache_key(token);

        if self.revoked.get(&key).is_some() {
            debug!("Rejected revoked token from {:?}", source);
            return Err(Rejection::InvalidCredential);
        }

        let identity = match self.cache.get(&key) {
            Some(identity) => {
                debug!("Identity cache hit for {}", identity.username);
                identity
            }
            None => {
                let verified = self.verifier.verify(token).map_err(|e| {
                    debug!("Token from {:?} rejected: {}", source, e);
                    Rejection::InvalidCredential
                })?;

                // Never outlive the token itself.
                let ttl = self.cache_ttl.min(verified.remaining);
                if !ttl.is_zero() {
                    self.cache.set(key, verified.identity.clone(), ttl);
                }
                verified.identity
            }
        };

        *session = Some(identity.clone());
        Ok(Resolved {
            identity,
            source,
            session_backfilled: true,
        })
    }

    /// Stop honouring `token` for `ttl`, normally its remaining lifetime.
    pub fn revoke(&self, token: &str, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let key = token_cache_key(token);
        self.cache.delete(&key);
        self.revoked.set(key, (), ttl);
    }

    pub fn cached_identities(&self) -> usize {
        self.cache.size()
    }

    pub fn revoked_tokens(&self) -> usize {
        self.revoked.size()
    }
}
