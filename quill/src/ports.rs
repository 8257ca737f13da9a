use crate::auth::TokenError;
use crate::domain::{Blog, BlogUpdate, IdentityPayload, SortField};
use async_trait::async_trait;
use shared::Result;
use std::time::Duration;

// Ports are the pluggable extension points the core consumes

/// Authoritative storage for blog records.
///
/// `increment_views_and_fetch` and `update_record` must be atomic against
/// concurrent callers: implementations use their own transaction facility, never
/// a read-modify-write in application code.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Approved blogs in `sort` order, strictly after the row with id `cursor`.
    async fn query_approved_listing(
        &self,
        limit: usize,
        cursor: Option<&str>,
        sort: SortField,
    ) -> Result<Vec<Blog>>;

    /// Add one view and return the record as committed, `None` if absent.
    async fn increment_views_and_fetch(&self, id: &str) -> Result<Option<Blog>>;

    async fn update_record(&self, id: &str, update: &BlogUpdate) -> Result<Option<Blog>>;

    async fn insert_record(&self, blog: Blog) -> Result<Blog>;

    /// Plain read with no side effects.
    async fn fetch_record(&self, id: &str) -> Result<Option<Blog>>;
}

/// A token that passed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub identity: IdentityPayload,
    /// Time left before the token expires; never zero.
    pub remaining: Duration,
}

/// Turns an opaque credential back into an identity.
pub trait CredentialVerifier: Send + Sync + 'static {
    fn verify(&self, token: &str) -> std::result::Result<VerifiedToken, TokenError>;
}
