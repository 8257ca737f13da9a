use super::session::{Session, SessionId};
use crate::domain::IdentityPayload;
use async_trait::async_trait;
use shared::Result;
use std::sync::Arc;

/// Storage for server-side sessions.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create_session(
        &self,
        identity: Option<IdentityPayload>,
        ttl_ms: u64,
    ) -> Result<Session>;

    /// A live session, or `None` if unknown or expired.
    async fn get_session(&self, id: &str) -> Result<Option<Session>>;

    /// Set the identity of a live session. Returns false if it no longer exists.
    async fn attach_identity(&self, id: &str, identity: IdentityPayload) -> Result<bool>;

    async fn delete_session(&self, id: &str) -> Result<bool>;
}

/// Session service used by the HTTP layer.
pub struct SessionStore<S: SessionRepository> {
    repository: Arc<S>,
    ttl_ms: u64,
}

impl<S: SessionRepository> SessionStore<S> {
    pub fn new(repository: Arc<S>, ttl_ms: u64) -> Self {
        Self { repository, ttl_ms }
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    pub async fn create_session(&self, identity: Option<IdentityPayload>) -> Result<Session> {
        self.repository.create_session(identity, self.ttl_ms).await
    }

    pub async fn load(&self, id: &SessionId) -> Result<Option<Session>> {
        self.repository.get_session(id).await
    }

    pub async fn attach_identity(&self, id: &SessionId, identity: IdentityPayload) -> Result<bool> {
        self.repository.attach_identity(id, identity).await
    }

    /// Logout: forget the session entirely.
    pub async fn destroy(&self, id: &SessionId) -> Result<bool> {
        self.repository.delete_session(id).await
    }
}
