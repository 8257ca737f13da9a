use super::session::{Session, generate_session_id};
use super::session_store::SessionRepository;
use crate::domain::IdentityPayload;
use async_trait::async_trait;
use moka::Entry;
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use shared::Result;
use std::time::Duration;

/// In-memory session repository on a moka cache.
///
/// The cache TTL bounds memory; each session's own `expires_at` is what decides
/// whether it is still served.
pub struct MokaSessionRepository {
    sessions: Cache<String, Session>,
}

impl MokaSessionRepository {
    pub fn new(max_sessions: Option<u64>, default_ttl: Option<Duration>) -> Self {
        let mut builder = Cache::builder();

        if let Some(capacity) = max_sessions {
            builder = builder.max_capacity(capacity);
        }
        if let Some(ttl) = default_ttl {
            builder = builder.time_to_live(ttl);
        }

        Self {
            sessions: builder.build(),
        }
    }

    /// Unbounded, 30 minute TTL.
    pub fn with_defaults() -> Self {
        Self::new(None, Some(Duration::from_secs(1800)))
    }

    pub fn entry_count(&self) -> u64 {
        self.sessions.entry_count()
    }
}

#[async_trait]
impl SessionRepository for MokaSessionRepository {
    async fn create_session(
        &self,
        identity: Option<IdentityPayload>,
        ttl_ms: u64,
    ) -> Result<Session> {
        let session = Session::new(generate_session_id(), identity, ttl_ms);
        self.sessions
            .insert(session.id.clone(), session.clone())
            .await;
        Ok(session)
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>> {
        let Some(session) = self.sessions.get(id).await else {
            return Ok(None);
        };

        if session.is_expired() {
            self.sessions.invalidate(id).await;
            return Ok(None);
        }
        Ok(Some(session))
    }

    async fn attach_identity(&self, id: &str, identity: IdentityPayload) -> Result<bool> {
        // Compute on the entry so a concurrent delete is never undone.
        let outcome = self
            .sessions
            .entry_by_ref(id)
            .and_compute_with(|current| {
                let op = match current.map(Entry::into_value) {
                    Some(session) if session.is_expired() => Op::Remove,
                    Some(mut session) => {
                        session.identity = Some(identity);
                        session.touch();
                        Op::Put(session)
                    }
                    None => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;

        Ok(matches!(outcome, CompResult::ReplacedWith(_)))
    }

    async fn delete_session(&self, id: &str) -> Result<bool> {
        let outcome = self
            .sessions
            .entry_by_ref(id)
            .and_compute_with(|current| {
                std::future::ready(match current {
                    Some(_) => Op::Remove,
                    None => Op::Nop,
                })
            })
            .await;

        Ok(matches!(outcome, CompResult::Removed(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionStore;
    use std::sync::Arc;

    fn ada() -> IdentityPayload {
        IdentityPayload::new("u1", "ada")
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let repo = MokaSessionRepository::with_defaults();

        let session = repo.create_session(Some(ada()), 3_600_000).await.unwrap();
        assert_eq!(session.id.len(), 64);

        let loaded = repo.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.identity, Some(ada()));
        assert!(loaded.last_accessed >= session.last_accessed);
    }

    #[tokio::test]
    async fn test_unknown_session_is_none() {
        let repo = MokaSessionRepository::with_defaults();

        assert!(repo.get_session("nope").await.unwrap().is_none());
        assert!(!repo.attach_identity("nope", ada()).await.unwrap());
        assert!(!repo.delete_session("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_session() {
        let repo = MokaSessionRepository::with_defaults();
        let session = repo.create_session(None, 3_600_000).await.unwrap();

        assert!(repo.delete_session(&session.id).await.unwrap());
        assert!(repo.get_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_not_served() {
        let repo = MokaSessionRepository::with_defaults();

        let session = repo.create_session(Some(ada()), 0).await.unwrap();

        assert!(repo.get_session(&session.id).await.unwrap().is_none());
        assert!(!repo.attach_identity(&session.id, ada()).await.unwrap());
    }

    #[tokio::test]
    async fn test_attach_identity_to_anonymous_session() {
        let repo = MokaSessionRepository::with_defaults();
        let session = repo.create_session(None, 3_600_000).await.unwrap();

        assert!(repo.attach_identity(&session.id, ada()).await.unwrap());

        let loaded = repo.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.identity, Some(ada()));
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let repo = MokaSessionRepository::with_defaults();
        let first = repo.create_session(Some(ada()), 3_600_000).await.unwrap();
        let second = repo
            .create_session(Some(IdentityPayload::new("u2", "grace")), 3_600_000)
            .await
            .unwrap();

        assert_ne!(first.id, second.id);
        repo.delete_session(&first.id).await.unwrap();

        let survivor = repo.get_session(&second.id).await.unwrap().unwrap();
        assert_eq!(survivor.identity.unwrap().username, "grace");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_deleted_session_stays_deleted_under_concurrent_reads() {
        let repo = Arc::new(MokaSessionRepository::with_defaults());

        for _ in 0..500 {
            let session = repo.create_session(Some(ada()), 3_600_000).await.unwrap();
            let id = session.id.clone();

            let reader = {
                let repo = Arc::clone(&repo);
                let id = id.clone();
                tokio::spawn(async move { repo.get_session(&id).await })
            };
            let attacher = {
                let repo = Arc::clone(&repo);
                let id = id.clone();
                tokio::spawn(async move { repo.attach_identity(&id, ada()).await })
            };

            assert!(repo.delete_session(&id).await.unwrap());
            reader.await.unwrap().unwrap();
            attacher.await.unwrap().unwrap();

            assert!(repo.get_session(&id).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_session_store_uses_configured_ttl() {
        let store = SessionStore::new(Arc::new(MokaSessionRepository::with_defaults()), 60_000);

        let session = store.create_session(None).await.unwrap();
        assert!(session.remaining_ttl_ms() <= 60_000);
        assert_eq!(store.ttl_ms(), 60_000);

        assert!(store.attach_identity(&session.id, ada()).await.unwrap());
        assert_eq!(
            store.load(&session.id).await.unwrap().unwrap().identity,
            Some(ada())
        );
        assert!(store.destroy(&session.id).await.unwrap());
        assert!(store.load(&session.id).await.unwrap().is_none());
    }
}
