use crate::domain::Blog;
use crate::ports::RecordStore;
use shared::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use storage_engine::ExpiringStore;
use tokio_util::task::TaskTracker;
use tracing::{debug, error};

pub fn detail_key(id: &str) -> String {
    format!("blog:{}", id)
}

/// Serves approved blog details and counts every read.
///
/// A cache miss increments in the store and returns the committed record.
/// A cache hit answers at once from the cache with `views + 1`, and commits
/// that increment on a tracked background task which then replaces the cache
/// entry with the authoritative record. The background task is attempted once;
/// its failure is logged and the next miss or expiry reloads the record.
///
/// Cache writes never replace a newer record with an older one, so refreshes
/// finishing out of order leave the latest committed count behind. Drafts are
/// reported as `NotFound` and never counted.
pub struct ViewCounter {
    store: Arc<dyn RecordStore>,
    cache: ExpiringStore<Blog>,
    ttl: Duration,
    refreshes: TaskTracker,
}

impl ViewCounter {
    pub fn new(store: Arc<dyn RecordStore>, cache: ExpiringStore<Blog>, ttl: Duration) -> Self {
        Self {
            store,
            cache,
            ttl,
            refreshes: TaskTracker::new(),
        }
    }

    pub async fn view(&self, id: &str) -> Result<Blog> {
        let key = detail_key(id);

        if let Some(mut cached) = self.cache.get(&key) {
            if !cached.approved {
                return Err(Error::NotFound);
            }
            debug!("Detail cache hit for {}", id);
            self.spawn_refresh(id.to_string(), key);
            // Display only; the cache keeps the committed value.
            cached.views += 1;
            return Ok(cached);
        }

        debug!("Detail cache miss for {}", id);
        let current = self.store.fetch_record(id).await?.ok_or(Error::NotFound)?;
        if !current.approved {
            return Err(Error::NotFound);
        }

        let committed = self
            .store
            .increment_views_and_fetch(id)
            .await?
            .ok_or(Error::NotFound)?;
        cache_if_newer(&self.cache, key, committed.clone(), self.ttl);
        Ok(committed)
    }

    fn spawn_refresh(&self, id: String, key: String) {
        let store = Arc::clone(&self.store);
        let cache = self.cache.clone();
        let ttl = self.ttl;

        // Detached from the request: a dropped client does not cancel it.
        self.refreshes.spawn(async move {
            match store.increment_views_and_fetch(&id).await {
                Ok(Some(committed)) => {
                    if !cache_if_newer(&cache, key, committed, ttl) {
                        debug!("Dropped late refresh for blog {}", id);
                    }
                }
                Ok(None) => {
                    debug!("Blog {} disappeared before its view was committed", id);
                    cache.delete(&key);
                }
                Err(e) => error!("Failed to commit view for blog {}: {}", id, e),
            }
        });
    }

    /// Number of background refreshes still running.
    pub fn pending_refreshes(&self) -> usize {
        self.refreshes.len()
    }

    /// Wait for every background refresh started so far.
    pub async fn drain(&self) {
        self.refreshes.close();
        self.refreshes.wait().await;
        self.refreshes.reopen();
    }

    /// Replace the cached copy after a write elsewhere.
    pub fn store_committed(&self, blog: &Blog) {
        cache_if_newer(&self.cache, detail_key(&blog.id), blog.clone(), self.ttl);
    }

    pub fn cached_details(&self) -> usize {
        self.cache.size()
    }
}

/// Every commit raises `views` or moves `updated_at` forward, so the pair
/// orders committed records of one blog.
fn cache_if_newer(cache: &ExpiringStore<Blog>, key: String, blog: Blog, ttl: Duration) -> bool {
    let version = (blog.views, blog.updated_at);
    cache.set_if(key, blog, ttl, |cached| version >= (cached.views, cached.updated_at))
}
