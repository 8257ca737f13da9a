use crate::domain::{CachedListing, ListingQuery};
use crate::ports::RecordStore;
use shared::Result;
use std::sync::Arc;
use std::time::Duration;
use storage_engine::ExpiringStore;
use tracing::debug;

/// Whole-page cache of approved listings keyed by the query shape.
///
/// Pages are never invalidated individually; a write shows up in listings
/// once the page's TTL runs out.
pub struct ListingCache {
    store: Arc<dyn RecordStore>,
    cache: ExpiringStore<CachedListing>,
    ttl: Duration,
}

impl ListingCache {
    pub fn new(
        store: Arc<dyn RecordStore>,
        cache: ExpiringStore<CachedListing>,
        ttl: Duration,
    ) -> Self {
        Self { store, cache, ttl }
    }

    pub async fn list(&self, query: &ListingQuery) -> Result<CachedListing> {
        let key = query.cache_key();
        if let Some(page) = self.cache.get(&key) {
            debug!("Listing cache hit for {}", key);
            return Ok(page);
        }

        let rows = self
            .store
            .query_approved_listing(query.limit, query.cursor.as_deref(), query.sort)
            .await?;
        // A short page is the last one.
        let next_cursor = if rows.len() == query.limit {
            rows.last().map(|blog| blog.id.clone())
        } else {
            None
        };

        let page = CachedListing { rows, next_cursor };
        debug!("Listing cache miss for {}, caching {} rows", key, page.rows.len());
        self.cache.set(key, page.clone(), self.ttl);
        Ok(page)
    }

    pub fn cached_pages(&self) -> usize {
        self.cache.size()
    }
}
