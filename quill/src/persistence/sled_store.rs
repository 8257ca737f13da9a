use crate::domain::{Blog, BlogUpdate, SortField};
use crate::ports::RecordStore;
use async_trait::async_trait;
use shared::{Error, Result};
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionResult};
use std::path::Path;

const BLOGS_TREE: &str = "blogs";

/// Sled-backed record store for blogs, keyed by blog id
pub struct SledRecordStore {
    db: sled::Db,
    blogs: sled::Tree,
}

impl SledRecordStore {
    /// Open (or create) the database at `path`, creating parent directories
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Internal(format!("Failed to create directory: {}", e)))?;
        }

        let db = sled::open(path).map_err(storage_error)?;
        let blogs = db.open_tree(BLOGS_TREE).map_err(storage_error)?;

        Ok(Self { db, blogs })
    }

    fn read(&self, id: &str) -> Result<Option<Blog>> {
        match self.blogs.get(id.as_bytes()).map_err(storage_error)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Apply `mutate` to the stored blog inside one sled transaction.
    /// Sled retries the closure on conflict, so it must stay side-effect free.
    fn mutate_in_transaction<F>(&self, id: &str, mutate: F) -> Result<Option<Blog>>
    where
        F: Fn(&mut Blog),
    {
        let outcome: TransactionResult<Option<Blog>, String> = self.blogs.transaction(|tx| {
            let Some(bytes) = tx.get(id.as_bytes())? else {
                return Ok(None);
            };

            let mut blog: Blog = serde_json::from_slice(&bytes)
                .map_err(|e| ConflictableTransactionError::Abort(e.to_string()))?;
            mutate(&mut blog);

            let encoded = serde_json::to_vec(&blog)
                .map_err(|e| ConflictableTransactionError::Abort(e.to_string()))?;
            tx.insert(id.as_bytes(), encoded)?;

            Ok(Some(blog))
        });

        outcome.map_err(transaction_error)
    }

    fn flush(&self) -> Result<()> {
        self.db.flush().map_err(storage_error)?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SledRecordStore {
    async fn query_approved_listing(
        &self,
        limit: usize,
        cursor: Option<&str>,
        sort: SortField,
    ) -> Result<Vec<Blog>> {
        let mut rows = Vec::new();
        for item in self.blogs.iter() {
            let (_, bytes) = item.map_err(storage_error)?;
            let blog = decode(&bytes)?;
            if blog.approved {
                rows.push(blog);
            }
        }
        rows.sort_by(|a, b| sort.compare(a, b));

        // Keyset pagination: skip everything ordered at or before the cursor row.
        // The cursor row itself is read directly so it may since have been unapproved.
        let start = match cursor {
            None => 0,
            Some(cursor_id) => {
                let anchor = self.read(cursor_id)?.ok_or_else(|| {
                    Error::Validation(format!("unknown cursor '{}'", cursor_id))
                })?;
                rows.partition_point(|row| sort.compare(row, &anchor).is_le())
            }
        };

        Ok(rows.into_iter().skip(start).take(limit).collect())
    }

    async fn increment_views_and_fetch(&self, id: &str) -> Result<Option<Blog>> {
        self.mutate_in_transaction(id, |blog| blog.views += 1)
    }

    async fn update_record(&self, id: &str, update: &BlogUpdate) -> Result<Option<Blog>> {
        let updated = self.mutate_in_transaction(id, |blog| update.apply_to(blog))?;
        self.flush()?;
        Ok(updated)
    }

    async fn insert_record(&self, blog: Blog) -> Result<Blog> {
        let encoded = serde_json::to_vec(&blog)
            .map_err(|e| Error::Internal(format!("Failed to serialize blog: {}", e)))?;

        self.blogs
            .compare_and_swap(blog.id.as_bytes(), None as Option<&[u8]>, Some(encoded))
            .map_err(storage_error)?
            .map_err(|_| Error::Validation(format!("blog '{}' already exists", blog.id)))?;

        self.flush()?;
        Ok(blog)
    }

    async fn fetch_record(&self, id: &str) -> Result<Option<Blog>> {
        self.read(id)
    }
}

fn decode(bytes: &[u8]) -> Result<Blog> {
    serde_json::from_slice(bytes)
        .map_err(|e| Error::Internal(format!("Failed to deserialize blog: {}", e)))
}

fn storage_error(err: sled::Error) -> Error {
    Error::StoreUnavailable(err.to_string())
}

fn transaction_error(err: TransactionError<String>) -> Error {
    match err {
        TransactionError::Abort(reason) => {
            Error::Internal(format!("Blog transaction aborted: {}", reason))
        }
        TransactionError::Storage(e) => storage_error(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IdentityPayload;
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    fn open_store() -> (tempfile::TempDir, SledRecordStore) {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = SledRecordStore::new(temp_dir.path().join("blogs.sled")).unwrap();
        (temp_dir, store)
    }

    fn approved(id: &str, title: &str, views: u64, age_secs: i64) -> Blog {
        let author = IdentityPayload::new("u1", "writer");
        let mut blog = Blog::draft(title, "body", &author);
        blog.id = id.to_string();
        blog.approved = true;
        blog.views = views;
        blog.created_at = Utc::now() - Duration::seconds(age_secs);
        blog
    }

    #[tokio::test]
    async fn test_insert_and_fetch() {
        let (_dir, store) = open_store();
        let blog = approved("b1", "Hello", 0, 0);

        store.insert_record(blog.clone()).await.unwrap();

        let fetched = store.fetch_record("b1").await.unwrap();
        assert_eq!(fetched, Some(blog));
        assert_eq!(store.fetch_record("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_insert_refuses_duplicate_id() {
        let (_dir, store) = open_store();
        store.insert_record(approved("b1", "One", 0, 0)).await.unwrap();

        let result = store.insert_record(approved("b1", "Two", 0, 0)).await;

        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(store.fetch_record("b1").await.unwrap().unwrap().title, "One");
    }

    #[tokio::test]
    async fn test_listing_skips_unapproved_and_respects_sort() {
        let (_dir, store) = open_store();
        store.insert_record(approved("a", "Charlie", 5, 30)).await.unwrap();
        store.insert_record(approved("b", "Alpha", 50, 20)).await.unwrap();
        store.insert_record(approved("c", "Bravo", 1, 10)).await.unwrap();
        let mut draft = approved("d", "Draft", 999, 0);
        draft.approved = false;
        store.insert_record(draft).await.unwrap();

        let ids = |rows: Vec<Blog>| rows.into_iter().map(|b| b.id).collect::<Vec<_>>();

        let newest = store
            .query_approved_listing(10, None, SortField::Newest)
            .await
            .unwrap();
        assert_eq!(ids(newest), vec!["c", "b", "a"]);

        let most_viewed = store
            .query_approved_listing(10, None, SortField::MostViewed)
            .await
            .unwrap();
        assert_eq!(ids(most_viewed), vec!["b", "a", "c"]);

        let by_title = store
            .query_approved_listing(10, None, SortField::Title)
            .await
            .unwrap();
        assert_eq!(ids(by_title), vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn test_listing_cursor_is_exclusive() {
        let (_dir, store) = open_store();
        for (i, id) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            store
                .insert_record(approved(id, id, 0, 100 - i as i64))
                .await
                .unwrap();
        }

        let first = store
            .query_approved_listing(2, None, SortField::Newest)
            .await
            .unwrap();
        assert_eq!(first.iter().map(|b| b.id.as_str()).collect::<Vec<_>>(), ["e", "d"]);

        let second = store
            .query_approved_listing(2, Some("d"), SortField::Newest)
            .await
            .unwrap();
        assert_eq!(second.iter().map(|b| b.id.as_str()).collect::<Vec<_>>(), ["c", "b"]);

        let last = store
            .query_approved_listing(2, Some("b"), SortField::Newest)
            .await
            .unwrap();
        assert_eq!(last.iter().map(|b| b.id.as_str()).collect::<Vec<_>>(), ["a"]);
    }

    #[tokio::test]
    async fn test_listing_unknown_cursor_is_rejected() {
        let (_dir, store) = open_store();

        let result = store
            .query_approved_listing(10, Some("nope"), SortField::Newest)
            .await;

        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_increment_views_and_fetch() {
        let (_dir, store) = open_store();
        store.insert_record(approved("b1", "Hello", 7, 0)).await.unwrap();

        let after = store.increment_views_and_fetch("b1").await.unwrap().unwrap();
        assert_eq!(after.views, 8);
        assert_eq!(store.fetch_record("b1").await.unwrap().unwrap().views, 8);

        assert_eq!(store.increment_views_and_fetch("missing").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        let (_dir, store) = open_store();
        let store = Arc::new(store);
        store.insert_record(approved("hot", "Hot", 0, 0)).await.unwrap();

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.increment_views_and_fetch("hot").await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(store.fetch_record("hot").await.unwrap().unwrap().views, 64);
    }

    #[tokio::test]
    async fn test_update_record() {
        let (_dir, store) = open_store();
        let mut draft = approved("b1", "Before", 3, 0);
        draft.approved = false;
        store.insert_record(draft).await.unwrap();

        let update = BlogUpdate {
            title: Some("After".to_string()),
            approved: Some(true),
            ..Default::default()
        };
        let updated = store.update_record("b1", &update).await.unwrap().unwrap();

        assert_eq!(updated.title, "After");
        assert!(updated.approved);
        assert_eq!(updated.views, 3);
        assert_eq!(store.fetch_record("b1").await.unwrap(), Some(updated));
        assert_eq!(store.update_record("missing", &update).await.unwrap(), None);
    }
}
