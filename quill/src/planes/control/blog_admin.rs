use crate::domain::{Blog, BlogUpdate, IdentityPayload};
use crate::planes::data::ViewCounter;
use crate::ports::RecordStore;
use shared::{Error, Result};
use std::sync::Arc;
use tracing::info;

const MAX_TITLE_CHARS: usize = 200;

/// Creates drafts and applies editorial updates.
///
/// Updates are written through to the detail cache so the next reader sees
/// them; listing pages catch up when they expire.
pub struct BlogAdmin {
    store: Arc<dyn RecordStore>,
    views: Arc<ViewCounter>,
}

impl BlogAdmin {
    pub fn new(store: Arc<dyn RecordStore>, views: Arc<ViewCounter>) -> Self {
        Self { store, views }
    }

    pub async fn create_draft(
        &self,
        author: &IdentityPayload,
        title: &str,
        body: &str,
    ) -> Result<Blog> {
        validate_title(title)?;

        let draft = self
            .store
            .insert_record(Blog::draft(title.trim(), body, author))
            .await?;
        info!("Draft {} created by {}", draft.id, author.username);
        Ok(draft)
    }

    pub async fn update(&self, id: &str, update: &BlogUpdate) -> Result<Blog> {
        if update.is_empty() {
            return Err(Error::Validation("update has no fields".to_string()));
        }
        if let Some(title) = &update.title {
            validate_title(title)?;
        }

        let updated = self
            .store
            .update_record(id, update)
            .await?
            .ok_or(Error::NotFound)?;
        self.views.store_committed(&updated);
        info!("Blog {} updated (approved: {})", updated.id, updated.approved);
        Ok(updated)
    }

    /// A blog the public detail view hides, for its author or an admin.
    ///
    /// Anyone else gets `NotFound`, the answer for an unknown id. Not counted.
    pub async fn preview_draft(
        &self,
        id: &str,
        viewer: &IdentityPayload,
        viewer_is_admin: bool,
    ) -> Result<Blog> {
        let blog = self.store.fetch_record(id).await?.ok_or(Error::NotFound)?;
        if viewer_is_admin || blog.author_id == viewer.id {
            Ok(blog)
        } else {
            Err(Error::NotFound)
        }
    }
}

fn validate_title(title: &str) -> Result<()> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::Validation("title must not be empty".to_string()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(Error::Validation(format!(
            "title must be at most {} characters",
            MAX_TITLE_CHARS
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planes::data::view_counter::tests::{MemoryStore, blog};
    use std::time::Duration;
    use storage_engine::ExpiringStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        views: Arc<ViewCounter>,
        admin: BlogAdmin,
    }

    async fn fixture(blogs: Vec<Blog>) -> Fixture {
        let store = MemoryStore::with(blogs).await;
        let views = Arc::new(ViewCounter::new(
            store.clone(),
            ExpiringStore::new("detail"),
            Duration::from_secs(60),
        ));
        let admin = BlogAdmin::new(store.clone(), views.clone());
        Fixture { store, views, admin }
    }

    #[tokio::test]
    async fn test_create_draft() {
        let f = fixture(vec![]).await;
        let author = IdentityPayload::new("u7", "grace");

        let draft = f.admin.create_draft(&author, "  Hello  ", "text").await.unwrap();

        assert_eq!(draft.title, "Hello");
        assert!(!draft.approved);
        assert_eq!(draft.author_name, "grace");
        assert_eq!(f.store.fetch_record(&draft.id).await.unwrap(), Some(draft));
    }

    #[tokio::test]
    async fn test_create_draft_validates_title() {
        let f = fixture(vec![]).await;
        let author = IdentityPayload::new("u7", "grace");

        for title in ["", "   ", &"x".repeat(201)] {
            assert!(matches!(
                f.admin.create_draft(&author, title, "text").await,
                Err(Error::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_update_writes_through_detail_cache() {
        let f = fixture(vec![blog("r", 3)]).await;
        f.views.view("r").await.unwrap();

        let update = BlogUpdate {
            title: Some("Renamed".to_string()),
            ..Default::default()
        };
        f.admin.update("r", &update).await.unwrap();

        let served = f.views.view("r").await.unwrap();
        assert_eq!(served.title, "Renamed");
        assert_eq!(served.views, 5);
        f.views.drain().await;
    }

    #[tokio::test]
    async fn test_preview_draft_only_for_author_or_admin() {
        let f = fixture(vec![]).await;
        let author = IdentityPayload::new("u7", "grace");
        let stranger = IdentityPayload::new("u8", "eve");
        let draft = f.admin.create_draft(&author, "Secret", "text").await.unwrap();

        let own = f.admin.preview_draft(&draft.id, &author, false).await.unwrap();
        assert_eq!(own.title, "Secret");
        assert_eq!(
            f.admin.preview_draft(&draft.id, &stranger, false).await,
            Err(Error::NotFound)
        );
        assert!(f.admin.preview_draft(&draft.id, &stranger, true).await.is_ok());
        assert_eq!(
            f.admin.preview_draft("missing", &author, true).await,
            Err(Error::NotFound)
        );

        assert_eq!(f.store.fetch_record(&draft.id).await.unwrap().unwrap().views, 0);
    }

    #[tokio::test]
    async fn test_update_errors() {
        let f = fixture(vec![blog("r", 0)]).await;

        assert!(matches!(
            f.admin.update("r", &BlogUpdate::default()).await,
            Err(Error::Validation(_))
        ));

        let approve = BlogUpdate {
            approved: Some(true),
            ..Default::default()
        };
        assert_eq!(f.admin.update("ghost", &approve).await, Err(Error::NotFound));
    }
}
