use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{Error, Result};
use std::cmp::Ordering;
use uuid::Uuid;

/// Who a request is acting as.
///
/// A plain value: the session, the identity cache and every signed token hold
/// their own copy. Copies are never reconciled after issue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityPayload {
    pub id: String,
    pub username: String,
}

impl IdentityPayload {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blog {
    pub id: String,
    pub title: String,
    pub body: String,
    pub author_id: String,
    pub author_name: String,
    pub approved: bool,
    pub views: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Blog {
    /// A new, unapproved blog with no views.
    pub fn draft(
        title: impl Into<String>,
        body: impl Into<String>,
        author: &IdentityPayload,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            body: body.into(),
            author_id: author.id.clone(),
            author_name: author.username.clone(),
            approved: false,
            views: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a blog. `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
    pub approved: Option<bool>,
}

impl BlogUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_none() && self.approved.is_none()
    }

    pub fn apply_to(&self, blog: &mut Blog) {
        if let Some(title) = &self.title {
            blog.title = title.clone();
        }
        if let Some(body) = &self.body {
            blog.body = body.clone();
        }
        if let Some(approved) = self.approved {
            blog.approved = approved;
        }
        blog.updated_at = Utc::now();
    }
}

/// Ordering of a listing. Ties are broken by id so pages never overlap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Newest,
    MostViewed,
    Title,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Newest => "newest",
            SortField::MostViewed => "most_viewed",
            SortField::Title => "title",
        }
    }

    pub fn compare(&self, a: &Blog, b: &Blog) -> Ordering {
        let primary = match self {
            SortField::Newest => b.created_at.cmp(&a.created_at),
            SortField::MostViewed => b.views.cmp(&a.views),
            SortField::Title => a.title.cmp(&b.title),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

/// Shape of a listing request; also the identity of its cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    pub limit: usize,
    pub cursor: Option<String>,
    pub sort: SortField,
}

impl ListingQuery {
    pub const DEFAULT_LIMIT: usize = 10;
    pub const MAX_LIMIT: usize = 50;

    pub fn new(
        limit: Option<usize>,
        cursor: Option<String>,
        sort: Option<SortField>,
    ) -> Result<Self> {
        let limit = limit.unwrap_or(Self::DEFAULT_LIMIT);
        if limit == 0 || limit > Self::MAX_LIMIT {
            return Err(Error::Validation(format!(
                "limit must be between 1 and {}",
                Self::MAX_LIMIT
            )));
        }

        Ok(Self {
            limit,
            cursor: cursor.filter(|c| !c.is_empty()),
            sort: sort.unwrap_or_default(),
        })
    }

    pub fn cache_key(&self) -> String {
        format!(
            "blogs:{}:{}:{}",
            self.limit,
            self.cursor.as_deref().unwrap_or("-"),
            self.sort.as_str()
        )
    }
}

/// One page of approved blogs, cached as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedListing {
    pub rows: Vec<Blog>,
    pub next_cursor: Option<String>,
}
