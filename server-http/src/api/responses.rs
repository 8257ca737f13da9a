use chrono::{DateTime, Utc};
use quill::auth::CredentialSource;
use quill::{Blog, CachedListing, IdentityPayload};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub cached_identities: usize,
    pub revoked_tokens: usize,
    pub cached_listing_pages: usize,
    pub cached_details: usize,
    pub pending_view_refreshes: usize,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub user: IdentityPayload,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: String,
    pub username: String,
    /// Where this request's identity came from: `session`, `cookie` or `bearer_header`.
    pub resolved_from: &'static str,
}

impl MeResponse {
    pub fn new(identity: IdentityPayload, source: CredentialSource) -> Self {
        let resolved_from = match source {
            CredentialSource::Session => "session",
            CredentialSource::Cookie => "cookie",
            CredentialSource::BearerHeader => "bearer_header",
        };
        Self {
            id: identity.id,
            username: identity.username,
            resolved_from,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BlogResponse {
    pub id: String,
    pub title: String,
    pub body: String,
    pub author: IdentityPayload,
    pub approved: bool,
    pub views: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Blog> for BlogResponse {
    fn from(blog: Blog) -> Self {
        Self {
            id: blog.id,
            title: blog.title,
            body: blog.body,
            author: IdentityPayload::new(blog.author_id, blog.author_name),
            approved: blog.approved,
            views: blog.views,
            created_at: blog.created_at,
            updated_at: blog.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListingResponse {
    pub blogs: Vec<BlogResponse>,
    pub next_cursor: Option<String>,
}

impl From<CachedListing> for ListingResponse {
    fn from(page: CachedListing) -> Self {
        Self {
            blogs: page.rows.into_iter().map(BlogResponse::from).collect(),
            next_cursor: page.next_cursor,
        }
    }
}
