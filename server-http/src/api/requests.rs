use quill::{BlogUpdate, SortField};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Query string of `GET /blogs`.
#[derive(Debug, Default, Deserialize)]
pub struct ListBlogsParams {
    pub limit: Option<usize>,
    pub cursor: Option<String>,
    pub sort: Option<SortField>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBlogRequest {
    pub title: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateBlogRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    pub approved: Option<bool>,
}

impl From<UpdateBlogRequest> for BlogUpdate {
    fn from(request: UpdateBlogRequest) -> Self {
        BlogUpdate {
            title: request.title,
            body: request.body,
            approved: request.approved,
        }
    }
}
