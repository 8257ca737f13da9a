use crate::api::{
    BlogResponse, CreateBlogRequest, ListBlogsParams, ListingResponse, UpdateBlogRequest,
};
use crate::error::ApiError;
use crate::middleware::AuthContext;
use crate::state::AppState;
use axum::{
    Extension, Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use quill::auth::AuthError;
use quill::{BlogUpdate, ListingQuery};

/// GET /blogs?limit=&cursor=&sort=
pub async fn list_blogs(
    State(state): State<AppState>,
    params: Result<Query<ListBlogsParams>, QueryRejection>,
) -> Result<Json<ListingResponse>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::Validation(e.body_text()))?;
    let query = ListingQuery::new(params.limit, params.cursor, params.sort)?;

    let page = state.listings.list(&query).await?;
    Ok(Json(page.into()))
}

/// GET /blogs/{id}
///
/// Every read of an approved blog counts as a view. Drafts are shown, uncounted,
/// to their author and to admins; everyone else gets 404.
pub async fn get_blog(
    State(state): State<AppState>,
    Path(id): Path<String>,
    context: Option<Extension<AuthContext>>,
) -> Result<Json<BlogResponse>, ApiError> {
    match state.views.view(&id).await {
        Err(shared::Error::NotFound) => {}
        viewed => return Ok(Json(viewed?.into())),
    }

    let Some(Extension(context)) = context else {
        return Err(ApiError::NotFound);
    };
    let is_admin = match state.auth_service.require_admin(&context.identity).await {
        Ok(_) => true,
        Err(AuthError::PermissionDenied) => false,
        Err(other) => return Err(other.into()),
    };

    let draft = state
        .blog_admin
        .preview_draft(&id, &context.identity, is_admin)
        .await?;
    Ok(Json(draft.into()))
}

/// POST /blogs
pub async fn create_blog(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    body: Result<Json<CreateBlogRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BlogResponse>), ApiError> {
    let Json(request) = body.map_err(|e| ApiError::Validation(e.body_text()))?;

    let draft = state
        .blog_admin
        .create_draft(&context.identity, &request.title, &request.body)
        .await?;
    Ok((StatusCode::CREATED, Json(draft.into())))
}

/// PATCH /blogs/{id}
pub async fn update_blog(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<UpdateBlogRequest>, JsonRejection>,
) -> Result<Json<BlogResponse>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::Validation(e.body_text()))?;
    let update = BlogUpdate::from(request);

    let updated = state.blog_admin.update(&id, &update).await?;
    Ok(Json(updated.into()))
}
