use crate::api::HealthResponse;
use crate::state::AppState;
use axum::{Json, extract::State};

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        cached_identities: state.resolver.cached_identities(),
        revoked_tokens: state.resolver.revoked_tokens(),
        cached_listing_pages: state.listings.cached_pages(),
        cached_details: state.views.cached_details(),
        pending_view_refreshes: state.views.pending_refreshes(),
    })
}
