use crate::handlers;
use crate::middleware::{check_admin, identify_if_present, require_identity};
use crate::state::AppState;
use axum::{
    Router, middleware,
    routing::{get, patch, post},
};
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::trace::TraceLayer;

/// Build and configure the application router
pub fn build_router(state: AppState) -> Router {
    let authenticated = || middleware::from_fn_with_state(state.clone(), require_identity);
    let admin_only = middleware::from_fn_with_state(state.clone(), check_admin);
    let identified_if_present =
        middleware::from_fn_with_state(state.clone(), identify_if_present);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Auth routes
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route(
            "/auth/me",
            get(handlers::me).route_layer(authenticated()),
        )
        // Blog routes: reads are public (drafts only for their author or an admin),
        // writes need an identity, edits an admin
        .route(
            "/blogs",
            get(handlers::list_blogs)
                .merge(post(handlers::create_blog).route_layer(authenticated())),
        )
        .route(
            "/blogs/{id}",
            get(handlers::get_blog)
                .route_layer(identified_if_present)
                .merge(
                    patch(handlers::update_blog)
                        .route_layer(admin_only)
                        .route_layer(authenticated()),
                ),
        )
        // Middleware
        .layer(NormalizePathLayer::trim_trailing_slash())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
