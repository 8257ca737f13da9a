use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use quill::auth::{
    AuthService, IdentityResolver, MokaSessionRepository, SessionStore, SledUserRepository,
    TokenCodec, UserRepository,
};
use quill::persistence::SledRecordStore;
use quill::planes::control::BlogAdmin;
use quill::planes::data::{ListingCache, ViewCounter};
use quill::{Blog, CachedListing, IdentityPayload, RecordStore};
use sha2::{Digest, Sha512};
use shared::config::Config;
use shared::{Error, Result};
use std::path::Path;
use std::sync::Arc;
use storage_engine::{ExpiringStore, SweeperHandle};
use tracing::{info, warn};

/// Server state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth_service: Arc<AuthService>,
    pub session_store: Arc<SessionStore<MokaSessionRepository>>,
    pub codec: Arc<TokenCodec>,
    pub resolver: Arc<IdentityResolver>,
    pub listings: Arc<ListingCache>,
    pub views: Arc<ViewCounter>,
    pub blog_admin: Arc<BlogAdmin>,
    pub cookie_key: Key,
    // Sweepers stop when the last clone of the state is dropped.
    _sweepers: Arc<Vec<SweeperHandle>>,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Create the configured admin account if it is missing. A generated password
/// is logged once, when the account is created with it.
async fn seed_admin(auth_service: &AuthService, config: &Config) -> Result<bool> {
    let created = auth_service
        .ensure_default_admin(&config.admin_username, &config.admin_password)
        .await
        .map_err(|e| Error::Internal(format!("Failed to seed admin user: {}", e)))?;

    if !created {
        info!("Admin user already exists: {}", config.admin_username);
    } else if config.admin_password_generated {
        warn!(
            "QUILL_ADMIN_PASSWORD not set, admin '{}' created with password: {}",
            config.admin_username, config.admin_password
        );
    }
    Ok(created)
}

impl AppState {
    /// Open the stores under `config.data_dir`, seed the admin account and
    /// start one sweeper per expiring cache. Must run inside a Tokio runtime.
    pub async fn new(config: Arc<Config>) -> Result<Self> {
        let data_dir = Path::new(&config.data_dir);
        std::fs::create_dir_all(data_dir)
            .map_err(|e| Error::Internal(format!("Failed to create data directory: {}", e)))?;

        let records: Arc<dyn RecordStore> =
            Arc::new(SledRecordStore::new(data_dir.join("blogs.sled"))?);
        let users: Arc<dyn UserRepository> = Arc::new(
            SledUserRepository::new(data_dir.join("users.sled"))
                .map_err(|e| Error::StoreUnavailable(e.to_string()))?,
        );

        let auth_service = Arc::new(AuthService::new(users));
        seed_admin(&auth_service, &config).await?;

        let session_repository = Arc::new(MokaSessionRepository::new(
            None,
            Some(config.session_ttl),
        ));
        let session_store = Arc::new(SessionStore::new(
            session_repository,
            config.session_ttl.as_millis() as u64,
        ));

        let identity_cache: ExpiringStore<IdentityPayload> = ExpiringStore::new("identity");
        let revoked: ExpiringStore<()> = ExpiringStore::new("revoked");
        let listing_cache: ExpiringStore<CachedListing> = ExpiringStore::new("listing");
        let detail_cache: ExpiringStore<Blog> = ExpiringStore::new("detail");
        let sweepers = vec![
            identity_cache.spawn_sweeper(config.sweep_interval),
            revoked.spawn_sweeper(config.sweep_interval),
            listing_cache.spawn_sweeper(config.sweep_interval),
            detail_cache.spawn_sweeper(config.sweep_interval),
        ];

        let codec = Arc::new(TokenCodec::new(&config.token_secret));
        let resolver = Arc::new(IdentityResolver::new(
            codec.clone(),
            identity_cache,
            revoked,
            config.identity_cache_ttl,
        ));

        let listings = Arc::new(ListingCache::new(
            records.clone(),
            listing_cache,
            config.listing_cache_ttl,
        ));
        let views = Arc::new(ViewCounter::new(
            records.clone(),
            detail_cache,
            config.detail_cache_ttl,
        ));
        let blog_admin = Arc::new(BlogAdmin::new(records, views.clone()));

        // Key wants 64 bytes; the configured secret may be any length.
        let cookie_key = Key::from(Sha512::digest(&config.token_secret).as_slice());

        info!("Application state initialised (data dir: {})", config.data_dir);

        Ok(Self {
            config,
            auth_service,
            session_store,
            codec,
            resolver,
            listings,
            views,
            blog_admin,
            cookie_key,
            _sweepers: Arc::new(sweepers),
        })
    }
}
