// Public API
pub mod auth_service;
pub mod codec;
pub mod error;
pub mod models;
pub mod moka_session_repository;
pub mod password;
pub mod repository;
pub mod resolver;
pub mod session;
pub mod session_store;
pub mod sled_repository;

// Re-export commonly used types
pub use auth_service::AuthService;
pub use codec::{Clock, ManualClock, SystemClock, TokenCodec};
pub use error::{AuthError, TokenError};
pub use models::{Role, User};
pub use moka_session_repository::MokaSessionRepository;
pub use repository::UserRepository;
pub use resolver::{
    CredentialSource, CredentialSources, IdentityResolver, Rejection, Resolved, token_cache_key,
};
pub use session::{Session, SessionId, current_timestamp_ms, format_utc_time, generate_session_id};
pub use session_store::{SessionRepository, SessionStore};
pub use sled_repository::SledUserRepository;
