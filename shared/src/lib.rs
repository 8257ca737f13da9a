// shared/src/lib.rs

/// Failure categories shared by the record store, the caches and the services on top.
///
/// Credential failures have their own types in `quill::auth`; these are the
/// store-side outcomes a handler maps onto a response.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("internal: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

pub mod config;
