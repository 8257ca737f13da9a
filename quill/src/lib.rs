//! Core of the quill blog backend: identities and credentials, the blog record
//! store, and the caches that sit between HTTP handlers and the store.

pub mod auth;
pub mod domain;
pub mod persistence;
pub mod planes;
pub mod ports;

pub use domain::{Blog, BlogUpdate, CachedListing, IdentityPayload, ListingQuery, SortField};
pub use ports::RecordStore;
