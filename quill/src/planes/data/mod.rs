//! Read path: cached listings and counted detail views.
pub mod listing_cache;
pub mod view_counter;

pub use listing_cache::ListingCache;
pub use view_counter::{ViewCounter, detail_key};
