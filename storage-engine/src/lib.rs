//! In-process storage primitives shared by the quill services.
//!
//! Nothing in here knows about identities, blogs or counters: the stores hold
//! opaque string keys and typed values.

pub mod expiring_store;

pub use expiring_store::{ExpiringStore, SweeperHandle};
