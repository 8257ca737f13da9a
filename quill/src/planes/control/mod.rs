//! Write path: drafts and editorial updates.
pub mod blog_admin;

pub use blog_admin::BlogAdmin;
