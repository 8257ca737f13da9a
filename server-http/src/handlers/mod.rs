pub mod auth;
pub mod blogs;
pub mod health;

pub use auth::{login, logout, me};
pub use blogs::{create_blog, get_blog, list_blogs, update_blog};
pub use health::health_check;
