pub mod authentication;
pub mod authorization;

pub use authentication::{
    AuthContext, extract_bearer_token, identify_if_present, require_identity,
};
pub use authorization::check_admin;
