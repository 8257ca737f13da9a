use super::error::AuthError;
use super::models::{Role, User};
use super::password::{hash_password, verify_password};
use super::repository::UserRepository;
use crate::domain::IdentityPayload;
use std::sync::Arc;
use tracing::info;

pub struct AuthService {
    user_repo: Arc<dyn UserRepository>,
}

impl AuthService {
    pub fn new(user_repo: Arc<dyn UserRepository>) -> Self {
        Self { user_repo }
    }

    /// Check a username/password pair. Unknown users and wrong passwords are
    /// indistinguishable to the caller.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let user = self
            .user_repo
            .find_by_username(username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user)
    }

    /// Allow only users whose stored role is `Admin`.
    ///
    /// The identity is looked up again so a role change applies to tokens
    /// already issued. No user or no role means no access.
    pub async fn require_admin(&self, identity: &IdentityPayload) -> Result<User, AuthError> {
        match self.user_repo.find_by_id(&identity.id).await? {
            Some(user) if user.is_admin() => Ok(user),
            _ => Err(AuthError::PermissionDenied),
        }
    }

    pub async fn register(
        &self,
        username: &str,
        password: &str,
        role: Option<Role>,
    ) -> Result<User, AuthError> {
        let password_hash = hash_password(password)?;
        self.user_repo
            .create(User::new(username.to_string(), password_hash, role))
            .await
    }

    /// Create the admin account if `username` is free. Returns whether it was created.
    pub async fn ensure_default_admin(
        &self,
        username: &str,
        password: &str,
    ) -> Result<bool, AuthError> {
        if self.user_repo.username_exists(username).await? {
            return Ok(false);
        }

        match self.register(username, password, Some(Role::Admin)).await {
            Ok(_) => {
                info!("Created default admin user '{}'", username);
                Ok(true)
            }
            // Lost a race with another start-up.
            Err(AuthError::UserAlreadyExists) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
