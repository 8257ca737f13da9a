use super::error::AuthError;
use super::models::User;
use async_trait::async_trait;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Store a new user. Fails with `UserAlreadyExists` if the username is taken.
    async fn create(&self, user: User) -> Result<User, AuthError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AuthError>;

    async fn username_exists(&self, username: &str) -> Result<bool, AuthError>;
}
