use super::error::AuthError;
use super::models::User;
use super::repository::UserRepository;
use async_trait::async_trait;
use sled::Transactional;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::path::Path;

const USERS_TREE: &str = "users";
const USERS_BY_USERNAME_TREE: &str = "users_by_username";

/// Users keyed by id, plus a username -> id index.
#[derive(Clone)]
pub struct SledUserRepository {
    users: sled::Tree,
    by_username: sled::Tree,
}

impl SledUserRepository {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, AuthError> {
        let db = sled::open(path)?;
        Ok(Self {
            users: db.open_tree(USERS_TREE)?,
            by_username: db.open_tree(USERS_BY_USERNAME_TREE)?,
        })
    }

    fn decode(bytes: &[u8]) -> Result<User, AuthError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[async_trait]
impl UserRepository for SledUserRepository {
    async fn create(&self, user: User) -> Result<User, AuthError> {
        let user_json = serde_json::to_vec(&user)?;

        // Both trees in one transaction so the index never points at nothing.
        let outcome = (&self.users, &self.by_username).transaction(|(users, by_username)| {
            if by_username.get(user.username.as_bytes())?.is_some() {
                return Err(ConflictableTransactionError::Abort(()));
            }
            users.insert(user.id.as_bytes(), user_json.clone())?;
            by_username.insert(user.username.as_bytes(), user.id.as_bytes())?;
            Ok(())
        });

        match outcome {
            Ok(()) => {
                self.users.flush_async().await?;
                Ok(user)
            }
            Err(TransactionError::Abort(())) => Err(AuthError::UserAlreadyExists),
            Err(TransactionError::Storage(e)) => Err(e.into()),
        }
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        let Some(user_id) = self.by_username.get(username.as_bytes())? else {
            return Ok(None);
        };

        match self.users.get(&user_id)? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AuthError> {
        match self.users.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn username_exists(&self, username: &str) -> Result<bool, AuthError> {
        Ok(self.by_username.contains_key(username.as_bytes())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::Role;
    use tempfile::TempDir;

    fn open() -> (TempDir, SledUserRepository) {
        let temp_dir = TempDir::new().unwrap();
        let repo = SledUserRepository::new(temp_dir.path().join("users.sled")).unwrap();
        (temp_dir, repo)
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let (_dir, repo) = open();
        let user = User::new("ada".into(), "hash".into(), Some(Role::Author));

        repo.create(user.clone()).await.unwrap();

        let by_name = repo.find_by_username("ada").await.unwrap().unwrap();
        assert_eq!(by_name.id, user.id);
        let by_id = repo.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(by_id.username, "ada");
        assert_eq!(by_id.role, Some(Role::Author));
        assert!(repo.username_exists("ada").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_user() {
        let (_dir, repo) = open();

        assert!(repo.find_by_username("ghost").await.unwrap().is_none());
        assert!(repo.find_by_id("ghost").await.unwrap().is_none());
        assert!(!repo.username_exists("ghost").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let (_dir, repo) = open();
        let first = User::new("ada".into(), "hash".into(), None);
        repo.create(first.clone()).await.unwrap();

        let second = User::new("ada".into(), "other".into(), Some(Role::Admin));
        let result = repo.create(second.clone()).await;

        assert!(matches!(result, Err(AuthError::UserAlreadyExists)));
        assert!(repo.find_by_id(&second.id).await.unwrap().is_none());
        assert_eq!(
            repo.find_by_username("ada").await.unwrap().unwrap().id,
            first.id
        );
    }
}
