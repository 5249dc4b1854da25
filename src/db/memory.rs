use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use super::{RepositoryError, UserFilter, UserRepository};
use crate::user::User;

/// In-process [`UserRepository`] with the same uniqueness rules as the
/// sqlite store.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Uuid, User>> {
        self.users.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Uuid, User>> {
        self.users
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn same_username(a: &str, b: &str) -> bool {
    !a.is_empty() && a.eq_ignore_ascii_case(b)
}

/// Reject `user` if another record already holds its email or username.
fn check_unique(users: &HashMap<Uuid, User>, user: &User) -> Result<(), RepositoryError> {
    for other in users.values().filter(|other| other.id() != user.id()) {
        if other.email() == user.email() {
            return Err(RepositoryError::Conflict("email"));
        }
        if same_username(other.username(), user.username()) {
            return Err(RepositoryError::Conflict("username"));
        }
    }
    Ok(())
}

#[async_trait]
impl UserRepository for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        Ok(self.read().get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self.read().values().find(|u| u.email() == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .read()
            .values()
            .find(|u| same_username(u.username(), username))
            .cloned())
    }

    async fn create(&self, user: &User) -> Result<(), RepositoryError> {
        let mut users = self.write();
        if users.contains_key(&user.id()) {
            return Err(RepositoryError::Conflict("id"));
        }
        check_unique(&users, user)?;
        users.insert(user.id(), user.clone());
        Ok(())
    }

    async fn update(&self, user: &User) -> Result<(), RepositoryError> {
        let mut users = self.write();
        if !users.contains_key(&user.id()) {
            return Err(RepositoryError::NotFound(user.id()));
        }
        check_unique(&users, user)?;
        users.insert(user.id(), user.clone());
        Ok(())
    }

    async fn find_many(&self, filter: UserFilter) -> Result<Vec<User>, RepositoryError> {
        let mut found: Vec<User> = self
            .read()
            .values()
            .filter(|u| filter.matches(u))
            .cloned()
            .collect();
        found.sort_by_key(|u| (u.created_at(), u.id()));
        Ok(found)
    }
}
