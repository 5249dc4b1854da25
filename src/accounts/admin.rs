//! Administrative actions and user listing.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{AccountService, UserView};
use crate::db::UserFilter;
use crate::error::AuthError;
use crate::user::User;
use crate::validation::ValidationError;

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserOrder {
    #[default]
    Username,
    CreatedAt,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Filters, ordering and paging for [`AccountService::list_users`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ListUsersQuery {
    pub is_active: Option<bool>,
    pub is_admin: Option<bool>,
    pub order_by: UserOrder,
    pub direction: SortDirection,
    pub page: u32,
    pub limit: u32,
}

impl Default for ListUsersQuery {
    fn default() -> Self {
        Self {
            is_active: None,
            is_admin: None,
            order_by: UserOrder::default(),
            direction: SortDirection::default(),
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserPage {
    pub items: Vec<UserView>,
    pub page: u32,
    pub limit: u32,
    pub total: usize,
}

/// Admins first, then by the requested key and direction.
fn compare(a: &User, b: &User, order: UserOrder, direction: SortDirection) -> Ordering {
    let by_key = match order {
        UserOrder::Username => a
            .username()
            .to_lowercase()
            .cmp(&b.username().to_lowercase()),
        UserOrder::CreatedAt => a.created_at().cmp(&b.created_at()),
    };
    let by_key = match direction {
        SortDirection::Asc => by_key,
        SortDirection::Desc => by_key.reverse(),
    };
    b.is_admin().cmp(&a.is_admin()).then(by_key)
}

impl AccountService {
    async fn active_admin_count(&self) -> Result<usize, AuthError> {
        Ok(self.users.find_many(UserFilter::active_admins()).await?.len())
    }

    /// Reactivate a deactivated user. Users who never finished their first
    /// activation must do so through their emailed link.
    pub async fn activate_user(&self, user_id: Uuid) -> Result<User, AuthError> {
        let mut user = self.load(user_id).await?;
        if !user.has_activated_once() {
            return Err(AuthError::UserPendingActivation);
        }
        if user.activate(self.now()) {
            self.users.update(&user).await?;
            info!(user_id = %user_id, "User activated by admin");
        }
        Ok(user)
    }

    /// Deactivate a user and kill their sessions. An admin cannot lock
    /// themselves out, and the last active admin cannot be removed.
    pub async fn deactivate_user(&self, actor_id: Uuid, user_id: Uuid) -> Result<User, AuthError> {
        if actor_id == user_id {
            return Err(AuthError::CannotDeactivateYourself);
        }

        let mut user = self.load(user_id).await?;
        if user.is_admin() && user.is_active() && self.active_admin_count().await? <= 1 {
            return Err(AuthError::LastAdminCannotBeDeactivated);
        }

        if user.deactivate(self.now()) {
            self.users.update(&user).await?;
            info!(user_id = %user_id, actor_id = %actor_id, "User deactivated");
        }
        Ok(user)
    }

    pub async fn promote_user(&self, user_id: Uuid) -> Result<User, AuthError> {
        let mut user = self.load(user_id).await?;
        if user.promote_to_admin(self.now()) {
            self.users.update(&user).await?;
            info!(user_id = %user_id, "User promoted to admin");
        }
        Ok(user)
    }

    /// Remove admin rights. Outstanding access tokens stop working.
    pub async fn demote_user(&self, actor_id: Uuid, user_id: Uuid) -> Result<User, AuthError> {
        if actor_id == user_id {
            return Err(AuthError::CannotDemoteYourself);
        }

        let mut user = self.load(user_id).await?;
        if user.is_admin() && user.is_active() && self.active_admin_count().await? <= 1 {
            return Err(AuthError::LastAdminCannotBeDemoted);
        }

        if user.demote_from_admin(self.now()) {
            self.users.update(&user).await?;
            info!(user_id = %user_id, actor_id = %actor_id, "Admin demoted");
        }
        Ok(user)
    }

    /// Admins may read anyone; other users only themselves.
    pub async fn get_user(&self, requester: &User, user_id: Uuid) -> Result<User, AuthError> {
        if !requester.is_admin() && requester.id() != user_id {
            return Err(AuthError::Forbidden);
        }
        self.load(user_id).await
    }

    pub async fn list_users(&self, query: &ListUsersQuery) -> Result<UserPage, AuthError> {
        if query.page == 0 {
            return Err(ValidationError::InvalidPage.into());
        }
        if query.limit == 0 || query.limit > MAX_PAGE_LIMIT {
            return Err(ValidationError::InvalidLimit.into());
        }

        let filter = UserFilter {
            is_active: query.is_active,
            is_admin: query.is_admin,
        };
        let mut users = self.users.find_many(filter).await?;
        users.sort_by(|a, b| compare(a, b, query.order_by, query.direction));

        let total = users.len();
        let offset = (query.page as usize - 1).saturating_mul(query.limit as usize);
        let items = users
            .iter()
            .skip(offset)
            .take(query.limit as usize)
            .map(UserView::from)
            .collect();

        Ok(UserPage {
            items,
            page: query.page,
            limit: query.limit,
            total,
        })
    }
}
