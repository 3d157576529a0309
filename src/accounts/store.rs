//! User, org and membership storage.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use thiserror::Error;

use crate::identity::OrgRole;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub login: String,
    pub name: String,
    /// Org the user signed up into.
    pub org_id: i64,
}

/// Sign-up request.
#[derive(Debug, Clone)]
pub struct CreateUserCommand {
    pub email: String,
    pub login: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("user not found")]
    UserNotFound,

    #[error("org {0} not found")]
    OrgNotFound(i64),

    #[error("user with email or login {0:?} already exists")]
    UserExists(String),

    #[error("user {user_id} is already a member of org {org_id}")]
    AlreadyMember { org_id: i64, user_id: i64 },

    #[error("user {user_id} is not a member of org {org_id}")]
    NotMember { org_id: i64, user_id: i64 },
}

pub type AccountResult<T> = Result<T, AccountError>;

/// Storage port for accounts.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Create a user together with a personal org where it is Admin.
    async fn create_user(&self, cmd: CreateUserCommand) -> AccountResult<User>;

    async fn get_user(&self, id: i64) -> AccountResult<User>;

    /// Case-insensitive email lookup.
    async fn get_user_by_email(&self, email: &str) -> AccountResult<User>;

    async fn add_org_user(&self, org_id: i64, user_id: i64, role: OrgRole) -> AccountResult<()>;

    async fn update_org_user(&self, org_id: i64, user_id: i64, role: OrgRole) -> AccountResult<()>;

    async fn org_role(&self, org_id: i64, user_id: i64) -> Option<OrgRole>;
}

/// Account store backed by concurrent maps.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    users: DashMap<i64, User>,
    orgs: DashMap<i64, String>,
    memberships: DashMap<(i64, i64), OrgRole>,
    last_user_id: AtomicI64,
    last_org_id: AtomicI64,
    write_lock: Mutex<()>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with the server admin (user 1) owning org 1.
    pub fn with_server_admin() -> Self {
        let store = Self::new();
        store.insert_user("admin@localhost", "admin", "Admin");
        store
    }

    fn insert_user(&self, email: &str, login: &str, name: &str) -> User {
        let user_id = self.last_user_id.fetch_add(1, Ordering::SeqCst) + 1;
        let org_id = self.last_org_id.fetch_add(1, Ordering::SeqCst) + 1;

        let user = User {
            id: user_id,
            email: email.to_string(),
            login: login.to_string(),
            name: name.to_string(),
            org_id,
        };
        self.orgs.insert(org_id, login.to_string());
        self.memberships.insert((org_id, user_id), OrgRole::Admin);
        self.users.insert(user_id, user.clone());
        user
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn create_user(&self, cmd: CreateUserCommand) -> AccountResult<User> {
        let _guard = self.write_lock.lock().expect("account store mutex poisoned");

        let taken = self.users.iter().any(|u| {
            u.email.eq_ignore_ascii_case(&cmd.email) || u.login.eq_ignore_ascii_case(&cmd.login)
        });
        if taken {
            return Err(AccountError::UserExists(cmd.login));
        }

        let user = self.insert_user(&cmd.email, &cmd.login, &cmd.name);
        tracing::info!(user_id = user.id, org_id = user.org_id, login = %user.login, "User created");
        Ok(user)
    }

    async fn get_user(&self, id: i64) -> AccountResult<User> {
        self.users
            .get(&id)
            .map(|u| u.value().clone())
            .ok_or(AccountError::UserNotFound)
    }

    async fn get_user_by_email(&self, email: &str) -> AccountResult<User> {
        self.users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .map(|u| u.value().clone())
            .ok_or(AccountError::UserNotFound)
    }

    async fn add_org_user(&self, org_id: i64, user_id: i64, role: OrgRole) -> AccountResult<()> {
        if !self.orgs.contains_key(&org_id) {
            return Err(AccountError::OrgNotFound(org_id));
        }
        if !self.users.contains_key(&user_id) {
            return Err(AccountError::UserNotFound);
        }

        match self.memberships.entry((org_id, user_id)) {
            Entry::Occupied(_) => Err(AccountError::AlreadyMember { org_id, user_id }),
            Entry::Vacant(slot) => {
                slot.insert(role);
                Ok(())
            }
        }
    }

    async fn update_org_user(&self, org_id: i64, user_id: i64, role: OrgRole) -> AccountResult<()> {
        match self.memberships.get_mut(&(org_id, user_id)) {
            Some(mut current) => {
                *current = role;
                Ok(())
            }
            None => Err(AccountError::NotMember { org_id, user_id }),
        }
    }

    async fn org_role(&self, org_id: i64, user_id: i64) -> Option<OrgRole> {
        self.memberships.get(&(org_id, user_id)).map(|r| *r)
    }
}
