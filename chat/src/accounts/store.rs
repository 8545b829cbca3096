use super::UserId;
use crate::{clock::SharedClock, error::ChatError, ids, limits};
use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

/// Author of the startup entry. Nobody can log in as this user.
pub const SYSTEM_USER: UserId = UserId(0);
pub const SYSTEM_USER_NAME: &str = "SYSTEM";

/// Where user names and passwords live.
///
/// `register_user` is only ever called from the [`Registrar`](super::Registrar)
/// worker, so implementations need not serialize registrations themselves.
pub trait CredentialStore: Send + Sync + 'static {
    fn register_user(&self, name: &str, password: &str) -> Result<UserId, ChatError>;

    fn is_valid_credential(&self, user: UserId, password: &str) -> bool;

    fn name_of(&self, user: UserId) -> Option<String>;
}

#[derive(Debug)]
struct UserRecord {
    name: String,
    password: String,
    registered_at: i64,
}

/// Process-local [`CredentialStore`].
pub struct MemoryCredentialStore {
    users: RwLock<HashMap<UserId, UserRecord>>,
    clock: SharedClock,
}

impl MemoryCredentialStore {
    pub fn new(clock: SharedClock) -> Self {
        let mut users = HashMap::new();
        // A password nobody knows keeps the system account out of reach.
        users.insert(
            SYSTEM_USER,
            UserRecord {
                name: SYSTEM_USER_NAME.to_string(),
                password: format!("{:016x}{:016x}", ids::random_u64(), ids::random_u64()),
                registered_at: clock.now(),
            },
        );
        Self {
            users: RwLock::new(users),
            clock,
        }
    }

    pub fn registered_at(&self, user: UserId) -> Option<i64> {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        users.get(&user).map(|record| record.registered_at)
    }

    pub fn user_count(&self) -> usize {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn register_user(&self, name: &str, password: &str) -> Result<UserId, ChatError> {
        limits::check_credentials(name, password)?;
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        let id = ids::unique_id(|candidate| users.contains_key(&UserId(candidate)))?;
        users.insert(
            UserId(id),
            UserRecord {
                name: name.to_string(),
                password: password.to_string(),
                registered_at: self.clock.now(),
            },
        );
        Ok(UserId(id))
    }

    fn is_valid_credential(&self, user: UserId, password: &str) -> bool {
        if user == SYSTEM_USER {
            return false;
        }
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        users
            .get(&user)
            .is_some_and(|record| record.password == password)
    }

    fn name_of(&self, user: UserId) -> Option<String> {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        users.get(&user).map(|record| record.name.clone())
    }
}
