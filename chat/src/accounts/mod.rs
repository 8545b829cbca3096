//! User registrations and the credential capability the core consumes.

mod registrar;
mod store;

pub use registrar::{Registrar, RegistrarHandle};
pub use store::{CredentialStore, MemoryCredentialStore, SYSTEM_USER, SYSTEM_USER_NAME};

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
