//! Size limits applied before a request reaches any worker.

use crate::error::ValidationError;

pub const MAX_MESSAGE_BYTES: usize = 4096;
pub const MAX_NAME_BYTES: usize = 255;
pub const MAX_PASSWORD_BYTES: usize = 255;

pub fn check_message(text: &str) -> Result<(), ValidationError> {
    if text.is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    if text.len() > MAX_MESSAGE_BYTES {
        return Err(ValidationError::MessageTooLong(text.len()));
    }
    Ok(())
}

pub fn check_credentials(name: &str, password: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if name.len() > MAX_NAME_BYTES {
        return Err(ValidationError::NameTooLong(name.len()));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(ValidationError::PasswordTooLong(password.len()));
    }
    Ok(())
}
