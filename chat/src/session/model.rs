use crate::{accounts::UserId, ids, log::Cursor};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt;

/// Opaque proof that a request comes from whoever logged in.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        ids::fill_random(&mut bytes);
        Self(STANDARD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for SessionToken {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

// Tokens are credentials; keep them out of logs.
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub user: UserId,
    pub token: SessionToken,
    pub address: String,
    pub last_activity: i64,
    /// Chat log tail at login. Clients never get history older than this.
    pub login_cursor: Cursor,
}

impl ActiveSession {
    pub fn idle_for(&self, now: i64) -> i64 {
        now - self.last_activity
    }

    pub fn is_idle(&self, now: i64, threshold: i64) -> bool {
        self.idle_for(now) >= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_differ() {
        let a = SessionToken::generate();
        let b = SessionToken::generate();
        assert_ne!(a, b);
        assert_eq!(24, a.as_str().len());
        assert_eq!("SessionToken(..)", format!("{a:?}"));
    }

    #[test]
    fn idle_threshold_is_inclusive() {
        let session = ActiveSession {
            user: UserId(1),
            token: "t".into(),
            address: "127.0.0.1".into(),
            last_activity: 100,
            login_cursor: Cursor { sequence: 0, timestamp: 100 },
        };
        assert!(!session.is_idle(219, 120));
        assert!(session.is_idle(220, 120));
    }
}
