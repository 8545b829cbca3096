use crate::error::ChatError;
use std::{fmt, str::FromStr, sync::Arc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChallengeId(pub u64);

impl fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ChallengeId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(ChallengeId)
    }
}

/// Image bytes until the client has downloaded them once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Image(Arc<[u8]>),
    Cleared,
}

impl Payload {
    pub fn bytes(&self) -> &[u8] {
        match self {
            Payload::Image(bytes) => bytes,
            Payload::Cleared => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub id: ChallengeId,
    pub created_at: i64,
    pub answer: u8,
    pub payload: Payload,
}

impl Challenge {
    /// Checks `answer`, then that the challenge is no older than `timeout` seconds.
    pub fn verify(&self, answer: u8, now: i64, timeout: i64) -> Result<(), ChatError> {
        if answer != self.answer {
            return Err(ChatError::WrongAnswer(self.id));
        }
        if self.is_expired(now, timeout) {
            return Err(ChatError::Expired(self.id));
        }
        Ok(())
    }

    pub fn is_expired(&self, now: i64, timeout: i64) -> bool {
        now - self.created_at > timeout
    }
}

/// A client's claimed solution to a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChallengeAnswer {
    pub id: ChallengeId,
    pub answer: u8,
}

/// A freshly drawn challenge picture and the number it shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeImage {
    pub payload: Vec<u8>,
    pub answer: u8,
}

/// Produces challenge pictures. Rendering happens outside the store's worker.
pub trait ImageGenerator: Send + Sync + 'static {
    fn generate(&self) -> ChallengeImage;
}
