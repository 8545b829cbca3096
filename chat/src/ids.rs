//! Random identifiers drawn from the operating system's CSPRNG.

use crate::error::ChatError;
use rand::{rngs::OsRng, RngCore};

/// How many fresh draws a caller gets before giving up on finding a free id.
pub const MAX_ID_ATTEMPTS: usize = 64;

pub fn random_u64() -> u64 {
    OsRng.next_u64()
}

pub fn random_u32() -> u32 {
    OsRng.next_u32()
}

pub fn fill_random(buf: &mut [u8]) {
    OsRng.fill_bytes(buf);
}

/// Draws ids until one is not `taken`.
pub fn unique_id(taken: impl FnMut(u64) -> bool) -> Result<u64, ChatError> {
    unique_id_from(random_u64, taken)
}

/// Same as [`unique_id`] with a caller-supplied source of candidates.
pub fn unique_id_from(
    mut draw: impl FnMut() -> u64,
    mut taken: impl FnMut(u64) -> bool,
) -> Result<u64, ChatError> {
    for _ in 0..MAX_ID_ATTEMPTS {
        let candidate = draw();
        if !taken(candidate) {
            return Ok(candidate);
        }
        tracing::debug!(candidate, "id collision, drawing again");
    }
    Err(ChatError::IdSpaceExhausted(MAX_ID_ATTEMPTS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collisions_are_retried() {
        let mut candidates = [7, 7, 7, 9].into_iter();
        let id = unique_id_from(|| candidates.next().unwrap_or(0), |id| id == 7).unwrap();
        assert_eq!(9, id);
    }

    #[test]
    fn gives_up_after_the_attempt_cap() {
        let mut draws = 0;
        let result = unique_id_from(
            || {
                draws += 1;
                42
            },
            |_| true,
        );
        assert_eq!(Err(ChatError::IdSpaceExhausted(MAX_ID_ATTEMPTS)), result);
        assert_eq!(MAX_ID_ATTEMPTS, draws);
    }
}
