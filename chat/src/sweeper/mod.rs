//! Periodic workers that expire idle sessions and stale challenges.
//!
//! A sweeper never touches the data it cleans. It asks the owning worker for a
//! listing, then sends one eviction request per stale key through the same
//! mailbox every other caller uses; the owner re-checks staleness when the
//! request arrives, so activity that lands in between wins.

mod challenge;
mod idle;

pub use challenge::{ChallengeSweeper, ChallengeSweeperHandle};
pub use idle::{IdleSweeper, IdleSweeperHandle};

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub evicted: usize,
}

#[derive(Debug, Clone)]
pub enum InMessage {
    SweepNow,
}

#[derive(Debug, Clone)]
pub enum CastMessage {
    Tick,
}
