//! In-memory state core of the mikron chat server.
//!
//! Every shared dataset (the chat log, the active sessions, the pending
//! challenges, the user registrations) is owned by exactly one
//! [`GenServer`](mikron_concurrency::GenServer). Request handlers never touch
//! the data directly: they send a request into the owning server's mailbox
//! and wait for the reply. [`ChatCore`] bundles the handles together with the
//! configuration and the pluggable capabilities, and exposes the operations an
//! HTTP layer needs.

pub mod accounts;
pub mod challenge;
pub mod clock;
pub mod config;
mod context;
pub mod error;
pub mod ids;
pub mod limits;
pub mod log;
pub mod protocol;
pub mod session;
pub mod sweeper;

pub use context::ChatCore;
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{ConfigError, CoreConfig};
pub use error::{ChatError, ValidationError};
pub use protocol::{Reply, ResponseCode};
