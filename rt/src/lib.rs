//! Runtime wrapper to keep `tokio` out of the rest of the workspace. Workers,
//! timers and the chat core only ever name `mikron_rt`, so swapping the
//! executor means touching this crate alone.
//!
//! Two flavours are exposed:
//! - [`tasks`]: async tasks on a shared tokio runtime (the default worker home).
//! - [`threads`]: dedicated OS threads, each driving its own private runtime.

pub mod tasks;
pub mod threads;
mod tracing;

pub use crate::tracing::init_tracing;
