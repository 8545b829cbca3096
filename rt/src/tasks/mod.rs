//! Task-based runtime surface.
//!
//! Only the small set of tokio functionality the workers and timers need is
//! reexported. Extend it here rather than importing tokio downstream.

mod tokio;

use crate::tracing::init_tracing;
use std::future::Future;

pub use crate::tasks::tokio::mpsc;
pub use crate::tasks::tokio::oneshot;
pub use crate::tasks::tokio::CancellationToken;
pub use crate::tasks::tokio::{sleep, timeout};
pub use crate::tasks::tokio::{spawn, JoinHandle, Runtime};

/// Installs tracing and drives `future` to completion on a fresh multi-thread
/// runtime.
pub fn run<F: Future>(future: F) -> std::io::Result<F::Output> {
    init_tracing();

    let rt = Runtime::new()?;
    Ok(rt.block_on(future))
}
