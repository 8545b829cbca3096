//! # mikron-concurrency
//!
//! Mailbox-driven workers in the style of Erlang's `gen_server`.
//!
//! Each [`GenServer`] owns its state outright and is reachable only through a
//! [`GenServerHandle`]. Callers package a request, drop it into the server's
//! FIFO mailbox together with a private reply conduit, and wait for the
//! answer. The server processes one message at a time, so every piece of state
//! it owns has exactly one writer.
//!
//! ```ignore
//! use mikron_concurrency::{CallResponse, GenServer, GenServerHandle};
//!
//! struct Counter { count: u64 }
//!
//! impl GenServer for Counter {
//!     type CallMsg = ();
//!     type CastMsg = mikron_concurrency::messages::Unused;
//!     type OutMsg = u64;
//!     type Error = ();
//!
//!     async fn handle_call(&mut self, _: (), _: &GenServerHandle<Self>) -> CallResponse<Self> {
//!         self.count += 1;
//!         CallResponse::Reply(self.count)
//!     }
//! }
//!
//! let handle = Counter { count: 0 }.start();
//! let count = handle.call(()).await?;
//! ```
//!
//! Periodic work (sweeps, refreshes) is driven by [`send_interval`], which
//! casts a message into the server's own mailbox so the work is serialized
//! with every other request.

pub mod error;
mod gen_server;
pub mod messages;
mod time;


pub use error::GenServerError;
pub use gen_server::{
    Backend, CallResponse, CastResponse, GenServer, GenServerHandle, InitResult,
    DEFAULT_CALL_TIMEOUT,
};
pub use time::{send_after, send_interval, TimerHandle};
