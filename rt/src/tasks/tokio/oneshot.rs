//! Tokio.rs reexports to prevent tokio dependencies within external code.
//! Used as the private reply conduit of a single request.

pub use tokio::sync::oneshot::{channel, error::RecvError, Receiver, Sender};
