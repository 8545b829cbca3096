//! The chat log: a fixed-capacity ring of messages and the worker that owns it.

mod ring;
mod server;

pub use ring::{ChatEntry, Cursor, RingChatLog, Window, LOG_CAPACITY, STARTUP_TEXT};
pub use server::{ChatLog, ChatLogHandle};
