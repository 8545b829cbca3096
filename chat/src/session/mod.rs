//! Active sessions and the worker that owns them.

mod model;
mod registry;

pub use model::{ActiveSession, SessionToken};
pub use registry::{RegistryHandle, SessionRegistry};
