/// Placeholder message type for GenServers that accept no casts (or no
/// calls). Having no variants, it can never be constructed.
#[derive(Debug, Clone, Copy)]
pub enum Unused {}
