//! Tracing initializer

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::FmtSubscriber;

/// Installs a global `fmt` subscriber filtered by `RUST_LOG` (defaults to
/// `info`). Calling it again after a subscriber is set is a no-op.
pub fn init_tracing() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::trace!("tracing subscriber already installed");
    }
}
