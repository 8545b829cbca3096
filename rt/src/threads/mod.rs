//! OS-thread flavour. A worker started on a dedicated thread still runs async
//! code, but on a runtime nobody else shares.

use std::future::Future;

pub use std::thread::JoinHandle;

/// Blocks the current (non-runtime) thread on `future` using a private
/// current-thread runtime.
pub fn block_on<F: Future>(future: F) -> std::io::Result<F::Output> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(rt.block_on(future))
}

/// Spawns a named OS thread that owns a private runtime and drives `future`
/// on it until completion.
pub fn spawn_with_runtime<F>(name: &str, future: F) -> std::io::Result<JoinHandle<()>>
where
    F: Future<Output = ()> + Send + 'static,
{
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            if let Err(error) = block_on(future) {
                ::tracing::error!(%error, "could not build a runtime for dedicated thread");
            }
        })
}
