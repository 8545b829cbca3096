//! GenServer trait and structs to create an abstraction similar to Erlang gen_server.
//!
//! A GenServer owns its state exclusively. Everybody else talks to it through a
//! [`GenServerHandle`], which pushes messages into the server's mailbox; the
//! server takes them out one at a time and runs each to completion before
//! looking at the next. That one-at-a-time processing gives every server
//! single-writer semantics over its state without any lock.
use crate::error::GenServerError;
use core::pin::pin;
use futures::future::{self, Either, FutureExt as _};
use mikron_rt::{
    tasks::{self as rt, mpsc, oneshot, timeout, CancellationToken},
    threads,
};
use std::{fmt::Debug, future::Future, panic::AssertUnwindSafe, time::Duration};

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a GenServer's loop runs.
///
/// | Backend | Execution Model | Best For |
/// |---------|-----------------|----------|
/// | `Async` | Tokio task on the caller's runtime | Short, non-blocking handlers |
/// | `Thread` | Dedicated OS thread with its own runtime | Long-lived singletons that must not share the main runtime |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Backend {
    /// **Warning**: a handler that blocks synchronously stalls the runtime
    /// thread it happens to be scheduled on.
    #[default]
    Async,
    Thread,
}

/// Cloneable address of a running GenServer.
#[derive(Debug)]
pub struct GenServerHandle<G: GenServer> {
    tx: mpsc::Sender<GenServerInMsg<G>>,
    cancellation_token: CancellationToken,
}

impl<G: GenServer> Clone for GenServerHandle<G> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            cancellation_token: self.cancellation_token.clone(),
        }
    }
}

impl<G: GenServer> GenServerHandle<G> {
    fn spawn(server: G, backend: Backend) -> Self {
        let (tx, mut rx) = mpsc::channel::<GenServerInMsg<G>>();
        let handle = GenServerHandle {
            tx,
            cancellation_token: CancellationToken::new(),
        };

        let server_handle = handle.clone();
        let lifecycle = async move {
            if let Err(error) = serve(server, &server_handle, &mut rx).await {
                tracing::debug!(%error, server = std::any::type_name::<G>(), "GenServer exited");
            }
        };
        match backend {
            Backend::Async => {
                // Stopping goes through the token, so the join handle is not kept.
                let _join_handle = rt::spawn(lifecycle);
            }
            Backend::Thread => {
                let name = format!("genserver-{}", std::any::type_name::<G>());
                if let Err(error) = threads::spawn_with_runtime(&name, lifecycle) {
                    tracing::error!(%error, "could not spawn GenServer thread");
                    handle.stop();
                }
            }
        }
        handle
    }

    /// Sends `message` and suspends until the server replies or
    /// [`DEFAULT_CALL_TIMEOUT`] elapses.
    pub async fn call(&self, message: G::CallMsg) -> Result<G::OutMsg, GenServerError> {
        self.call_with_timeout(message, DEFAULT_CALL_TIMEOUT).await
    }

    pub async fn call_with_timeout(
        &self,
        message: G::CallMsg,
        duration: Duration,
    ) -> Result<G::OutMsg, GenServerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx.send(GenServerInMsg::Call {
            sender: reply_tx,
            message,
        })?;

        match timeout(duration, reply_rx).await {
            Ok(Ok(reply)) => reply,
            // The server dropped the conduit without answering: it stopped.
            Ok(Err(_)) => Err(GenServerError::Server),
            Err(_) => Err(GenServerError::CallTimeout),
        }
    }

    /// Fire-and-forget. Only fails when the server's mailbox is closed.
    pub fn cast(&self, message: G::CastMsg) -> Result<(), GenServerError> {
        self.tx
            .send(GenServerInMsg::Cast { message })
            .map_err(|_| GenServerError::Server)
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Asks the server to stop. The message being processed (if any) runs to
    /// completion; everything still queued behind it is abandoned.
    pub fn stop(&self) {
        self.cancellation_token.cancel();
    }
}

pub(crate) enum GenServerInMsg<G: GenServer> {
    Call {
        sender: oneshot::Sender<Result<G::OutMsg, GenServerError>>,
        message: G::CallMsg,
    },
    Cast {
        message: G::CastMsg,
    },
}

pub enum CallResponse<G: GenServer> {
    Reply(G::OutMsg),
    Unused,
    /// Reply, then stop the server.
    Stop(G::OutMsg),
}

pub enum CastResponse {
    NoReply,
    Unused,
    Stop,
}

pub enum InitResult<G: GenServer> {
    Success(G),
    /// Initialization gave up on its own terms: skip the loop, still run teardown.
    NoSuccess(G),
}

pub trait GenServer: Send + Sized + 'static {
    type CallMsg: Send + Sized;
    type CastMsg: Send + Sized;
    type OutMsg: Send + Sized;
    type Error: Debug + Send;

    /// Start the GenServer on the default backend (Async).
    fn start(self) -> GenServerHandle<Self> {
        self.start_with_backend(Backend::default())
    }

    fn start_with_backend(self, backend: Backend) -> GenServerHandle<Self> {
        GenServerHandle::spawn(self, backend)
    }

    /// Runs before the first message is taken out of the mailbox. Timers that
    /// target this server are usually started here.
    fn init(
        self,
        _handle: &GenServerHandle<Self>,
    ) -> impl Future<Output = Result<InitResult<Self>, Self::Error>> + Send {
        async move { Ok(InitResult::Success(self)) }
    }

    fn handle_call(
        &mut self,
        _message: Self::CallMsg,
        _handle: &GenServerHandle<Self>,
    ) -> impl Future<Output = CallResponse<Self>> + Send {
        async { CallResponse::Unused }
    }

    fn handle_cast(
        &mut self,
        _message: Self::CastMsg,
        _handle: &GenServerHandle<Self>,
    ) -> impl Future<Output = CastResponse> + Send {
        async { CastResponse::Unused }
    }

    /// Runs once the loop has ended, whatever the reason. Cancel timers here.
    fn teardown(
        self,
        _handle: &GenServerHandle<Self>,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async { Ok(()) }
    }
}

/// Whole life of a server: init, message loop, teardown.
async fn serve<G: GenServer>(
    server: G,
    handle: &GenServerHandle<G>,
    rx: &mut mpsc::Receiver<GenServerInMsg<G>>,
) -> Result<(), GenServerError> {
    let outcome = match server.init(handle).await {
        Ok(InitResult::Success(mut server)) => {
            while let Some(message) = next_message(handle, rx).await {
                if !dispatch(&mut server, message, handle).await || handle.is_cancelled() {
                    break;
                }
            }
            Ok(server)
        }
        Ok(InitResult::NoSuccess(server)) => Ok(server),
        Err(error) => {
            tracing::error!(?error, "GenServer initialization failed");
            Err(GenServerError::Initialization)
        }
    };

    // From here on the handle reports the server as gone.
    handle.stop();
    let server = outcome?;
    if let Err(error) = server.teardown(handle).await {
        tracing::error!(?error, "GenServer teardown failed");
    }
    Ok(())
}

/// Next message in the mailbox, or `None` once stopped or once every sender is gone.
async fn next_message<G: GenServer>(
    handle: &GenServerHandle<G>,
    rx: &mut mpsc::Receiver<GenServerInMsg<G>>,
) -> Option<GenServerInMsg<G>> {
    let token = handle.cancellation_token();
    let received = pin!(rx.recv());
    let stopped = pin!(token.cancelled());
    match future::select(received, stopped).await {
        Either::Left((message, _)) => message,
        Either::Right(_) => None,
    }
}

/// Runs the matching callback. Returns whether the server keeps going.
///
/// A panicking callback is logged and, for calls, answered with
/// [`GenServerError::Callback`]; the server itself survives it.
async fn dispatch<G: GenServer>(
    server: &mut G,
    message: GenServerInMsg<G>,
    handle: &GenServerHandle<G>,
) -> bool {
    match message {
        GenServerInMsg::Call { sender, message } => {
            let outcome = AssertUnwindSafe(server.handle_call(message, handle))
                .catch_unwind()
                .await;
            let (keep_running, reply) = match outcome {
                Ok(CallResponse::Reply(reply)) => (true, Ok(reply)),
                Ok(CallResponse::Stop(reply)) => (false, Ok(reply)),
                Ok(CallResponse::Unused) => {
                    tracing::error!("GenServer received a call it does not handle");
                    (true, Err(GenServerError::CallMsgUnused))
                }
                Err(panic) => {
                    tracing::error!(?panic, "GenServer call handler panicked");
                    (true, Err(GenServerError::Callback))
                }
            };
            if sender.send(reply).is_err() {
                tracing::trace!("caller went away before the reply");
            }
            keep_running
        }
        GenServerInMsg::Cast { message } => {
            let outcome = AssertUnwindSafe(server.handle_cast(message, handle))
                .catch_unwind()
                .await;
            match outcome {
                Ok(CastResponse::NoReply) => true,
                Ok(CastResponse::Stop) => false,
                Ok(CastResponse::Unused) => {
                    tracing::error!("GenServer received a cast it does not handle");
                    true
                }
                Err(panic) => {
                    tracing::error!(?panic, "GenServer cast handler panicked");
                    true
                }
            }
        }
    }
}
