//! Timers that feed a server's own mailbox.
//!
//! A timer never runs server code itself: when it fires it casts a message,
//! and the server handles that message in turn like any other request.

use crate::gen_server::{GenServer, GenServerHandle};
use core::pin::pin;
use futures::future::select;
use mikron_rt::tasks::{self as rt, CancellationToken, JoinHandle};
use std::{future::Future, time::Duration};

/// Dropping the handle does not stop the timer; call [`TimerHandle::cancel`].
pub struct TimerHandle {
    pub join_handle: JoinHandle<()>,
    pub cancellation_token: CancellationToken,
}

impl TimerHandle {
    pub fn cancel(&self) {
        self.cancellation_token.cancel();
    }
}

/// Casts `message` to `server` once, after `delay`.
pub fn send_after<G: GenServer>(
    delay: Duration,
    server: GenServerHandle<G>,
    message: G::CastMsg,
) -> TimerHandle {
    spawn_timer(server.cancellation_token(), async move {
        rt::sleep(delay).await;
        // A closed mailbox means the server already stopped.
        let _ = server.cast(message);
    })
}

/// Casts a clone of `message` to `server` every `period`, starting one period
/// from now. Ends on cancel, when the server stops, or when its mailbox closes.
pub fn send_interval<G>(
    period: Duration,
    server: GenServerHandle<G>,
    message: G::CastMsg,
) -> TimerHandle
where
    G: GenServer,
    G::CastMsg: Clone,
{
    spawn_timer(server.cancellation_token(), async move {
        loop {
            rt::sleep(period).await;
            if server.cast(message.clone()).is_err() {
                break;
            }
        }
    })
}

/// Runs `work` until it finishes, the timer is cancelled, or `server_token`
/// fires, whichever comes first.
fn spawn_timer<F>(server_token: CancellationToken, work: F) -> TimerHandle
where
    F: Future<Output = ()> + Send + 'static,
{
    let cancellation_token = CancellationToken::new();
    let timer_token = cancellation_token.clone();
    let join_handle = rt::spawn(async move {
        let timer_cancelled = pin!(timer_token.cancelled());
        let server_stopped = pin!(server_token.cancelled());
        let work = pin!(work);
        let _ = select(select(timer_cancelled, server_stopped), work).await;
    });
    TimerHandle {
        join_handle,
        cancellation_token,
    }
}
