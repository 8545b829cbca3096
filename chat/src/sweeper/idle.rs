use super::{CastMessage, InMessage, SweepReport};
use crate::{
    clock::SharedClock,
    error::ChatError,
    session::{RegistryHandle, SessionRegistry},
};
use mikron_concurrency::{
    send_interval, CallResponse, CastResponse, GenServer, GenServerHandle, InitResult,
    TimerHandle,
};
use std::time::Duration;

pub type IdleSweeperHandle = GenServerHandle<IdleSweeper>;

/// Logs out sessions that have been quiet for `idle_timeout` seconds.
pub struct IdleSweeper {
    registry: RegistryHandle,
    clock: SharedClock,
    idle_timeout: i64,
    interval: Duration,
    timer: Option<TimerHandle>,
}

impl IdleSweeper {
    pub fn new(
        registry: RegistryHandle,
        clock: SharedClock,
        idle_timeout_secs: i64,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            clock,
            idle_timeout: idle_timeout_secs,
            interval,
            timer: None,
        }
    }

    /// Runs a sweep right away instead of waiting for the next tick.
    pub async fn sweep_now(server: &IdleSweeperHandle) -> Result<SweepReport, ChatError> {
        server.call(InMessage::SweepNow).await?
    }

    async fn sweep(&self) -> Result<SweepReport, ChatError> {
        let now = self.clock.now();
        let activity = SessionRegistry::list_activity(&self.registry).await?;
        let mut report = SweepReport {
            scanned: activity.len(),
            evicted: 0,
        };
        for (user, last_activity) in activity {
            if now - last_activity < self.idle_timeout {
                continue;
            }
            if SessionRegistry::evict_if_idle(&self.registry, user, self.idle_timeout).await? {
                report.evicted += 1;
            }
        }
        if report.evicted > 0 {
            SessionRegistry::refresh_snapshot(&self.registry).await?;
            tracing::info!(evicted = report.evicted, "idle sessions swept");
        }
        Ok(report)
    }
}

impl GenServer for IdleSweeper {
    type CallMsg = InMessage;
    type CastMsg = CastMessage;
    type OutMsg = Result<SweepReport, ChatError>;
    type Error = ChatError;

    async fn init(mut self, handle: &IdleSweeperHandle) -> Result<InitResult<Self>, Self::Error> {
        self.timer = Some(send_interval(self.interval, handle.clone(), CastMessage::Tick));
        tracing::debug!(interval = ?self.interval, "idle sweeper started");
        Ok(InitResult::Success(self))
    }

    async fn handle_call(
        &mut self,
        message: Self::CallMsg,
        _handle: &IdleSweeperHandle,
    ) -> CallResponse<Self> {
        match message {
            InMessage::SweepNow => CallResponse::Reply(self.sweep().await),
        }
    }

    async fn handle_cast(
        &mut self,
        message: Self::CastMsg,
        _handle: &IdleSweeperHandle,
    ) -> CastResponse {
        match message {
            CastMessage::Tick => {
                if let Err(error) = self.sweep().await {
                    tracing::warn!(%error, "idle sweep failed");
                }
            }
        }
        CastResponse::NoReply
    }

    async fn teardown(self, _handle: &IdleSweeperHandle) -> Result<(), Self::Error> {
        if let Some(timer) = self.timer {
            timer.cancel();
        }
        Ok(())
    }
}
