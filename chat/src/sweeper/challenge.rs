use super::{CastMessage, InMessage, SweepReport};
use crate::{
    challenge::{ChallengeStore, ChallengeStoreHandle},
    clock::SharedClock,
    error::ChatError,
};
use mikron_concurrency::{
    send_interval, CallResponse, CastResponse, GenServer, GenServerHandle, InitResult,
    TimerHandle,
};
use std::time::Duration;

pub type ChallengeSweeperHandle = GenServerHandle<ChallengeSweeper>;

/// Drops challenges nobody answered within `timeout` seconds.
pub struct ChallengeSweeper {
    store: ChallengeStoreHandle,
    clock: SharedClock,
    timeout: i64,
    interval: Duration,
    timer: Option<TimerHandle>,
}

impl ChallengeSweeper {
    pub fn new(
        store: ChallengeStoreHandle,
        clock: SharedClock,
        timeout_secs: i64,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            timeout: timeout_secs,
            interval,
            timer: None,
        }
    }

    pub async fn sweep_now(server: &ChallengeSweeperHandle) -> Result<SweepReport, ChatError> {
        server.call(InMessage::SweepNow).await?
    }

    async fn sweep(&self) -> Result<SweepReport, ChatError> {
        let now = self.clock.now();
        let ages = ChallengeStore::list_ages(&self.store).await?;
        let mut report = SweepReport {
            scanned: ages.len(),
            evicted: 0,
        };
        for (id, created_at) in ages {
            if now - created_at <= self.timeout {
                continue;
            }
            if ChallengeStore::evict_if_expired(&self.store, id, self.timeout).await? {
                report.evicted += 1;
            }
        }
        if report.evicted > 0 {
            tracing::debug!(evicted = report.evicted, "expired challenges swept");
        }
        Ok(report)
    }
}

impl GenServer for ChallengeSweeper {
    type CallMsg = InMessage;
    type CastMsg = CastMessage;
    type OutMsg = Result<SweepReport, ChatError>;
    type Error = ChatError;

    async fn init(
        mut self,
        handle: &ChallengeSweeperHandle,
    ) -> Result<InitResult<Self>, Self::Error> {
        self.timer = Some(send_interval(self.interval, handle.clone(), CastMessage::Tick));
        Ok(InitResult::Success(self))
    }

    async fn handle_call(
        &mut self,
        message: Self::CallMsg,
        _handle: &ChallengeSweeperHandle,
    ) -> CallResponse<Self> {
        match message {
            InMessage::SweepNow => CallResponse::Reply(self.sweep().await),
        }
    }

    async fn handle_cast(
        &mut self,
        message: Self::CastMsg,
        _handle: &ChallengeSweeperHandle,
    ) -> CastResponse {
        match message {
            CastMessage::Tick => {
                if let Err(error) = self.sweep().await {
                    tracing::warn!(%error, "challenge sweep failed");
                }
            }
        }
        CastResponse::NoReply
    }

    async fn teardown(self, _handle: &ChallengeSweeperHandle) -> Result<(), Self::Error> {
        if let Some(timer) = self.timer {
            timer.cancel();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        challenge::{ChallengeImage, ImageGenerator},
        clock::ManualClock,
    };
    use mikron_rt::tasks::{self as rt};
    use std::sync::Arc;

    struct Blank;

    impl ImageGenerator for Blank {
        fn generate(&self) -> ChallengeImage {
            ChallengeImage {
                payload: vec![0; 4],
                answer: 1,
            }
        }
    }

    #[test]
    fn ticks_remove_expired_challenges_only() {
        let runtime = rt::Runtime::new().unwrap();
        runtime.block_on(async move {
            let clock = ManualClock::new(1_000);
            let shared: SharedClock = Arc::new(clock.clone());
            let store = ChallengeStore::new(shared.clone()).start();

            let old = ChallengeStore::issue(&store, &Blank).await.unwrap();
            clock.advance(45);
            let young = ChallengeStore::issue(&store, &Blank).await.unwrap();
            clock.advance(20);

            let sweeper =
                ChallengeSweeper::new(store.clone(), shared, 60, Duration::from_millis(30))
                    .start();
            rt::sleep(Duration::from_millis(120)).await;

            assert_eq!(
                Err(ChatError::ChallengeNotFound(old)),
                ChallengeStore::fetch(&store, old).await
            );
            assert!(ChallengeStore::fetch(&store, young).await.is_ok());

            sweeper.stop();
        });
    }

    #[test]
    fn sweep_now_reports_what_it_saw() {
        let runtime = rt::Runtime::new().unwrap();
        runtime.block_on(async move {
            let clock = ManualClock::new(0);
            let shared: SharedClock = Arc::new(clock.clone());
            let store = ChallengeStore::new(shared.clone()).start();
            for _ in 0..3 {
                ChallengeStore::issue(&store, &Blank).await.unwrap();
            }
            let sweeper =
                ChallengeSweeper::new(store.clone(), shared, 60, Duration::from_secs(120)).start();

            clock.advance(60);
            let report = ChallengeSweeper::sweep_now(&sweeper).await.unwrap();
            assert_eq!(SweepReport { scanned: 3, evicted: 0 }, report);

            clock.advance(1);
            let report = ChallengeSweeper::sweep_now(&sweeper).await.unwrap();
            assert_eq!(SweepReport { scanned: 3, evicted: 3 }, report);
        });
    }
}
