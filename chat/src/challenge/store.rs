use super::model::{Challenge, ChallengeId, ImageGenerator, Payload};
use crate::{clock::SharedClock, error::ChatError, ids};
use mikron_concurrency::{messages::Unused, CallResponse, GenServer, GenServerHandle};
use std::{collections::HashMap, sync::Arc};

pub type ChallengeStoreHandle = GenServerHandle<ChallengeStore>;

/// Single owner of the pending challenges.
///
/// The store never judges an answer: callers fetch the record and check it
/// with [`Challenge::verify`].
pub struct ChallengeStore {
    challenges: HashMap<ChallengeId, Challenge>,
    clock: SharedClock,
}

#[derive(Debug, Clone)]
pub enum InMessage {
    Insert { payload: Vec<u8>, answer: u8 },
    Fetch(ChallengeId),
    ClearPayload(ChallengeId),
    Delete(ChallengeId),
    EvictIfExpired { id: ChallengeId, timeout: i64 },
    ListAges,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutMessage {
    Issued(ChallengeId),
    Challenge(Challenge),
    NotFound,
    Done,
    Evicted(bool),
    Ages(Vec<(ChallengeId, i64)>),
}

impl ChallengeStore {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            challenges: HashMap::new(),
            clock,
        }
    }

    /// Draws an image from `generator` in the caller's task and stores it
    /// under a fresh id.
    pub async fn issue(
        server: &ChallengeStoreHandle,
        generator: &dyn ImageGenerator,
    ) -> Result<ChallengeId, ChatError> {
        let image = generator.generate();
        let message = InMessage::Insert {
            payload: image.payload,
            answer: image.answer,
        };
        match server.call(message).await?? {
            OutMessage::Issued(id) => Ok(id),
            _ => Err(ChatError::UnexpectedReply),
        }
    }

    pub async fn fetch(
        server: &ChallengeStoreHandle,
        id: ChallengeId,
    ) -> Result<Challenge, ChatError> {
        match server.call(InMessage::Fetch(id)).await?? {
            OutMessage::Challenge(challenge) => Ok(challenge),
            OutMessage::NotFound => Err(ChatError::ChallengeNotFound(id)),
            _ => Err(ChatError::UnexpectedReply),
        }
    }

    /// Drops the image but keeps the answer and the creation time.
    pub async fn clear_payload(
        server: &ChallengeStoreHandle,
        id: ChallengeId,
    ) -> Result<(), ChatError> {
        Self::expect_done(server.call(InMessage::ClearPayload(id)).await??)
    }

    pub async fn delete(server: &ChallengeStoreHandle, id: ChallengeId) -> Result<(), ChatError> {
        Self::expect_done(server.call(InMessage::Delete(id)).await??)
    }

    pub async fn evict_if_expired(
        server: &ChallengeStoreHandle,
        id: ChallengeId,
        timeout: i64,
    ) -> Result<bool, ChatError> {
        match server.call(InMessage::EvictIfExpired { id, timeout }).await?? {
            OutMessage::Evicted(evicted) => Ok(evicted),
            _ => Err(ChatError::UnexpectedReply),
        }
    }

    /// `(id, created_at)` for every pending challenge.
    pub async fn list_ages(
        server: &ChallengeStoreHandle,
    ) -> Result<Vec<(ChallengeId, i64)>, ChatError> {
        match server.call(InMessage::ListAges).await?? {
            OutMessage::Ages(ages) => Ok(ages),
            _ => Err(ChatError::UnexpectedReply),
        }
    }

    fn expect_done(reply: OutMessage) -> Result<(), ChatError> {
        match reply {
            OutMessage::Done => Ok(()),
            _ => Err(ChatError::UnexpectedReply),
        }
    }

    fn insert(&mut self, payload: Vec<u8>, answer: u8) -> Result<ChallengeId, ChatError> {
        let id = ids::unique_id(|candidate| self.challenges.contains_key(&ChallengeId(candidate)))?;
        let id = ChallengeId(id);
        self.challenges.insert(
            id,
            Challenge {
                id,
                created_at: self.clock.now(),
                answer,
                payload: Payload::Image(Arc::from(payload)),
            },
        );
        Ok(id)
    }
}

impl GenServer for ChallengeStore {
    type CallMsg = InMessage;
    type CastMsg = Unused;
    type OutMsg = Result<OutMessage, ChatError>;
    type Error = ChatError;

    async fn handle_call(
        &mut self,
        message: Self::CallMsg,
        _handle: &ChallengeStoreHandle,
    ) -> CallResponse<Self> {
        let reply = match message {
            InMessage::Insert { payload, answer } => match self.insert(payload, answer) {
                Ok(id) => {
                    tracing::debug!(%id, "challenge issued");
                    Ok(OutMessage::Issued(id))
                }
                Err(error) => Err(error),
            },
            InMessage::Fetch(id) => Ok(match self.challenges.get(&id) {
                Some(challenge) => OutMessage::Challenge(challenge.clone()),
                None => OutMessage::NotFound,
            }),
            InMessage::ClearPayload(id) => {
                if let Some(challenge) = self.challenges.get_mut(&id) {
                    challenge.payload = Payload::Cleared;
                }
                Ok(OutMessage::Done)
            }
            InMessage::Delete(id) => {
                if self.challenges.remove(&id).is_some() {
                    tracing::debug!(%id, "challenge deleted");
                }
                Ok(OutMessage::Done)
            }
            InMessage::EvictIfExpired { id, timeout } => {
                let now = self.clock.now();
                let expired = self
                    .challenges
                    .get(&id)
                    .is_some_and(|challenge| challenge.is_expired(now, timeout));
                if expired {
                    self.challenges.remove(&id);
                    tracing::debug!(%id, "expired challenge evicted");
                }
                Ok(OutMessage::Evicted(expired))
            }
            InMessage::ListAges => Ok(OutMessage::Ages(
                self.challenges
                    .values()
                    .map(|challenge| (challenge.id, challenge.created_at))
                    .collect(),
            )),
        };
        CallResponse::Reply(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{challenge::ChallengeImage, clock::ManualClock};
    use mikron_rt::tasks::{self as rt};
    use std::collections::HashSet;

    struct FixedImage;

    impl ImageGenerator for FixedImage {
        fn generate(&self) -> ChallengeImage {
            ChallengeImage {
                payload: b"three dots".to_vec(),
                answer: 3,
            }
        }
    }

    #[test]
    fn concurrent_issues_get_distinct_ids() {
        let runtime = rt::Runtime::new().unwrap();
        runtime.block_on(async move {
            let store = ChallengeStore::new(Arc::new(ManualClock::new(0))).start();

            let mut tasks = Vec::new();
            for _ in 0..200 {
                let store = store.clone();
                tasks.push(rt::spawn(async move {
                    ChallengeStore::issue(&store, &FixedImage).await.unwrap()
                }));
            }
            let mut ids = HashSet::new();
            for task in tasks {
                ids.insert(task.await.unwrap());
            }
            assert_eq!(200, ids.len());
            assert_eq!(200, ChallengeStore::list_ages(&store).await.unwrap().len());
        });
    }

    #[test]
    fn clear_keeps_the_answer_and_sweep_removes_it_later() {
        let runtime = rt::Runtime::new().unwrap();
        runtime.block_on(async move {
            let clock = ManualClock::new(500);
            let store = ChallengeStore::new(Arc::new(clock.clone())).start();

            let id = ChallengeStore::issue(&store, &FixedImage).await.unwrap();
            let fresh = ChallengeStore::fetch(&store, id).await.unwrap();
            assert_eq!(b"three dots", fresh.payload.bytes());

            ChallengeStore::clear_payload(&store, id).await.unwrap();
            ChallengeStore::clear_payload(&store, id).await.unwrap();
            let cleared = ChallengeStore::fetch(&store, id).await.unwrap();
            assert_eq!(Payload::Cleared, cleared.payload);
            assert_eq!(3, cleared.answer);
            assert_eq!(500, cleared.created_at);

            clock.advance(60);
            assert!(!ChallengeStore::evict_if_expired(&store, id, 60).await.unwrap());
            clock.advance(1);
            assert!(ChallengeStore::evict_if_expired(&store, id, 60).await.unwrap());

            assert_eq!(
                Err(ChatError::ChallengeNotFound(id)),
                ChallengeStore::fetch(&store, id).await
            );
        });
    }

    #[test]
    fn delete_is_idempotent() {
        let runtime = rt::Runtime::new().unwrap();
        runtime.block_on(async move {
            let store = ChallengeStore::new(Arc::new(ManualClock::new(0))).start();
            let id = ChallengeStore::issue(&store, &FixedImage).await.unwrap();

            ChallengeStore::delete(&store, id).await.unwrap();
            ChallengeStore::delete(&store, id).await.unwrap();
            assert!(ChallengeStore::list_ages(&store).await.unwrap().is_empty());
            // Clearing a missing challenge is not an error either.
            ChallengeStore::clear_payload(&store, id).await.unwrap();
        });
    }
}
