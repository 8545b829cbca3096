use super::ring::{ChatEntry, Cursor, RingChatLog, Window};
use crate::{accounts::UserId, clock::SharedClock, error::ChatError};
use mikron_concurrency::{messages::Unused, CallResponse, GenServer, GenServerHandle};

pub type ChatLogHandle = GenServerHandle<ChatLog>;

/// Single owner of the [`RingChatLog`].
pub struct ChatLog {
    ring: RingChatLog,
    clock: SharedClock,
}

#[derive(Debug, Clone)]
pub enum InMessage {
    Append { author: UserId, text: String },
    WindowSince(Cursor),
    Tail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutMessage {
    Appended(ChatEntry),
    Window(Window),
    Tail(Cursor),
}

impl ChatLog {
    pub fn new(capacity: usize, clock: SharedClock) -> Self {
        let ring = RingChatLog::with_capacity(capacity, clock.now());
        Self { ring, clock }
    }

    pub async fn append(
        server: &ChatLogHandle,
        author: UserId,
        text: String,
    ) -> Result<ChatEntry, ChatError> {
        match server.call(InMessage::Append { author, text }).await? {
            OutMessage::Appended(entry) => Ok(entry),
            _ => Err(ChatError::UnexpectedReply),
        }
    }

    pub async fn window_since(server: &ChatLogHandle, known: Cursor) -> Result<Window, ChatError> {
        match server.call(InMessage::WindowSince(known)).await? {
            OutMessage::Window(window) => Ok(window),
            _ => Err(ChatError::UnexpectedReply),
        }
    }

    pub async fn tail(server: &ChatLogHandle) -> Result<Cursor, ChatError> {
        match server.call(InMessage::Tail).await? {
            OutMessage::Tail(cursor) => Ok(cursor),
            _ => Err(ChatError::UnexpectedReply),
        }
    }
}

impl GenServer for ChatLog {
    type CallMsg = InMessage;
    type CastMsg = Unused;
    type OutMsg = OutMessage;
    type Error = ChatError;

    async fn handle_call(
        &mut self,
        message: Self::CallMsg,
        _handle: &ChatLogHandle,
    ) -> CallResponse<Self> {
        match message {
            InMessage::Append { author, text } => {
                let entry = self.ring.append(author, text, self.clock.now());
                tracing::debug!(sequence = entry.sequence, %author, "message appended");
                CallResponse::Reply(OutMessage::Appended(entry))
            }
            InMessage::WindowSince(known) => {
                let window = self.ring.window_since(known);
                if let Window::Resync(cursor) = &window {
                    tracing::debug!(?known, ?cursor, "stale bookmark, resynchronizing");
                }
                CallResponse::Reply(OutMessage::Window(window))
            }
            InMessage::Tail => CallResponse::Reply(OutMessage::Tail(self.ring.tail())),
        }
    }
}
