use super::model::{ActiveSession, SessionToken};
use crate::{
    accounts::{CredentialStore, UserId},
    clock::SharedClock,
    error::ChatError,
    log::{ChatLog, ChatLogHandle, Cursor},
    protocol,
};
use mikron_concurrency::{messages::Unused, CallResponse, GenServer, GenServerHandle};
use std::{collections::HashMap, sync::Arc};

pub type RegistryHandle = GenServerHandle<SessionRegistry>;

/// Single owner of the active sessions and of the cached listing of who is
/// online. The listing is rebuilt inside the worker whenever membership
/// changes, so reading it never walks the session table.
pub struct SessionRegistry {
    sessions: HashMap<UserId, ActiveSession>,
    snapshot: Arc<str>,
    directory: Arc<dyn CredentialStore>,
    clock: SharedClock,
    idle_timeout: i64,
}

#[derive(Debug, Clone)]
pub enum InMessage {
    Login {
        user: UserId,
        address: String,
        token: SessionToken,
        tail: Cursor,
    },
    Logout {
        user: UserId,
        token: SessionToken,
    },
    Touch(UserId),
    Authenticate {
        user: UserId,
        token: SessionToken,
    },
    Lookup(UserId),
    Snapshot,
    EvictIfIdle {
        user: UserId,
        threshold: i64,
    },
    ListActivity,
    RefreshSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutMessage {
    LoggedIn(ActiveSession),
    AlreadyActive,
    LoggedOut(bool),
    Session(ActiveSession),
    NotFound,
    Snapshot(Arc<str>),
    Evicted(bool),
    Activity(Vec<(UserId, i64)>),
    Refreshed,
}

impl SessionRegistry {
    pub fn new(
        directory: Arc<dyn CredentialStore>,
        clock: SharedClock,
        idle_timeout_secs: i64,
    ) -> Self {
        Self {
            sessions: HashMap::new(),
            snapshot: Arc::from(protocol::EMPTY_ACTIVE_LIST),
            directory,
            clock,
            idle_timeout: idle_timeout_secs,
        }
    }

    /// Reads the chat log tail, then registers the session with that tail as
    /// its history floor. The two requests are independent: a message appended
    /// in between is simply not part of the floor.
    pub async fn login(
        server: &RegistryHandle,
        chat_log: &ChatLogHandle,
        user: UserId,
        address: String,
        token: SessionToken,
    ) -> Result<ActiveSession, ChatError> {
        let tail = ChatLog::tail(chat_log).await?;
        match server
            .call(InMessage::Login {
                user,
                address,
                token,
                tail,
            })
            .await?
        {
            OutMessage::LoggedIn(session) => Ok(session),
            OutMessage::AlreadyActive => Err(ChatError::AlreadyActive(user)),
            _ => Err(ChatError::UnexpectedReply),
        }
    }

    /// Returns whether a session was removed. A wrong token removes nothing.
    pub async fn logout(
        server: &RegistryHandle,
        user: UserId,
        token: SessionToken,
    ) -> Result<bool, ChatError> {
        match server.call(InMessage::Logout { user, token }).await? {
            OutMessage::LoggedOut(removed) => Ok(removed),
            _ => Err(ChatError::UnexpectedReply),
        }
    }

    /// Refreshes the session's activity, or drops it if it went idle.
    pub async fn touch(server: &RegistryHandle, user: UserId) -> Result<ActiveSession, ChatError> {
        Self::expect_session(server.call(InMessage::Touch(user)).await?, user)
    }

    /// [`touch`](Self::touch) for requests that carry a token. A mismatching
    /// token is treated as not logged in and leaves the session untouched.
    pub async fn authenticate(
        server: &RegistryHandle,
        user: UserId,
        token: SessionToken,
    ) -> Result<ActiveSession, ChatError> {
        let reply = server.call(InMessage::Authenticate { user, token }).await?;
        Self::expect_session(reply, user)
    }

    pub async fn lookup(server: &RegistryHandle, user: UserId) -> Result<ActiveSession, ChatError> {
        Self::expect_session(server.call(InMessage::Lookup(user)).await?, user)
    }

    pub async fn snapshot(server: &RegistryHandle) -> Result<Arc<str>, ChatError> {
        match server.call(InMessage::Snapshot).await? {
            OutMessage::Snapshot(snapshot) => Ok(snapshot),
            _ => Err(ChatError::UnexpectedReply),
        }
    }

    pub async fn evict_if_idle(
        server: &RegistryHandle,
        user: UserId,
        threshold: i64,
    ) -> Result<bool, ChatError> {
        match server.call(InMessage::EvictIfIdle { user, threshold }).await? {
            OutMessage::Evicted(evicted) => Ok(evicted),
            _ => Err(ChatError::UnexpectedReply),
        }
    }

    /// `(user, last activity)` for every session, in no particular order.
    pub async fn list_activity(server: &RegistryHandle) -> Result<Vec<(UserId, i64)>, ChatError> {
        match server.call(InMessage::ListActivity).await? {
            OutMessage::Activity(activity) => Ok(activity),
            _ => Err(ChatError::UnexpectedReply),
        }
    }

    pub async fn refresh_snapshot(server: &RegistryHandle) -> Result<(), ChatError> {
        match server.call(InMessage::RefreshSnapshot).await? {
            OutMessage::Refreshed => Ok(()),
            _ => Err(ChatError::UnexpectedReply),
        }
    }

    fn expect_session(reply: OutMessage, user: UserId) -> Result<ActiveSession, ChatError> {
        match reply {
            OutMessage::Session(session) => Ok(session),
            OutMessage::NotFound => Err(ChatError::SessionNotFound(user)),
            _ => Err(ChatError::UnexpectedReply),
        }
    }

    fn regenerate_snapshot(&mut self) {
        let mut names: Vec<String> = self
            .sessions
            .keys()
            .filter_map(|user| self.directory.name_of(*user))
            .collect();
        names.sort_unstable();
        match protocol::render_active_list(&names) {
            Ok(snapshot) => self.snapshot = Arc::from(snapshot),
            Err(error) => tracing::error!(%error, "could not rebuild the active list"),
        }
    }

    fn touch_session(&mut self, user: UserId) -> OutMessage {
        let now = self.clock.now();
        let Some(session) = self.sessions.get_mut(&user) else {
            return OutMessage::NotFound;
        };
        if session.is_idle(now, self.idle_timeout) {
            tracing::info!(%user, "session idle, logging out");
            self.sessions.remove(&user);
            self.regenerate_snapshot();
            return OutMessage::NotFound;
        }
        session.last_activity = now;
        OutMessage::Session(session.clone())
    }
}

impl GenServer for SessionRegistry {
    type CallMsg = InMessage;
    type CastMsg = Unused;
    type OutMsg = OutMessage;
    type Error = ChatError;

    async fn handle_call(
        &mut self,
        message: Self::CallMsg,
        _handle: &RegistryHandle,
    ) -> CallResponse<Self> {
        let reply = match message {
            InMessage::Login {
                user,
                address,
                token,
                tail,
            } => {
                if self.sessions.contains_key(&user) {
                    tracing::warn!(%user, "login refused, session already active");
                    OutMessage::AlreadyActive
                } else {
                    let session = ActiveSession {
                        user,
                        token,
                        address,
                        last_activity: self.clock.now(),
                        login_cursor: tail,
                    };
                    tracing::info!(%user, address = %session.address, "logged in");
                    self.sessions.insert(user, session.clone());
                    self.regenerate_snapshot();
                    OutMessage::LoggedIn(session)
                }
            }
            InMessage::Logout { user, token } => {
                let matches = self
                    .sessions
                    .get(&user)
                    .is_some_and(|session| session.token == token);
                if matches {
                    self.sessions.remove(&user);
                    self.regenerate_snapshot();
                    tracing::info!(%user, "logged out");
                }
                OutMessage::LoggedOut(matches)
            }
            InMessage::Touch(user) => self.touch_session(user),
            InMessage::Authenticate { user, token } => {
                let matches = self
                    .sessions
                    .get(&user)
                    .is_some_and(|session| session.token == token);
                if matches {
                    self.touch_session(user)
                } else {
                    tracing::debug!(%user, "token rejected");
                    OutMessage::NotFound
                }
            }
            InMessage::Lookup(user) => match self.sessions.get(&user) {
                Some(session) => OutMessage::Session(session.clone()),
                None => OutMessage::NotFound,
            },
            InMessage::Snapshot => OutMessage::Snapshot(self.snapshot.clone()),
            InMessage::EvictIfIdle { user, threshold } => {
                let now = self.clock.now();
                let idle = self
                    .sessions
                    .get(&user)
                    .is_some_and(|session| session.is_idle(now, threshold));
                if idle {
                    self.sessions.remove(&user);
                    self.regenerate_snapshot();
                    tracing::info!(%user, "idle session evicted");
                }
                OutMessage::Evicted(idle)
            }
            InMessage::ListActivity => OutMessage::Activity(
                self.sessions
                    .values()
                    .map(|session| (session.user, session.last_activity))
                    .collect(),
            ),
            InMessage::RefreshSnapshot => {
                self.regenerate_snapshot();
                OutMessage::Refreshed
            }
        };
        CallResponse::Reply(reply)
    }
}
