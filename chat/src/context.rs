use crate::{
    accounts::{CredentialStore, Registrar, RegistrarHandle, UserId},
    challenge::{ChallengeAnswer, ChallengeStore, ChallengeStoreHandle, ImageGenerator},
    clock::{SharedClock, SystemClock},
    config::CoreConfig,
    error::{ChatError, ValidationError},
    limits,
    log::{ChatLog, ChatLogHandle, Window},
    protocol::{self, Bookmark, Reply, ResponseCode},
    session::{ActiveSession, RegistryHandle, SessionRegistry, SessionToken},
    sweeper::{ChallengeSweeper, ChallengeSweeperHandle, IdleSweeper, IdleSweeperHandle},
};
use mikron_concurrency::{Backend, GenServer};
use std::sync::Arc;

/// Everything a request handler needs, passed around explicitly.
///
/// Cloning is cheap: clones share the same workers.
#[derive(Clone)]
pub struct ChatCore {
    config: CoreConfig,
    clock: SharedClock,
    credentials: Arc<dyn CredentialStore>,
    images: Arc<dyn ImageGenerator>,
    chat_log: ChatLogHandle,
    sessions: RegistryHandle,
    challenges: ChallengeStoreHandle,
    registrar: RegistrarHandle,
    idle_sweeper: IdleSweeperHandle,
    challenge_sweeper: ChallengeSweeperHandle,
}

impl ChatCore {
    /// Starts every worker. Must be called from inside a runtime.
    pub fn start(
        config: CoreConfig,
        credentials: Arc<dyn CredentialStore>,
        images: Arc<dyn ImageGenerator>,
    ) -> Result<Self, ChatError> {
        Self::start_with_clock(config, credentials, images, Arc::new(SystemClock))
    }

    pub fn start_with_clock(
        config: CoreConfig,
        credentials: Arc<dyn CredentialStore>,
        images: Arc<dyn ImageGenerator>,
        clock: SharedClock,
    ) -> Result<Self, ChatError> {
        config
            .validate()
            .map_err(|error| ChatError::Config(error.to_string()))?;
        let backend = Backend::from(config.backend);

        let chat_log =
            ChatLog::new(config.log_capacity, clock.clone()).start_with_backend(backend);
        let sessions =
            SessionRegistry::new(credentials.clone(), clock.clone(), config.idle_timeout())
                .start_with_backend(backend);
        let challenges = ChallengeStore::new(clock.clone()).start_with_backend(backend);
        let registrar = Registrar::new(credentials.clone()).start_with_backend(backend);
        let idle_sweeper = IdleSweeper::new(
            sessions.clone(),
            clock.clone(),
            config.idle_timeout(),
            config.activity_sweep_interval(),
        )
        .start();
        let challenge_sweeper = ChallengeSweeper::new(
            challenges.clone(),
            clock.clone(),
            config.challenge_timeout(),
            config.challenge_sweep_interval(),
        )
        .start();

        tracing::info!(
            log_capacity = config.log_capacity,
            idle_timeout = config.idle_timeout_secs,
            ?backend,
            "chat core started"
        );
        Ok(Self {
            config,
            clock,
            credentials,
            images,
            chat_log,
            sessions,
            challenges,
            registrar,
            idle_sweeper,
            challenge_sweeper,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn chat_log(&self) -> &ChatLogHandle {
        &self.chat_log
    }

    pub fn sessions(&self) -> &RegistryHandle {
        &self.sessions
    }

    pub fn challenges(&self) -> &ChallengeStoreHandle {
        &self.challenges
    }

    pub fn idle_sweeper(&self) -> &IdleSweeperHandle {
        &self.idle_sweeper
    }

    pub fn challenge_sweeper(&self) -> &ChallengeSweeperHandle {
        &self.challenge_sweeper
    }

    /// Checks the token and refreshes the session's activity.
    pub async fn authenticate(
        &self,
        user: UserId,
        token: &SessionToken,
    ) -> Result<ActiveSession, ChatError> {
        SessionRegistry::authenticate(&self.sessions, user, token.clone()).await
    }

    /// Appends a `"<char count> <text>"` post body to the chat log.
    pub async fn post_message(
        &self,
        user: UserId,
        token: &SessionToken,
        body: &str,
    ) -> ResponseCode {
        if let Err(error) = self.authenticate(user, token).await {
            return error.response_code();
        }
        let text = match protocol::parse_post_body(body) {
            Ok(text) => text,
            Err(error) => {
                tracing::debug!(%user, %error, "post rejected");
                return ChatError::from(error).response_code();
            }
        };
        match ChatLog::append(&self.chat_log, user, text.to_string()).await {
            Ok(_) => ResponseCode::MessageSent,
            Err(error) => error.response_code(),
        }
    }

    /// Messages the client has not seen, given its `mid`/`ts` bookmark.
    pub async fn delta(&self, user: UserId, token: &SessionToken, mid: &str, ts: &str) -> Reply {
        let session = match self.authenticate(user, token).await {
            Ok(session) => session,
            Err(error) => return error.into(),
        };
        let known = match protocol::parse_bookmark(mid, ts) {
            Ok(Bookmark::Known(cursor)) => cursor,
            Ok(Bookmark::Unknown) => return json(protocol::render_bookmark(session.login_cursor)),
            Err(error) => return ChatError::from(error).into(),
        };
        if known.timestamp < session.login_cursor.timestamp {
            tracing::warn!(%user, ?known, "bookmark older than login");
            return ResponseCode::BadRequest.into();
        }

        match ChatLog::window_since(&self.chat_log, known).await {
            Ok(Window::NoNews) => ResponseCode::NoNews.into(),
            Ok(Window::Resync(cursor)) => json(protocol::render_bookmark(cursor)),
            Ok(Window::Entries { entries, cursor }) => json(protocol::render_delta(
                &entries,
                cursor,
                |entry| self.display_name(entry.author),
            )),
            Err(error) => error.into(),
        }
    }

    /// The cached `{"names":[...]}` listing of who is logged in.
    pub async fn active_list(&self, user: UserId, token: &SessionToken) -> Reply {
        if let Err(error) = self.authenticate(user, token).await {
            return error.into();
        }
        match SessionRegistry::snapshot(&self.sessions).await {
            Ok(snapshot) => Reply::Json(snapshot.to_string()),
            Err(error) => error.into(),
        }
    }

    /// Issues a challenge and hands out its image. The image can be
    /// downloaded only once; the answer stays on file until it expires.
    pub async fn issue_challenge(&self) -> Result<String, ChatError> {
        let id = ChallengeStore::issue(&self.challenges, self.images.as_ref()).await?;
        let challenge = ChallengeStore::fetch(&self.challenges, id).await?;
        ChallengeStore::clear_payload(&self.challenges, id).await?;
        protocol::render_challenge(id.0, challenge.payload.bytes())
    }

    /// Logs `user` in and returns the new session token.
    pub async fn login(
        &self,
        user: UserId,
        password: &str,
        challenge: ChallengeAnswer,
        address: String,
    ) -> Result<SessionToken, ChatError> {
        if password.len() > limits::MAX_PASSWORD_BYTES {
            return Err(ValidationError::PasswordTooLong(password.len()).into());
        }
        self.redeem_challenge(challenge).await?;
        if !self.credentials.is_valid_credential(user, password) {
            tracing::warn!(%user, "login refused, bad credentials");
            return Err(ChatError::BadCredentials(user));
        }
        let token = SessionToken::generate();
        SessionRegistry::login(&self.sessions, &self.chat_log, user, address, token.clone())
            .await?;
        Ok(token)
    }

    pub async fn logout(&self, user: UserId, token: &SessionToken) -> Result<(), ChatError> {
        if SessionRegistry::logout(&self.sessions, user, token.clone()).await? {
            Ok(())
        } else {
            Err(ChatError::SessionNotFound(user))
        }
    }

    pub async fn register(
        &self,
        name: &str,
        password: &str,
        challenge: ChallengeAnswer,
    ) -> Result<UserId, ChatError> {
        limits::check_credentials(name, password)?;
        self.redeem_challenge(challenge).await?;
        Registrar::register(&self.registrar, name.to_string(), password.to_string()).await
    }

    /// Stops the sweepers first so no sweep lands on a stopped worker, then
    /// the workers themselves. Requests still queued are abandoned.
    pub fn shutdown(&self) {
        self.idle_sweeper.stop();
        self.challenge_sweeper.stop();
        self.registrar.stop();
        self.challenges.stop();
        self.sessions.stop();
        self.chat_log.stop();
        tracing::info!("chat core stopped");
    }

    /// Checks the answer and the challenge's age. A challenge can be
    /// redeemed once.
    async fn redeem_challenge(&self, answer: ChallengeAnswer) -> Result<(), ChatError> {
        let challenge = ChallengeStore::fetch(&self.challenges, answer.id).await?;
        if let Err(error) =
            challenge.verify(answer.answer, self.clock.now(), self.config.challenge_timeout())
        {
            tracing::warn!(%error, "challenge failed");
            return Err(error);
        }
        ChallengeStore::delete(&self.challenges, answer.id).await
    }

    fn display_name(&self, user: UserId) -> String {
        self.credentials.name_of(user).unwrap_or_default()
    }
}

fn json(body: Result<String, ChatError>) -> Reply {
    match body {
        Ok(body) => Reply::Json(body),
        Err(error) => error.into(),
    }
}
