use base64::{engine::general_purpose::STANDARD, Engine as _};
use mikron_chat::{
    accounts::{MemoryCredentialStore, UserId},
    challenge::{
        ChallengeAnswer, ChallengeId, ChallengeImage, ChallengeStore, ImageGenerator, Payload,
    },
    session::SessionToken,
    ChatCore, ChatError, CoreConfig, ManualClock, Reply, ResponseCode,
};
use mikron_rt::tasks::{self as rt};
use serde_json::Value;
use std::sync::Arc;

const START: i64 = 1_700_000_000;
const ANSWER: u8 = 4;

struct FourDots;

impl ImageGenerator for FourDots {
    fn generate(&self) -> ChallengeImage {
        ChallengeImage {
            payload: b"....".to_vec(),
            answer: ANSWER,
        }
    }
}

struct Harness {
    clock: ManualClock,
    core: ChatCore,
}

impl Harness {
    fn start() -> Self {
        let config = CoreConfig {
            log_capacity: 8,
            ..CoreConfig::default()
        };
        let clock = ManualClock::new(START);
        let credentials = Arc::new(MemoryCredentialStore::new(Arc::new(clock.clone())));
        let core = ChatCore::start_with_clock(
            config,
            credentials,
            Arc::new(FourDots),
            Arc::new(clock.clone()),
        )
        .unwrap();
        Self { clock, core }
    }

    async fn solve(&self) -> ChallengeAnswer {
        let reply = self.core.issue_challenge().await.unwrap();
        let reply: Value = serde_json::from_str(&reply).unwrap();
        ChallengeAnswer {
            id: reply["qid"].as_str().unwrap().parse().unwrap(),
            answer: ANSWER,
        }
    }

    async fn register(&self, name: &str) -> UserId {
        let answer = self.solve().await;
        self.core.register(name, "secret", answer).await.unwrap()
    }

    async fn login(&self, user: UserId) -> Result<SessionToken, ChatError> {
        let answer = self.solve().await;
        self.core
            .login(user, "secret", answer, "192.0.2.1".into())
            .await
    }
}

fn json(reply: Reply) -> Value {
    match reply {
        Reply::Json(body) => serde_json::from_str(&body).unwrap(),
        Reply::Code(code) => panic!("expected JSON, got status {code}"),
    }
}

fn decode(field: &Value) -> String {
    String::from_utf8(STANDARD.decode(field.as_str().unwrap()).unwrap()).unwrap()
}

#[test]
fn register_login_post_and_poll() {
    let runtime = rt::Runtime::new().unwrap();
    runtime.block_on(async move {
        let harness = Harness::start();
        let core = &harness.core;
        let alice = harness.register("alice").await;
        let token = harness.login(alice).await.unwrap();

        // No bookmark yet: the client gets its login bookmark back.
        let bookmark = json(core.delta(alice, &token, "X", "X").await);
        assert_eq!(0, bookmark["messages"].as_array().unwrap().len());
        assert_eq!("0", bookmark["x"]["mid"]);
        assert_eq!(START.to_string(), bookmark["x"]["ts"]);

        harness.clock.advance(1);
        assert_eq!(
            ResponseCode::MessageSent,
            core.post_message(alice, &token, "5 hello").await
        );

        let delta = json(core.delta(alice, &token, "0", &START.to_string()).await);
        let messages = delta["messages"].as_array().unwrap();
        assert_eq!(1, messages.len());
        assert_eq!("1", messages[0]["mid"]);
        assert_eq!("22:13:21", messages[0]["tim"]);
        assert_eq!("alice", decode(&messages[0]["atr"]));
        assert_eq!("hello", decode(&messages[0]["txt"]));
        assert_eq!("1", delta["x"]["mid"]);

        let ts = delta["x"]["ts"].as_str().unwrap().to_string();
        assert_eq!(
            Reply::Code(ResponseCode::NoNews),
            core.delta(alice, &token, "1", &ts).await
        );

        core.logout(alice, &token).await.unwrap();
        assert_eq!(
            ResponseCode::NotLoggedIn,
            core.post_message(alice, &token, "5 hello").await
        );
        core.shutdown();
    });
}

#[test]
fn second_login_is_refused_until_logout() {
    let runtime = rt::Runtime::new().unwrap();
    runtime.block_on(async move {
        let harness = Harness::start();
        let alice = harness.register("alice").await;
        let token = harness.login(alice).await.unwrap();

        assert_eq!(Err(ChatError::AlreadyActive(alice)), harness.login(alice).await);

        harness.core.logout(alice, &token).await.unwrap();
        assert!(harness.login(alice).await.is_ok());
    });
}

#[test]
fn bad_credentials_and_logout_with_wrong_token() {
    let runtime = rt::Runtime::new().unwrap();
    runtime.block_on(async move {
        let harness = Harness::start();
        let alice = harness.register("alice").await;

        let answer = harness.solve().await;
        assert_eq!(
            Err(ChatError::BadCredentials(alice)),
            harness.core.login(alice, "guess", answer, "::1".into()).await
        );

        let token = harness.login(alice).await.unwrap();
        assert_eq!(
            Err(ChatError::SessionNotFound(alice)),
            harness.core.logout(alice, &SessionToken::from("forged")).await
        );
        assert!(harness.core.authenticate(alice, &token).await.is_ok());
    });
}

#[test]
fn challenges_are_single_use_and_expire() {
    let runtime = rt::Runtime::new().unwrap();
    runtime.block_on(async move {
        let harness = Harness::start();
        let core = &harness.core;

        let answer = harness.solve().await;
        core.register("alice", "secret", answer).await.unwrap();
        assert_eq!(
            Err(ChatError::ChallengeNotFound(answer.id)),
            core.register("alice2", "secret", answer).await
        );

        let wrong = ChallengeAnswer {
            answer: ANSWER + 1,
            ..harness.solve().await
        };
        assert_eq!(
            Err(ChatError::WrongAnswer(wrong.id)),
            core.register("bob", "secret", wrong).await
        );

        let late = harness.solve().await;
        harness.clock.advance(61);
        assert_eq!(
            Err(ChatError::Expired(late.id)),
            core.register("carol", "secret", late).await
        );

        assert_eq!(
            Err(ChatError::ChallengeNotFound(ChallengeId(0))),
            core.register("dave", "secret", ChallengeAnswer { id: ChallengeId(0), answer: 1 })
                .await
        );
    });
}

#[test]
fn issued_challenge_image_is_handed_out_once() {
    let runtime = rt::Runtime::new().unwrap();
    runtime.block_on(async move {
        let harness = Harness::start();
        let reply: Value =
            serde_json::from_str(&harness.core.issue_challenge().await.unwrap()).unwrap();
        assert_eq!("....", decode(&reply["msg"]));

        let id: ChallengeId = reply["qid"].as_str().unwrap().parse().unwrap();
        let stored = ChallengeStore::fetch(harness.core.challenges(), id).await.unwrap();
        assert_eq!(Payload::Cleared, stored.payload);
        assert_eq!(ANSWER, stored.answer);
    });
}

#[test]
fn post_body_errors_map_to_status_codes() {
    let runtime = rt::Runtime::new().unwrap();
    runtime.block_on(async move {
        let harness = Harness::start();
        let core = &harness.core;
        let alice = harness.register("alice").await;
        let token = harness.login(alice).await.unwrap();

        let too_long = format!("4097 {}", "a".repeat(4097));
        let cases = [
            ("0 ", ResponseCode::EmptyMessage),
            ("hello", ResponseCode::BadPostData),
            ("3 hello", ResponseCode::BadPostData),
            (too_long.as_str(), ResponseCode::MessageTooLong),
        ];
        for (body, code) in cases {
            assert_eq!(code, core.post_message(alice, &token, body).await, "{body:.10}");
        }
        assert_eq!(
            ResponseCode::NotLoggedIn,
            core.post_message(alice, &SessionToken::from("forged"), "2 hi").await
        );
    });
}

#[test]
fn delta_rejects_bad_bookmarks_and_resyncs_stale_ones() {
    let runtime = rt::Runtime::new().unwrap();
    runtime.block_on(async move {
        let harness = Harness::start();
        let core = &harness.core;
        let alice = harness.register("alice").await;
        let token = harness.login(alice).await.unwrap();

        let bad = Reply::Code(ResponseCode::BadRequest);
        assert_eq!(bad, core.delta(alice, &token, "", "1").await);
        assert_eq!(bad, core.delta(alice, &token, "zero", "1").await);
        // Older than the login bookmark.
        assert_eq!(bad, core.delta(alice, &token, "0", &(START - 1).to_string()).await);

        // Twelve posts wrap the eight-slot ring and overwrite slot 0.
        for i in 0..12 {
            harness.clock.advance(1);
            let body = format!("{} m{i}", format!("m{i}").chars().count());
            assert_eq!(ResponseCode::MessageSent, core.post_message(alice, &token, &body).await);
        }
        let resync = json(core.delta(alice, &token, "0", &START.to_string()).await);
        assert!(resync["messages"].as_array().unwrap().is_empty());
        assert_eq!("0", resync["x"]["mid"]);
        assert_ne!(START.to_string(), resync["x"]["ts"]);

        let ts = resync["x"]["ts"].as_str().unwrap().to_string();
        let delta = json(core.delta(alice, &token, "0", &ts).await);
        let texts: Vec<String> = delta["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|message| decode(&message["txt"]))
            .collect();
        assert_eq!(vec!["m8", "m9", "m10", "m11"], texts);
    });
}

#[test]
fn active_list_tracks_logins_and_idle_sessions() {
    let runtime = rt::Runtime::new().unwrap();
    runtime.block_on(async move {
        let harness = Harness::start();
        let core = &harness.core;
        let alice = harness.register("alice").await;
        let bob = harness.register("bob").await;
        let alice_token = harness.login(alice).await.unwrap();
        let bob_token = harness.login(bob).await.unwrap();

        let list = json(core.active_list(alice, &alice_token).await);
        let names: Vec<String> = list["names"].as_array().unwrap().iter().map(decode).collect();
        assert_eq!(vec!["alice", "bob"], names);

        // Bob stays busy; alice does not.
        harness.clock.advance(100);
        assert!(core.authenticate(bob, &bob_token).await.is_ok());
        harness.clock.advance(30);
        assert_eq!(
            ResponseCode::NotLoggedIn,
            core.post_message(alice, &alice_token, "2 hi").await
        );

        let list = json(core.active_list(bob, &bob_token).await);
        let names: Vec<String> = list["names"].as_array().unwrap().iter().map(decode).collect();
        assert_eq!(vec!["bob"], names);
    });
}

#[test]
fn invalid_config_is_refused() {
    let runtime = rt::Runtime::new().unwrap();
    runtime.block_on(async move {
        let config = CoreConfig {
            log_capacity: 1,
            ..CoreConfig::default()
        };
        let clock = Arc::new(ManualClock::new(START));
        let credentials = Arc::new(MemoryCredentialStore::new(clock.clone()));
        let result = ChatCore::start_with_clock(config, credentials, Arc::new(FourDots), clock);
        assert!(matches!(result, Err(ChatError::Config(_))));
    });
}
