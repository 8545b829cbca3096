//! Walks two users through the whole chat core: registration behind a
//! challenge, login, posting, polling for deltas and logging out.
//!
//! Usage: `lobby [config.toml]`. Without a path (or with a missing file) the
//! defaults apply. Set `RUST_LOG=debug` to see every worker request.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use mikron_chat::{
    accounts::{MemoryCredentialStore, UserId},
    challenge::{ChallengeAnswer, ChallengeImage, ImageGenerator},
    ids,
    session::SessionToken,
    ChatCore, ChatError, CoreConfig, Reply, SystemClock,
};
use mikron_rt::tasks as rt;
use std::{process::ExitCode, sync::Arc};

/// "Count the dots": the picture is a row of asterisks.
struct Dots;

impl ImageGenerator for Dots {
    fn generate(&self) -> ChallengeImage {
        let answer = (ids::random_u32() % 9 + 1) as u8;
        ChallengeImage {
            payload: "*".repeat(usize::from(answer)).into_bytes(),
            answer,
        }
    }
}

/// Plays the client: reads the picture and counts.
async fn solve(core: &ChatCore) -> Result<ChallengeAnswer, ChatError> {
    let reply: serde_json::Value = serde_json::from_str(&core.issue_challenge().await?)?;
    let id = reply["qid"]
        .as_str()
        .and_then(|qid| qid.parse().ok())
        .ok_or(ChatError::UnexpectedReply)?;
    let picture = reply["msg"]
        .as_str()
        .and_then(|msg| STANDARD.decode(msg).ok())
        .unwrap_or_default();
    let answer = picture.iter().filter(|byte| **byte == b'*').count() as u8;
    Ok(ChallengeAnswer { id, answer })
}

async fn join(core: &ChatCore, name: &str) -> Result<(UserId, SessionToken), ChatError> {
    let user = core.register(name, "hunter2", solve(core).await?).await?;
    let token = core
        .login(user, "hunter2", solve(core).await?, "127.0.0.1".to_string())
        .await?;
    tracing::info!(name, %user, "joined");
    Ok((user, token))
}

async fn chat(core: &ChatCore) -> Result<(), ChatError> {
    let (ada, ada_token) = join(core, "ada").await?;
    let (grace, grace_token) = join(core, "grace").await?;

    let Reply::Json(bookmark) = core.delta(grace, &grace_token, "X", "X").await else {
        return Err(ChatError::UnexpectedReply);
    };
    let bookmark: serde_json::Value = serde_json::from_str(&bookmark)?;
    let mid = bookmark["x"]["mid"].as_str().unwrap_or("X").to_string();
    let ts = bookmark["x"]["ts"].as_str().unwrap_or("X").to_string();

    for text in ["hello grace", "the compiler is happy today"] {
        let body = format!("{} {text}", text.chars().count());
        let code = core.post_message(ada, &ada_token, &body).await;
        tracing::info!(%code, text, "ada posted");
    }

    match core.delta(grace, &grace_token, &mid, &ts).await {
        Reply::Json(delta) => tracing::info!(%delta, "grace polled"),
        Reply::Code(code) => tracing::warn!(%code, "grace got no messages"),
    }
    let active = core.active_list(ada, &ada_token).await;
    tracing::info!(%active, "who is online");

    core.logout(ada, &ada_token).await?;
    core.logout(grace, &grace_token).await?;
    Ok(())
}

fn main() -> ExitCode {
    let result = rt::run(async {
        let config = match std::env::args().nth(1) {
            Some(path) => CoreConfig::load(&path)
                .map_err(|error| ChatError::Config(error.to_string()))?,
            None => CoreConfig::default(),
        };
        let clock = Arc::new(SystemClock);
        let credentials = Arc::new(MemoryCredentialStore::new(clock.clone()));
        let core = ChatCore::start_with_clock(config, credentials, Arc::new(Dots), clock)?;

        let outcome = chat(&core).await;
        core.shutdown();
        outcome
    });

    match result {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(error)) => {
            tracing::error!(%error, "lobby demo failed");
            ExitCode::FAILURE
        }
        Err(error) => {
            eprintln!("could not start the runtime: {error}");
            ExitCode::FAILURE
        }
    }
}
