use super::{CredentialStore, UserId};
use crate::error::ChatError;
use mikron_concurrency::{messages::Unused, CallResponse, GenServer, GenServerHandle};
use std::sync::Arc;

pub type RegistrarHandle = GenServerHandle<Registrar>;

/// Serializes registrations so two requests never race for the same id.
pub struct Registrar {
    store: Arc<dyn CredentialStore>,
}

#[derive(Debug, Clone)]
pub enum InMessage {
    Register { name: String, password: String },
}

impl Registrar {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    pub async fn register(
        server: &RegistrarHandle,
        name: String,
        password: String,
    ) -> Result<UserId, ChatError> {
        server
            .call(InMessage::Register { name, password })
            .await
            .unwrap_or_else(|error| Err(error.into()))
    }
}

impl GenServer for Registrar {
    type CallMsg = InMessage;
    type CastMsg = Unused;
    type OutMsg = Result<UserId, ChatError>;
    type Error = ChatError;

    async fn handle_call(
        &mut self,
        message: Self::CallMsg,
        _handle: &RegistrarHandle,
    ) -> CallResponse<Self> {
        match message {
            InMessage::Register { name, password } => {
                let result = self.store.register_user(&name, &password);
                match &result {
                    Ok(user) => tracing::info!(%user, name = %name, "user registered"),
                    Err(error) => tracing::warn!(%error, "registration rejected"),
                }
                CallResponse::Reply(result)
            }
        }
    }
}
