use crate::{accounts::UserId, challenge::ChallengeId, protocol::ResponseCode};
use mikron_concurrency::GenServerError;

/// Input that is malformed or out of bounds. Rejected before any state changes.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("message is {0} bytes long")]
    MessageTooLong(usize),
    #[error("malformed post body: {0}")]
    BadPostData(&'static str),
    #[error("malformed request: {0}")]
    BadRequest(&'static str),
    #[error("user name is empty")]
    EmptyName,
    #[error("user name is {0} bytes long")]
    NameTooLong(usize),
    #[error("password is {0} bytes long")]
    PasswordTooLong(usize),
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("user {0} already has an active session")]
    AlreadyActive(UserId),
    #[error("no active session for user {0}")]
    SessionNotFound(UserId),
    #[error("challenge {0} not found")]
    ChallengeNotFound(ChallengeId),
    #[error("challenge {0} has expired")]
    Expired(ChallengeId),
    #[error("wrong answer to challenge {0}")]
    WrongAnswer(ChallengeId),
    #[error("credentials rejected for user {0}")]
    BadCredentials(UserId),
    #[error("no free id found after {0} attempts")]
    IdSpaceExhausted(usize),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("could not encode reply: {0}")]
    Encoding(String),
    #[error("worker replied with an unexpected message")]
    UnexpectedReply,
    #[error(transparent)]
    Actor(#[from] GenServerError),
}

impl ChatError {
    /// The status code a client sees for this failure.
    pub fn response_code(&self) -> ResponseCode {
        match self {
            ChatError::Validation(ValidationError::EmptyMessage) => ResponseCode::EmptyMessage,
            ChatError::Validation(ValidationError::MessageTooLong(_)) => {
                ResponseCode::MessageTooLong
            }
            ChatError::Validation(ValidationError::BadPostData(_)) => ResponseCode::BadPostData,
            ChatError::SessionNotFound(_) => ResponseCode::NotLoggedIn,
            _ => ResponseCode::BadRequest,
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(error: serde_json::Error) -> Self {
        ChatError::Encoding(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_status_codes() {
        let cases: [(ChatError, char); 6] = [
            (ValidationError::EmptyMessage.into(), 'E'),
            (ValidationError::MessageTooLong(5000).into(), 'M'),
            (ValidationError::BadPostData("no separator").into(), 'X'),
            (ValidationError::BadRequest("empty mid").into(), 'B'),
            (ChatError::SessionNotFound(UserId(3)), 'L'),
            (ChatError::Actor(GenServerError::CallTimeout), 'B'),
        ];
        for (error, code) in cases {
            assert_eq!(code, error.response_code().as_char(), "{error}");
        }
    }
}
