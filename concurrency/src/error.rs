use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GenServerError {
    #[error("GenServer callback panicked")]
    Callback,
    #[error("GenServer failed to initialize")]
    Initialization,
    #[error("GenServer is not running")]
    Server,
    #[error("call to GenServer timed out")]
    CallTimeout,
    #[error("GenServer does not handle this call")]
    CallMsgUnused,
}

impl<T> From<mikron_rt::tasks::mpsc::SendError<T>> for GenServerError {
    fn from(_value: mikron_rt::tasks::mpsc::SendError<T>) -> Self {
        Self::Server
    }
}
