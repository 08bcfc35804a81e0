use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Bad endpoint address `{0}`")]
    BadAddress(String),

    #[error("Connect reset by peer")]
    ConnectionReset,

    #[error("Request `{opaque}` timed out after {elapsed_ms}ms")]
    RequestTimeout { opaque: i32, elapsed_ms: u128 },

    #[error("Invalid message id `{0}`")]
    InvalidMessageId(String),

    #[error("Invalid message `{0}`")]
    InvalidMessage(String),

    #[error("Invalid configuration `{0}`")]
    InvalidConfig(String),

    #[error("unknown client error")]
    Unknown,
}
