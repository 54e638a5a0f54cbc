//! Error taxonomy for the exchange engine.
//!
//! Callers can tell "fix your request" (`Validation`, `Forbidden`) apart from
//! "state changed, retry if appropriate" (`Conflict`) and from datastore
//! failures (`Storage`, `Codec`), which abort the surrounding transaction.

#[derive(thiserror::Error, Debug)]
pub enum ExchangeError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("storage failure: {0}")]
    Storage(#[from] sled::Error),
    #[error("codec failure: {0}")]
    Codec(String),
}

impl ExchangeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}

impl From<minicbor::decode::Error> for ExchangeError {
    fn from(err: minicbor::decode::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

impl From<minicbor::encode::Error<std::convert::Infallible>> for ExchangeError {
    fn from(err: minicbor::encode::Error<std::convert::Infallible>) -> Self {
        Self::Codec(err.to_string())
    }
}
