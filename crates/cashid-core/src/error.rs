use thiserror::Error;

use crate::status::StatusCode;

/// Failures raised by external collaborators (nonce store, signature
/// verifier). These never describe a protocol violation; the engine folds
/// every one of them into a service-side status.
#[derive(Debug, Error)]
pub enum CashIdError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CashIdError {
    /// Status reported to the client when this error interrupts validation.
    pub fn status(&self) -> StatusCode {
        StatusCode::ServiceInternalError
    }
}

impl From<serde_json::Error> for CashIdError {
    fn from(e: serde_json::Error) -> Self {
        CashIdError::Serialization(e.to_string())
    }
}

pub type CashIdResult<T> = Result<T, CashIdError>;
