use thiserror::Error;

/// Error type for the CashID service and binary, aggregating the errors of
/// the protocol crates.
///
/// Validation rejections are not errors; they travel as `ValidationOutcome`.
#[derive(Debug, Error)]
pub enum RootError {
    #[error("request build error: {0}")]
    Build(#[from] cashid_core::BuildError),

    #[error("request uri error: {0}")]
    Uri(#[from] cashid_core::UriError),

    #[error("metadata error: {0}")]
    Metadata(#[from] cashid_core::MetadataError),

    #[error("nonce store error: {0}")]
    Store(#[from] cashid_core::CashIdError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RootError {
    fn from(e: serde_json::Error) -> Self {
        RootError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for RootError {
    fn from(e: toml::de::Error) -> Self {
        RootError::Config(format!("TOML parse error: {}", e))
    }
}

pub type RootResult<T> = Result<T, RootError>;
