use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::metadata::FieldSet;
use crate::status::StatusCode;

// ---------------------------------------------------------------------------
// Timestamp: canonical time representation (seconds + nanoseconds)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds_since_epoch: u64,
    pub nanoseconds: u32,
}

impl Timestamp {
    pub fn now() -> Self {
        let now = chrono::Utc::now();
        Self {
            seconds_since_epoch: now.timestamp().max(0) as u64,
            nanoseconds: now.timestamp_subsec_nanos(),
        }
    }

    pub fn from_seconds(seconds: u64) -> Self {
        Self {
            seconds_since_epoch: seconds,
            nanoseconds: 0,
        }
    }

    /// The instant `duration` after `self`, saturating at the far future.
    pub fn after(&self, duration: Duration) -> Self {
        let mut seconds = self.seconds_since_epoch.saturating_add(duration.as_secs());
        let mut nanoseconds = self.nanoseconds + duration.subsec_nanos();
        if nanoseconds >= 1_000_000_000 {
            nanoseconds -= 1_000_000_000;
            seconds = seconds.saturating_add(1);
        }
        Self {
            seconds_since_epoch: seconds,
            nanoseconds,
        }
    }

    pub fn to_rfc3339(&self) -> String {
        let dt =
            chrono::DateTime::from_timestamp(self.seconds_since_epoch as i64, self.nanoseconds);
        dt.map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "invalid".to_string())
    }

    pub fn is_expired(&self) -> bool {
        *self < Self::now()
    }
}

// ---------------------------------------------------------------------------
// Nonce: numeric single-use challenge token
// ---------------------------------------------------------------------------

/// Numeric nonce carried in the `x` parameter.
///
/// Service-issued nonces are nine digits. User-initiated requests carry a
/// client-chosen value, so any `u32` is representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nonce(pub u32);

impl Nonce {
    /// Inclusive lower bound of generated nonces.
    pub const MIN: u32 = 100_000_000;
    /// Exclusive upper bound of generated nonces.
    pub const MAX: u32 = 1_000_000_000;

    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn generate() -> Self {
        use rand::Rng;
        Self(rand::thread_rng().gen_range(Self::MIN..Self::MAX))
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid nonce '{0}'")]
pub struct InvalidNonce(pub String);

impl FromStr for Nonce {
    type Err = InvalidNonce;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidNonce(s.to_string()));
        }
        s.parse::<u32>()
            .map(Nonce)
            .map_err(|_| InvalidNonce(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// ChallengeRequest
// ---------------------------------------------------------------------------

/// A service-issued challenge, rendered on the wire as a `cashid:` URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeRequest {
    pub domain: String,
    /// Resource path, including its leading `/`.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default)]
    pub required: FieldSet,
    #[serde(default)]
    pub optional: FieldSet,
    pub nonce: Nonce,
}

impl ChallengeRequest {
    pub fn scheme(&self) -> &'static str {
        crate::uri::SCHEME
    }
}

impl fmt::Display for ChallengeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::uri::encode(self))
    }
}

impl FromStr for ChallengeRequest {
    type Err = crate::uri::UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::uri::decode(s)
    }
}

// ---------------------------------------------------------------------------
// Response: what the client posts back
// ---------------------------------------------------------------------------

/// Signed response produced by a client.
///
/// Missing members deserialize as empty so the engine can report which one
/// is absent instead of a generic parse failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub request: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Response {
    pub fn new(
        request: impl Into<String>,
        address: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        Self {
            request: request.into(),
            address: address.into(),
            signature: signature.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(
        mut self,
        field: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(field.into(), value.into());
        self
    }

    /// Parse a response body. Anything that is not a JSON object is
    /// `ResponseBroken`.
    pub fn from_json(body: &str) -> Result<Self, StatusCode> {
        serde_json::from_str(body).map_err(|e| {
            tracing::debug!(error = %e, "response body is not a valid response object");
            StatusCode::ResponseBroken
        })
    }
}

/// Whether a metadata value carries no information.
pub fn is_blank(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.trim().is_empty(),
        serde_json::Value::Array(a) => a.is_empty(),
        serde_json::Value::Object(o) => o.is_empty(),
        serde_json::Value::Bool(_) | serde_json::Value::Number(_) => false,
    }
}

// ---------------------------------------------------------------------------
// NonceRecord: issuance record held by a NonceStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceRecord {
    pub nonce: Nonce,
    /// The exact URI string that was issued for this nonce.
    pub request: String,
    pub expires_at: Timestamp,
    pub consumed: bool,
}

impl NonceRecord {
    pub fn new(nonce: Nonce, request: impl Into<String>, expires_at: Timestamp) -> Self {
        Self {
            nonce,
            request: request.into(),
            expires_at,
            consumed: false,
        }
    }

    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expires_at < now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Timestamp::now())
    }
}
