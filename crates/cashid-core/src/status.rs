//! Status registry.
//!
//! Every validation outcome maps to exactly one `StatusCode`. Codes are
//! grouped by their hundreds digit: `0` success, `1xx` request problems,
//! `2xx` response problems, `3xx` service-side problems.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Broad class of a status, used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    Success,
    /// Unparseable URI or response shape. Caller's fault, never retried.
    Malformed,
    /// Nonce invalid, expired, consumed or altered. Restart the challenge.
    ProtocolState,
    /// Signature or metadata policy violation. Treated as a denial.
    Trust,
    /// Failure inside the service. Safe to retry.
    Service,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown status code {0}")]
pub struct UnknownStatusCode(pub u16);

macro_rules! status_codes {
    ($( $(#[$meta:meta])* $name:ident = $code:literal => $message:literal ),+ $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(into = "u16", try_from = "u16")]
        pub enum StatusCode {
            $( $(#[$meta])* $name ),+
        }

        impl StatusCode {
            pub const ALL: &'static [StatusCode] = &[ $( StatusCode::$name ),+ ];

            pub fn code(self) -> u16 {
                match self {
                    $( StatusCode::$name => $code ),+
                }
            }

            pub fn message(self) -> &'static str {
                match self {
                    $( StatusCode::$name => $message ),+
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $( StatusCode::$name => stringify!($name) ),+
                }
            }

            pub fn from_code(code: u16) -> Option<Self> {
                match code {
                    $( $code => Some(StatusCode::$name), )+
                    _ => None,
                }
            }
        }
    };
}

status_codes! {
    AuthenticationSuccessful = 0 => "Authentication successful",

    RequestBroken = 100 => "Request is broken",
    RequestMissingScheme = 111 => "Request is missing the scheme",
    RequestMissingDomain = 112 => "Request is missing the domain",
    RequestMissingNonce = 113 => "Request is missing the nonce",
    RequestMalformedScheme = 121 => "Request scheme is malformed",
    RequestMalformedDomain = 122 => "Request domain is malformed",
    RequestInvalidDomain = 131 => "Request domain is invalid",
    RequestInvalidNonce = 132 => "Request nonce is invalid",
    RequestAltered = 141 => "Request has been altered",
    RequestExpired = 142 => "Request has expired",
    RequestConsumed = 143 => "Request has already been consumed",

    ResponseBroken = 200 => "Response is broken",
    ResponseMissingRequest = 211 => "Response is missing the request",
    ResponseMissingAddress = 212 => "Response is missing the address",
    ResponseMissingSignature = 213 => "Response is missing the signature",
    ResponseMissingMetadata = 214 => "Response is missing required metadata",
    ResponseMalformedAddress = 221 => "Response address is malformed",
    ResponseMalformedSignature = 222 => "Response signature is malformed",
    ResponseMalformedMetadata = 223 => "Response metadata is malformed",
    ResponseInvalidMethod = 231 => "Response was sent with an invalid method",
    ResponseInvalidAddress = 232 => "Response address is invalid",
    ResponseInvalidSignature = 233 => "Response signature is invalid",
    ResponseInvalidMetadata = 234 => "Response metadata is invalid",

    ServiceBroken = 300 => "Service is broken",
    ServiceAddressDenied = 311 => "Address has been denied",
    ServiceAddressRevoked = 312 => "Address has been revoked",
    ServiceActionDenied = 321 => "Action has been denied",
    ServiceActionUnavailable = 322 => "Action is currently unavailable",
    ServiceActionNotImplemented = 323 => "Action is not implemented",
    ServiceInternalError = 331 => "Service encountered an internal error",
}

impl StatusCode {
    pub fn is_success(self) -> bool {
        self == StatusCode::AuthenticationSuccessful
    }

    pub fn class(self) -> StatusClass {
        use StatusCode::*;
        match self {
            AuthenticationSuccessful => StatusClass::Success,
            RequestInvalidNonce | RequestAltered | RequestExpired | RequestConsumed => {
                StatusClass::ProtocolState
            }
            RequestInvalidDomain
            | ResponseMissingMetadata
            | ResponseInvalidAddress
            | ResponseInvalidSignature
            | ResponseInvalidMetadata
            | ServiceAddressDenied
            | ServiceAddressRevoked
            | ServiceActionDenied => StatusClass::Trust,
            ServiceBroken
            | ServiceActionUnavailable
            | ServiceActionNotImplemented
            | ServiceInternalError => StatusClass::Service,
            _ => StatusClass::Malformed,
        }
    }

    /// Whether the caller may retry the same response unchanged.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            StatusCode::ServiceBroken
                | StatusCode::ServiceActionUnavailable
                | StatusCode::ServiceInternalError
        )
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}

impl From<StatusCode> for u16 {
    fn from(status: StatusCode) -> Self {
        status.code()
    }
}

impl TryFrom<u16> for StatusCode {
    type Error = UnknownStatusCode;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        StatusCode::from_code(code).ok_or(UnknownStatusCode(code))
    }
}
