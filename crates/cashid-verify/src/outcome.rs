use cashid_core::{Nonce, Response, StatusCode};
use serde::{Deserialize, Serialize};

/// A response that passed every check, with the request's resolved
/// parameters attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedResponse {
    #[serde(flatten)]
    pub response: Response,
    pub action: String,
    pub data: String,
    pub nonce: Nonce,
}

/// Terminal result of validating one response.
///
/// Exactly one status per call. `response` is set only on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub code: StatusCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ValidatedResponse>,
}

impl ValidationOutcome {
    pub fn success(response: ValidatedResponse) -> Self {
        Self {
            code: StatusCode::AuthenticationSuccessful,
            message: StatusCode::AuthenticationSuccessful.message().to_string(),
            response: Some(response),
        }
    }

    pub fn failure(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            response: None,
        }
    }

    /// Failure carrying the registry's message for `code`.
    pub fn rejected(code: StatusCode) -> Self {
        Self::failure(code, code.message())
    }

    pub fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// The status object returned to the client after validation.
    pub fn confirmation(&self) -> Confirmation {
        Confirmation {
            status: self.code,
            message: self.message.clone(),
        }
    }
}

/// `{ "status": 0, "message": "..." }`, the body a service replies with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub status: StatusCode,
    pub message: String,
}
