//! Response validation.
//!
//! `validate` runs a fixed sequence of checks and stops at the first one
//! that fails; that check alone decides the status:
//!
//! 1. The response carries a request, an address and a base64 signature.
//! 2. The embedded request decodes.
//! 3. Its scheme is `cashid`.
//! 4. Its domain is the service's domain.
//! 5. It carries a nonce.
//! 6. Unless the action is user-initiated, the nonce was issued for exactly
//!    this request, has not expired and has not been consumed.
//! 7. The signature over the request verifies for the address.
//! 8. Every required metadata field is present and non-empty.
//! 9. Every supplied metadata field was requested and is non-empty.
//! 10. Unless the action is user-initiated, the nonce is consumed.
//!
//! Collaborator errors surface as `ServiceInternalError`, as does a
//! validation whose [`ValidationBudget`] was abandoned before step 10.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use cashid_core::metadata::MetadataField;
use cashid_core::{
    is_blank, uri, CashIdError, DecodedRequest, FieldSet, Nonce, NonceStore, Response,
    SignatureVerifier, StatusCode, Timestamp, UriError,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::outcome::{ValidatedResponse, ValidationOutcome};

/// Actions a client may start on its own, without a service-issued nonce.
pub const USER_INITIATED_ACTIONS: [&str; 4] = ["delete", "logout", "revoke", "update"];

/// Action reported when the request names none.
pub const DEFAULT_ACTION: &str = "auth";

/// How user-initiated actions interact with the nonce registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserActionPolicy {
    /// Skip nonce lookup and consumption for user-initiated actions.
    #[default]
    Exempt,
    /// Hold user-initiated actions to the same issued-nonce rules as
    /// everything else.
    RequireIssued,
}

pub fn is_user_initiated(action: Option<&str>) -> bool {
    action.is_some_and(|a| USER_INITIATED_ACTIONS.contains(&a))
}

/// Handshake between a validation and a caller that may stop waiting for it.
///
/// The validation must `commit` before it changes any nonce state; the caller
/// may `abandon` instead. Exactly one of the two wins, so an abandoned
/// validation never consumes the nonce and a committed one always finishes.
#[derive(Debug, Default)]
pub struct ValidationBudget {
    state: AtomicU8,
}

const BUDGET_RUNNING: u8 = 0;
const BUDGET_COMMITTED: u8 = 1;
const BUDGET_ABANDONED: u8 = 2;

impl ValidationBudget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the right to change nonce state. False once abandoned.
    pub fn commit(&self) -> bool {
        self.transition(BUDGET_COMMITTED) || self.state.load(Ordering::SeqCst) == BUDGET_COMMITTED
    }

    /// Stop waiting. False if the validation already committed, in which
    /// case its outcome stands and should be awaited.
    pub fn abandon(&self) -> bool {
        self.transition(BUDGET_ABANDONED) || self.is_abandoned()
    }

    pub fn is_abandoned(&self) -> bool {
        self.state.load(Ordering::SeqCst) == BUDGET_ABANDONED
    }

    fn transition(&self, to: u8) -> bool {
        self.state
            .compare_exchange(BUDGET_RUNNING, to, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// Everything `validate` needs from its host.
#[derive(Clone, Copy)]
pub struct ValidationContext<'a> {
    pub domain: &'a str,
    pub verifier: &'a dyn SignatureVerifier,
    pub store: &'a dyn NonceStore,
    pub user_actions: UserActionPolicy,
}

#[derive(Debug)]
struct Rejection {
    code: StatusCode,
    message: String,
}

impl Rejection {
    fn new(code: StatusCode) -> Self {
        Self {
            code,
            message: code.message().to_string(),
        }
    }

    fn detailed(code: StatusCode, detail: impl AsRef<str>) -> Self {
        Self {
            code,
            message: format!("{}: {}", code.message(), detail.as_ref()),
        }
    }
}

impl From<UriError> for Rejection {
    fn from(e: UriError) -> Self {
        Rejection::detailed(e.status(), e.to_string())
    }
}

impl From<CashIdError> for Rejection {
    fn from(e: CashIdError) -> Self {
        tracing::error!(error = %e, "collaborator failed during validation");
        Rejection::new(e.status())
    }
}

/// Validate a client response against `ctx`.
pub fn validate(response: &Response, ctx: &ValidationContext<'_>) -> ValidationOutcome {
    finish(run_checks(response, ctx, None))
}

/// Like [`validate`], but gives up without touching the nonce registry if
/// `budget` is abandoned before the nonce would be consumed.
pub fn validate_within(
    response: &Response,
    ctx: &ValidationContext<'_>,
    budget: &ValidationBudget,
) -> ValidationOutcome {
    finish(run_checks(response, ctx, Some(budget)))
}

fn finish(result: Result<ValidatedResponse, Rejection>) -> ValidationOutcome {
    match result {
        Ok(validated) => {
            tracing::info!(
                nonce = %validated.nonce,
                action = %validated.action,
                address = %validated.response.address,
                "cashid response accepted"
            );
            ValidationOutcome::success(validated)
        }
        Err(rejection) => {
            tracing::warn!(
                status = rejection.code.code(),
                reason = %rejection.message,
                "cashid response rejected"
            );
            ValidationOutcome::failure(rejection.code, rejection.message)
        }
    }
}

/// Parse a raw response body and validate it.
pub fn validate_json(body: &str, ctx: &ValidationContext<'_>) -> ValidationOutcome {
    match Response::from_json(body) {
        Ok(response) => validate(&response, ctx),
        Err(code) => {
            tracing::warn!(status = code.code(), "cashid response body rejected");
            ValidationOutcome::rejected(code)
        }
    }
}

fn run_checks(
    response: &Response,
    ctx: &ValidationContext<'_>,
    budget: Option<&ValidationBudget>,
) -> Result<ValidatedResponse, Rejection> {
    check_shape(response)?;

    let decoded = uri::parse(&response.request)?;
    tracing::debug!(
        scheme = %decoded.scheme,
        domain = %decoded.domain,
        action = decoded.action.as_deref().unwrap_or(""),
        "decoded embedded request"
    );

    if decoded.scheme != uri::SCHEME {
        return Err(Rejection::detailed(
            StatusCode::RequestMalformedScheme,
            &decoded.scheme,
        ));
    }
    if decoded.domain != ctx.domain {
        return Err(Rejection::detailed(
            StatusCode::RequestInvalidDomain,
            &decoded.domain,
        ));
    }
    let nonce = decoded.nonce()?;

    let tracked = !is_user_initiated(decoded.action.as_deref())
        || ctx.user_actions == UserActionPolicy::RequireIssued;
    if tracked {
        check_nonce_record(ctx.store, nonce, &response.request)?;
    }

    if !ctx
        .verifier
        .verify(&response.address, &response.signature, &response.request)?
    {
        return Err(Rejection::new(StatusCode::ResponseInvalidSignature));
    }

    check_required_metadata(&decoded.required, response)?;
    check_supplied_metadata(&decoded, response)?;

    if budget.is_some_and(|b| !b.commit()) {
        return Err(Rejection::detailed(
            StatusCode::ServiceInternalError,
            "validation abandoned before completion",
        ));
    }
    if tracked && !ctx.store.consume(nonce)? {
        // Lost a race against a concurrent validation of the same nonce.
        return Err(Rejection::new(StatusCode::RequestConsumed));
    }

    Ok(ValidatedResponse {
        response: response.clone(),
        action: decoded
            .action
            .unwrap_or_else(|| DEFAULT_ACTION.to_string()),
        data: decoded.data.unwrap_or_default(),
        nonce,
    })
}

fn check_shape(response: &Response) -> Result<(), Rejection> {
    if response.request.is_empty() {
        return Err(Rejection::new(StatusCode::ResponseMissingRequest));
    }
    if response.address.is_empty() {
        return Err(Rejection::new(StatusCode::ResponseMissingAddress));
    }
    if response.signature.is_empty() {
        return Err(Rejection::new(StatusCode::ResponseMissingSignature));
    }
    if BASE64.decode(&response.signature).is_err() {
        return Err(Rejection::new(StatusCode::ResponseMalformedSignature));
    }
    Ok(())
}

fn check_nonce_record(store: &dyn NonceStore, nonce: Nonce, request: &str) -> Result<(), Rejection> {
    let record = store
        .lookup(nonce)?
        .ok_or_else(|| Rejection::new(StatusCode::RequestInvalidNonce))?;

    if record.is_expired_at(Timestamp::now()) {
        return Err(Rejection::new(StatusCode::RequestExpired));
    }
    if record.consumed {
        return Err(Rejection::new(StatusCode::RequestConsumed));
    }
    let same: bool = record.request.as_bytes().ct_eq(request.as_bytes()).into();
    if !same {
        return Err(Rejection::new(StatusCode::RequestAltered));
    }
    Ok(())
}

fn check_required_metadata(required: &FieldSet, response: &Response) -> Result<(), Rejection> {
    let missing: Vec<&str> = required
        .iter()
        .map(MetadataField::name)
        .filter(|name| response.metadata.get(*name).map_or(true, is_blank))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Rejection::detailed(
            StatusCode::ResponseMissingMetadata,
            missing.join(", "),
        ))
    }
}

fn check_supplied_metadata(decoded: &DecodedRequest, response: &Response) -> Result<(), Rejection> {
    let unrequested: Vec<&str> = response
        .metadata
        .keys()
        .map(String::as_str)
        .filter(|name| {
            !MetadataField::from_name(name)
                .is_some_and(|f| decoded.required.contains(f) || decoded.optional.contains(f))
        })
        .collect();
    if !unrequested.is_empty() {
        return Err(Rejection::detailed(
            StatusCode::ResponseInvalidMetadata,
            unrequested.join(", "),
        ));
    }

    let blank: Vec<&str> = response
        .metadata
        .iter()
        .filter(|(_, value)| is_blank(value))
        .map(|(name, _)| name.as_str())
        .collect();
    if !blank.is_empty() {
        return Err(Rejection::detailed(
            StatusCode::ResponseMalformedMetadata,
            blank.join(", "),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ValidationEngine: owns the collaborators for repeated use
// ---------------------------------------------------------------------------

pub struct ValidationEngine {
    domain: String,
    verifier: Arc<dyn SignatureVerifier>,
    store: Arc<dyn NonceStore>,
    user_actions: UserActionPolicy,
}

impl ValidationEngine {
    pub fn new(
        domain: impl Into<String>,
        verifier: Arc<dyn SignatureVerifier>,
        store: Arc<dyn NonceStore>,
    ) -> Self {
        Self {
            domain: domain.into(),
            verifier,
            store,
            user_actions: UserActionPolicy::default(),
        }
    }

    pub fn with_user_action_policy(mut self, policy: UserActionPolicy) -> Self {
        self.user_actions = policy;
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn context(&self) -> ValidationContext<'_> {
        ValidationContext {
            domain: &self.domain,
            verifier: self.verifier.as_ref(),
            store: self.store.as_ref(),
            user_actions: self.user_actions,
        }
    }

    pub fn validate(&self, response: &Response) -> ValidationOutcome {
        validate(response, &self.context())
    }

    pub fn validate_json(&self, body: &str) -> ValidationOutcome {
        validate_json(body, &self.context())
    }

    pub fn validate_within(&self, response: &Response, budget: &ValidationBudget) -> ValidationOutcome {
        validate_within(response, &self.context(), budget)
    }
}
