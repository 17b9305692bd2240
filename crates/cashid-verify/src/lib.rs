//! CashID Response Validation
//!
//! Decides whether a signed client response answers a challenge this service
//! issued. Every call yields exactly one `StatusCode`; rejections are values
//! in the returned `ValidationOutcome`, never `Err`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use cashid_verify::{Ed25519Verifier, ValidationEngine};
//!
//! let engine = ValidationEngine::new("demo.example", Arc::new(Ed25519Verifier), store);
//! let outcome = engine.validate_json(&body);
//! reply_with(outcome.confirmation());
//! ```

pub mod ed25519;
pub mod engine;
pub mod outcome;

pub use ed25519::{address_for, sign_message, Ed25519Verifier};
pub use engine::{
    is_user_initiated, validate, validate_json, validate_within, UserActionPolicy,
    ValidationBudget, ValidationContext, ValidationEngine, DEFAULT_ACTION,
    USER_INITIATED_ACTIONS,
};
pub use outcome::{Confirmation, ValidatedResponse, ValidationOutcome};
