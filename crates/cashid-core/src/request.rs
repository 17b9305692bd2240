//! Challenge request construction.
//!
//! The builder is pure: it draws a nonce and renders the URI but does not
//! register anything. Callers hand `BuiltRequest::request.nonce` and
//! `BuiltRequest::uri` to their `NonceStore` before sending the URI out.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metadata::{FieldSet, MetadataError};
use crate::status::StatusCode;
use crate::types::{ChallengeRequest, Nonce};
use crate::uri;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("invalid service domain '{0}'")]
    InvalidDomain(String),

    #[error("invalid service path '{0}': must start with '/' and name a resource")]
    InvalidPath(String),

    #[error("parameter '{key}' contains characters reserved by the request grammar")]
    InvalidParameter { key: char, value: String },

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),
}

impl BuildError {
    pub fn status(&self) -> StatusCode {
        match self {
            BuildError::Metadata(e) => e.status(),
            BuildError::InvalidParameter { .. } => StatusCode::RequestBroken,
            BuildError::InvalidDomain(_) | BuildError::InvalidPath(_) => StatusCode::ServiceBroken,
        }
    }
}

pub type BuildResult<T> = Result<T, BuildError>;

/// Metadata a service asks for with each challenge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRequest {
    #[serde(default)]
    pub required: FieldSet,
    #[serde(default)]
    pub optional: FieldSet,
}

impl MetadataRequest {
    pub fn is_empty(&self) -> bool {
        self.required.is_empty() && self.optional.is_empty()
    }
}

/// A freshly built challenge and its wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltRequest {
    pub uri: String,
    pub request: ChallengeRequest,
}

#[derive(Debug, Clone)]
pub struct RequestBuilder {
    domain: String,
    path: String,
}

impl RequestBuilder {
    pub fn new(domain: impl Into<String>, path: impl Into<String>) -> BuildResult<Self> {
        let domain = domain.into();
        let path = path.into();

        if domain.is_empty() || domain.contains(|c: char| "/?#&".contains(c) || c.is_whitespace())
        {
            return Err(BuildError::InvalidDomain(domain));
        }
        if !path.starts_with('/')
            || path.len() < 2
            || path.contains(|c: char| "?#&".contains(c) || c.is_whitespace())
        {
            return Err(BuildError::InvalidPath(path));
        }

        Ok(Self { domain, path })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Build a challenge with a freshly drawn nonce.
    pub fn build(
        &self,
        action: Option<&str>,
        data: Option<&str>,
        metadata: Option<&MetadataRequest>,
    ) -> BuildResult<BuiltRequest> {
        self.build_with_nonce(action, data, metadata, Nonce::generate())
    }

    /// Build a challenge around a caller-chosen nonce.
    pub fn build_with_nonce(
        &self,
        action: Option<&str>,
        data: Option<&str>,
        metadata: Option<&MetadataRequest>,
        nonce: Nonce,
    ) -> BuildResult<BuiltRequest> {
        let action = check_parameter('a', action)?;
        let data = check_parameter('d', data)?;
        let metadata = metadata.cloned().unwrap_or_default();

        let request = ChallengeRequest {
            domain: self.domain.clone(),
            path: self.path.clone(),
            action,
            data,
            required: metadata.required,
            optional: metadata.optional,
            nonce,
        };
        let uri = uri::encode(&request);

        tracing::debug!(
            nonce = %request.nonce,
            action = request.action.as_deref().unwrap_or(""),
            "built challenge request"
        );

        Ok(BuiltRequest { uri, request })
    }
}

/// Values are written into the URI verbatim, so anything that would end the
/// parameter early is refused.
fn check_parameter(key: char, value: Option<&str>) -> BuildResult<Option<String>> {
    match value {
        None | Some("") => Ok(None),
        Some(v) if v.contains(|c: char| "&?#".contains(c) || c.is_whitespace()) => {
            Err(BuildError::InvalidParameter {
                key,
                value: v.to_string(),
            })
        }
        Some(v) => Ok(Some(v.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataField;

    fn builder() -> RequestBuilder {
        RequestBuilder::new("demo.example", "/api/auth").unwrap()
    }

    #[test]
    fn test_build_login() {
        let built = builder().build(Some("login"), None, None).unwrap();
        let nonce = built.request.nonce.to_string();
        assert_eq!(nonce.len(), 9);
        assert_eq!(
            built.uri,
            format!("cashid:demo.example/api/auth?a=login&x={}", nonce)
        );

        let decoded = uri::decode(&built.uri).unwrap();
        assert_eq!(decoded.action.as_deref(), Some("login"));
        assert_eq!(decoded, built.request);
    }

    #[test]
    fn test_build_with_metadata() {
        let metadata = MetadataRequest {
            required: [MetadataField::Name, MetadataField::Age].into_iter().collect(),
            optional: [MetadataField::Phone].into_iter().collect(),
        };
        let built = builder()
            .build_with_nonce(None, Some("abc"), Some(&metadata), Nonce(555_000_111))
            .unwrap();
        assert_eq!(
            built.uri,
            "cashid:demo.example/api/auth?d=abc&r=i14&o=c4&x=555000111"
        );
    }

    #[test]
    fn test_build_fresh_nonces() {
        let b = builder();
        let first = b.build(None, None, None).unwrap();
        let second = b.build(None, None, None).unwrap();
        assert_ne!(first.request.nonce, second.request.nonce);
    }

    #[test]
    fn test_build_rejects_reserved_characters() {
        let err = builder().build(Some("log in"), None, None).unwrap_err();
        assert!(matches!(err, BuildError::InvalidParameter { key: 'a', .. }));
        let err = builder().build(None, Some("a&x=1"), None).unwrap_err();
        assert!(matches!(err, BuildError::InvalidParameter { key: 'd', .. }));
        assert_eq!(err.status().class(), crate::status::StatusClass::Malformed);
    }

    #[test]
    fn test_new_rejects_bad_domain_and_path() {
        assert!(matches!(
            RequestBuilder::new("", "/a"),
            Err(BuildError::InvalidDomain(_))
        ));
        assert!(matches!(
            RequestBuilder::new("demo.example/x", "/a"),
            Err(BuildError::InvalidDomain(_))
        ));
        assert!(matches!(
            RequestBuilder::new("demo.example", "api"),
            Err(BuildError::InvalidPath(_))
        ));
        assert!(matches!(
            RequestBuilder::new("demo.example", "/"),
            Err(BuildError::InvalidPath(_))
        ));
        let err = RequestBuilder::new("", "/a").unwrap_err();
        assert_eq!(err.status(), StatusCode::ServiceBroken);
    }

    #[test]
    fn test_metadata_request_deserializes_from_names() {
        let json = serde_json::json!({
            "required": { "identity": ["name"] },
            "optional": { "contact": ["email", "phone"] }
        });
        let metadata: MetadataRequest = serde_json::from_value(json).unwrap();
        assert!(metadata.required.contains(MetadataField::Name));
        assert_eq!(metadata.optional.len(), 2);
    }

    #[test]
    fn test_metadata_request_rejects_unknown_field() {
        let json = serde_json::json!({ "required": { "identity": ["shoe_size"] } });
        assert!(serde_json::from_value::<MetadataRequest>(json).is_err());
    }
}
