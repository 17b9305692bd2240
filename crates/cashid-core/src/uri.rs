//! CashID URI grammar.
//!
//! ```text
//! uri   = scheme ":" ["//"] domain path "?" query
//! path  = "/" 1*<any char except "?">
//! query = param *("&" param)      ; keys a, d, r, o, x in any order
//! ```
//!
//! Decoding runs in two stages that can be used on their own: [`split`]
//! recovers the structural parts and [`parse_query`] the named parameters.
//! [`parse`] chains both and decodes the metadata tokens without judging
//! scheme or nonce; [`decode`] additionally insists on a complete
//! `cashid:` challenge.

use serde::Serialize;
use thiserror::Error;

use crate::metadata::{self, FieldSet, MetadataError};
use crate::status::StatusCode;
use crate::types::{ChallengeRequest, InvalidNonce, Nonce};

pub const SCHEME: &str = "cashid";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UriError {
    #[error("request is broken: {0}")]
    Broken(String),

    #[error("request metadata is broken: {0}")]
    Metadata(#[from] MetadataError),

    #[error("request scheme '{0}' is not cashid")]
    MalformedScheme(String),

    #[error("request is missing the nonce")]
    MissingNonce,

    #[error("request nonce '{0}' is invalid")]
    InvalidNonce(String),
}

impl UriError {
    pub fn status(&self) -> StatusCode {
        match self {
            UriError::Broken(_) | UriError::Metadata(_) => StatusCode::RequestBroken,
            UriError::MalformedScheme(_) => StatusCode::RequestMalformedScheme,
            UriError::MissingNonce => StatusCode::RequestMissingNonce,
            UriError::InvalidNonce(_) => StatusCode::RequestInvalidNonce,
        }
    }
}

impl From<InvalidNonce> for UriError {
    fn from(e: InvalidNonce) -> Self {
        UriError::InvalidNonce(e.0)
    }
}

pub type UriResult<T> = Result<T, UriError>;

// ---------------------------------------------------------------------------
// Stage 1: structural split
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UriParts<'a> {
    pub scheme: &'a str,
    pub domain: &'a str,
    /// Includes the leading `/`.
    pub path: &'a str,
    /// Everything after the first `?`.
    pub query: &'a str,
}

pub fn split(uri: &str) -> UriResult<UriParts<'_>> {
    let (scheme, rest) = uri
        .split_once(':')
        .ok_or_else(|| UriError::Broken("missing scheme separator".into()))?;
    if scheme.is_empty() || !is_scheme(scheme) {
        return Err(UriError::Broken(format!("invalid scheme '{}'", scheme)));
    }

    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let slash = rest
        .find('/')
        .ok_or_else(|| UriError::Broken("missing path".into()))?;
    let (domain, rest) = rest.split_at(slash);
    if domain.is_empty() {
        return Err(UriError::Broken("missing domain".into()));
    }
    if domain.contains(|c: char| c == '?' || c == '#' || c.is_whitespace()) {
        return Err(UriError::Broken(format!("invalid domain '{}'", domain)));
    }

    let (path, query) = rest
        .split_once('?')
        .ok_or_else(|| UriError::Broken("missing query".into()))?;
    if path.len() < 2 {
        return Err(UriError::Broken("empty path".into()));
    }
    if query.is_empty() {
        return Err(UriError::Broken("empty query".into()));
    }

    Ok(UriParts {
        scheme,
        domain,
        path,
        query,
    })
}

fn is_scheme(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

// ---------------------------------------------------------------------------
// Stage 2: query parameters
// ---------------------------------------------------------------------------

/// Raw query parameters. Empty values are reported as absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryParams<'a> {
    pub action: Option<&'a str>,
    pub data: Option<&'a str>,
    pub required: Option<&'a str>,
    pub optional: Option<&'a str>,
    pub nonce: Option<&'a str>,
}

pub fn parse_query(query: &str) -> UriResult<QueryParams<'_>> {
    let mut params = QueryParams::default();
    let mut seen = [false; 5];

    for pair in query.split('&') {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| UriError::Broken(format!("malformed parameter '{}'", pair)))?;
        let (slot, index) = match key {
            "a" => (&mut params.action, 0),
            "d" => (&mut params.data, 1),
            "r" => (&mut params.required, 2),
            "o" => (&mut params.optional, 3),
            "x" => (&mut params.nonce, 4),
            _ => {
                tracing::debug!(key = %key, "ignoring unknown request parameter");
                continue;
            }
        };
        if std::mem::replace(&mut seen[index], true) {
            return Err(UriError::Broken(format!("duplicate parameter '{}'", key)));
        }
        if !value.is_empty() {
            *slot = Some(value);
        }
    }

    Ok(params)
}

// ---------------------------------------------------------------------------
// Full decode
// ---------------------------------------------------------------------------

/// A request URI decoded without judging its scheme or nonce.
///
/// The nonce is kept as written; [`DecodedRequest::nonce`] interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedRequest {
    pub scheme: String,
    pub domain: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    pub required: FieldSet,
    pub optional: FieldSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

impl DecodedRequest {
    /// The numeric nonce, or `MissingNonce` / `InvalidNonce`.
    pub fn nonce(&self) -> UriResult<Nonce> {
        let raw = self.nonce.as_deref().ok_or(UriError::MissingNonce)?;
        Ok(raw.parse::<Nonce>()?)
    }

    /// Promote to a challenge: scheme must be `cashid` and a nonce present.
    pub fn into_challenge(self) -> UriResult<ChallengeRequest> {
        if self.scheme != SCHEME {
            return Err(UriError::MalformedScheme(self.scheme));
        }
        let nonce = self.nonce()?;
        Ok(ChallengeRequest {
            domain: self.domain,
            path: self.path,
            action: self.action,
            data: self.data,
            required: self.required,
            optional: self.optional,
            nonce,
        })
    }
}

pub fn parse(uri: &str) -> UriResult<DecodedRequest> {
    let parts = split(uri)?;
    let params = parse_query(parts.query)?;

    let required = params.required.map(metadata::decode).transpose()?;
    let optional = params.optional.map(metadata::decode).transpose()?;

    Ok(DecodedRequest {
        scheme: parts.scheme.to_string(),
        domain: parts.domain.to_string(),
        path: parts.path.to_string(),
        action: params.action.map(str::to_string),
        data: params.data.map(str::to_string),
        required: required.unwrap_or_default(),
        optional: optional.unwrap_or_default(),
        nonce: params.nonce.map(str::to_string),
    })
}

pub fn decode(uri: &str) -> UriResult<ChallengeRequest> {
    parse(uri)?.into_challenge()
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

/// Render a challenge. Parameter order is fixed: a, d, r, o, x.
pub fn encode(request: &ChallengeRequest) -> String {
    let mut params: Vec<String> = Vec::with_capacity(5);

    if let Some(action) = request.action.as_deref().filter(|a| !a.is_empty()) {
        params.push(format!("a={}", action));
    }
    if let Some(data) = request.data.as_deref().filter(|d| !d.is_empty()) {
        params.push(format!("d={}", data));
    }
    if !request.required.is_empty() {
        params.push(format!("r={}", metadata::encode(&request.required)));
    }
    if !request.optional.is_empty() {
        params.push(format!("o={}", metadata::encode(&request.optional)));
    }
    params.push(format!("x={}", request.nonce));

    format!(
        "{}:{}{}?{}",
        SCHEME,
        request.domain,
        request.path,
        params.join("&")
    )
}
