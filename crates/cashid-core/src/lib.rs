//! CashID Protocol Core
//!
//! Pure protocol logic for CashID challenge–response authentication:
//! the status registry, the metadata token codec, the `cashid:` URI grammar
//! and the challenge request builder, plus the collaborator traits the
//! validation engine is written against.
//!
//! Nothing here performs I/O or holds state between calls. Signature
//! verification and nonce bookkeeping are reached only through the
//! `SignatureVerifier` and `NonceStore` traits.

pub mod error;
pub mod metadata;
pub mod request;
pub mod status;
pub mod traits;
pub mod types;
pub mod uri;

pub use error::*;
pub use metadata::{FieldSet, MetadataCategory, MetadataError, MetadataField, MetadataResult};
pub use request::{BuildError, BuildResult, BuiltRequest, MetadataRequest, RequestBuilder};
pub use status::{StatusClass, StatusCode};
pub use traits::*;
pub use types::*;
pub use uri::{DecodedRequest, UriError, UriResult};
