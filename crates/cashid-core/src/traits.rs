use std::time::Duration;

use crate::error::CashIdResult;
use crate::types::{Nonce, NonceRecord};

// ---------------------------------------------------------------------------
// SignatureVerifier: address-bound signature check
//
// Returns Ok(false) for a signature that does not verify, including
// undecodable addresses or signatures. Err is reserved for the verifier
// itself being unavailable.
// ---------------------------------------------------------------------------

pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, address: &str, signature: &str, message: &str) -> CashIdResult<bool>;
}

// ---------------------------------------------------------------------------
// NonceStore: issuance and single-use tracking
//
// `consume` must be linearizable: the not-consumed/not-expired check and the
// transition to consumed happen as one step, so at most one caller ever
// observes `true` for a given nonce.
// ---------------------------------------------------------------------------

pub trait NonceStore: Send + Sync {
    fn issue(&self, nonce: Nonce, request: &str, ttl: Duration) -> CashIdResult<()>;
    fn lookup(&self, nonce: Nonce) -> CashIdResult<Option<NonceRecord>>;
    fn consume(&self, nonce: Nonce) -> CashIdResult<bool>;
}

impl<T: SignatureVerifier + ?Sized> SignatureVerifier for std::sync::Arc<T> {
    fn verify(&self, address: &str, signature: &str, message: &str) -> CashIdResult<bool> {
        (**self).verify(address, signature, message)
    }
}

impl<T: NonceStore + ?Sized> NonceStore for std::sync::Arc<T> {
    fn issue(&self, nonce: Nonce, request: &str, ttl: Duration) -> CashIdResult<()> {
        (**self).issue(nonce, request, ttl)
    }

    fn lookup(&self, nonce: Nonce) -> CashIdResult<Option<NonceRecord>> {
        (**self).lookup(nonce)
    }

    fn consume(&self, nonce: Nonce) -> CashIdResult<bool> {
        (**self).consume(nonce)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Verify the trait objects are object-safe
    fn _assert_verifier_object_safe(_: &dyn SignatureVerifier) {}
    fn _assert_store_object_safe(_: &dyn NonceStore) {}

    struct AcceptAll;

    impl SignatureVerifier for AcceptAll {
        fn verify(&self, _: &str, _: &str, _: &str) -> CashIdResult<bool> {
            Ok(true)
        }
    }

    #[test]
    fn test_arc_forwards() {
        let verifier: std::sync::Arc<dyn SignatureVerifier> = std::sync::Arc::new(AcceptAll);
        assert!(verifier.verify("a", "s", "m").unwrap());
    }
}
