// ---------------------------------------------------------------------------
// Ed25519 reference verifier
// ---------------------------------------------------------------------------
//
// Addresses are the base58 encoding of a 32-byte Ed25519 public key and
// signatures the standard base64 encoding of the 64-byte signature over the
// request string. Real wallets sign with their own scheme and plug in behind
// `SignatureVerifier`; this one exists for local services, the CLI and tests.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use cashid_core::{CashIdResult, SignatureVerifier};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl Ed25519Verifier {
    pub fn new() -> Self {
        Self
    }
}

impl SignatureVerifier for Ed25519Verifier {
    /// Malformed addresses or signatures verify as `false`, not as errors.
    fn verify(&self, address: &str, signature: &str, message: &str) -> CashIdResult<bool> {
        let Some(key) = decode_address(address) else {
            tracing::debug!(address = %address, "address is not a base58 ed25519 key");
            return Ok(false);
        };
        let Some(sig) = decode_signature(signature) else {
            tracing::debug!("signature is not 64 base64-encoded bytes");
            return Ok(false);
        };
        Ok(key.verify(message.as_bytes(), &sig).is_ok())
    }
}

fn decode_address(address: &str) -> Option<VerifyingKey> {
    let bytes = bs58::decode(address).into_vec().ok()?;
    let key_bytes: [u8; 32] = bytes.as_slice().try_into().ok()?;
    VerifyingKey::from_bytes(&key_bytes).ok()
}

fn decode_signature(signature: &str) -> Option<Signature> {
    let bytes = BASE64.decode(signature).ok()?;
    let sig_bytes: [u8; 64] = bytes.as_slice().try_into().ok()?;
    Some(Signature::from_bytes(&sig_bytes))
}

/// The address a client holding `key` identifies itself with.
pub fn address_for(key: &VerifyingKey) -> String {
    bs58::encode(key.as_bytes()).into_string()
}

/// Sign `message` the way `Ed25519Verifier` expects.
pub fn sign_message(key: &SigningKey, message: &str) -> String {
    BASE64.encode(key.sign(message.as_bytes()).to_bytes())
}
