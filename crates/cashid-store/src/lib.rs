//! Nonce bookkeeping for CashID challenges.
//!
//! Provides `InMemoryNonceStore`, a process-local `NonceStore` suitable for
//! tests, single-instance deployments and the `cashid` CLI. Multi-instance
//! services plug their own shared store in behind the same trait.

pub mod in_memory;

pub use in_memory::InMemoryNonceStore;
