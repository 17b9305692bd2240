use cashid_core::{CashIdError, CashIdResult, Nonce, NonceRecord, NonceStore, Timestamp};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// In-memory nonce store implementing NonceStore.
///
/// Every operation takes the same lock, which is what makes `consume`
/// linearizable. State is lost when the process exits.
pub struct InMemoryNonceStore {
    records: Mutex<HashMap<Nonce, NonceRecord>>,
}

fn lock_records(
    mutex: &Mutex<HashMap<Nonce, NonceRecord>>,
) -> CashIdResult<MutexGuard<'_, HashMap<Nonce, NonceRecord>>> {
    mutex
        .lock()
        .map_err(|e| CashIdError::Storage(format!("lock poisoned: {}", e)))
}

impl InMemoryNonceStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Register a nonce with an absolute expiry.
    ///
    /// Fails if the nonce is already held by a live, unconsumed record.
    pub fn issue_until(
        &self,
        nonce: Nonce,
        request: &str,
        expires_at: Timestamp,
    ) -> CashIdResult<()> {
        let mut records = lock_records(&self.records)?;
        let now = Timestamp::now();
        if let Some(existing) = records.get(&nonce) {
            if !existing.consumed && !existing.is_expired_at(now) {
                return Err(CashIdError::Storage(format!(
                    "nonce {} is already outstanding",
                    nonce
                )));
            }
        }
        records.insert(nonce, NonceRecord::new(nonce, request, expires_at));
        tracing::debug!(nonce = %nonce, expires_at = %expires_at.to_rfc3339(), "nonce issued");
        Ok(())
    }

    /// Drop expired and consumed records. Returns how many were removed.
    pub fn purge_expired(&self) -> CashIdResult<usize> {
        let mut records = lock_records(&self.records)?;
        let now = Timestamp::now();
        let before = records.len();
        records.retain(|_, r| !r.consumed && !r.is_expired_at(now));
        let removed = before - records.len();
        if removed > 0 {
            tracing::debug!(removed, "purged nonce records");
        }
        Ok(removed)
    }

    /// Get the number of stored records.
    pub fn len(&self) -> CashIdResult<usize> {
        Ok(lock_records(&self.records)?.len())
    }

    pub fn is_empty(&self) -> CashIdResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl Default for InMemoryNonceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NonceStore for InMemoryNonceStore {
    fn issue(&self, nonce: Nonce, request: &str, ttl: Duration) -> CashIdResult<()> {
        self.issue_until(nonce, request, Timestamp::now().after(ttl))
    }

    fn lookup(&self, nonce: Nonce) -> CashIdResult<Option<NonceRecord>> {
        let records = lock_records(&self.records)?;
        Ok(records.get(&nonce).cloned())
    }

    fn consume(&self, nonce: Nonce) -> CashIdResult<bool> {
        let mut records = lock_records(&self.records)?;
        let now = Timestamp::now();
        match records.get_mut(&nonce) {
            Some(record) if !record.consumed && !record.is_expired_at(now) => {
                record.consumed = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const URI: &str = "cashid:demo.example/api/auth?x=123456789";

    #[test]
    fn test_issue_lookup_consume() {
        let store = InMemoryNonceStore::new();
        let nonce = Nonce(123_456_789);

        assert!(store.lookup(nonce).unwrap().is_none());
        store.issue(nonce, URI, Duration::from_secs(60)).unwrap();

        let record = store.lookup(nonce).unwrap().unwrap();
        assert_eq!(record.request, URI);
        assert!(!record.consumed);
        assert!(!record.is_expired());

        assert!(store.consume(nonce).unwrap());
        assert!(!store.consume(nonce).unwrap());
        assert!(store.lookup(nonce).unwrap().unwrap().consumed);
    }

    #[test]
    fn test_consume_unknown_nonce() {
        let store = InMemoryNonceStore::new();
        assert!(!store.consume(Nonce(1)).unwrap());
    }

    #[test]
    fn test_consume_expired_nonce() {
        let store = InMemoryNonceStore::new();
        let nonce = Nonce(200_000_000);
        store
            .issue_until(nonce, URI, Timestamp::from_seconds(1))
            .unwrap();
        assert!(!store.consume(nonce).unwrap());
        assert!(!store.lookup(nonce).unwrap().unwrap().consumed);
    }

    #[test]
    fn test_issue_rejects_outstanding_nonce() {
        let store = InMemoryNonceStore::new();
        let nonce = Nonce(300_000_000);
        store.issue(nonce, URI, Duration::from_secs(60)).unwrap();
        assert!(store.issue(nonce, URI, Duration::from_secs(60)).is_err());

        // Once consumed the value may be reissued
        assert!(store.consume(nonce).unwrap());
        store.issue(nonce, URI, Duration::from_secs(60)).unwrap();
        assert!(!store.lookup(nonce).unwrap().unwrap().consumed);
    }

    #[test]
    fn test_purge_expired() {
        let store = InMemoryNonceStore::new();
        store
            .issue_until(Nonce(1), URI, Timestamp::from_seconds(1))
            .unwrap();
        store.issue(Nonce(2), URI, Duration::from_secs(60)).unwrap();
        store.issue(Nonce(3), URI, Duration::from_secs(60)).unwrap();
        assert!(store.consume(Nonce(3)).unwrap());

        assert_eq!(store.len().unwrap(), 3);
        assert_eq!(store.purge_expired().unwrap(), 2);
        assert_eq!(store.len().unwrap(), 1);
        assert!(store.lookup(Nonce(2)).unwrap().is_some());
    }

    #[test]
    fn test_concurrent_consume_single_winner() {
        let store = Arc::new(InMemoryNonceStore::new());
        let nonce = Nonce(500_000_000);
        store.issue(nonce, URI, Duration::from_secs(60)).unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.consume(nonce).unwrap())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_poisoned_lock_is_storage_error() {
        let store = Arc::new(InMemoryNonceStore::new());
        let holder = Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = holder.records.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert!(matches!(store.len(), Err(CashIdError::Storage(_))));
        assert!(store.is_empty().is_err());
        assert!(store.lookup(Nonce(1)).is_err());
        assert!(store.purge_expired().is_err());
    }
}
