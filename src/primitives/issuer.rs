//! Issuers persist refresh tokens.
//!
//! Only the hash of a refresh token is ever stored, see [`hash_token`]. A refresh rotates the
//! record: the old hash is deleted and a successor record is stored under the hash of the new
//! token. Rotation therefore only requires insert and delete by key, no in-place update.
//!
//! [`hash_token`]: ../generator/fn.hash_token.html
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::grant::RefreshTokenRecord;
use super::StoreError;

/// Storage of refresh token records, keyed by token hash.
///
/// ## Requirements on implementations
///
/// `revoke_refresh` must be atomic: of several concurrent calls for the same hash, at most one
/// may return `true`. A refresh whose delete returned `false` lost a race against a concurrent
/// rotation and fails.
#[async_trait]
pub trait Issuer: Send + Sync {
    /// Retrieve the record stored under a hash.
    async fn recover_refresh(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Delete a record, returning whether it was still present.
    async fn revoke_refresh(&self, token_hash: &str) -> Result<bool, StoreError>;

    /// Store a record under its `token_hash`.
    async fn store_refresh(&self, record: RefreshTokenRecord) -> Result<(), StoreError>;
}

/// Keeps refresh token records in a hash map.
#[derive(Default)]
pub struct TokenMap {
    refresh: Mutex<HashMap<String, RefreshTokenRecord>>,
}

impl TokenMap {
    /// Create an empty map.
    pub fn new() -> Self {
        TokenMap::default()
    }

    /// The number of live refresh tokens.
    pub fn len(&self) -> usize {
        self.records().len()
    }

    /// Whether no refresh token is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy of the record for a hash, if any.
    pub fn get(&self, token_hash: &str) -> Option<RefreshTokenRecord> {
        self.records().get(token_hash).cloned()
    }

    /// A panic while holding the lock can not leave a record half written, so poison is ignored.
    fn records(&self) -> MutexGuard<'_, HashMap<String, RefreshTokenRecord>> {
        self.refresh.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Issuer for TokenMap {
    async fn recover_refresh(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, StoreError> {
        Ok(self.records().get(token_hash).cloned())
    }

    async fn revoke_refresh(&self, token_hash: &str) -> Result<bool, StoreError> {
        Ok(self.records().remove(token_hash).is_some())
    }

    async fn store_refresh(&self, record: RefreshTokenRecord) -> Result<(), StoreError> {
        self.records().insert(record.token_hash.clone(), record);
        Ok(())
    }
}

#[async_trait]
impl<'a, I: Issuer + ?Sized> Issuer for &'a I {
    async fn recover_refresh(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, StoreError> {
        (**self).recover_refresh(token_hash).await
    }

    async fn revoke_refresh(&self, token_hash: &str) -> Result<bool, StoreError> {
        (**self).revoke_refresh(token_hash).await
    }

    async fn store_refresh(&self, record: RefreshTokenRecord) -> Result<(), StoreError> {
        (**self).store_refresh(record).await
    }
}

#[async_trait]
impl<I: Issuer + ?Sized> Issuer for Box<I> {
    async fn recover_refresh(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, StoreError> {
        (**self).recover_refresh(token_hash).await
    }

    async fn revoke_refresh(&self, token_hash: &str) -> Result<bool, StoreError> {
        (**self).revoke_refresh(token_hash).await
    }

    async fn store_refresh(&self, record: RefreshTokenRecord) -> Result<(), StoreError> {
        (**self).store_refresh(record).await
    }
}

#[async_trait]
impl<I: Issuer + ?Sized> Issuer for Arc<I> {
    async fn recover_refresh(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, StoreError> {
        (**self).recover_refresh(token_hash).await
    }

    async fn revoke_refresh(&self, token_hash: &str) -> Result<bool, StoreError> {
        (**self).revoke_refresh(token_hash).await
    }

    async fn store_refresh(&self, record: RefreshTokenRecord) -> Result<(), StoreError> {
        (**self).store_refresh(record).await
    }
}

#[cfg(test)]
/// Tests for issuer implementations, including those provided here.
pub mod tests {
    use super::*;
    use crate::primitives::grant::RefreshTokenClientType;

    fn record(hash: &str) -> RefreshTokenRecord {
        RefreshTokenRecord {
            tenant_id: "Tenant".into(),
            client_id: "Client".into(),
            owner_id: "Owner".into(),
            token_hash: hash.into(),
            refresh_count: 0,
            client_type: RefreshTokenClientType::Confidential,
            scope: "default".parse().unwrap(),
        }
    }

    /// Tests the storage contract every issuer must uphold.
    pub fn simple_test_suite<I: Issuer>(issuer: &I) {
        smol::block_on(async {
            assert!(issuer.recover_refresh("first").await.unwrap().is_none());
            assert!(!issuer.revoke_refresh("first").await.unwrap());

            issuer.store_refresh(record("first")).await.unwrap();
            assert_eq!(issuer.recover_refresh("first").await.unwrap(), Some(record("first")));

            assert!(issuer.revoke_refresh("first").await.unwrap());
            assert!(!issuer.revoke_refresh("first").await.unwrap());
            assert!(issuer.recover_refresh("first").await.unwrap().is_none());
        });
    }

    #[test]
    fn token_map_test_suite() {
        let map = TokenMap::new();
        simple_test_suite(&map);
        assert!(map.is_empty());
    }

    #[test]
    fn survives_poisoned_lock() {
        let map = TokenMap::new();
        let panicked = std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let _held = map.refresh.lock();
                    panic!("poison the token map");
                })
                .join()
                .is_err()
        });
        assert!(panicked);

        simple_test_suite(&map);
        assert!(map.is_empty());
    }

    #[test]
    fn records_are_keyed_by_hash() {
        let map = TokenMap::new();
        smol::block_on(async {
            map.store_refresh(record("a")).await.unwrap();
            map.store_refresh(record("b")).await.unwrap();
        });
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("a").unwrap().token_hash, "a");
    }
}
