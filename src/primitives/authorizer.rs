//! Authorizers keep the authorization codes until they are redeemed.
//!
//! A code is handed to the client at the end of the consent step, which is not part of this
//! library. The token endpoint then recovers the record bound to the code and invalidates it
//! before doing anything else with it. A code must never be usable twice.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::generator::{GeneratorError, RandomGenerator, TokenGenerator};
use super::grant::AuthorizationCodeRecord;
use super::StoreError;

/// Storage of authorization codes.
///
/// ## Requirements on implementations
///
/// `revoke_code` must be atomic: of several concurrent calls for the same code, at most one may
/// return `true`. This is what makes a code single-use even when two redemptions race past
/// `recover_code` at the same time.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Retrieve the record associated with a code without invalidating it.
    async fn recover_code(&self, code: &str) -> Result<Option<AuthorizationCodeRecord>, StoreError>;

    /// Delete the code, returning whether it was still present.
    async fn revoke_code(&self, code: &str) -> Result<bool, StoreError>;
}

/// An in-memory hash map.
///
/// This authorizer saves a mapping of generated strings to their associated records. The
/// generator is itself trait based and can be chosen during construction.
pub struct AuthMap<G: TokenGenerator = RandomGenerator> {
    generator: G,
    codes: Mutex<HashMap<String, AuthorizationCodeRecord>>,
}

impl<G: TokenGenerator> AuthMap<G> {
    /// Create an authorizer generating codes with the `generator`.
    pub fn new(generator: G) -> Self {
        AuthMap {
            generator,
            codes: Mutex::new(HashMap::new()),
        }
    }

    /// Store a record under a newly generated code and return the code.
    ///
    /// This is what the consent step does once the owner agreed.
    pub fn authorize(&self, record: AuthorizationCodeRecord) -> Result<String, GeneratorError> {
        let code = self.generator.generate()?;
        self.codes().insert(code.clone(), record);
        Ok(code)
    }

    /// Whether a code is still redeemable.
    pub fn contains(&self, code: &str) -> bool {
        self.codes().contains_key(code)
    }

    /// Every access is a single insert, lookup or remove, so a poisoned map is still consistent.
    fn codes(&self) -> MutexGuard<'_, HashMap<String, AuthorizationCodeRecord>> {
        self.codes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl<G: TokenGenerator> Authorizer for AuthMap<G> {
    async fn recover_code(&self, code: &str) -> Result<Option<AuthorizationCodeRecord>, StoreError> {
        Ok(self.codes().get(code).cloned())
    }

    async fn revoke_code(&self, code: &str) -> Result<bool, StoreError> {
        Ok(self.codes().remove(code).is_some())
    }
}

#[async_trait]
impl<'a, A: Authorizer + ?Sized> Authorizer for &'a A {
    async fn recover_code(&self, code: &str) -> Result<Option<AuthorizationCodeRecord>, StoreError> {
        (**self).recover_code(code).await
    }

    async fn revoke_code(&self, code: &str) -> Result<bool, StoreError> {
        (**self).revoke_code(code).await
    }
}

#[async_trait]
impl<A: Authorizer + ?Sized> Authorizer for Box<A> {
    async fn recover_code(&self, code: &str) -> Result<Option<AuthorizationCodeRecord>, StoreError> {
        (**self).recover_code(code).await
    }

    async fn revoke_code(&self, code: &str) -> Result<bool, StoreError> {
        (**self).revoke_code(code).await
    }
}

#[async_trait]
impl<A: Authorizer + ?Sized> Authorizer for Arc<A> {
    async fn recover_code(&self, code: &str) -> Result<Option<AuthorizationCodeRecord>, StoreError> {
        (**self).recover_code(code).await
    }

    async fn revoke_code(&self, code: &str) -> Result<bool, StoreError> {
        (**self).revoke_code(code).await
    }
}
