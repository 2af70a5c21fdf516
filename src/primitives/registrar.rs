//! Registrars administer a database of known tenants and clients.
//!
//! The token endpoint only reads from the registrar. Registering, updating and disabling clients
//! is an administrative concern that is not covered by this library, except for the simple
//! in-memory `ClientMap` which offers it to make testing possible.
use super::scope::Scope;
use super::StoreError;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Registrars provide a read-only view on tenants and their clients.
#[async_trait]
pub trait Registrar: Send + Sync {
    /// Look up a tenant by its identifier.
    async fn tenant(&self, tenant_id: &str) -> Result<Option<Tenant>, StoreError>;

    /// Look up a client by its identifier.
    ///
    /// Client identifiers are unique across tenants. The tenant the client belongs to is part of
    /// the returned record and must be checked by the caller.
    async fn client(&self, client_id: &str) -> Result<Option<Client>, StoreError>;
}

/// An isolated namespace of clients and users.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    /// The identifier appearing in the token endpoint path.
    pub tenant_id: String,

    /// Disabled tenants can not obtain any token.
    pub enabled: bool,
}

/// The grants a client may use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientType {
    /// A machine client. It obtains tokens for itself through the client credentials grant and
    /// never holds refresh tokens.
    ServiceAccountOnly,

    /// A client acting on behalf of users only. It may not use the client credentials grant.
    UserDelegatedPermissionsOnly,

    /// A client that may do both.
    Both,
}

impl ClientType {
    /// Whether refresh tokens may be issued to clients of this type.
    pub fn allows_refresh(self) -> bool {
        self != ClientType::ServiceAccountOnly
    }

    /// Whether the client credentials grant is open to clients of this type.
    pub fn allows_client_credentials(self) -> bool {
        self != ClientType::UserDelegatedPermissionsOnly
    }
}

/// Key material to verify signed client assertions with.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssertionKey {
    /// A secret shared with the client, assertions are signed with `HS256`.
    Hmac(Vec<u8>),

    /// A PEM encoded RSA public key, assertions are signed with `RS256`.
    RsaPem(Vec<u8>),

    /// A PEM encoded EC public key on P-256, assertions are signed with `ES256`.
    EcPem(Vec<u8>),
}

impl fmt::Debug for AssertionKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            AssertionKey::Hmac(_) => write!(f, "<hmac>"),
            AssertionKey::RsaPem(_) => write!(f, "<rsa>"),
            AssertionKey::EcPem(_) => write!(f, "<ec>"),
        }
    }
}

/// Clients are registered users of tokens.
///
/// A client may hold a secret, a key for assertions, both or neither. A client holding neither can
/// only redeem authorization codes protected by PKCE.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// The tenant the client is registered in.
    pub tenant_id: String,

    /// The unique identifier of the client.
    pub client_id: String,

    /// Disabled clients can not obtain tokens.
    pub enabled: bool,

    /// The grants this client may use.
    pub client_type: ClientType,

    /// How often a single refresh token family may be rotated. Unlimited if `None`.
    pub max_refresh_token_count: Option<u32>,

    /// The scope a client credentials grant is issued with, and the upper bound of what it may
    /// request.
    pub allowed_scope: Scope,

    /// The client secret, encrypted at rest. See [`SecretStore`].
    ///
    /// [`SecretStore`]: ../credentials/trait.SecretStore.html
    pub encrypted_secret: Option<Vec<u8>>,

    /// Key for verifying client assertions.
    pub assertion_key: Option<AssertionKey>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        f.debug_struct("Client")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("enabled", &self.enabled)
            .field("client_type", &self.client_type)
            .field("max_refresh_token_count", &self.max_refresh_token_count)
            .field("allowed_scope", &self.allowed_scope)
            .field("encrypted_secret", &self.encrypted_secret.as_ref().map(|_| "<secret>"))
            .field("assertion_key", &self.assertion_key)
            .finish()
    }
}

impl Client {
    /// Create an enabled client without credentials and an empty allowed scope.
    pub fn new(tenant_id: &str, client_id: &str, client_type: ClientType) -> Client {
        Client {
            tenant_id: tenant_id.to_string(),
            client_id: client_id.to_string(),
            enabled: true,
            client_type,
            max_refresh_token_count: None,
            allowed_scope: Scope::default(),
            encrypted_secret: None,
            assertion_key: None,
        }
    }

    /// Attach the encrypted secret.
    pub fn with_encrypted_secret(mut self, ciphertext: Vec<u8>) -> Self {
        self.encrypted_secret = Some(ciphertext);
        self
    }

    /// Attach a key to verify assertions with.
    pub fn with_assertion_key(mut self, key: AssertionKey) -> Self {
        self.assertion_key = Some(key);
        self
    }

    /// Set the allowed scope.
    pub fn with_allowed_scope(mut self, scope: Scope) -> Self {
        self.allowed_scope = scope;
        self
    }

    /// Limit the number of rotations of each refresh token family.
    pub fn with_max_refresh_token_count(mut self, max: u32) -> Self {
        self.max_refresh_token_count = Some(max);
        self
    }

    /// Mark the client as disabled.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// A very simple, in-memory registry of tenants and clients.
#[derive(Default)]
pub struct ClientMap {
    tenants: RwLock<HashMap<String, Tenant>>,
    clients: RwLock<HashMap<String, Client>>,
}

impl ClientMap {
    /// Create an empty map without any tenant or client.
    pub fn new() -> ClientMap {
        ClientMap::default()
    }

    /// Insert or replace a tenant.
    pub fn register_tenant(&self, tenant: Tenant) {
        self.tenants
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tenant.tenant_id.clone(), tenant);
    }

    /// Insert or replace a client.
    ///
    /// The tenant of the client is not required to be registered.
    pub fn register_client(&self, client: Client) {
        self.clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(client.client_id.clone(), client);
    }
}

fn poisoned<T>(_: PoisonError<T>) -> StoreError {
    StoreError::Unavailable("client map lock poisoned".into())
}

#[async_trait]
impl Registrar for ClientMap {
    async fn tenant(&self, tenant_id: &str) -> Result<Option<Tenant>, StoreError> {
        Ok(self.tenants.read().map_err(poisoned)?.get(tenant_id).cloned())
    }

    async fn client(&self, client_id: &str) -> Result<Option<Client>, StoreError> {
        Ok(self.clients.read().map_err(poisoned)?.get(client_id).cloned())
    }
}

#[async_trait]
impl<'s, R: Registrar + ?Sized> Registrar for &'s R {
    async fn tenant(&self, tenant_id: &str) -> Result<Option<Tenant>, StoreError> {
        (**self).tenant(tenant_id).await
    }

    async fn client(&self, client_id: &str) -> Result<Option<Client>, StoreError> {
        (**self).client(client_id).await
    }
}

#[async_trait]
impl<R: Registrar + ?Sized> Registrar for Box<R> {
    async fn tenant(&self, tenant_id: &str) -> Result<Option<Tenant>, StoreError> {
        (**self).tenant(tenant_id).await
    }

    async fn client(&self, client_id: &str) -> Result<Option<Client>, StoreError> {
        (**self).client(client_id).await
    }
}

#[async_trait]
impl<R: Registrar + ?Sized> Registrar for Arc<R> {
    async fn tenant(&self, tenant_id: &str) -> Result<Option<Tenant>, StoreError> {
        (**self).tenant(tenant_id).await
    }

    async fn client(&self, client_id: &str) -> Result<Option<Client>, StoreError> {
        (**self).client(client_id).await
    }
}
