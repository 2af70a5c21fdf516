//! A collection of primitives consumed by the grant handlers.
//!
//! A primitive is the smallest independent unit of policy or storage used by the token endpoint.
//! For example, an `authorizer` stores and single-use-redeems authorization codes, while the
//! `issuer` keeps the hashed refresh tokens and rotates them. Abstracting them into traits makes
//! it possible to provide an independent, database backed implementation for each.
//!
//! Every trait comes with a simple in-memory implementation. These should be used to build or
//! instantiate an `Endpoint`, for example [`Generic`] or your own.
//!
//! ```
//! use std::sync::Arc;
//! use oxide_auth_token::config::Config;
//! use oxide_auth_token::frontends::simple::endpoint::Generic;
//! use oxide_auth_token::primitives::{
//!     authorizer::AuthMap,
//!     credentials::{ClientAuthenticator, PlaintextSecrets},
//!     generator::RandomGenerator,
//!     issuer::TokenMap,
//!     registrar::ClientMap,
//!     signer::TokenSigner,
//! };
//!
//! let config = Config::default();
//! let registrar = Arc::new(ClientMap::new());
//! let endpoint = Generic {
//!     registrar: registrar.clone(),
//!     authorizer: AuthMap::new(RandomGenerator::new(16)),
//!     issuer: TokenMap::new(),
//!     signer: TokenSigner::ephemeral().valid_for_secs(config.access_token_lifetime_secs),
//!     credentials: ClientAuthenticator::new(registrar, PlaintextSecrets).with_config(&config),
//!     generator: RandomGenerator::new(config.refresh_token_bytes),
//!     pkce: config.pkce(),
//! };
//! # let _ = endpoint;
//! ```
//!
//! [`Generic`]: ../frontends/simple/endpoint/struct.Generic.html

use chrono::DateTime;
use chrono::Utc;
use thiserror::Error;

pub mod authorizer;
pub mod credentials;
pub mod generator;
pub mod grant;
pub mod issuer;
pub mod registrar;
pub mod scope;
pub mod signer;

type Time = DateTime<Utc>;

/// Failure of a storage backend.
///
/// Only infrastructure problems are reported this way. An absent record is not an error but an
/// `Ok(None)` or `Ok(false)` of the respective operation.
#[derive(Clone, Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or refused the operation.
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    /// A stored record could not be decoded.
    #[error("stored record is corrupt: {0}")]
    Corrupt(String),
}

/// Commonly used primitives for frontends and backends.
pub mod prelude {
    pub use super::authorizer::{AuthMap, Authorizer};
    pub use super::credentials::{
        ClientAuthenticator, CredentialValidator, PlaintextSecrets, Rejection, SecretStore,
        Validation,
    };
    pub use super::generator::{hash_token, RandomGenerator, TokenGenerator};
    pub use super::grant::{
        AuthorizationCodeRecord, ChallengeMethod, CodeChallenge, RefreshTokenClientType,
        RefreshTokenRecord,
    };
    pub use super::issuer::{Issuer, TokenMap};
    pub use super::registrar::{AssertionKey, Client, ClientMap, ClientType, Registrar, Tenant};
    pub use super::scope::Scope;
    pub use super::signer::{AccessToken, MintRequest, Principal, Signer, TokenSigner};
    pub use super::StoreError;
}
