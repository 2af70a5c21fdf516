//! Signers mint the access tokens handed out by the token endpoint.
//!
//! The claim layout of production tokens is a contract between the signer and the resource
//! servers, the grant handlers only decide *whether* and *for whom* a token is minted. The
//! provided `TokenSigner` produces self-contained tokens: a MessagePack encoding of the claims
//! authenticated with HMAC-SHA256 and encoded as url-safe base64.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use super::scope::Scope;
use super::Time;

/// The subject an access token is issued to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Principal {
    /// An end user, the client acts on their behalf.
    User(String),

    /// The client itself, as in the client credentials grant.
    Client(String),
}

/// Everything the signer is told about a token to mint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MintRequest {
    /// Subject of the token.
    pub principal: Principal,

    /// Tenant the token is valid in.
    pub tenant_id: String,

    /// The client that will hold the token.
    pub client_id: String,

    /// The permissions of the token.
    pub scope: Scope,
}

/// A freshly minted access token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessToken {
    /// The encoded token.
    pub token: String,

    /// Expiration of the token (Utc).
    pub until: Time,
}

impl AccessToken {
    /// Seconds until expiry, never negative.
    pub fn expires_in(&self) -> i64 {
        (self.until - Utc::now()).num_seconds().max(0)
    }
}

/// Minting a token failed.
#[derive(Clone, Debug, Error)]
pub enum SignerError {
    /// The supplied key can not be used.
    #[error("signing key rejected")]
    InvalidKey,

    /// The claims could not be encoded.
    #[error("failed to encode token claims: {0}")]
    Encoding(String),

    /// The signing backend failed.
    #[error("signing backend unavailable: {0}")]
    Unavailable(String),

    /// The configured lifetime puts the expiry outside of the representable time range.
    #[error("token lifetime of {0} seconds is out of range")]
    Lifetime(i64),
}

/// Mints access tokens.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Mint a token for the given principal, tenant, client and scope.
    async fn mint_access_token(&self, request: &MintRequest) -> Result<AccessToken, SignerError>;
}

/// The claims encoded in a token of the `TokenSigner`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Unique per signer instance, distinguishes tokens minted for identical requests.
    pub counter: u64,

    /// Subject of the token.
    pub principal: Principal,

    /// Tenant the token is valid in.
    pub tenant_id: String,

    /// The client holding the token.
    pub client_id: String,

    /// The permissions of the token.
    pub scope: Scope,

    /// Expiration of the token (Utc).
    pub until: Time,
}

#[derive(Serialize, Deserialize)]
struct SignedToken(Vec<u8>, Vec<u8>);

/// Signs token claims with an HMAC key.
///
/// Tokens can be verified by any holder of the key with [`verify`]. They are not encrypted, so
/// the claims are readable by the token holder.
///
/// [`verify`]: #method.verify
pub struct TokenSigner {
    hasher: Hmac<Sha256>,
    lifetime_secs: i64,
    counter: AtomicU64,
}

impl TokenSigner {
    /// The lifetime of tokens unless configured otherwise, one hour.
    pub const DEFAULT_LIFETIME_SECS: i64 = 3600;

    /// Construct a signing instance from a private signing key.
    ///
    /// Security notice: Never use a password alone to construct the signing key. Instead, generate
    /// a new key using a utility such as `openssl rand` that you then store away securely.
    pub fn new(secret: &[u8]) -> Result<TokenSigner, SignerError> {
        let hasher = Hmac::<Sha256>::new_from_slice(secret).map_err(|_| SignerError::InvalidKey)?;
        Ok(TokenSigner::with_hasher(hasher))
    }

    /// Construct a signing instance whose tokens are only valid for the program execution.
    pub fn ephemeral() -> TokenSigner {
        let mut key = [0u8; 64];
        OsRng.fill_bytes(&mut key);
        TokenSigner::with_hasher(<Hmac<Sha256> as Mac>::new(&key.into()))
    }

    fn with_hasher(hasher: Hmac<Sha256>) -> TokenSigner {
        TokenSigner {
            hasher,
            lifetime_secs: Self::DEFAULT_LIFETIME_SECS,
            counter: AtomicU64::new(0),
        }
    }

    /// Set the validity of all tokens minted after this call.
    ///
    /// A lifetime beyond the range of timestamps is not rejected here, minting fails instead.
    pub fn valid_for_secs(mut self, seconds: i64) -> Self {
        self.lifetime_secs = seconds;
        self
    }

    fn expiry(&self) -> Result<Time, SignerError> {
        Duration::try_seconds(self.lifetime_secs)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or(SignerError::Lifetime(self.lifetime_secs))
    }

    fn next_counter(&self) -> u64 {
        // Only uniqueness matters, not ordering.
        self.counter.fetch_add(1, Ordering::Relaxed)
    }

    fn signature(&self, data: &[u8]) -> Vec<u8> {
        let mut hasher = self.hasher.clone();
        hasher.update(data);
        hasher.finalize().into_bytes().to_vec()
    }

    /// Sign a set of claims.
    pub fn sign(&self, claims: &TokenClaims) -> Result<String, SignerError> {
        let payload = rmp_serde::to_vec(claims).map_err(|err| SignerError::Encoding(err.to_string()))?;
        let signature = self.signature(&payload);
        let token = rmp_serde::to_vec(&SignedToken(payload, signature))
            .map_err(|err| SignerError::Encoding(err.to_string()))?;
        Ok(URL_SAFE_NO_PAD.encode(token))
    }

    /// Recover the claims of a token minted by this signer.
    ///
    /// Returns `None` when the token was not produced with this key, was tampered with, or has
    /// expired.
    pub fn verify(&self, token: &str) -> Option<TokenClaims> {
        let decoded = URL_SAFE_NO_PAD.decode(token).ok()?;
        let SignedToken(payload, signature) = rmp_serde::from_slice(&decoded).ok()?;

        let mut hasher = self.hasher.clone();
        hasher.update(&payload);
        hasher.verify_slice(&signature).ok()?;

        let claims: TokenClaims = rmp_serde::from_slice(&payload).ok()?;
        if claims.until <= Utc::now() {
            return None;
        }

        Some(claims)
    }
}

#[async_trait]
impl Signer for TokenSigner {
    async fn mint_access_token(&self, request: &MintRequest) -> Result<AccessToken, SignerError> {
        let until = self.expiry()?;
        let claims = TokenClaims {
            counter: self.next_counter(),
            principal: request.principal.clone(),
            tenant_id: request.tenant_id.clone(),
            client_id: request.client_id.clone(),
            scope: request.scope.clone(),
            until,
        };

        Ok(AccessToken {
            token: self.sign(&claims)?,
            until,
        })
    }
}

#[async_trait]
impl<'a, S: Signer + ?Sized> Signer for &'a S {
    async fn mint_access_token(&self, request: &MintRequest) -> Result<AccessToken, SignerError> {
        (**self).mint_access_token(request).await
    }
}

#[async_trait]
impl<S: Signer + ?Sized> Signer for Box<S> {
    async fn mint_access_token(&self, request: &MintRequest) -> Result<AccessToken, SignerError> {
        (**self).mint_access_token(request).await
    }
}

#[async_trait]
impl<S: Signer + ?Sized> Signer for Arc<S> {
    async fn mint_access_token(&self, request: &MintRequest) -> Result<AccessToken, SignerError> {
        (**self).mint_access_token(request).await
    }
}
