//! Validation of client credentials.
//!
//! A confidential client proves its identity either with its shared secret or with a signed
//! client assertion, a JWT whose subject is the client id. Exactly one of the two is checked per
//! request: the secret when one was supplied, the assertion otherwise.
//!
//! An invalid credential is an expected outcome and reported as [`Validation::Invalid`]. Only a
//! failing backend (registrar, key management) is an `Err`.
use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation as JwtValidation};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use thiserror::Error;

use super::registrar::{AssertionKey, Client, Registrar};
use super::StoreError;
use crate::config::Config;

/// Outcome of checking a credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Validation {
    /// The credential proves the identity of the client.
    Valid,

    /// The credential was rejected.
    Invalid(Rejection),
}

impl Validation {
    /// Whether the credential was accepted.
    pub fn is_valid(self) -> bool {
        self == Validation::Valid
    }
}

/// Why a credential was rejected.
///
/// These are for logging only, callers must not reveal the distinction to the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// No client with the claimed id exists.
    UnknownClient,
    /// The client exists in another tenant.
    TenantMismatch,
    /// The client has no secret, it can not authenticate with one.
    NoSecretRegistered,
    /// The supplied secret differs from the stored one.
    SecretMismatch,
    /// The client has no key to verify assertions with.
    NoAssertionKey,
    /// The assertion is not a well-formed JWT for the registered key.
    MalformedAssertion,
    /// The signature of the assertion does not verify.
    SignatureInvalid,
    /// The assertion has expired.
    AssertionExpired,
    /// Subject or issuer of the assertion is not the client.
    SubjectMismatch,
    /// The assertion was made out for another audience.
    AudienceMismatch,
}

/// Infrastructure failure while validating credentials.
#[derive(Clone, Debug, Error)]
pub enum SecretError {
    /// The client could not be looked up.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The stored secret could not be decrypted.
    #[error("failed to decrypt client secret: {0}")]
    Decrypt(String),

    /// The stored verification key is unusable.
    #[error("registered assertion key is invalid: {0}")]
    Key(String),
}

/// Decrypts client secrets which are stored encrypted at rest.
///
/// Usually backed by a key management service.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Decrypt a stored secret.
    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, SecretError>;
}

/// Secrets that are stored without encryption.
///
/// Only fit for development and tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlaintextSecrets;

#[async_trait]
impl SecretStore for PlaintextSecrets {
    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, SecretError> {
        Ok(ciphertext.to_vec())
    }
}

#[async_trait]
impl<S: SecretStore + ?Sized> SecretStore for Arc<S> {
    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, SecretError> {
        (**self).decrypt(ciphertext).await
    }
}

/// Checks the proof of identity of a client.
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    /// Compare a supplied secret to the one stored for the client.
    async fn validate_by_secret(&self, client_id: &str, secret: &str) -> Result<Validation, SecretError>;

    /// Verify a signed client assertion, as found in the `Authorization: Bearer` header.
    async fn validate_by_assertion(
        &self, assertion: &str, client_id: &str, tenant_id: &str,
    ) -> Result<Validation, SecretError>;
}

#[async_trait]
impl<'a, V: CredentialValidator + ?Sized> CredentialValidator for &'a V {
    async fn validate_by_secret(&self, client_id: &str, secret: &str) -> Result<Validation, SecretError> {
        (**self).validate_by_secret(client_id, secret).await
    }

    async fn validate_by_assertion(
        &self, assertion: &str, client_id: &str, tenant_id: &str,
    ) -> Result<Validation, SecretError> {
        (**self).validate_by_assertion(assertion, client_id, tenant_id).await
    }
}

#[async_trait]
impl<V: CredentialValidator + ?Sized> CredentialValidator for Box<V> {
    async fn validate_by_secret(&self, client_id: &str, secret: &str) -> Result<Validation, SecretError> {
        (**self).validate_by_secret(client_id, secret).await
    }

    async fn validate_by_assertion(
        &self, assertion: &str, client_id: &str, tenant_id: &str,
    ) -> Result<Validation, SecretError> {
        (**self).validate_by_assertion(assertion, client_id, tenant_id).await
    }
}

#[async_trait]
impl<V: CredentialValidator + ?Sized> CredentialValidator for Arc<V> {
    async fn validate_by_secret(&self, client_id: &str, secret: &str) -> Result<Validation, SecretError> {
        (**self).validate_by_secret(client_id, secret).await
    }

    async fn validate_by_assertion(
        &self, assertion: &str, client_id: &str, tenant_id: &str,
    ) -> Result<Validation, SecretError> {
        (**self).validate_by_assertion(assertion, client_id, tenant_id).await
    }
}

#[derive(Deserialize)]
struct AssertionClaims {
    sub: String,
    #[serde(default)]
    iss: Option<String>,
}

/// Validates credentials against the clients of a registrar.
///
/// Secrets are decrypted through a [`SecretStore`] and compared in constant time. Assertions are
/// verified with the key registered for the client: `HS256` for shared keys, `RS256` and `ES256`
/// for public keys. An assertion must carry `exp` and `sub`, and `sub` (as well as `iss`, if
/// present) must be the client id.
pub struct ClientAuthenticator<R, S> {
    registrar: R,
    secrets: S,
    leeway: u64,
    audience: Option<String>,
}

impl<R: Registrar, S: SecretStore> ClientAuthenticator<R, S> {
    /// Validate credentials of the clients in `registrar`.
    pub fn new(registrar: R, secrets: S) -> Self {
        ClientAuthenticator {
            registrar,
            secrets,
            leeway: 60,
            audience: None,
        }
    }

    /// Tolerated clock skew, in seconds, when checking the expiry of assertions.
    pub fn with_leeway(mut self, seconds: u64) -> Self {
        self.leeway = seconds;
        self
    }

    /// Only accept assertions made out for this audience.
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Apply the assertion settings of a configuration.
    pub fn with_config(mut self, config: &Config) -> Self {
        self.leeway = config.assertion_leeway_secs;
        self.audience = config.assertion_audience.clone();
        self
    }

    fn verify_assertion(&self, assertion: &str, client: &Client) -> Result<Validation, SecretError> {
        let (key, algorithm) = match &client.assertion_key {
            None => return Ok(Validation::Invalid(Rejection::NoAssertionKey)),
            Some(AssertionKey::Hmac(secret)) => (DecodingKey::from_secret(secret), Algorithm::HS256),
            Some(AssertionKey::RsaPem(pem)) => (
                DecodingKey::from_rsa_pem(pem).map_err(|err| SecretError::Key(err.to_string()))?,
                Algorithm::RS256,
            ),
            Some(AssertionKey::EcPem(pem)) => (
                DecodingKey::from_ec_pem(pem).map_err(|err| SecretError::Key(err.to_string()))?,
                Algorithm::ES256,
            ),
        };

        let mut validation = JwtValidation::new(algorithm);
        validation.leeway = self.leeway;
        validation.set_required_spec_claims(&["exp", "sub"]);
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        let claims = match jsonwebtoken::decode::<AssertionClaims>(assertion, &key, &validation) {
            Ok(data) => data.claims,
            Err(err) => {
                let rejection = match err.kind() {
                    JwtErrorKind::ExpiredSignature => Rejection::AssertionExpired,
                    JwtErrorKind::InvalidSignature => Rejection::SignatureInvalid,
                    JwtErrorKind::InvalidAudience => Rejection::AudienceMismatch,
                    _ => Rejection::MalformedAssertion,
                };
                return Ok(Validation::Invalid(rejection));
            }
        };

        let issuer_matches = claims.iss.as_deref().map_or(true, |iss| iss == client.client_id);
        if claims.sub != client.client_id || !issuer_matches {
            return Ok(Validation::Invalid(Rejection::SubjectMismatch));
        }

        Ok(Validation::Valid)
    }
}

#[async_trait]
impl<R: Registrar, S: SecretStore> CredentialValidator for ClientAuthenticator<R, S> {
    async fn validate_by_secret(&self, client_id: &str, secret: &str) -> Result<Validation, SecretError> {
        let client = match self.registrar.client(client_id).await? {
            Some(client) => client,
            None => return Ok(Validation::Invalid(Rejection::UnknownClient)),
        };

        let ciphertext = match &client.encrypted_secret {
            Some(ciphertext) => ciphertext,
            None => return Ok(Validation::Invalid(Rejection::NoSecretRegistered)),
        };

        let stored = self.secrets.decrypt(ciphertext).await?;
        if bool::from(stored.as_slice().ct_eq(secret.as_bytes())) {
            Ok(Validation::Valid)
        } else {
            Ok(Validation::Invalid(Rejection::SecretMismatch))
        }
    }

    async fn validate_by_assertion(
        &self, assertion: &str, client_id: &str, tenant_id: &str,
    ) -> Result<Validation, SecretError> {
        let client = match self.registrar.client(client_id).await? {
            Some(client) => client,
            None => return Ok(Validation::Invalid(Rejection::UnknownClient)),
        };

        if client.tenant_id != tenant_id {
            return Ok(Validation::Invalid(Rejection::TenantMismatch));
        }

        self.verify_assertion(assertion, &client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::registrar::{ClientMap, ClientType};

    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    const ASSERTION_KEY: &[u8] = b"assertion signing key for tests";

    #[derive(Serialize)]
    struct Claims<'a> {
        sub: &'a str,
        iss: &'a str,
        exp: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        aud: Option<&'a str>,
    }

    fn assertion(sub: &str, exp_offset: i64, aud: Option<&str>, key: &[u8]) -> String {
        let claims = Claims {
            sub,
            iss: sub,
            exp: Utc::now().timestamp() + exp_offset,
            aud,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(key)).unwrap()
    }

    fn authenticator() -> ClientAuthenticator<ClientMap, PlaintextSecrets> {
        let registrar = ClientMap::new();
        registrar.register_client(
            Client::new("acme", "app", ClientType::Both)
                .with_encrypted_secret(b"correct horse".to_vec())
                .with_assertion_key(AssertionKey::Hmac(ASSERTION_KEY.to_vec())),
        );
        registrar.register_client(Client::new("acme", "public", ClientType::Both));
        ClientAuthenticator::new(registrar, PlaintextSecrets).with_leeway(0)
    }

    #[test]
    fn secret_validation() {
        let auth = authenticator();
        smol::block_on(async {
            assert_eq!(auth.validate_by_secret("app", "correct horse").await.unwrap(), Validation::Valid);
            assert_eq!(
                auth.validate_by_secret("app", "correct horse battery").await.unwrap(),
                Validation::Invalid(Rejection::SecretMismatch)
            );
            assert_eq!(
                auth.validate_by_secret("public", "anything").await.unwrap(),
                Validation::Invalid(Rejection::NoSecretRegistered)
            );
            assert_eq!(
                auth.validate_by_secret("ghost", "anything").await.unwrap(),
                Validation::Invalid(Rejection::UnknownClient)
            );
        });
    }

    #[test]
    fn assertion_validation() {
        let auth = authenticator();
        smol::block_on(async {
            let valid = assertion("app", 300, None, ASSERTION_KEY);
            assert!(auth.validate_by_assertion(&valid, "app", "acme").await.unwrap().is_valid());

            assert_eq!(
                auth.validate_by_assertion(&valid, "app", "other-tenant").await.unwrap(),
                Validation::Invalid(Rejection::TenantMismatch)
            );

            let foreign_subject = assertion("someone-else", 300, None, ASSERTION_KEY);
            assert_eq!(
                auth.validate_by_assertion(&foreign_subject, "app", "acme").await.unwrap(),
                Validation::Invalid(Rejection::SubjectMismatch)
            );

            let wrong_key = assertion("app", 300, None, b"some other key");
            assert_eq!(
                auth.validate_by_assertion(&wrong_key, "app", "acme").await.unwrap(),
                Validation::Invalid(Rejection::SignatureInvalid)
            );

            let expired = assertion("app", -300, None, ASSERTION_KEY);
            assert_eq!(
                auth.validate_by_assertion(&expired, "app", "acme").await.unwrap(),
                Validation::Invalid(Rejection::AssertionExpired)
            );

            assert_eq!(
                auth.validate_by_assertion("garbage", "app", "acme").await.unwrap(),
                Validation::Invalid(Rejection::MalformedAssertion)
            );

            assert_eq!(
                auth.validate_by_assertion(&valid, "public", "acme").await.unwrap(),
                Validation::Invalid(Rejection::NoAssertionKey)
            );
        });
    }

    #[test]
    fn assertion_audience() {
        let auth = authenticator().with_audience("https://issuer.example/acme/token");
        smol::block_on(async {
            let matching = assertion("app", 300, Some("https://issuer.example/acme/token"), ASSERTION_KEY);
            assert!(auth.validate_by_assertion(&matching, "app", "acme").await.unwrap().is_valid());

            let other = assertion("app", 300, Some("https://elsewhere.example"), ASSERTION_KEY);
            assert_eq!(
                auth.validate_by_assertion(&other, "app", "acme").await.unwrap(),
                Validation::Invalid(Rejection::AudienceMismatch)
            );
        });
    }
}
