//! The grant flows of the token endpoint.
//!
//! Each flow is an explicit state machine that performs no I/O on its own. It is created from a
//! [`TokenRequest`] and driven with `advance`: every [`Output`] names one operation on a primitive
//! and its result is fed back as the next `Input`. An error state is final and repeats itself on
//! every further input.
//!
//! The async functions [`authorization_code::authorization_code`], [`refresh::refresh`] and
//! [`client_credentials::client_credentials`] drive the machines against an [`Endpoint`]. Most
//! users will not call them directly but go through the dispatcher in [`endpoint`].
//!
//! [`TokenRequest`]: request/struct.TokenRequest.html
//! [`Output`]: authorization_code/enum.Output.html
//! [`Endpoint`]: trait.Endpoint.html
//! [`endpoint`]: ../endpoint/index.html
use tracing::{debug, error, info, warn};

use crate::primitives::authorizer::Authorizer;
use crate::primitives::credentials::{CredentialValidator, Validation};
use crate::primitives::generator::TokenGenerator;
use crate::primitives::issuer::Issuer;
use crate::primitives::registrar::Registrar;
use crate::primitives::signer::Signer;

use self::accesstoken::BearerToken;
use self::error::{Error, ErrorKind, Result};
use self::extensions::PkceVerifier;
use self::request::{ClientProof, GrantType};

pub mod accesstoken;
pub mod authorization_code;
pub mod client_credentials;
pub mod error;
pub mod extensions;
pub mod refresh;
pub mod request;

/// The primitives the grant flows operate on.
///
/// Every primitive is borrowed for the duration of one request only, the flows keep no state
/// between requests.
pub trait Endpoint: Send + Sync {
    /// Tenants and clients.
    fn registrar(&self) -> &dyn Registrar;

    /// Storage of authorization codes.
    fn authorizer(&self) -> &dyn Authorizer;

    /// Storage of refresh tokens.
    fn issuer(&self) -> &dyn Issuer;

    /// Mints access tokens.
    fn signer(&self) -> &dyn Signer;

    /// Checks client secrets and assertions.
    fn credentials(&self) -> &dyn CredentialValidator;

    /// Produces refresh token values.
    fn generator(&self) -> &dyn TokenGenerator;

    /// Checks PKCE verifiers.
    fn pkce(&self) -> PkceVerifier {
        PkceVerifier::default()
    }
}

/// Check the credential presented by a confidential client.
pub(crate) async fn authenticate(
    validator: &dyn CredentialValidator, proof: &ClientProof, client_id: &str, tenant_id: &str,
) -> Result<()> {
    let validation = match proof {
        ClientProof::Secret(secret) => validator.validate_by_secret(client_id, secret).await?,
        ClientProof::Assertion(assertion) => {
            validator
                .validate_by_assertion(assertion, client_id, tenant_id)
                .await?
        }
    };

    match validation {
        Validation::Valid => Ok(()),
        Validation::Invalid(rejection) => {
            debug!(?rejection, "client credentials rejected");
            Err(ErrorKind::InvalidClientCredentials.into())
        }
    }
}

/// Log the outcome of a flow.
pub(crate) fn trace_outcome(grant: GrantType, result: &Result<BearerToken>) {
    match result {
        Ok(token) => info!(
            grant = %grant,
            refresh = token.refresh_token().is_some(),
            "token issued"
        ),
        Err(Error::Rejected(kind)) => warn!(
            grant = %grant,
            error = kind.key(),
            class = ?kind.class(),
            oauth = kind.oauth_error().description(),
            "token request rejected"
        ),
        Err(Error::Primitive(err)) => error!(grant = %grant, error = %err, "token request failed"),
    }
}
