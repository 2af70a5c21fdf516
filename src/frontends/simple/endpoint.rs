//! An ad-hoc endpoint.
//!
//! Provides a simple struct with public members, [`Generic`], that implements the central
//! [`Endpoint`] trait. Tries to implement the least amount of policies and logic while providing
//! the biggest possible customizability.
//!
//! [`Generic`]: ./struct.Generic.html
//! [`Endpoint`]: ../../../code_grant/trait.Endpoint.html
use crate::code_grant::extensions::PkceVerifier;
use crate::code_grant::Endpoint;
use crate::endpoint::TokenEndpoint;
use crate::primitives::authorizer::Authorizer;
use crate::primitives::credentials::CredentialValidator;
use crate::primitives::generator::TokenGenerator;
use crate::primitives::issuer::Issuer;
use crate::primitives::registrar::Registrar;
use crate::primitives::signer::Signer;

/// A rather basic [`Endpoint`] implementation.
///
/// Included types are assumed to be implemented independently, with no major connections. All
/// attributes are public, so there is no inner invariant.
///
/// ## Usage
///
/// You should prefer this implementation when the endpoint is created ad-hoc, for example in
/// tests or for a single-process deployment with the in-memory primitives. When your primitives
/// share a connection pool or other state it is likely cleaner to provide your own [`Endpoint`]
/// implementation instead.
///
/// [`Endpoint`]: ../../../code_grant/trait.Endpoint.html
pub struct Generic<R, A, I, S, C, G> {
    /// The registrar of tenants and clients.
    pub registrar: R,

    /// Storage of authorization codes.
    pub authorizer: A,

    /// Storage of refresh tokens.
    pub issuer: I,

    /// Mints access tokens.
    pub signer: S,

    /// Checks client secrets and assertions.
    pub credentials: C,

    /// Generates refresh tokens.
    pub generator: G,

    /// Checks code verifiers.
    pub pkce: PkceVerifier,
}

impl<R, A, I, S, C, G> Generic<R, A, I, S, C, G>
where
    R: Registrar,
    A: Authorizer,
    I: Issuer,
    S: Signer,
    C: CredentialValidator,
    G: TokenGenerator,
{
    /// Wrap the primitives into a token endpoint.
    pub fn token_endpoint(self) -> TokenEndpoint<Self> {
        TokenEndpoint::new(self)
    }
}

impl<R, A, I, S, C, G> Endpoint for Generic<R, A, I, S, C, G>
where
    R: Registrar,
    A: Authorizer,
    I: Issuer,
    S: Signer,
    C: CredentialValidator,
    G: TokenGenerator,
{
    fn registrar(&self) -> &dyn Registrar {
        &self.registrar
    }

    fn authorizer(&self) -> &dyn Authorizer {
        &self.authorizer
    }

    fn issuer(&self) -> &dyn Issuer {
        &self.issuer
    }

    fn signer(&self) -> &dyn Signer {
        &self.signer
    }

    fn credentials(&self) -> &dyn CredentialValidator {
        &self.credentials
    }

    fn generator(&self) -> &dyn TokenGenerator {
        &self.generator
    }

    fn pkce(&self) -> PkceVerifier {
        self.pkce
    }
}
