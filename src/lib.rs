//! # oxide-auth-token
//!
//! The token endpoint of a multi-tenant OAuth2 server, featuring a set of configurable and
//! pluggable back-ends.
//!
//! ## About
//!
//! A client exchanges some proof of authorization for an access token at the token endpoint. This
//! crate implements that exchange for three grants:
//!
//! * `authorization_code`: redeem a single-use code obtained by a user's consent, either with a
//!   PKCE code verifier or with client credentials. User delegated clients also receive a refresh
//!   token.
//! * `refresh_token`: rotate a refresh token. Each value is usable once, and a client may only
//!   refresh a limited number of times if so configured.
//! * `client_credentials`: a service account authenticates as itself.
//!
//! Clients authenticate either with a shared secret or with a signed JWT assertion in the
//! `Authorization` header. Every request belongs to a tenant, named in the request path, and all
//! codes, tokens and clients are bound to their tenant.
//!
//! ## Usage
//!
//! Choose a set of [`primitives`]: a [`Registrar`] of tenants and clients, an [`Authorizer`]
//! holding authorization codes, an [`Issuer`] holding refresh tokens, a [`Signer`] minting access
//! tokens and a [`CredentialValidator`]. There is a simple, in-memory implementation provided for
//! each of those. Combine them into an [`Endpoint`], in simple cases an instantiation of the
//! [`Generic`] struct, and wrap it into a [`TokenEndpoint`].
//!
//! Requests reach the endpoint through the [`WebRequest`] and [`WebResponse`] traits, see
//! [`frontends`] for the available adaptations. Every outcome is rendered into a json body, either
//! the token response or a uniform error description with a stable error key.
//!
//! ```
//! use std::sync::Arc;
//! use oxide_auth_token::config::Config;
//! use oxide_auth_token::frontends::simple::endpoint::Generic;
//! use oxide_auth_token::frontends::simple::request::Request;
//! use oxide_auth_token::primitives::prelude::*;
//!
//! let config = Config::default();
//! let registrar = Arc::new(ClientMap::new());
//! registrar.register_tenant(Tenant { tenant_id: "acme".into(), enabled: true });
//! registrar.register_client(
//!     Client::new("acme", "reporting", ClientType::ServiceAccountOnly)
//!         .with_encrypted_secret(b"s3cr3t".to_vec())
//!         .with_allowed_scope("reports:read".parse().unwrap()),
//! );
//!
//! let endpoint = Generic {
//!     registrar: registrar.clone(),
//!     authorizer: AuthMap::new(RandomGenerator::new(16)),
//!     issuer: TokenMap::new(),
//!     signer: TokenSigner::ephemeral(),
//!     credentials: ClientAuthenticator::new(registrar, PlaintextSecrets),
//!     generator: RandomGenerator::new(config.refresh_token_bytes),
//!     pkce: config.pkce(),
//! }
//! .token_endpoint();
//!
//! let mut request = Request::post("acme", vec![
//!     ("client_id", "reporting"),
//!     ("grant_type", "client_credentials"),
//!     ("client_secret", "s3cr3t"),
//! ]);
//! let response = smol::block_on(endpoint.execute(&mut request)).unwrap();
//! assert_eq!(response.status, 200);
//! ```
//!
//! [`primitives`]: primitives/index.html
//! [`Registrar`]: primitives/registrar/trait.Registrar.html
//! [`Authorizer`]: primitives/authorizer/trait.Authorizer.html
//! [`Issuer`]: primitives/issuer/trait.Issuer.html
//! [`Signer`]: primitives/signer/trait.Signer.html
//! [`CredentialValidator`]: primitives/credentials/trait.CredentialValidator.html
//! [`Endpoint`]: code_grant/trait.Endpoint.html
//! [`Generic`]: frontends/simple/endpoint/struct.Generic.html
//! [`TokenEndpoint`]: endpoint/struct.TokenEndpoint.html
//! [`WebRequest`]: endpoint/trait.WebRequest.html
//! [`WebResponse`]: endpoint/trait.WebResponse.html
//! [`frontends`]: frontends/index.html
#![warn(missing_docs)]

pub mod code_grant;
pub mod config;
pub mod endpoint;
pub mod frontends;
pub mod primitives;
