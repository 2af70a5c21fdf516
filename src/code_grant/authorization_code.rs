//! Redemption of authorization codes.
//!
//! The flow is roughly:
//!
//! ```text
//! recover(code) ─> revoke(code) ─> binding checks ─┬─ PKCE ──────────┬─> client ─> mint ─> store refresh
//!                                                   └─ authenticate ──┘
//! ```
//!
//! The code is invalidated right after it was found and before anything else is checked, so it
//! is consumed by the first redemption attempt whether or not that attempt succeeds. The
//! invalidation is awaited. When the store reports that the code was already gone, a concurrent
//! redemption won the race and this one fails.
use std::mem;

use tracing::{debug, instrument};
use url::Url;

use crate::primitives::generator::hash_token;
use crate::primitives::grant::{AuthorizationCodeRecord, RefreshTokenClientType, RefreshTokenRecord};
use crate::primitives::registrar::Client;
use crate::primitives::scope::Scope;
use crate::primitives::signer::{AccessToken, MintRequest, Principal};

use super::accesstoken::BearerToken;
use super::error::{Error, ErrorKind, PrimitiveError, Result};
use super::extensions::PkceVerifier;
use super::request::{non_empty, ClientProof, GrantType, TokenRequest};
use super::{authenticate, trace_outcome, Endpoint};

/// Redeems one authorization code.
pub struct AuthorizationCode {
    request: TokenRequest,
    pkce: PkceVerifier,
    state: State,
}

enum State {
    Start,
    Recover(String),
    Revoke(String, AuthorizationCodeRecord),
    Authenticate(AuthorizationCodeRecord, ClientProof),
    Bind(AuthorizationCodeRecord, RefreshTokenClientType),
    Issue {
        record: AuthorizationCodeRecord,
        origin: RefreshTokenClientType,
        mint: MintRequest,
        refreshable: bool,
    },
    Store(RefreshTokenRecord, BearerToken),
    Complete(BearerToken),
    Done,
    Err(Error),
}

/// Results of the operations requested by [`Output`].
pub enum Input {
    /// The record stored under the code, if any.
    Recovered(Option<AuthorizationCodeRecord>),
    /// Whether the code was still present when it was revoked.
    Revoked(bool),
    /// The client credentials were valid.
    Authenticated,
    /// The client the code was issued to, if it still exists.
    Client(Option<Client>),
    /// The minted access token and, if one was requested, a fresh refresh token.
    Issued {
        /// The access token.
        access: AccessToken,
        /// The raw refresh token.
        refresh: Option<String>,
    },
    /// The refresh token record was stored.
    Stored,
    /// Advance without input, as in the very first step.
    None,
}

/// A request by the state machine, or its final result.
pub enum Output<'a> {
    /// Look up the record of the code.
    Recover {
        /// The authorization code.
        code: &'a str,
    },
    /// Delete the code, answered with whether it was still present.
    Revoke {
        /// The authorization code.
        code: &'a str,
    },
    /// Validate the credentials of the client.
    Authenticate {
        /// The presented secret or assertion.
        proof: &'a ClientProof,
        /// The client claiming the code.
        client_id: &'a str,
        /// The tenant of the request.
        tenant_id: &'a str,
    },
    /// Look up the client.
    Client {
        /// The client the code was issued to.
        client_id: &'a str,
    },
    /// Mint an access token and, if `refreshable`, generate a refresh token.
    Issue {
        /// What to mint.
        mint: &'a MintRequest,
        /// Whether a refresh token must be generated.
        refreshable: bool,
    },
    /// Store the record of the new refresh token.
    Store {
        /// The new record.
        record: &'a RefreshTokenRecord,
    },
    /// The code was redeemed.
    Ok(BearerToken),
    /// The request was rejected or a primitive failed.
    Err(Error),
}

impl AuthorizationCode {
    /// Start redeeming the code in `request`.
    pub fn new(request: TokenRequest, pkce: PkceVerifier) -> Self {
        AuthorizationCode {
            request,
            pkce,
            state: State::Start,
        }
    }

    /// Feed the result of the previous output and compute the next one.
    pub fn advance(&mut self, input: Input) -> Output<'_> {
        self.state = match (mem::replace(&mut self.state, State::Done), input) {
            (State::Err(err), _) => State::Err(err),
            (State::Start, Input::None) => self.start(),
            (State::Recover(code), Input::Recovered(record)) => Self::recovered(code, record),
            (State::Revoke(_, _), Input::Revoked(false)) => {
                debug!("authorization code was redeemed concurrently");
                State::Err(ErrorKind::InvalidAuthorizationCode.into())
            }
            (State::Revoke(_, record), Input::Revoked(true)) => self.revoked(record),
            (State::Authenticate(record, _), Input::Authenticated) => {
                State::Bind(record, RefreshTokenClientType::Confidential)
            }
            (State::Bind(record, origin), Input::Client(client)) => Self::bound(record, origin, client),
            (
                State::Issue {
                    record,
                    origin,
                    mint,
                    refreshable,
                },
                Input::Issued { access, refresh },
            ) => Self::issued(record, origin, mint, refreshable, access, refresh),
            (State::Store(_, token), Input::Stored) => State::Complete(token),
            (_, _) => State::Err(PrimitiveError::Protocol.into()),
        };

        self.output()
    }

    fn output(&mut self) -> Output<'_> {
        if let State::Complete(_) = self.state {
            if let State::Complete(token) = mem::replace(&mut self.state, State::Done) {
                return Output::Ok(token);
            }
        }

        match &self.state {
            State::Recover(code) => Output::Recover { code },
            State::Revoke(code, _) => Output::Revoke { code },
            State::Authenticate(_, proof) => Output::Authenticate {
                proof,
                client_id: &self.request.client_id,
                tenant_id: &self.request.tenant_id,
            },
            State::Bind(record, _) => Output::Client {
                client_id: &record.client_id,
            },
            State::Issue { mint, refreshable, .. } => Output::Issue {
                mint,
                refreshable: *refreshable,
            },
            State::Store(record, _) => Output::Store { record },
            State::Err(err) => Output::Err(err.clone()),
            State::Start | State::Complete(_) | State::Done => Output::Err(PrimitiveError::Protocol.into()),
        }
    }

    fn start(&self) -> State {
        match non_empty(&self.request.code) {
            Some(code) => State::Recover(code.to_string()),
            None => State::Err(ErrorKind::InvalidAuthorizationCode.into()),
        }
    }

    fn recovered(code: String, record: Option<AuthorizationCodeRecord>) -> State {
        match record {
            Some(record) => State::Revoke(code, record),
            None => State::Err(ErrorKind::InvalidAuthorizationCode.into()),
        }
    }

    /// The code is consumed, check that it was redeemed in the context it was issued for.
    fn revoked(&self, record: AuthorizationCodeRecord) -> State {
        match self.check_binding(&record) {
            Ok(()) => self.choose_authentication(record),
            Err(kind) => State::Err(kind.into()),
        }
    }

    fn check_binding(&self, record: &AuthorizationCodeRecord) -> std::result::Result<(), ErrorKind> {
        let request = &self.request;

        if record.tenant_id != request.tenant_id {
            return Err(ErrorKind::AuthorizationCodeTenantMismatch);
        }

        if record.client_id != request.client_id {
            return Err(ErrorKind::AuthorizationCodeClientMismatch);
        }

        let redirect_uri = non_empty(&request.redirect_uri).and_then(|uri| Url::parse(uri).ok());
        if redirect_uri.as_ref() != Some(&record.redirect_uri) {
            return Err(ErrorKind::RedirectUriMismatch);
        }

        if let Some(scope) = non_empty(&request.scope) {
            match scope.parse::<Scope>() {
                Ok(scope) if scope == record.scope => (),
                _ => return Err(ErrorKind::ScopeMismatch),
            }
        }

        if record.is_expired() {
            return Err(ErrorKind::ExpiredAuthorizationCode);
        }

        Ok(())
    }

    fn choose_authentication(&self, record: AuthorizationCodeRecord) -> State {
        let challenge = match &record.challenge {
            Some(challenge) => challenge,
            None => {
                return match self.request.client_proof() {
                    Some(proof) => State::Authenticate(record, proof),
                    None => State::Err(ErrorKind::MissingClientCredentials.into()),
                }
            }
        };

        let verifier = match non_empty(&self.request.code_verifier) {
            Some(verifier) => verifier,
            None => return State::Err(ErrorKind::MissingCodeVerifier.into()),
        };

        if !self.pkce.verify_challenge(verifier, challenge) {
            return State::Err(ErrorKind::InvalidCodeVerifier.into());
        }

        State::Bind(record, RefreshTokenClientType::Pkce)
    }

    fn bound(record: AuthorizationCodeRecord, origin: RefreshTokenClientType, client: Option<Client>) -> State {
        let client = match client {
            Some(client) => client,
            None => return State::Err(ErrorKind::MissingClient.into()),
        };

        if !client.enabled {
            return State::Err(ErrorKind::InvalidClient.into());
        }

        if client.tenant_id != record.tenant_id {
            return State::Err(ErrorKind::InvalidTenantAndClient.into());
        }

        let mint = MintRequest {
            principal: Principal::User(record.owner_id.clone()),
            tenant_id: record.tenant_id.clone(),
            client_id: record.client_id.clone(),
            scope: record.scope.clone(),
        };

        State::Issue {
            record,
            origin,
            mint,
            refreshable: client.client_type.allows_refresh(),
        }
    }

    fn issued(
        record: AuthorizationCodeRecord, origin: RefreshTokenClientType, mint: MintRequest,
        refreshable: bool, access: AccessToken, refresh: Option<String>,
    ) -> State {
        match (refreshable, refresh) {
            (true, Some(refresh)) => {
                let stored = RefreshTokenRecord {
                    tenant_id: record.tenant_id,
                    client_id: record.client_id,
                    owner_id: record.owner_id,
                    token_hash: hash_token(&refresh),
                    refresh_count: 0,
                    client_type: origin,
                    scope: record.scope,
                };
                State::Store(stored, BearerToken::new(access, Some(refresh), mint.scope))
            }
            (false, None) => State::Complete(BearerToken::new(access, None, mint.scope)),
            _ => State::Err(PrimitiveError::Protocol.into()),
        }
    }
}

/// Redeem an authorization code against the primitives of an endpoint.
#[instrument(skip_all, fields(tenant = %request.tenant_id, client = %request.client_id))]
pub async fn authorization_code(endpoint: &dyn Endpoint, request: &TokenRequest) -> Result<BearerToken> {
    let result = drive(endpoint, request).await;
    trace_outcome(GrantType::AuthorizationCode, &result);
    result
}

async fn drive(endpoint: &dyn Endpoint, request: &TokenRequest) -> Result<BearerToken> {
    let mut grant = AuthorizationCode::new(request.clone(), endpoint.pkce());
    let mut input = Input::None;

    loop {
        input = match grant.advance(input) {
            Output::Recover { code } => Input::Recovered(endpoint.authorizer().recover_code(code).await?),
            Output::Revoke { code } => Input::Revoked(endpoint.authorizer().revoke_code(code).await?),
            Output::Authenticate {
                proof,
                client_id,
                tenant_id,
            } => {
                authenticate(endpoint.credentials(), proof, client_id, tenant_id).await?;
                Input::Authenticated
            }
            Output::Client { client_id } => Input::Client(endpoint.registrar().client(client_id).await?),
            Output::Issue { mint, refreshable } => {
                let access = endpoint.signer().mint_access_token(mint).await?;
                let refresh = if refreshable {
                    Some(endpoint.generator().generate()?)
                } else {
                    None
                };
                Input::Issued { access, refresh }
            }
            Output::Store { record } => {
                endpoint.issuer().store_refresh(record.clone()).await?;
                Input::Stored
            }
            Output::Ok(token) => return Ok(token),
            Output::Err(err) => return Err(err),
        };
    }
}
