//! Rotation of refresh tokens.
//!
//! A refresh token is looked up by its hash only. Every successful redemption replaces the stored
//! record by a successor with an incremented count, so each token value is usable exactly once.
//! Failures leave the record untouched, with the exception of a client exceeding its configured
//! number of refreshes: that token family is deleted for good and the client has to start over
//! with a new authorization.
use std::mem;

use tracing::{debug, instrument, warn};

use crate::primitives::generator::hash_token;
use crate::primitives::grant::{RefreshTokenClientType, RefreshTokenRecord};
use crate::primitives::issuer::Issuer;
use crate::primitives::registrar::Client;
use crate::primitives::scope::Scope;
use crate::primitives::signer::{AccessToken, MintRequest, Principal};

use super::accesstoken::BearerToken;
use super::error::{Error, ErrorKind, PrimitiveError, Result};
use super::request::{non_empty, ClientProof, GrantType, TokenRequest};
use super::{authenticate, trace_outcome, Endpoint};

/// Redeems one refresh token.
pub struct Refresh {
    request: TokenRequest,
    state: State,
}

enum State {
    Start,
    Recover(String),
    Bind(RefreshTokenRecord),
    Authenticate {
        record: RefreshTokenRecord,
        client: Client,
        proof: ClientProof,
    },
    Issue {
        record: RefreshTokenRecord,
        mint: MintRequest,
    },
    Retire(RefreshTokenRecord),
    Rotate {
        previous: RefreshTokenRecord,
        next: RefreshTokenRecord,
        token: BearerToken,
    },
    Store(RefreshTokenRecord, BearerToken),
    Complete(BearerToken),
    Done,
    Err(Error),
}

/// Results of the operations requested by [`Output`].
pub enum Input {
    /// The record stored under the token hash, if any.
    Recovered(Option<RefreshTokenRecord>),
    /// The client holding the token, if it still exists.
    Client(Option<Client>),
    /// The client credentials were valid.
    Authenticated,
    /// The minted access token and the raw successor refresh token.
    Issued {
        /// The access token.
        access: AccessToken,
        /// The new refresh token.
        refresh: String,
    },
    /// Whether the record was still present when it was deleted.
    Revoked(bool),
    /// The successor record was stored.
    Stored,
    /// Advance without input, as in the very first step.
    None,
}

/// A request by the state machine, or its final result.
pub enum Output<'a> {
    /// Look up the record of the token.
    Recover {
        /// Hash of the presented token.
        token_hash: &'a str,
    },
    /// Look up the client.
    Client {
        /// The client holding the token.
        client_id: &'a str,
    },
    /// Validate the credentials of the client.
    Authenticate {
        /// The presented secret or assertion.
        proof: &'a ClientProof,
        /// The client holding the token.
        client_id: &'a str,
        /// The tenant of the request.
        tenant_id: &'a str,
    },
    /// Mint an access token and generate the successor refresh token.
    Issue {
        /// What to mint.
        mint: &'a MintRequest,
    },
    /// Delete a record, answered with whether it was still present.
    Revoke {
        /// Hash of the token to delete.
        token_hash: &'a str,
    },
    /// Store the successor record.
    Store {
        /// The new record.
        record: &'a RefreshTokenRecord,
    },
    /// The token was rotated.
    Ok(BearerToken),
    /// The request was rejected or a primitive failed.
    Err(Error),
}

impl Refresh {
    /// Start redeeming the refresh token in `request`.
    pub fn new(request: TokenRequest) -> Self {
        Refresh {
            request,
            state: State::Start,
        }
    }

    /// Feed the result of the previous output and compute the next one.
    pub fn advance(&mut self, input: Input) -> Output<'_> {
        self.state = match (mem::replace(&mut self.state, State::Done), input) {
            (State::Err(err), _) => State::Err(err),
            (State::Start, Input::None) => self.start(),
            (State::Recover(_), Input::Recovered(record)) => self.recovered(record),
            (State::Bind(record), Input::Client(client)) => self.bound(record, client),
            (State::Authenticate { record, client, .. }, Input::Authenticated) => {
                self.authenticated(record, client)
            }
            (State::Issue { record, mint }, Input::Issued { access, refresh }) => {
                let next = record.rotated(hash_token(&refresh));
                State::Rotate {
                    previous: record,
                    next,
                    token: BearerToken::new(access, Some(refresh), mint.scope),
                }
            }
            (State::Retire(_), Input::Revoked(_)) => State::Err(ErrorKind::MaximumRefreshCountReached.into()),
            (State::Rotate { .. }, Input::Revoked(false)) => {
                debug!("refresh token was rotated concurrently");
                State::Err(ErrorKind::InvalidRefreshToken.into())
            }
            (State::Rotate { next, token, .. }, Input::Revoked(true)) => State::Store(next, token),
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
            State::Recover(token_hash) => Output::Recover { token_hash },
            State::Bind(record) => Output::Client {
                client_id: &record.client_id,
            },
            State::Authenticate { record, proof, .. } => Output::Authenticate {
                proof,
                client_id: &record.client_id,
                tenant_id: &self.request.tenant_id,
            },
            State::Issue { mint, .. } => Output::Issue { mint },
            State::Retire(record) => Output::Revoke {
                token_hash: &record.token_hash,
            },
            State::Rotate { previous, .. } => Output::Revoke {
                token_hash: &previous.token_hash,
            },
            State::Store(record, _) => Output::Store { record },
            State::Err(err) => Output::Err(err.clone()),
            State::Start | State::Complete(_) | State::Done => Output::Err(PrimitiveError::Protocol.into()),
        }
    }

    fn start(&self) -> State {
        match non_empty(&self.request.refresh_token) {
            Some(token) => State::Recover(hash_token(token)),
            None => State::Err(ErrorKind::MissingRefreshToken.into()),
        }
    }

    fn recovered(&self, record: Option<RefreshTokenRecord>) -> State {
        let record = match record {
            Some(record) => record,
            None => return State::Err(ErrorKind::InvalidRefreshToken.into()),
        };

        if record.client_id != self.request.client_id {
            debug!("refresh token presented by a client it was not issued to");
            return State::Err(ErrorKind::InvalidRefreshToken.into());
        }

        if record.tenant_id != self.request.tenant_id {
            return State::Err(ErrorKind::InvalidTenantAndClient.into());
        }

        State::Bind(record)
    }

    fn bound(&self, record: RefreshTokenRecord, client: Option<Client>) -> State {
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

        if !client.client_type.allows_refresh() {
            return State::Err(ErrorKind::InvalidClientTypeForRefreshTokenGrant.into());
        }

        match record.client_type {
            RefreshTokenClientType::Pkce => self.authenticated(record, client),
            RefreshTokenClientType::Confidential => match self.request.client_proof() {
                Some(proof) => State::Authenticate { record, client, proof },
                None => State::Err(ErrorKind::MissingClientCredentials.into()),
            },
        }
    }

    /// The caller may use the token, check the ceiling and the requested scope.
    fn authenticated(&self, record: RefreshTokenRecord, client: Client) -> State {
        if let Some(max) = client.max_refresh_token_count {
            if record.refresh_count > max {
                warn!(
                    refresh_count = record.refresh_count,
                    max, "refresh ceiling exceeded, deleting token"
                );
                return State::Retire(record);
            }
        }

        let scope = match non_empty(&self.request.scope) {
            None => record.scope.clone(),
            Some(scope) => match scope.parse::<Scope>() {
                Ok(scope) if scope <= record.scope => scope,
                _ => return State::Err(ErrorKind::InvalidScope.into()),
            },
        };

        let mint = MintRequest {
            principal: Principal::User(record.owner_id.clone()),
            tenant_id: record.tenant_id.clone(),
            client_id: record.client_id.clone(),
            scope,
        };

        State::Issue { record, mint }
    }
}

/// Redeem a refresh token against the primitives of an endpoint.
#[instrument(skip_all, fields(tenant = %request.tenant_id, client = %request.client_id))]
pub async fn refresh(endpoint: &dyn Endpoint, request: &TokenRequest) -> Result<BearerToken> {
    let result = drive(endpoint, request).await;
    trace_outcome(GrantType::RefreshToken, &result);
    result
}

async fn drive(endpoint: &dyn Endpoint, request: &TokenRequest) -> Result<BearerToken> {
    let mut grant = Refresh::new(request.clone());
    let mut input = Input::None;

    loop {
        input = match grant.advance(input) {
            Output::Recover { token_hash } => {
                Input::Recovered(endpoint.issuer().recover_refresh(token_hash).await?)
            }
            Output::Client { client_id } => Input::Client(endpoint.registrar().client(client_id).await?),
            Output::Authenticate {
                proof,
                client_id,
                tenant_id,
            } => {
                authenticate(endpoint.credentials(), proof, client_id, tenant_id).await?;
                Input::Authenticated
            }
            Output::Issue { mint } => {
                let access = endpoint.signer().mint_access_token(mint).await?;
                let refresh = endpoint.generator().generate()?;
                Input::Issued { access, refresh }
            }
            Output::Revoke { token_hash } => {
                Input::Revoked(endpoint.issuer().revoke_refresh(token_hash).await?)
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

/// Delete the refresh token family a raw token belongs to.
///
/// Returns whether the token was live. Revoking an unknown token is not an error.
pub async fn revoke_refresh_token(issuer: &dyn Issuer, token: &str) -> Result<bool> {
    if token.is_empty() {
        return Err(ErrorKind::MissingRefreshToken.into());
    }

    let revoked = issuer.revoke_refresh(&hash_token(token)).await?;
    debug!(revoked, "refresh token revoked");
    Ok(revoked)
}
