//! The client credentials grant.
//!
//! A service account authenticates as itself and receives an access token whose subject is the
//! client. No user is involved and no refresh token is issued, the client simply repeats the
//! request when its token expires.
use std::mem;

use tracing::instrument;

use crate::primitives::registrar::{Client, Tenant};
use crate::primitives::scope::Scope;
use crate::primitives::signer::{AccessToken, MintRequest, Principal};

use super::accesstoken::BearerToken;
use super::error::{Error, ErrorKind, PrimitiveError, Result};
use super::request::{non_empty, ClientProof, GrantType, TokenRequest};
use super::{authenticate, trace_outcome, Endpoint};

/// Issues one token to a service account.
pub struct ClientCredentials {
    request: TokenRequest,
    state: State,
}

enum State {
    Start,
    Tenant,
    Client,
    Authenticate(Client, ClientProof),
    Issue(MintRequest),
    Complete(BearerToken),
    Done,
    Err(Error),
}

/// Results of the operations requested by [`Output`].
pub enum Input {
    /// The tenant named in the request, if it exists.
    Tenant(Option<Tenant>),
    /// The client named in the request, if it exists.
    Client(Option<Client>),
    /// The client credentials were valid.
    Authenticated,
    /// The minted access token.
    Issued(AccessToken),
    /// Advance without input, as in the very first step.
    None,
}

/// A request by the state machine, or its final result.
pub enum Output<'a> {
    /// Look up the tenant.
    Tenant {
        /// The tenant of the request.
        tenant_id: &'a str,
    },
    /// Look up the client.
    Client {
        /// The requesting client.
        client_id: &'a str,
    },
    /// Validate the credentials of the client.
    Authenticate {
        /// The presented secret or assertion.
        proof: &'a ClientProof,
        /// The requesting client.
        client_id: &'a str,
        /// The tenant of the request.
        tenant_id: &'a str,
    },
    /// Mint an access token.
    Issue {
        /// What to mint.
        mint: &'a MintRequest,
    },
    /// A token was issued.
    Ok(BearerToken),
    /// The request was rejected or a primitive failed.
    Err(Error),
}

impl ClientCredentials {
    /// Start handling `request`.
    pub fn new(request: TokenRequest) -> Self {
        ClientCredentials {
            request,
            state: State::Start,
        }
    }

    /// Feed the result of the previous output and compute the next one.
    pub fn advance(&mut self, input: Input) -> Output<'_> {
        self.state = match (mem::replace(&mut self.state, State::Done), input) {
            (State::Err(err), _) => State::Err(err),
            (State::Start, Input::None) => State::Tenant,
            (State::Tenant, Input::Tenant(tenant)) => Self::tenant(tenant),
            (State::Client, Input::Client(client)) => self.client(client),
            (State::Authenticate(client, _), Input::Authenticated) => self.authenticated(client),
            (State::Issue(mint), Input::Issued(access)) => {
                State::Complete(BearerToken::new(access, None, mint.scope))
            }
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
            State::Tenant => Output::Tenant {
                tenant_id: &self.request.tenant_id,
            },
            State::Client => Output::Client {
                client_id: &self.request.client_id,
            },
            State::Authenticate(_, proof) => Output::Authenticate {
                proof,
                client_id: &self.request.client_id,
                tenant_id: &self.request.tenant_id,
            },
            State::Issue(mint) => Output::Issue { mint },
            State::Err(err) => Output::Err(err.clone()),
            State::Start | State::Complete(_) | State::Done => Output::Err(PrimitiveError::Protocol.into()),
        }
    }

    fn tenant(tenant: Option<Tenant>) -> State {
        match tenant {
            Some(tenant) if tenant.enabled => State::Client,
            _ => State::Err(ErrorKind::InvalidTenant.into()),
        }
    }

    fn client(&self, client: Option<Client>) -> State {
        let client = match client {
            Some(client) if client.enabled && client.tenant_id == self.request.tenant_id => client,
            _ => return State::Err(ErrorKind::InvalidClient.into()),
        };

        if !client.client_type.allows_client_credentials() {
            return State::Err(ErrorKind::InvalidClientTypeForClientCredentialsGrant.into());
        }

        match self.request.client_proof() {
            Some(proof) => State::Authenticate(client, proof),
            None => State::Err(ErrorKind::MissingClientCredentials.into()),
        }
    }

    fn authenticated(&self, client: Client) -> State {
        let scope = match non_empty(&self.request.scope) {
            None => client.allowed_scope,
            Some(scope) => match scope.parse::<Scope>() {
                Ok(scope) if scope <= client.allowed_scope => scope,
                _ => return State::Err(ErrorKind::InvalidScope.into()),
            },
        };

        State::Issue(MintRequest {
            principal: Principal::Client(client.client_id.clone()),
            tenant_id: client.tenant_id,
            client_id: client.client_id,
            scope,
        })
    }
}

/// Issue a token to a service account against the primitives of an endpoint.
#[instrument(skip_all, fields(tenant = %request.tenant_id, client = %request.client_id))]
pub async fn client_credentials(endpoint: &dyn Endpoint, request: &TokenRequest) -> Result<BearerToken> {
    let result = drive(endpoint, request).await;
    trace_outcome(GrantType::ClientCredentials, &result);
    result
}

async fn drive(endpoint: &dyn Endpoint, request: &TokenRequest) -> Result<BearerToken> {
    let mut grant = ClientCredentials::new(request.clone());
    let mut input = Input::None;

    loop {
        input = match grant.advance(input) {
            Output::Tenant { tenant_id } => Input::Tenant(endpoint.registrar().tenant(tenant_id).await?),
            Output::Client { client_id } => Input::Client(endpoint.registrar().client(client_id).await?),
            Output::Authenticate {
                proof,
                client_id,
                tenant_id,
            } => {
                authenticate(endpoint.credentials(), proof, client_id, tenant_id).await?;
                Input::Authenticated
            }
            Output::Issue { mint } => Input::Issued(endpoint.signer().mint_access_token(mint).await?),
            Output::Ok(token) => return Ok(token),
            Output::Err(err) => return Err(err),
        };
    }
}
