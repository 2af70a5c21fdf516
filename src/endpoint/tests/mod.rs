use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;

use crate::code_grant::accesstoken::TokenResponse;
use crate::endpoint::TokenEndpoint;
use crate::frontends::simple::endpoint::Generic;
use crate::frontends::simple::request::{Request, Response};
use crate::primitives::prelude::*;
use crate::primitives::signer::SignerError;

mod dispatch;
mod refresh;

/// Some default values for tests.
pub mod defaults {
    pub const TENANT: &str = "acme";
    pub const OTHER_TENANT: &str = "globex";
    pub const CLIENT_ID: &str = "LocalClient";
    pub const PUBLIC_ID: &str = "PublicClient";
    pub const SERVICE_ID: &str = "ServiceClient";
    pub const LIMITED_ID: &str = "LimitedClient";
    pub const FOREIGN_ID: &str = "ForeignClient";
    pub const PASSPHRASE: &str = "WOJJCcS8WyS2aGmJK6ZADg==";
    pub const OWNER_ID: &str = "Owner";
    pub const REDIRECT_URI: &str = "https://client.example/endpoint";
    pub const SCOPE: &str = "example default";
    pub const SERVICE_SCOPE: &str = "reports:read reports:write";
    pub const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    pub const ASSERTION_KEY: &[u8] = b"shared assertion key of LocalClient";
    pub const LIMIT: u32 = 2;
}

use self::defaults::*;

type TestEndpoint = Generic<
    Arc<ClientMap>,
    Arc<AuthMap>,
    Arc<TokenMap>,
    Arc<TokenSigner>,
    ClientAuthenticator<Arc<ClientMap>, PlaintextSecrets>,
    RandomGenerator,
>;

/// An endpoint over in-memory primitives that stay accessible to the test.
struct Setup {
    registrar: Arc<ClientMap>,
    authorizer: Arc<AuthMap>,
    issuer: Arc<TokenMap>,
    signer: Arc<TokenSigner>,
    endpoint: TokenEndpoint<TestEndpoint>,
}

impl Setup {
    fn new() -> Self {
        let registrar = Arc::new(ClientMap::new());
        registrar.register_tenant(Tenant {
            tenant_id: TENANT.into(),
            enabled: true,
        });
        registrar.register_tenant(Tenant {
            tenant_id: OTHER_TENANT.into(),
            enabled: true,
        });

        registrar.register_client(
            Client::new(TENANT, CLIENT_ID, ClientType::Both)
                .with_encrypted_secret(PASSPHRASE.as_bytes().to_vec())
                .with_assertion_key(AssertionKey::Hmac(ASSERTION_KEY.to_vec()))
                .with_allowed_scope(SCOPE.parse().unwrap()),
        );
        registrar.register_client(
            Client::new(TENANT, PUBLIC_ID, ClientType::UserDelegatedPermissionsOnly)
                .with_allowed_scope(SCOPE.parse().unwrap()),
        );
        registrar.register_client(
            Client::new(TENANT, SERVICE_ID, ClientType::ServiceAccountOnly)
                .with_encrypted_secret(PASSPHRASE.as_bytes().to_vec())
                .with_allowed_scope(SERVICE_SCOPE.parse().unwrap()),
        );
        registrar.register_client(
            Client::new(TENANT, LIMITED_ID, ClientType::UserDelegatedPermissionsOnly)
                .with_max_refresh_token_count(LIMIT),
        );
        registrar.register_client(
            Client::new(OTHER_TENANT, FOREIGN_ID, ClientType::Both)
                .with_encrypted_secret(PASSPHRASE.as_bytes().to_vec()),
        );

        let authorizer = Arc::new(AuthMap::new(RandomGenerator::new(16)));
        let issuer = Arc::new(TokenMap::new());
        let signer = Arc::new(TokenSigner::ephemeral());

        let endpoint = Generic {
            registrar: registrar.clone(),
            authorizer: authorizer.clone(),
            issuer: issuer.clone(),
            signer: signer.clone(),
            credentials: ClientAuthenticator::new(registrar.clone(), PlaintextSecrets),
            generator: RandomGenerator::new(32),
            pkce: Default::default(),
        }
        .token_endpoint();

        Setup {
            registrar,
            authorizer,
            issuer,
            signer,
            endpoint,
        }
    }

    /// Store an authorization code, as the authorization endpoint would have.
    fn code(&self, client_id: &str, challenge: Option<CodeChallenge>) -> String {
        self.authorizer
            .authorize(AuthorizationCodeRecord {
                tenant_id: TENANT.into(),
                client_id: client_id.into(),
                owner_id: OWNER_ID.into(),
                redirect_uri: REDIRECT_URI.parse().unwrap(),
                scope: SCOPE.parse().unwrap(),
                until: Utc::now() + Duration::minutes(10),
                challenge,
            })
            .unwrap()
    }

    /// Store a refresh token family directly, returning the raw token.
    fn refresh_token(&self, client_id: &str, client_type: RefreshTokenClientType, refresh_count: u32) -> String {
        let token = RandomGenerator::new(32).generate().unwrap();
        let record = RefreshTokenRecord {
            tenant_id: TENANT.into(),
            client_id: client_id.into(),
            owner_id: OWNER_ID.into(),
            token_hash: hash_token(&token),
            refresh_count,
            client_type,
            scope: SCOPE.parse().unwrap(),
        };
        smol::block_on(self.issuer.store_refresh(record)).unwrap();
        token
    }

    fn execute(&self, mut request: Request) -> Response {
        smol::block_on(self.endpoint.execute(&mut request)).unwrap()
    }

    /// An endpoint over the clients of this setup with other storage and signing.
    fn endpoint_with<A, I, S>(
        &self, authorizer: A, issuer: I, signer: S,
    ) -> TokenEndpoint<
        Generic<Arc<ClientMap>, A, I, S, ClientAuthenticator<Arc<ClientMap>, PlaintextSecrets>, RandomGenerator>,
    >
    where
        A: Authorizer,
        I: Issuer,
        S: Signer,
    {
        Generic {
            registrar: self.registrar.clone(),
            authorizer,
            issuer,
            signer,
            credentials: ClientAuthenticator::new(self.registrar.clone(), PlaintextSecrets),
            generator: RandomGenerator::new(32),
            pkce: Default::default(),
        }
        .token_endpoint()
    }
}

/// Fails every mint, as if the signing backend were offline.
struct BrokenSigner;

#[async_trait]
impl Signer for BrokenSigner {
    async fn mint_access_token(&self, _: &MintRequest) -> Result<AccessToken, SignerError> {
        Err(SignerError::Unavailable("hsm offline".into()))
    }
}

/// Counts the tokens it mints.
struct CountingSigner {
    inner: TokenSigner,
    minted: AtomicUsize,
}

impl CountingSigner {
    fn new() -> Self {
        CountingSigner {
            inner: TokenSigner::ephemeral(),
            minted: AtomicUsize::new(0),
        }
    }

    fn minted(&self) -> usize {
        self.minted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Signer for CountingSigner {
    async fn mint_access_token(&self, request: &MintRequest) -> Result<AccessToken, SignerError> {
        self.minted.fetch_add(1, Ordering::SeqCst);
        self.inner.mint_access_token(request).await
    }
}

/// Reads codes from the wrapped map but can not delete them.
struct StuckAuthorizer(Arc<AuthMap>);

#[async_trait]
impl Authorizer for StuckAuthorizer {
    async fn recover_code(&self, code: &str) -> Result<Option<AuthorizationCodeRecord>, StoreError> {
        self.0.recover_code(code).await
    }

    async fn revoke_code(&self, _: &str) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("primary unreachable".into()))
    }
}

/// Refuses to store refresh tokens.
struct ReadOnlyIssuer;

#[async_trait]
impl Issuer for ReadOnlyIssuer {
    async fn recover_refresh(&self, _: &str) -> Result<Option<RefreshTokenRecord>, StoreError> {
        Ok(None)
    }

    async fn revoke_refresh(&self, _: &str) -> Result<bool, StoreError> {
        Ok(false)
    }

    async fn store_refresh(&self, _: RefreshTokenRecord) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("replica is read-only".into()))
    }
}

/// A form post with owned or static parameters.
fn post<V>(tenant: &str, params: Vec<(&'static str, V)>) -> Request
where
    V: Into<std::borrow::Cow<'static, str>>,
{
    Request::post(tenant, params)
}

fn s256_challenge() -> CodeChallenge {
    CodeChallenge {
        challenge: crate::code_grant::extensions::PkceVerifier::challenge(VERIFIER, ChallengeMethod::Sha256),
        method: ChallengeMethod::Sha256,
    }
}

fn basic_authorization(client_id: &str, secret: &str) -> String {
    use base64::Engine;
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", client_id, secret));
    format!("Basic {}", encoded)
}

/// Parse a successful response.
fn expect_token(response: &Response) -> TokenResponse {
    assert_eq!(response.status, 200, "Expected success, got {:?}", response.body);
    let body = response.body.as_deref().expect("Successful response without body");
    serde_json::from_str(body).expect("Body is not a token response")
}

/// Assert the uniform error shape with the given key.
fn expect_error(response: &Response, status: u16, key: &str) {
    let json: Value = response.json().expect("Error response without json body");
    assert_eq!(response.status, status, "Unexpected status for {:?}", response.body);
    assert_eq!(json["statusCode"], status);
    let details = json["errorDetails"].as_array().expect("errorDetails is not an array");
    assert_eq!(details.len(), 1);
    assert_eq!(details[0]["errorKey"], key);
    assert!(details[0]["errorMessageCanonical"].is_string());
    assert!(details[0]["errorMessageTranslated"].is_string());
}
