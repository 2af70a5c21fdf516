//! The normalized form of a token request.
use std::fmt;
use std::str::FromStr;

/// The supported values of `grant_type`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GrantType {
    /// `authorization_code`
    AuthorizationCode,
    /// `refresh_token`
    RefreshToken,
    /// `client_credentials`
    ClientCredentials,
}

impl GrantType {
    /// The parameter value naming this grant.
    pub fn as_str(self) -> &'static str {
        match self {
            GrantType::AuthorizationCode => "authorization_code",
            GrantType::RefreshToken => "refresh_token",
            GrantType::ClientCredentials => "client_credentials",
        }
    }
}

impl FromStr for GrantType {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, ()> {
        match value {
            "authorization_code" => Ok(GrantType::AuthorizationCode),
            "refresh_token" => Ok(GrantType::RefreshToken),
            "client_credentials" => Ok(GrantType::ClientCredentials),
            _ => Err(()),
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A token request after shape validation.
///
/// Optional parameters that were absent or empty are `None`. The `assertion` is the value of the
/// `Authorization` header with a leading `Bearer ` removed.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TokenRequest {
    /// The tenant named in the request path.
    pub tenant_id: String,
    /// The `client_id` parameter.
    pub client_id: String,
    /// The `grant_type` parameter.
    pub grant_type: Option<GrantType>,
    /// The `scope` parameter.
    pub scope: Option<String>,
    /// The `redirect_uri` parameter.
    pub redirect_uri: Option<String>,
    /// The `code_verifier` parameter.
    pub code_verifier: Option<String>,
    /// The `code` parameter.
    pub code: Option<String>,
    /// The `refresh_token` parameter.
    pub refresh_token: Option<String>,
    /// The `client_secret` parameter, or the password of a `Basic` authorization.
    pub client_secret: Option<String>,
    /// A client assertion from the `Authorization` header.
    pub assertion: Option<String>,
}

impl fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fn redact(value: &Option<String>) -> Option<&'static str> {
            value.as_ref().map(|_| "<redacted>")
        }

        f.debug_struct("TokenRequest")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("grant_type", &self.grant_type)
            .field("scope", &self.scope)
            .field("redirect_uri", &self.redirect_uri)
            .field("code_verifier", &redact(&self.code_verifier))
            .field("code", &redact(&self.code))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("client_secret", &redact(&self.client_secret))
            .field("assertion", &redact(&self.assertion))
            .finish()
    }
}

/// The proof of identity a confidential client presented.
#[derive(Clone, PartialEq, Eq)]
pub enum ClientProof {
    /// A shared secret.
    Secret(String),
    /// A signed client assertion.
    Assertion(String),
}

impl fmt::Debug for ClientProof {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ClientProof::Secret(_) => f.write_str("Secret(<redacted>)"),
            ClientProof::Assertion(_) => f.write_str("Assertion(<redacted>)"),
        }
    }
}

impl TokenRequest {
    /// The credential to check, the secret taking precedence over an assertion.
    pub fn client_proof(&self) -> Option<ClientProof> {
        match (non_empty(&self.client_secret), non_empty(&self.assertion)) {
            (Some(secret), _) => Some(ClientProof::Secret(secret.to_string())),
            (None, Some(assertion)) => Some(ClientProof::Assertion(assertion.to_string())),
            (None, None) => None,
        }
    }
}

/// An optional parameter, with the empty string counting as absent.
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}
