//! The successful outcome of a token request.
use serde::{Deserialize, Serialize};

use crate::primitives::scope::Scope;
use crate::primitives::signer::AccessToken;

/// Token Response
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct TokenResponse {
    /// The access token issued by the authorization server.
    pub access_token: String,

    /// The refresh token, which can be used to obtain new access tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// The type of the token issued.
    pub token_type: String,

    /// The lifetime in seconds of the access token.
    pub expires_in: i64,

    /// The scope, which limits the permissions on the access token.
    pub scope: String,
}

/// Represents an access token, an optional refresh token and the associated scope.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken {
    access: AccessToken,
    refresh: Option<String>,
    scope: Scope,
}

impl BearerToken {
    pub(crate) fn new(access: AccessToken, refresh: Option<String>, scope: Scope) -> Self {
        BearerToken { access, refresh, scope }
    }

    /// The encoded access token.
    pub fn access_token(&self) -> &str {
        &self.access.token
    }

    /// The raw refresh token, if one was issued.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh.as_deref()
    }

    /// The scope of the access token.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// The access token as minted by the signer.
    pub fn access(&self) -> &AccessToken {
        &self.access
    }

    /// The response body fields.
    pub fn to_response(&self) -> TokenResponse {
        TokenResponse {
            access_token: self.access.token.clone(),
            refresh_token: self.refresh.clone(),
            token_type: "bearer".to_owned(),
            expires_in: self.access.expires_in(),
            scope: self.scope.to_string(),
        }
    }

    /// Convert the token into a json string, viable for being sent over a network with
    /// `application/json` encoding.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_response())
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("BearerToken")
            .field("until", &self.access.until)
            .field("refresh", &self.refresh.is_some())
            .field("scope", &self.scope)
            .finish()
    }
}
