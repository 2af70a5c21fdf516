//! The persisted records a token request redeems.
use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use url::Url;

use super::scope::Scope;
use super::Time;

/// The transformation applied to a PKCE code verifier to obtain its challenge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChallengeMethod {
    /// The challenge is the verifier itself.
    #[serde(rename = "plain")]
    Plain,

    /// The challenge is `BASE64URL-NOPAD(SHA256(verifier))`.
    #[serde(rename = "S256")]
    Sha256,
}

/// The name of a challenge method is neither `plain` nor `S256`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownMethod(pub String);

impl FromStr for ChallengeMethod {
    type Err = UnknownMethod;

    fn from_str(method: &str) -> Result<Self, UnknownMethod> {
        match method {
            "plain" => Ok(ChallengeMethod::Plain),
            "S256" => Ok(ChallengeMethod::Sha256),
            other => Err(UnknownMethod(other.to_string())),
        }
    }
}

impl fmt::Display for ChallengeMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            ChallengeMethod::Plain => "plain",
            ChallengeMethod::Sha256 => "S256",
        })
    }
}

/// A PKCE challenge that was attached to an authorization code when it was created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeChallenge {
    /// The encoded challenge as sent by the client in the authorization request.
    pub challenge: String,

    /// How the verifier must be transformed to be compared against `challenge`.
    pub method: ChallengeMethod,
}

/// Owning copy of an authorization code grant.
///
/// This is what the consent step stored under the code it handed to the client. It can be stored
/// in a database without worrying about lifetimes or shared across thread boundaries. The record
/// is strictly single-use: redeeming it removes it from storage before any other check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationCodeRecord {
    /// The tenant under which the code was issued.
    pub tenant_id: String,

    /// Identifies the client to which the code was issued.
    pub client_id: String,

    /// Identifies the resource owner (end user) that consented.
    pub owner_id: String,

    /// The redirection uri used in the authorization request.
    pub redirect_uri: Url,

    /// The scope granted to the client.
    pub scope: Scope,

    /// Expiration date of the code (Utc).
    pub until: Time,

    /// Present when the client used PKCE in its authorization request.
    pub challenge: Option<CodeChallenge>,
}

impl AuthorizationCodeRecord {
    /// Whether the code can no longer be redeemed.
    pub fn is_expired(&self) -> bool {
        self.until <= Utc::now()
    }
}

/// How the client proved its identity when the refresh token family was created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefreshTokenClientType {
    /// The code was redeemed with a PKCE verifier, the client holds no credentials.
    Pkce,

    /// The client authenticated with a secret or an assertion.
    Confidential,
}

/// A refresh token as persisted by the [`Issuer`].
///
/// Only the hash of the token is kept, the raw value is handed to the client once and forgotten.
/// Records are never updated in place. A successful refresh deletes the record and stores its
/// successor with an incremented `refresh_count`.
///
/// [`Issuer`]: ../issuer/trait.Issuer.html
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    /// The tenant under which the token family was issued.
    pub tenant_id: String,

    /// The client holding the token.
    pub client_id: String,

    /// The resource owner on whose behalf the client acts.
    pub owner_id: String,

    /// Hash of the live refresh token, see [`hash_token`].
    ///
    /// [`hash_token`]: ../generator/fn.hash_token.html
    pub token_hash: String,

    /// How many times this token family has been refreshed so far.
    pub refresh_count: u32,

    /// Whether later refreshes must authenticate the client.
    pub client_type: RefreshTokenClientType,

    /// The scope originally granted.
    pub scope: Scope,
}

impl RefreshTokenRecord {
    /// The successor of this record after a rotation to a token with hash `token_hash`.
    pub fn rotated(&self, token_hash: String) -> Self {
        RefreshTokenRecord {
            token_hash,
            refresh_count: self.refresh_count.saturating_add(1),
            ..self.clone()
        }
    }
}
