//! The error taxonomy of the token endpoint.
//!
//! Every rejection carries an [`ErrorKind`] with a stable key, an HTTP status and a canonical
//! english message. Rejections are reported in a uniform shape:
//!
//! ```json
//! {
//!   "statusCode": 401,
//!   "errorDetails": [{
//!     "errorKey": "INVALID_AUTHORIZATION_CODE",
//!     "errorMessageCanonical": "The authorization code is invalid.",
//!     "errorMessageTranslated": "The authorization code is invalid."
//!   }]
//! }
//! ```
use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::primitives::credentials::SecretError;
use crate::primitives::generator::GeneratorError;
use crate::primitives::signer::SignerError;
use crate::primitives::StoreError;

/// All the ways a token request can be rejected.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// The request was not a `POST`.
    MethodNotAllowed,
    /// The body is not `application/x-www-form-urlencoded`.
    InvalidContentType,
    /// `client_id` is absent or empty.
    MissingClientId,
    /// `grant_type` is absent or unsupported.
    MissingOrInvalidGrantType,
    /// The tenant is unknown or disabled.
    InvalidTenant,
    /// The authorization code is unknown or was already redeemed.
    InvalidAuthorizationCode,
    /// The authorization code has expired.
    ExpiredAuthorizationCode,
    /// The authorization code was issued under another tenant.
    AuthorizationCodeTenantMismatch,
    /// The authorization code was issued to another client.
    AuthorizationCodeClientMismatch,
    /// The redirect uri differs from the one in the authorization request.
    RedirectUriMismatch,
    /// The scope differs from the one granted with the authorization code.
    ScopeMismatch,
    /// The code is protected by PKCE but no verifier was sent.
    MissingCodeVerifier,
    /// The PKCE verifier does not match the challenge.
    InvalidCodeVerifier,
    /// Neither a client secret nor a client assertion was sent.
    MissingClientCredentials,
    /// The client secret or assertion was rejected.
    InvalidClientCredentials,
    /// `refresh_token` is absent or empty.
    MissingRefreshToken,
    /// The refresh token is unknown, rotated, revoked or belongs to another client.
    InvalidRefreshToken,
    /// The client of a grant no longer exists.
    MissingClient,
    /// The client is unknown, disabled or registered in another tenant.
    InvalidClient,
    /// The client and the grant belong to different tenants.
    InvalidTenantAndClient,
    /// A service account client tried to use a refresh token.
    InvalidClientTypeForRefreshTokenGrant,
    /// A delegated-only client tried to use the client credentials grant.
    InvalidClientTypeForClientCredentialsGrant,
    /// The refresh token family was rotated too often and has been revoked.
    MaximumRefreshCountReached,
    /// The requested scope exceeds what may be granted.
    InvalidScope,
    /// A backend failed, the request may be retried later.
    ServerError,
}

/// The coarse classes of [`ErrorKind`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorClass {
    /// The request itself is malformed. Never worth retrying unchanged.
    Request,
    /// The client failed to authenticate. Retrying makes sense after fixing the credentials.
    Credential,
    /// The presented artifact or the client is not in a usable state.
    State,
    /// The request was treated as abuse and the presented artifact has been destroyed.
    Abuse,
    /// A backend failed.
    Server,
}

/// Error codes of [RFC 6749, section 5.2].
///
/// [RFC 6749, section 5.2]: https://tools.ietf.org/html/rfc6749#section-5.2
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AccessTokenErrorType {
    /// The request is missing a required parameter, includes an unsupported parameter value
    /// (other than grant type), repeats a parameter, or is otherwise malformed.
    InvalidRequest,

    /// Client authentication failed.
    InvalidClient,

    /// The provided authorization grant or refresh token is invalid, expired, revoked, does not
    /// match the redirection URI used in the authorization request, or was issued to another
    /// client.
    InvalidGrant,

    /// The authenticated client is not authorized to use this authorization grant type.
    UnauthorizedClient,

    /// The authorization grant type is not supported by the authorization server.
    UnsupportedGrantType,

    /// The requested scope is invalid, unknown, malformed, or exceeds the scope granted by the
    /// resource owner.
    InvalidScope,

    /// Not part of the RFC, the server failed to process the request.
    ServerError,
}

impl AccessTokenErrorType {
    /// The code as it appears in the `error` field.
    pub fn description(self) -> &'static str {
        match self {
            AccessTokenErrorType::InvalidRequest => "invalid_request",
            AccessTokenErrorType::InvalidClient => "invalid_client",
            AccessTokenErrorType::InvalidGrant => "invalid_grant",
            AccessTokenErrorType::UnauthorizedClient => "unauthorized_client",
            AccessTokenErrorType::UnsupportedGrantType => "unsupported_grant_type",
            AccessTokenErrorType::InvalidScope => "invalid_scope",
            AccessTokenErrorType::ServerError => "server_error",
        }
    }
}

impl ErrorKind {
    /// The stable key clients may match on.
    pub fn key(self) -> &'static str {
        use self::ErrorKind::*;
        match self {
            MethodNotAllowed => "METHOD_NOT_ALLOWED",
            InvalidContentType => "INVALID_CONTENT_TYPE",
            MissingClientId => "MISSING_CLIENT_ID",
            MissingOrInvalidGrantType => "MISSING_OR_INVALID_GRANT_TYPE",
            InvalidTenant => "INVALID_TENANT",
            InvalidAuthorizationCode => "INVALID_AUTHORIZATION_CODE",
            ExpiredAuthorizationCode => "EXPIRED_AUTHORIZATION_CODE",
            AuthorizationCodeTenantMismatch => "AUTHORIZATION_CODE_TENANT_MISMATCH",
            AuthorizationCodeClientMismatch => "AUTHORIZATION_CODE_CLIENT_MISMATCH",
            RedirectUriMismatch => "REDIRECT_URI_MISMATCH",
            ScopeMismatch => "SCOPE_MISMATCH",
            MissingCodeVerifier => "MISSING_CODE_VERIFIER",
            InvalidCodeVerifier => "INVALID_CODE_VERIFIER",
            MissingClientCredentials => "MISSING_CLIENT_CREDENTIALS",
            InvalidClientCredentials => "INVALID_CLIENT_CREDENTIALS",
            MissingRefreshToken => "MISSING_REFRESH_TOKEN",
            InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            MissingClient => "MISSING_CLIENT",
            InvalidClient => "INVALID_CLIENT",
            InvalidTenantAndClient => "INVALID_TENANT_AND_CLIENT",
            InvalidClientTypeForRefreshTokenGrant => "INVALID_CLIENT_TYPE_FOR_REFRESH_TOKEN_GRANT",
            InvalidClientTypeForClientCredentialsGrant => "INVALID_CLIENT_TYPE_FOR_CLIENT_CREDENTIALS_GRANT",
            MaximumRefreshCountReached => "MAXIMUM_REFRESH_COUNT_REACHED",
            InvalidScope => "INVALID_SCOPE",
            ServerError => "SERVER_ERROR",
        }
    }

    /// The HTTP status of responses carrying this error.
    pub fn status(self) -> u16 {
        match self {
            ErrorKind::MethodNotAllowed => 405,
            ErrorKind::ServerError => 500,
            _ => 401,
        }
    }

    /// The english message.
    pub fn canonical_message(self) -> &'static str {
        use self::ErrorKind::*;
        match self {
            MethodNotAllowed => "The token endpoint only accepts POST requests.",
            InvalidContentType => "The request body must be application/x-www-form-urlencoded.",
            MissingClientId => "The client_id parameter is required.",
            MissingOrInvalidGrantType => "The grant_type parameter is missing or not supported.",
            InvalidTenant => "The tenant is invalid.",
            InvalidAuthorizationCode => "The authorization code is invalid.",
            ExpiredAuthorizationCode => "The authorization code has expired.",
            AuthorizationCodeTenantMismatch => "The authorization code was not issued for this tenant.",
            AuthorizationCodeClientMismatch => "The authorization code was not issued to this client.",
            RedirectUriMismatch => "The redirect_uri does not match the authorization request.",
            ScopeMismatch => "The scope does not match the authorization request.",
            MissingCodeVerifier => "The code_verifier parameter is required.",
            InvalidCodeVerifier => "The code_verifier is invalid.",
            MissingClientCredentials => "Client credentials are required.",
            InvalidClientCredentials => "The client credentials are invalid.",
            MissingRefreshToken => "The refresh_token parameter is required.",
            InvalidRefreshToken => "The refresh token is invalid.",
            MissingClient => "The client does not exist.",
            InvalidClient => "The client is invalid.",
            InvalidTenantAndClient => "The client does not belong to the tenant.",
            InvalidClientTypeForRefreshTokenGrant => {
                "The client type does not permit the refresh_token grant."
            }
            InvalidClientTypeForClientCredentialsGrant => {
                "The client type does not permit the client_credentials grant."
            }
            MaximumRefreshCountReached => {
                "The refresh token has been used too often and was revoked. Authenticate again."
            }
            InvalidScope => "The requested scope is invalid.",
            ServerError => "The request could not be processed, try again later.",
        }
    }

    /// The class of this error.
    pub fn class(self) -> ErrorClass {
        use self::ErrorKind::*;
        match self {
            MethodNotAllowed | InvalidContentType | MissingClientId | MissingOrInvalidGrantType
            | MissingRefreshToken | InvalidScope => ErrorClass::Request,
            MissingCodeVerifier | InvalidCodeVerifier | MissingClientCredentials
            | InvalidClientCredentials => ErrorClass::Credential,
            InvalidTenant | InvalidAuthorizationCode | ExpiredAuthorizationCode
            | AuthorizationCodeTenantMismatch | AuthorizationCodeClientMismatch
            | RedirectUriMismatch | ScopeMismatch | InvalidRefreshToken | MissingClient
            | InvalidClient | InvalidTenantAndClient | InvalidClientTypeForRefreshTokenGrant
            | InvalidClientTypeForClientCredentialsGrant => ErrorClass::State,
            MaximumRefreshCountReached => ErrorClass::Abuse,
            ServerError => ErrorClass::Server,
        }
    }

    /// The closest error code of RFC 6749.
    pub fn oauth_error(self) -> AccessTokenErrorType {
        use self::ErrorKind::*;
        match self {
            MethodNotAllowed | InvalidContentType | MissingClientId | MissingRefreshToken
            | MissingCodeVerifier => AccessTokenErrorType::InvalidRequest,
            MissingOrInvalidGrantType => AccessTokenErrorType::UnsupportedGrantType,
            InvalidTenant | MissingClientCredentials | InvalidClientCredentials | MissingClient
            | InvalidClient | InvalidTenantAndClient => AccessTokenErrorType::InvalidClient,
            InvalidAuthorizationCode | ExpiredAuthorizationCode | AuthorizationCodeTenantMismatch
            | AuthorizationCodeClientMismatch | RedirectUriMismatch | ScopeMismatch
            | InvalidCodeVerifier | InvalidRefreshToken | MaximumRefreshCountReached => {
                AccessTokenErrorType::InvalidGrant
            }
            InvalidClientTypeForRefreshTokenGrant | InvalidClientTypeForClientCredentialsGrant => {
                AccessTokenErrorType::UnauthorizedClient
            }
            InvalidScope => AccessTokenErrorType::InvalidScope,
            ServerError => AccessTokenErrorType::ServerError,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A primitive failed while handling a request.
///
/// The request was not necessarily invalid, the backend was unable to decide.
#[derive(Clone, Debug, Error)]
pub enum PrimitiveError {
    /// A storage backend failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The signer failed to mint a token.
    #[error(transparent)]
    Signer(#[from] SignerError),

    /// Validating client credentials failed for reasons other than invalid credentials.
    #[error(transparent)]
    Credentials(#[from] SecretError),

    /// No fresh token value could be generated.
    #[error(transparent)]
    Generator(#[from] GeneratorError),

    /// A state machine was driven with input it did not ask for.
    #[error("grant state machine received unexpected input")]
    Protocol,
}

/// The outcome of a failed token request.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// The request was rejected.
    #[error("token request rejected: {0}")]
    Rejected(ErrorKind),

    /// A primitive failed.
    #[error("token request failed: {0}")]
    Primitive(#[from] PrimitiveError),
}

impl Error {
    /// The kind reported to the client.
    ///
    /// Primitive failures are all reported as `SERVER_ERROR`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Rejected(kind) => *kind,
            Error::Primitive(_) => ErrorKind::ServerError,
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::Rejected(kind)
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Error::Primitive(err.into())
    }
}

impl From<SignerError> for Error {
    fn from(err: SignerError) -> Self {
        Error::Primitive(err.into())
    }
}

impl From<SecretError> for Error {
    fn from(err: SecretError) -> Self {
        Error::Primitive(err.into())
    }
}

impl From<GeneratorError> for Error {
    fn from(err: GeneratorError) -> Self {
        Error::Primitive(err.into())
    }
}

/// Alias for results of the grant flows.
pub type Result<T> = std::result::Result<T, Error>;

/// One entry of `errorDetails`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    /// Stable key, see [`ErrorKind::key`].
    pub error_key: String,

    /// The english message.
    pub error_message_canonical: String,

    /// The message in the language of the caller.
    pub error_message_translated: String,
}

/// The body of every rejected token request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Mirrors the HTTP status.
    pub status_code: u16,

    /// Always exactly one entry.
    pub error_details: Vec<ErrorDetail>,
}

impl ErrorResponse {
    /// Describe a rejection with a translated message.
    pub fn new(kind: ErrorKind, translated: Cow<'_, str>) -> Self {
        ErrorResponse {
            status_code: kind.status(),
            error_details: vec![ErrorDetail {
                error_key: kind.key().to_string(),
                error_message_canonical: kind.canonical_message().to_string(),
                error_message_translated: translated.into_owned(),
            }],
        }
    }

    /// Describe a rejection with the canonical message as translation.
    pub fn canonical(kind: ErrorKind) -> Self {
        ErrorResponse::new(kind, Cow::Borrowed(kind.canonical_message()))
    }

    /// The JSON body.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
