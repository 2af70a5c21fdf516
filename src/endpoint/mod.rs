//! Polymorphic HTTP wrappers for the token endpoint.
//!
//! The grant flows in [`code_grant`] operate on an already validated [`TokenRequest`]. This
//! module bridges from a raw http request to that form: it checks the method, the content type
//! and the required parameters, decodes the `Authorization` header and finally dispatches on the
//! `grant_type`. Every outcome, successful or not, is rendered into a response with a JSON body.
//!
//! Web server integration happens through the two traits [`WebRequest`] and [`WebResponse`]. See
//! the `frontends` module for implementations.
//!
//! [`code_grant`]: ../code_grant/index.html
//! [`TokenRequest`]: ../code_grant/request/struct.TokenRequest.html
//! [`WebRequest`]: trait.WebRequest.html
//! [`WebResponse`]: trait.WebResponse.html
use std::borrow::Cow;
use std::str::from_utf8;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, error};

use crate::code_grant::accesstoken::BearerToken;
use crate::code_grant::authorization_code::authorization_code;
use crate::code_grant::client_credentials::client_credentials;
use crate::code_grant::error::{Error, ErrorKind, ErrorResponse, Result as GrantResult};
use crate::code_grant::refresh::refresh;
use crate::code_grant::request::{GrantType, TokenRequest};
use crate::code_grant::Endpoint;

mod query;

#[cfg(test)]
mod tests;

pub use self::query::{NormalizedParameter, QueryParameter};

/// Abstraction of web requests with several different abstractions and constructors needed by the
/// token endpoint.
///
/// It is assumed to originate from an HTTP request, as defined in the scope of the rfc, but
/// theoretically other requests are possible.
pub trait WebRequest {
    /// The error generated from access of malformed or invalid requests.
    type Error;

    /// The corresponding type of Responses returned from this module.
    type Response: WebResponse<Error = Self::Error>;

    /// The http method, such as `POST`.
    fn method(&self) -> &str;

    /// The value of the `Content-Type` header, if any.
    fn content_type(&mut self) -> Result<Option<Cow<str>>, Self::Error>;

    /// The tenant named in the request path, if the route carries one.
    fn tenant(&mut self) -> Result<Option<Cow<str>>, Self::Error>;

    /// Retrieve the parsed `application/x-www-form-urlencoded` body of the request.
    ///
    /// An Err value indicates a malformed body, it is answered with `INVALID_CONTENT_TYPE`.
    fn urlbody(&mut self) -> Result<Cow<dyn QueryParameter + 'static>, Self::Error>;

    /// Contents of the authorization header or none if none exists. An Err value indicates a
    /// malformed header or request.
    fn authheader(&mut self) -> Result<Option<Cow<str>>, Self::Error>;

    /// A fresh response to fill in.
    fn response(&mut self) -> Result<Self::Response, Self::Error>;
}

/// Response representation into which the outcome of a token request is rendered.
///
/// Exactly one call to each method is made per request.
pub trait WebResponse {
    /// The error generated when trying to construct an unhandled or invalid response.
    type Error;

    /// Set the http status code.
    fn status(&mut self, status: u16) -> Result<(), Self::Error>;

    /// Json response data, with media type `application/json`.
    fn body_json(&mut self, data: &str) -> Result<(), Self::Error>;
}

/// Translates error messages into the language of the caller.
///
/// The default implementation answers with the canonical english message.
pub trait Messages: Send + Sync {
    /// The message shown as `errorMessageTranslated`.
    fn translate(&self, kind: ErrorKind) -> Cow<'static, str> {
        Cow::Borrowed(kind.canonical_message())
    }
}

/// Messages in english only.
#[derive(Clone, Copy, Debug, Default)]
pub struct Canonical;

impl Messages for Canonical {}

const SERVER_ERROR_BODY: &str = r#"{"statusCode":500,"errorDetails":[{"errorKey":"SERVER_ERROR","errorMessageCanonical":"The request could not be processed, try again later.","errorMessageTranslated":"The request could not be processed, try again later."}]}"#;

/// The token endpoint, dispatching requests to the grant flows.
pub struct TokenEndpoint<E> {
    endpoint: E,
    messages: Box<dyn Messages>,
}

impl<E: Endpoint> TokenEndpoint<E> {
    /// Serve tokens from the primitives of `endpoint`, with canonical error messages.
    pub fn new(endpoint: E) -> Self {
        TokenEndpoint {
            endpoint,
            messages: Box::new(Canonical),
        }
    }

    /// Use another translation of error messages.
    pub fn with_messages<M: Messages + 'static>(mut self, messages: M) -> Self {
        self.messages = Box::new(messages);
        self
    }

    /// The wrapped primitives.
    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    /// Answer one token request.
    ///
    /// Rejections and failing primitives are both rendered into the response, an `Err` is only
    /// returned when the request or response type itself fails.
    pub async fn execute<R: WebRequest>(&self, request: &mut R) -> Result<R::Response, R::Error> {
        let normalized = normalize(request)?;
        let outcome = match normalized {
            Ok(token_request) => self.dispatch(&token_request).await,
            Err(kind) => {
                debug!(error = kind.key(), "malformed token request");
                Err(kind.into())
            }
        };

        let mut response = request.response()?;
        match outcome {
            Ok(token) => match token.to_json() {
                Ok(json) => {
                    response.status(200)?;
                    response.body_json(&json)?;
                }
                Err(err) => {
                    error!(error = %err, "could not encode token response");
                    response.status(ErrorKind::ServerError.status())?;
                    response.body_json(SERVER_ERROR_BODY)?;
                }
            },
            Err(err) => {
                let rejection = self.error_response(&err);
                response.status(rejection.status_code)?;
                match rejection.to_json() {
                    Ok(json) => response.body_json(&json)?,
                    Err(err) => {
                        error!(error = %err, "could not encode error response");
                        response.body_json(SERVER_ERROR_BODY)?;
                    }
                }
            }
        }

        Ok(response)
    }

    /// Run the grant flow named by the request.
    pub async fn dispatch(&self, request: &TokenRequest) -> GrantResult<BearerToken> {
        match request.grant_type {
            Some(GrantType::AuthorizationCode) => authorization_code(&self.endpoint, request).await,
            Some(GrantType::RefreshToken) => refresh(&self.endpoint, request).await,
            Some(GrantType::ClientCredentials) => client_credentials(&self.endpoint, request).await,
            None => Err(ErrorKind::MissingOrInvalidGrantType.into()),
        }
    }

    /// The body describing a failed request.
    pub fn error_response(&self, error: &Error) -> ErrorResponse {
        let kind = error.kind();
        ErrorResponse::new(kind, self.messages.translate(kind))
    }
}

/// Validate the shape of the request and extract its parameters.
///
/// Everything borrowed from the request is released before any flow runs.
fn normalize<R: WebRequest>(request: &mut R) -> Result<Result<TokenRequest, ErrorKind>, R::Error> {
    if request.method() != "POST" {
        return Ok(Err(ErrorKind::MethodNotAllowed));
    }

    let is_form = request.content_type()?.map_or(false, |value| is_form_content_type(&value));
    if !is_form {
        return Ok(Err(ErrorKind::InvalidContentType));
    }

    let tenant_id = match request.tenant()? {
        Some(tenant) if !tenant.is_empty() => tenant.into_owned(),
        _ => return Ok(Err(ErrorKind::InvalidTenant)),
    };

    let authorization = request.authheader()?.map(Cow::into_owned);

    let body = match request.urlbody() {
        Ok(body) => body,
        Err(_) => return Ok(Err(ErrorKind::InvalidContentType)),
    };

    Ok(token_request(tenant_id, &*body, authorization.as_deref()))
}

fn is_form_content_type(value: &str) -> bool {
    let essence = value.split(';').next().unwrap_or("").trim();
    essence.eq_ignore_ascii_case("application/x-www-form-urlencoded")
}

fn token_request(
    tenant_id: String, body: &dyn QueryParameter, authorization: Option<&str>,
) -> Result<TokenRequest, ErrorKind> {
    let param = |key: &str| {
        body.unique_value(key)
            .filter(|value| !value.is_empty())
            .map(Cow::into_owned)
    };

    let client_id = param("client_id").ok_or(ErrorKind::MissingClientId)?;
    let grant_type = param("grant_type")
        .and_then(|grant| grant.parse::<GrantType>().ok())
        .ok_or(ErrorKind::MissingOrInvalidGrantType)?;

    let mut client_secret = param("client_secret");
    let mut assertion = None;

    match authorization.map(str::trim).filter(|header| !header.is_empty()) {
        Some(header) if header.starts_with("Basic ") => {
            let (basic_id, basic_secret) =
                decode_basic(&header[6..]).ok_or(ErrorKind::InvalidClientCredentials)?;
            if basic_id != client_id {
                debug!("client id of basic authorization differs from request");
                return Err(ErrorKind::InvalidClientCredentials);
            }
            if client_secret.is_none() && !basic_secret.is_empty() {
                client_secret = Some(basic_secret);
            }
        }
        Some(header) => {
            let value = header.strip_prefix("Bearer ").unwrap_or(header).trim();
            if !value.is_empty() {
                assertion = Some(value.to_string());
            }
        }
        None => (),
    }

    Ok(TokenRequest {
        tenant_id,
        client_id,
        grant_type: Some(grant_type),
        scope: param("scope"),
        redirect_uri: param("redirect_uri"),
        code_verifier: param("code_verifier"),
        code: param("code"),
        refresh_token: param("refresh_token"),
        client_secret,
        assertion,
    })
}

/// Decode the credentials of a `Basic` authorization.
fn decode_basic(encoded: &str) -> Option<(String, String)> {
    let combined = STANDARD.decode(encoded.trim()).ok()?;
    let combined = from_utf8(&combined).ok()?;
    let (client, passwd) = combined.split_once(':')?;
    Some((client.to_string(), passwd.to_string()))
}
