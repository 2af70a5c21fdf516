//! Serving the token endpoint from an axum router.
//!
//! [`OAuthRequest`] is extracted from the raw request and [`OAuthResponse`] is returned from the
//! handler. The tenant is read from a path parameter named `tenant`, so the endpoint is routed
//! like this:
//!
//! ```ignore
//! async fn token(
//!     State(endpoint): State<Arc<TokenEndpoint<MyEndpoint>>>,
//!     mut request: OAuthRequest,
//! ) -> Result<OAuthResponse, WebError> {
//!     endpoint.execute(&mut request).await
//! }
//!
//! let app = Router::new()
//!     .route("/:tenant/token", any(token))
//!     .with_state(Arc::new(endpoint.token_endpoint()));
//! ```
//!
//! The route must accept any method, otherwise axum answers non-`POST` requests itself and the
//! uniform `METHOD_NOT_ALLOWED` body is never produced.
//!
//! [`OAuthRequest`]: struct.OAuthRequest.html
//! [`OAuthResponse`]: struct.OAuthResponse.html
use std::collections::HashMap;

use axum::async_trait;
use axum::extract::{Form, FromRequest, FromRequestParts, Path, Request};
use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::frontends::dev::*;

/// The error type for failures of the http layer itself.
///
/// Rejected token requests are not errors on this level, they are rendered as regular responses.
#[derive(Debug, Error)]
pub enum WebError {
    /// The request carried more than one Authorization header.
    #[error("more than one authorization header")]
    Authorization,

    /// A status code outside the valid range was set.
    #[error("status code {0} is out of range")]
    Status(u16),

    /// The body was not accepted as a form, for example because it exceeded the body limit.
    #[error("form body rejected: {0}")]
    Body(String),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

/// Type implementing `WebRequest` as well as `FromRequest` for use in route handlers.
///
/// This type consumes the body of the request upon extraction. A body the form extractor rejects
/// is kept as its rejection and reported when the endpoint reads the parameters.
#[derive(Clone, Debug)]
pub struct OAuthRequest {
    method: String,
    content_type: Option<String>,
    tenant: Option<String>,
    auth: Option<String>,
    body: Result<NormalizedParameter, String>,
}

impl OAuthRequest {
    /// Fetch the authorization header from the request.
    pub fn authorization_header(&self) -> Option<&str> {
        self.auth.as_deref()
    }

    /// The tenant path parameter.
    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant.as_deref()
    }

    /// Fetch the body of the request, if it was a form.
    pub fn body(&self) -> Option<&NormalizedParameter> {
        self.body.as_ref().ok()
    }
}

impl WebRequest for OAuthRequest {
    type Error = WebError;
    type Response = OAuthResponse;

    fn method(&self) -> &str {
        &self.method
    }

    fn content_type(&mut self) -> Result<Option<Cow<str>>, Self::Error> {
        Ok(self.content_type.as_deref().map(Cow::Borrowed))
    }

    fn tenant(&mut self) -> Result<Option<Cow<str>>, Self::Error> {
        Ok(self.tenant.as_deref().map(Cow::Borrowed))
    }

    fn urlbody(&mut self) -> Result<Cow<dyn QueryParameter + 'static>, Self::Error> {
        match &self.body {
            Ok(body) => Ok(Cow::Borrowed(body as &dyn QueryParameter)),
            Err(rejection) => Err(WebError::Body(rejection.clone())),
        }
    }

    fn authheader(&mut self) -> Result<Option<Cow<str>>, Self::Error> {
        Ok(self.auth.as_deref().map(Cow::Borrowed))
    }

    fn response(&mut self) -> Result<Self::Response, Self::Error> {
        Ok(OAuthResponse::default())
    }
}

#[async_trait]
impl<S> FromRequest<S> for OAuthRequest
where
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut all_auth = req.headers().get_all(header::AUTHORIZATION).iter();
        let optional = all_auth.next();

        let auth = if all_auth.next().is_some() {
            return Err(WebError::Authorization);
        } else {
            optional.and_then(|hv| hv.to_str().ok().map(str::to_owned))
        };

        let method = req.method().as_str().to_owned();
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|hv| hv.to_str().ok().map(str::to_owned));

        let (mut parts, body) = req.into_parts();
        let tenant = Path::<HashMap<String, String>>::from_request_parts(&mut parts, state)
            .await
            .ok()
            .and_then(|Path(mut params)| params.remove("tenant"));

        let req = Request::from_parts(parts, body);
        let body = Form::<NormalizedParameter>::from_request(req, state)
            .await
            .map(|Form(body)| body)
            .map_err(|rejection| rejection.body_text());

        Ok(OAuthRequest {
            method,
            content_type,
            tenant,
            auth,
            body,
        })
    }
}

/// Type implementing `WebResponse` and `IntoResponse` for use in route handlers.
#[derive(Clone, Debug, Default)]
pub struct OAuthResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<String>,
}

impl OAuthResponse {
    /// The status code set by the endpoint.
    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// The json body set by the endpoint.
    pub fn json_body(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

impl WebResponse for OAuthResponse {
    type Error = WebError;

    fn status(&mut self, status: u16) -> Result<(), Self::Error> {
        self.status = StatusCode::from_u16(status).map_err(|_| WebError::Status(status))?;
        Ok(())
    }

    fn body_json(&mut self, json: &str) -> Result<(), Self::Error> {
        self.body = Some(json.to_owned());
        self.headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.headers
            .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        Ok(())
    }
}

impl IntoResponse for OAuthResponse {
    fn into_response(self) -> Response {
        (self.status, self.headers, self.body.unwrap_or_default()).into_response()
    }
}
