//! Simple, owning request and response types.
use std::convert::Infallible;

use crate::frontends::dev::*;

/// Open and simple implementation of `WebRequest`.
#[derive(Clone, Debug)]
pub struct Request {
    /// The http method.
    pub method: String,

    /// The value of the `Content-Type` header.
    pub content_type: Option<String>,

    /// The tenant path segment.
    pub tenant: Option<String>,

    /// The key-value pairs of a `x-www-form-urlencoded` body.
    pub urlbody: NormalizedParameter,

    /// Provided authorization header.
    pub auth: Option<String>,
}

/// Open and simple implementation of `WebResponse`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,

    /// The json encoded body.
    pub body: Option<String>,
}

impl Request {
    /// A form POST to the token endpoint of `tenant`.
    pub fn post<I, K, V>(tenant: &str, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Cow<'static, str>>,
        V: Into<Cow<'static, str>>,
    {
        Request {
            method: "POST".to_owned(),
            content_type: Some("application/x-www-form-urlencoded".to_owned()),
            tenant: Some(tenant.to_owned()),
            urlbody: params.into_iter().collect(),
            auth: None,
        }
    }

    /// Add an `Authorization` header.
    pub fn with_auth(mut self, header: impl Into<String>) -> Self {
        self.auth = Some(header.into());
        self
    }
}

impl Response {
    /// Decode the body, if there is one.
    pub fn json(&self) -> Option<serde_json::Value> {
        self.body.as_deref().and_then(|body| serde_json::from_str(body).ok())
    }
}

impl WebRequest for Request {
    type Error = Infallible;
    type Response = Response;

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
        Ok(Cow::Borrowed(&self.urlbody as &dyn QueryParameter))
    }

    fn authheader(&mut self) -> Result<Option<Cow<str>>, Self::Error> {
        Ok(self.auth.as_deref().map(Cow::Borrowed))
    }

    fn response(&mut self) -> Result<Self::Response, Self::Error> {
        Ok(Response::default())
    }
}

impl WebResponse for Response {
    type Error = Infallible;

    fn status(&mut self, status: u16) -> Result<(), Self::Error> {
        self.status = status;
        Ok(())
    }

    fn body_json(&mut self, data: &str) -> Result<(), Self::Error> {
        self.body = Some(data.to_owned());
        Ok(())
    }
}
