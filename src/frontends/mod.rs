//! Adapters from http server crates to the token endpoint.
//!
//! Front-ends are glue between the request and response types of a web framework and the
//! [`WebRequest`] and [`WebResponse`] traits consumed by [`TokenEndpoint`]. The following are
//! available:
//!
//! * `simple`: Owning request and response types and the ad-hoc [`Generic`] endpoint. Useful for
//!   tests and for transports other than http.
//! * `axum`: Extractors and responses for axum 0.7, behind the `axum-frontend` feature.
//!
//! ## Guide to implementing a custom front-end
//!
//! A request must expose its method, the `Content-Type` and `Authorization` headers, the tenant
//! named in its path and its form body. Parameters that are sent more than once must never be
//! readable, which is guaranteed when the body is collected into a [`NormalizedParameter`]. The
//! response only needs a status code and a json body.
//!
//! [`WebRequest`]: ../endpoint/trait.WebRequest.html
//! [`WebResponse`]: ../endpoint/trait.WebResponse.html
//! [`TokenEndpoint`]: ../endpoint/struct.TokenEndpoint.html
//! [`Generic`]: simple/endpoint/struct.Generic.html
//! [`NormalizedParameter`]: ../endpoint/struct.NormalizedParameter.html

pub mod simple;

#[cfg(feature = "axum-frontend")]
pub mod axum;

/// Simply a prelude useful for writing front-ends.
pub mod dev {
    pub use std::borrow::Cow;
    pub use crate::endpoint::{NormalizedParameter, QueryParameter, WebRequest, WebResponse};
}
