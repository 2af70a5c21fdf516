//! An owned request type and an [`Endpoint`] assembled from public fields.
//!
//! Neither needs a web framework. Tests use them, and so can token endpoints served over other
//! transports.
//!
//! [`Endpoint`]: ../../code_grant/trait.Endpoint.html

pub mod endpoint;
pub mod request;
