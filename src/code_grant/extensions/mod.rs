//! Extensions to the grant flows defined in additional RFCs.
mod pkce;

pub use self::pkce::PkceVerifier;
