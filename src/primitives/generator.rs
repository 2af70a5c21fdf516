//! Generators produce the opaque refresh tokens and authorization codes.
//!
//! Tokens of this kind carry no information. Their security depends entirely on the entropy of
//! the generated value, guessing one must be infeasible. Storage only ever sees the hash computed
//! by [`hash_token`], so a leaked refresh-token table cannot be replayed.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// The operating system failed to provide randomness.
#[derive(Clone, Debug, Error)]
#[error("failed to generate random token: {0}")]
pub struct GeneratorError(String);

/// Produces fresh opaque token values.
///
/// ## Requirements on implementations
///
/// Each call MUST produce a value indistinguishable from a random one. One should not be able to
/// derive another token from ones own.
pub trait TokenGenerator: Send + Sync {
    /// Generate a new token.
    fn generate(&self) -> Result<String, GeneratorError>;
}

/// Generates tokens from random bytes.
///
/// Each byte is drawn from `OsRng` and the result is encoded in url-safe base64 without padding,
/// so tokens can be used in forms and urls without further escaping.
#[derive(Clone, Copy, Debug)]
pub struct RandomGenerator {
    len: usize,
}

impl RandomGenerator {
    /// The fewest random bytes in a token, 128 bits.
    pub const MIN_LENGTH: usize = 16;

    /// Generates tokens with a specific byte length.
    ///
    /// Lengths below [`MIN_LENGTH`](Self::MIN_LENGTH) are raised to it.
    pub fn new(length: usize) -> RandomGenerator {
        RandomGenerator {
            len: length.max(Self::MIN_LENGTH),
        }
    }
}

impl TokenGenerator for RandomGenerator {
    fn generate(&self) -> Result<String, GeneratorError> {
        let mut result = vec![0; self.len];
        OsRng
            .try_fill_bytes(result.as_mut_slice())
            .map_err(|err| GeneratorError(err.to_string()))?;
        Ok(URL_SAFE_NO_PAD.encode(&result))
    }
}

impl<T: TokenGenerator + ?Sized> TokenGenerator for Box<T> {
    fn generate(&self) -> Result<String, GeneratorError> {
        (**self).generate()
    }
}

impl<T: TokenGenerator + ?Sized> TokenGenerator for Arc<T> {
    fn generate(&self) -> Result<String, GeneratorError> {
        (**self).generate()
    }
}

impl<'a, T: TokenGenerator + ?Sized> TokenGenerator for &'a T {
    fn generate(&self) -> Result<String, GeneratorError> {
        (**self).generate()
    }
}

/// The storage key of a refresh token: `BASE64URL-NOPAD(SHA256(token))`.
pub fn hash_token(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}
