//! Tunables of the token endpoint.
//!
//! Every setting has a default, so an empty environment yields a working configuration.
//!
//! | Variable                               | Default |
//! |----------------------------------------|---------|
//! | `OXIDE_AUTH_ACCESS_TOKEN_LIFETIME_SECS` | `3600`  |
//! | `OXIDE_AUTH_REFRESH_TOKEN_BYTES`        | `32`    |
//! | `OXIDE_AUTH_ALLOW_PLAIN_PKCE`           | `false` |
//! | `OXIDE_AUTH_ASSERTION_LEEWAY_SECS`      | `60`    |
//! | `OXIDE_AUTH_ASSERTION_AUDIENCE`         | unset   |
use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::code_grant::extensions::PkceVerifier;
use crate::primitives::generator::RandomGenerator;

/// A configuration value could not be parsed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The variable is set but not valid for its type.
    #[error("invalid value {value:?} for {key}")]
    InvalidValue {
        /// Name of the variable.
        key: &'static str,
        /// The rejected value.
        value: String,
    },

    /// The value parsed but is outside the accepted range.
    #[error("{key} is out of range: {reason}")]
    OutOfRange {
        /// Name of the variable.
        key: &'static str,
        /// What was expected.
        reason: &'static str,
    },
}

/// Settings shared by the primitives of an endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Lifetime of minted access tokens.
    pub access_token_lifetime_secs: i64,

    /// Entropy of generated refresh tokens, in bytes.
    pub refresh_token_bytes: usize,

    /// Accept the `plain` PKCE method in addition to `S256`.
    pub allow_plain_pkce: bool,

    /// Tolerated clock skew when checking the expiry of client assertions.
    pub assertion_leeway_secs: u64,

    /// Required audience of client assertions.
    pub assertion_audience: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            access_token_lifetime_secs: 3600,
            refresh_token_bytes: 32,
            allow_plain_pkce: false,
            assertion_leeway_secs: 60,
            assertion_audience: None,
        }
    }
}

/// Upper bound of the access token lifetime, ten years.
pub const MAX_ACCESS_TOKEN_LIFETIME_SECS: i64 = 10 * 365 * 24 * 60 * 60;

const ACCESS_TOKEN_LIFETIME: &str = "OXIDE_AUTH_ACCESS_TOKEN_LIFETIME_SECS";
const REFRESH_TOKEN_BYTES: &str = "OXIDE_AUTH_REFRESH_TOKEN_BYTES";
const ALLOW_PLAIN_PKCE: &str = "OXIDE_AUTH_ALLOW_PLAIN_PKCE";
const ASSERTION_LEEWAY: &str = "OXIDE_AUTH_ASSERTION_LEEWAY_SECS";
const ASSERTION_AUDIENCE: &str = "OXIDE_AUTH_ASSERTION_AUDIENCE";

fn parse_or<T: FromStr>(
    lookup: &dyn Fn(&str) -> Option<String>, key: &'static str, default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
    }
}

impl Config {
    /// Load the configuration from `OXIDE_AUTH_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unparsable or out-of-range value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::from_lookup(|key| env::var(key).ok())
    }

    /// Load the configuration from an arbitrary key-value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let config = Config {
            access_token_lifetime_secs: parse_or(
                &lookup,
                ACCESS_TOKEN_LIFETIME,
                defaults.access_token_lifetime_secs,
            )?,
            refresh_token_bytes: parse_or(&lookup, REFRESH_TOKEN_BYTES, defaults.refresh_token_bytes)?,
            allow_plain_pkce: parse_or(&lookup, ALLOW_PLAIN_PKCE, defaults.allow_plain_pkce)?,
            assertion_leeway_secs: parse_or(&lookup, ASSERTION_LEEWAY, defaults.assertion_leeway_secs)?,
            assertion_audience: lookup(ASSERTION_AUDIENCE).filter(|aud| !aud.is_empty()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the ranges of all values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_token_lifetime_secs <= 0 {
            return Err(ConfigError::OutOfRange {
                key: ACCESS_TOKEN_LIFETIME,
                reason: "must be positive",
            });
        }

        if self.access_token_lifetime_secs > MAX_ACCESS_TOKEN_LIFETIME_SECS {
            return Err(ConfigError::OutOfRange {
                key: ACCESS_TOKEN_LIFETIME,
                reason: "must not exceed ten years",
            });
        }

        if self.refresh_token_bytes < RandomGenerator::MIN_LENGTH {
            return Err(ConfigError::OutOfRange {
                key: REFRESH_TOKEN_BYTES,
                reason: "must be at least 16",
            });
        }

        Ok(())
    }

    /// The PKCE verifier implied by this configuration.
    pub fn pkce(&self) -> PkceVerifier {
        if self.allow_plain_pkce {
            PkceVerifier::allow_plain()
        } else {
            PkceVerifier::s256_only()
        }
    }
}
