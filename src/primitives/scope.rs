//! Space separated scope strings as they appear in token requests and client registrations.
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::{fmt, str};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A set of scope tokens granted to, or requested by, a client.
///
/// A request may only narrow what was authorized: the scope of a refreshed token must be a subset
/// of the scope on the refresh token, and a service account can only ask for tokens it is allowed.
/// Subset inclusion is exposed as the partial order, so `requested <= granted` is the check every
/// grant performs.
///
/// ```
/// # use oxide_auth_token::primitives::scope::Scope;
/// let granted = "reports:read reports:write".parse::<Scope>().unwrap();
/// let narrowed = "reports:read".parse::<Scope>().unwrap();
/// let widened = "reports:read billing".parse::<Scope>().unwrap();
///
/// assert!(narrowed.narrows(&granted));
/// assert!(!widened.narrows(&granted));
/// assert_eq!(granted.partial_cmp(&widened), None);
/// ```
///
/// Tokens may use the printable ascii range except for space, `"` and `\`, see RFC 6749
/// section 3.3. Stored in order, so the rendered form of equal scopes is identical.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Scope {
    tokens: BTreeSet<String>,
}

/// The scope string of a request could not be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseScopeErr {
    /// The character is outside of the scope token alphabet.
    #[error("scope contains the forbidden character {0:?}")]
    InvalidCharacter(char),
}

fn is_token_char(ch: char) -> bool {
    matches!(ch, '!' | '#'..='[' | ']'..='~')
}

impl Scope {
    /// Whether every token of `self` is also part of `granted`.
    pub fn narrows(&self, granted: &Scope) -> bool {
        self.tokens.is_subset(&granted.tokens)
    }

    /// Whether the scope includes the single token.
    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    /// Whether no token was requested or granted.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The tokens in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }
}

impl str::FromStr for Scope {
    type Err = ParseScopeErr;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut tokens = BTreeSet::new();
        for token in raw.split(' ').filter(|token| !token.is_empty()) {
            if let Some(bad) = token.chars().find(|&ch| !is_token_char(ch)) {
                return Err(ParseScopeErr::InvalidCharacter(bad));
            }
            tokens.insert(token.to_owned());
        }
        Ok(Scope { tokens })
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut tokens = self.iter();
        if let Some(first) = tokens.next() {
            f.write_str(first)?;
        }
        for token in tokens {
            write!(f, " {}", token)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl PartialOrd for Scope {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.narrows(other), other.narrows(self)) {
            (true, true) => Some(Ordering::Equal),
            (true, false) => Some(Ordering::Less),
            (false, true) => Some(Ordering::Greater),
            (false, false) => None,
        }
    }
}

impl Serialize for Scope {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Scope {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
