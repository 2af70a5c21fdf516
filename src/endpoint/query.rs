use std::borrow::{Borrow, Cow};
use std::collections::HashMap;
use std::fmt;

use serde::de::{self, Deserialize, Deserializer, SeqAccess};
use url::form_urlencoded;

/// Read access to the form parameters of a token request.
///
/// A parameter sent more than once has no value at all. Were one of the copies chosen, the
/// credential check and the grant could end up looking at different values, so implementations
/// must report such a key as absent.
pub trait QueryParameter {
    /// The value of `key` if it was sent exactly once.
    fn unique_value(&self, key: &str) -> Option<Cow<str>>;

    /// An owned copy that keeps duplicated keys poisoned.
    fn normalize(&self) -> NormalizedParameter;
}

/// Owned form parameters with duplicates already poisoned.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NormalizedParameter {
    values: HashMap<Cow<'static, str>, Option<Cow<'static, str>>>,
}

impl NormalizedParameter {
    /// No parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode an `application/x-www-form-urlencoded` body.
    pub fn from_form(body: &[u8]) -> Self {
        form_urlencoded::parse(body).into_owned().collect()
    }

    /// Record a parameter. A second occurrence of the key erases its value for good.
    pub fn insert_or_poison(&mut self, key: Cow<'static, str>, value: Cow<'static, str>) {
        match self.values.get_mut(&key) {
            Some(slot) => *slot = None,
            None => {
                self.values.insert(key, Some(value));
            }
        }
    }
}

impl QueryParameter for NormalizedParameter {
    fn unique_value(&self, key: &str) -> Option<Cow<str>> {
        let value = self.values.get(key)?.as_deref()?;
        Some(Cow::Borrowed(value))
    }

    fn normalize(&self) -> NormalizedParameter {
        self.clone()
    }
}

impl<K: Borrow<str>, V: Borrow<str>> QueryParameter for Vec<(K, V)> {
    fn unique_value(&self, key: &str) -> Option<Cow<str>> {
        let mut matching = self.iter().filter(|(k, _)| k.borrow() == key);
        let (_, value) = matching.next()?;
        match matching.next() {
            Some(_) => None,
            None => Some(Cow::Borrowed(value.borrow())),
        }
    }

    fn normalize(&self) -> NormalizedParameter {
        self.iter()
            .map(|(k, v)| (k.borrow().to_owned(), v.borrow().to_owned()))
            .collect()
    }
}

impl<Q: QueryParameter + ?Sized> QueryParameter for &Q {
    fn unique_value(&self, key: &str) -> Option<Cow<str>> {
        (**self).unique_value(key)
    }

    fn normalize(&self) -> NormalizedParameter {
        (**self).normalize()
    }
}

impl<K, V> FromIterator<(K, V)> for NormalizedParameter
where
    K: Into<Cow<'static, str>>,
    V: Into<Cow<'static, str>>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(pairs: T) -> Self {
        let mut params = NormalizedParameter::new();
        for (key, value) in pairs {
            params.insert_or_poison(key.into(), value.into());
        }
        params
    }
}

// Lets requests hand out `Cow<dyn QueryParameter>`, borrowed or parsed on demand.
impl Borrow<dyn QueryParameter> for NormalizedParameter {
    fn borrow(&self) -> &(dyn QueryParameter + 'static) {
        self
    }
}

impl ToOwned for dyn QueryParameter {
    type Owned = NormalizedParameter;

    fn to_owned(&self) -> NormalizedParameter {
        self.normalize()
    }
}

/// Form extractors hand the body over as a sequence of pairs.
impl<'de> Deserialize<'de> for NormalizedParameter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct Pairs;

        impl<'de> de::Visitor<'de> for Pairs {
            type Value = NormalizedParameter;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("form parameters as key-value pairs")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut params = NormalizedParameter::new();
                while let Some((key, value)) = seq.next_element::<(String, String)>()? {
                    params.insert_or_poison(key.into(), value.into());
                }
                Ok(params)
            }
        }

        deserializer.deserialize_seq(Pairs)
    }
}
