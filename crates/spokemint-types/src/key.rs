//! stable identity for request objects.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// namespace/name identity of a request on the hub.
///
/// keys are what the controller indexes by: the local cache, the worker table
/// and watch deletion events all speak in keys rather than full objects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey {
    /// hub namespace the request lives in.
    pub namespace: String,
    /// request name, which doubles as the spoke identity name.
    pub name: String,
}

impl RequestKey {
    /// create a key from a namespace and a name.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for RequestKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((namespace, name)) if !namespace.is_empty() && !name.is_empty() => {
                Ok(Self::new(namespace, name))
            }
            _ => Err(KeyParseError::InvalidFormat(s.to_string())),
        }
    }
}

/// failure to parse a textual request key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyParseError {
    /// the input was not of the form `namespace/name`.
    #[error("request key must be of the form namespace/name, got {0:?}")]
    InvalidFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_roundtrips_through_fromstr() {
        let key = RequestKey::new("prod", "agent-a");
        let parsed: RequestKey = key.to_string().parse().unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn rejects_missing_separator() {
        assert!("no-slash".parse::<RequestKey>().is_err());
    }

    #[test]
    fn rejects_empty_parts() {
        assert!("/name".parse::<RequestKey>().is_err());
        assert!("ns/".parse::<RequestKey>().is_err());
    }

    #[test]
    fn extra_slashes_stay_in_the_name() {
        let key: RequestKey = "ns/a/b".parse().unwrap();
        assert_eq!(key.namespace, "ns");
        assert_eq!(key.name, "a/b");
    }
}
