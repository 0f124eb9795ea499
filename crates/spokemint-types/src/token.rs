//! opaque bearer token newtype.

use std::fmt;

use serde::{Deserialize, Serialize};

/// an opaque bearer token minted by a spoke.
///
/// the agent never interprets token contents; the spoke alone decides the
/// format. the newtype exists so the secret does not leak through `Debug`
/// output or log fields by accident. use [`Token::prefix`] when a log line
/// needs to identify a token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// wrap a raw token string.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// the full secret value. callers are expected to hand this to the
    /// consumer-facing surface only, never to logs.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// consume the newtype and return the raw string.
    pub fn into_inner(self) -> String {
        self.0
    }

    /// a short, log-safe prefix of the token.
    pub fn prefix(&self) -> String {
        self.0.chars().take(8).collect()
    }
}

impl From<String> for Token {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for Token {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({}...)", self.prefix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_the_secret() {
        let token = Token::new("smt-super-secret-value");
        let debug = format!("{token:?}");
        assert!(!debug.contains("secret-value"));
        assert!(debug.contains("smt-supe"));
    }

    #[test]
    fn prefix_is_short_even_for_short_tokens() {
        assert_eq!(Token::new("abc").prefix(), "abc");
        assert_eq!(Token::new("abcdefghij").prefix(), "abcdefgh");
    }

    #[test]
    fn serde_is_transparent() {
        let token = Token::new("smt-abc");
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, "\"smt-abc\"");
        let back: Token = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
    }
}
