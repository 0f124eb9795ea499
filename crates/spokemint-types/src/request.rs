//! declarative token requests and their controller-written status.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::key::RequestKey;
use crate::token::Token;

/// label the agent stamps on every spoke identity it creates.
pub const MANAGED_BY_LABEL: &str = "spokemint.dev/managed";

/// value paired with [`MANAGED_BY_LABEL`].
pub const MANAGED_BY_VALUE: &str = "true";

/// token validity requested when a request does not carry its own (8640h).
pub const DEFAULT_VALIDITY_SECS: u64 = 8640 * 60 * 60;

/// labels identifying a spoke identity as managed by this agent.
pub fn managed_labels() -> HashMap<String, String> {
    HashMap::from([(MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string())])
}

/// a declarative token request stored on the hub.
///
/// the hub owns the record. the agent reads the spec side and writes only the
/// [`status`](Request::status), replacing it wholesale after each successful
/// rotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// hub namespace the request lives in.
    pub namespace: String,
    /// request name, which doubles as the spoke identity name.
    pub name: String,
    /// hub-assigned revision, bumped on every write. status updates carry the
    /// revision they were computed from, so a concurrent write surfaces as a
    /// conflict instead of being silently overwritten.
    pub revision: u64,
    /// requested token lifetime in seconds. the issuing spoke may clamp this
    /// down; [`RequestStatus::expires_at`] records what was actually granted.
    #[serde(default = "default_validity_secs")]
    pub validity_secs: u64,
    /// outcome of the most recent successful rotation.
    #[serde(default)]
    pub status: RequestStatus,
    /// when the request was created on the hub.
    pub created_at: DateTime<Utc>,
    /// when the request was last written, spec or status.
    pub updated_at: DateTime<Utc>,
}

fn default_validity_secs() -> u64 {
    DEFAULT_VALIDITY_SECS
}

impl Request {
    /// create a request with an empty status. the revision stays zero until
    /// the hub stores it.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, validity_secs: u64) -> Self {
        let now = Utc::now();
        Self {
            namespace: namespace.into(),
            name: name.into(),
            revision: 0,
            validity_secs,
            status: RequestStatus::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// the namespace/name identity of this request.
    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.namespace.clone(), self.name.clone())
    }
}

/// controller-written rotation outcome.
///
/// the status is replaced as a whole on every rotation, never patched one
/// field at a time: either all three fields describe a live token or the
/// status is empty. [`RequestStatus::issued`] is the only way the agent
/// builds a populated one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestStatus {
    /// the issued bearer token. `None` until the first successful rotation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<Token>,
    /// absolute expiry reported by the issuing spoke.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// certificate authority bundle (PEM bytes) a consumer needs to trust the
    /// spoke endpoint the token is for. carried as base64 on the wire.
    #[serde(
        default,
        with = "base64_bytes",
        skip_serializing_if = "Option::is_none"
    )]
    pub ca_certificate: Option<Vec<u8>>,
}

impl RequestStatus {
    /// build a fully-populated status from a fresh issuance.
    pub fn issued(token: Token, expires_at: DateTime<Utc>, ca_certificate: Vec<u8>) -> Self {
        Self {
            token: Some(token),
            expires_at: Some(expires_at),
            ca_certificate: Some(ca_certificate),
        }
    }

    /// whether a token has ever been recorded.
    pub fn is_issued(&self) -> bool {
        self.token.is_some()
    }
}

mod base64_bytes {
    //! serde helper carrying `Option<Vec<u8>>` as base64 text.

    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|text| STANDARD.decode(text).map_err(serde::de::Error::custom))
            .transpose()
    }
}
