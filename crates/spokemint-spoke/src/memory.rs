//! in-process spoke for development and tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use spokemint_types::Token;

use crate::client::{Identity, IssuedToken, SpokeClient};
use crate::error::{Result, SpokeError};

/// ca bundle handed to consumers of in-memory tokens. nothing verifies it;
/// it exists so the status-population path is exercised end to end.
const MEMORY_CA: &[u8] =
    b"-----BEGIN CERTIFICATE-----\nspokemint in-memory spoke\n-----END CERTIFICATE-----\n";

/// in-memory [`SpokeClient`].
///
/// registers identities in a map and mints random tokens, clamping the
/// requested validity to a ceiling the way a real issuer would.
#[derive(Debug, Clone)]
pub struct MemorySpoke {
    identities: Arc<Mutex<HashMap<(String, String), Identity>>>,
    max_validity_secs: u64,
}

impl MemorySpoke {
    /// create a spoke that clamps granted validity to `max_validity_secs`.
    pub fn new(max_validity_secs: u64) -> Self {
        Self {
            identities: Arc::new(Mutex::new(HashMap::new())),
            max_validity_secs,
        }
    }

    /// the ca bundle consumers need for tokens minted here.
    pub fn ca_certificate(&self) -> Vec<u8> {
        MEMORY_CA.to_vec()
    }

    /// number of registered identities.
    pub fn identity_count(&self) -> usize {
        self.identities
            .lock()
            .expect("identity table lock poisoned")
            .len()
    }

    /// look up a registered identity.
    pub fn identity(&self, namespace: &str, name: &str) -> Option<Identity> {
        self.identities
            .lock()
            .expect("identity table lock poisoned")
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    fn mint() -> Token {
        let mut bytes = [0u8; 24];
        rand::rng().fill_bytes(&mut bytes);
        Token::new(format!("smt-{}", hex::encode(bytes)))
    }
}

impl SpokeClient for MemorySpoke {
    async fn create_identity(
        &self,
        namespace: String,
        name: String,
        labels: HashMap<String, String>,
    ) -> Result<()> {
        let mut identities = self
            .identities
            .lock()
            .expect("identity table lock poisoned");
        let key = (namespace.clone(), name.clone());
        if identities.contains_key(&key) {
            return Err(SpokeError::AlreadyExists(format!("{namespace}/{name}")));
        }
        identities.insert(
            key,
            Identity {
                namespace,
                name,
                labels,
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn issue_token(
        &self,
        namespace: String,
        identity: String,
        validity_secs: u64,
    ) -> Result<IssuedToken> {
        let known = self
            .identities
            .lock()
            .expect("identity table lock poisoned")
            .contains_key(&(namespace.clone(), identity.clone()));
        if !known {
            return Err(SpokeError::IdentityNotFound(format!(
                "{namespace}/{identity}"
            )));
        }
        let granted_secs = validity_secs.min(self.max_validity_secs);
        // saturate rather than wrap when the ceiling exceeds what the
        // timestamp can hold
        let granted = Duration::try_seconds(i64::try_from(granted_secs).unwrap_or(i64::MAX))
            .unwrap_or(Duration::MAX);
        let expires_at = Utc::now()
            .checked_add_signed(granted)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Ok(IssuedToken {
            token: Self::mint(),
            expires_at,
        })
    }
}
