//! agent configuration.

use std::path::PathBuf;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::request::DEFAULT_VALIDITY_SECS;

/// remaining-lifetime floor below which a token is rotated (15 days).
pub const DEFAULT_REFRESH_THRESHOLD_SECS: u64 = 15 * 24 * 60 * 60;

/// how often every cached request is re-reconciled regardless of events.
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 300;

/// per-call deadline for spoke and hub round trips and the trust anchor
/// read.
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;

/// first retry delay after a failed reconcile.
pub const DEFAULT_RETRY_INITIAL_DELAY_MS: u64 = 500;

/// ceiling for the exponential retry backoff.
pub const DEFAULT_RETRY_MAX_DELAY_SECS: u64 = 300;

/// validity ceiling enforced by the in-memory spoke (one year).
pub const DEFAULT_MAX_VALIDITY_SECS: u64 = 365 * 24 * 60 * 60;

/// top-level agent configuration.
///
/// every field has a default, so an empty toml file is a valid config.
/// the serve command layers cli flags and environment variables on top.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// spoke namespace the agent creates identities in.
    pub spoke_namespace: String,
    /// address the health endpoint listens on.
    pub listen_addr: String,
    /// rotation policy knobs.
    pub rotation: RotationConfig,
    /// controller scheduling knobs.
    pub controller: ControllerConfig,
    /// which spoke tokens are issued against.
    pub spoke: SpokeConfig,
    /// requests seeded into the built-in hub at startup.
    pub requests: Vec<SeedRequest>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spoke_namespace: "spokemint-managed".to_string(),
            listen_addr: "127.0.0.1:9090".to_string(),
            rotation: RotationConfig::default(),
            controller: ControllerConfig::default(),
            spoke: SpokeConfig::default(),
            requests: Vec::new(),
        }
    }
}

/// rotation policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// rotate once remaining token lifetime drops below this many seconds.
    pub refresh_threshold_secs: u64,
    /// validity requested for seeded requests that do not set their own.
    pub default_validity_secs: u64,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            refresh_threshold_secs: DEFAULT_REFRESH_THRESHOLD_SECS,
            default_validity_secs: DEFAULT_VALIDITY_SECS,
        }
    }
}

/// controller scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// interval between full resyncs of every cached request, in seconds.
    pub resync_interval_secs: u64,
    /// first retry delay after a failed reconcile, in milliseconds.
    pub retry_initial_delay_ms: u64,
    /// ceiling for the exponential retry backoff, in seconds.
    pub retry_max_delay_secs: u64,
    /// deadline for each individual remote call, in seconds.
    pub remote_timeout_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            resync_interval_secs: DEFAULT_RESYNC_INTERVAL_SECS,
            retry_initial_delay_ms: DEFAULT_RETRY_INITIAL_DELAY_MS,
            retry_max_delay_secs: DEFAULT_RETRY_MAX_DELAY_SECS,
            remote_timeout_secs: DEFAULT_REMOTE_TIMEOUT_SECS,
        }
    }
}

/// spoke backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpokeConfig {
    /// in-process spoke holding identities and tokens in agent memory.
    /// meant for development and tests.
    Memory {
        /// ceiling the fake issuer clamps requested validity to, in seconds.
        #[serde(default = "default_max_validity_secs")]
        max_validity_secs: u64,
    },
    /// remote spoke reached over http(s).
    Http {
        /// base url of the spoke api, e.g. `https://spoke.example.com`.
        endpoint: String,
        /// bearer token presented to the spoke api. deserialized from config
        /// but never serialized back out.
        #[serde(default, skip_serializing)]
        bearer_token: Option<SecretString>,
        /// inline pem bundle for the certificate authority consumers need to
        /// trust the spoke endpoint. takes precedence over the path.
        #[serde(default)]
        ca_certificate: Option<String>,
        /// file to read the ca bundle from when no inline bundle is set.
        #[serde(default)]
        ca_certificate_path: Option<PathBuf>,
    },
}

fn default_max_validity_secs() -> u64 {
    DEFAULT_MAX_VALIDITY_SECS
}

impl Default for SpokeConfig {
    fn default() -> Self {
        Self::Memory {
            max_validity_secs: DEFAULT_MAX_VALIDITY_SECS,
        }
    }
}

/// a request seeded into the built-in hub at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedRequest {
    /// hub namespace to create the request in.
    #[serde(default = "default_seed_namespace")]
    pub namespace: String,
    /// request name.
    pub name: String,
    /// per-request validity override in seconds.
    #[serde(default)]
    pub validity_secs: Option<u64>,
}

fn default_seed_namespace() -> String {
    "default".to_string()
}
