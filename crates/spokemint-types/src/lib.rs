//! core types for spokemint, a hub-and-spoke bounded-token rotation agent.
//!
//! the hub holds declarative [`Request`] objects; the agent watches them and
//! keeps a live token recorded in each request's [`RequestStatus`], issuing
//! fresh tokens from the spoke before the old ones expire.

mod config;
mod key;
mod request;
pub mod test_utils;
mod token;

pub use config::{
    Config, ControllerConfig, DEFAULT_MAX_VALIDITY_SECS, DEFAULT_REFRESH_THRESHOLD_SECS,
    DEFAULT_REMOTE_TIMEOUT_SECS, DEFAULT_RESYNC_INTERVAL_SECS, DEFAULT_RETRY_INITIAL_DELAY_MS,
    DEFAULT_RETRY_MAX_DELAY_SECS, RotationConfig, SeedRequest, SpokeConfig,
};
pub use key::{KeyParseError, RequestKey};
pub use request::{
    DEFAULT_VALIDITY_SECS, MANAGED_BY_LABEL, MANAGED_BY_VALUE, Request, RequestStatus,
    managed_labels,
};
pub use token::Token;
