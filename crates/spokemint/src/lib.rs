//! spokemint - hub-and-spoke bounded-token rotation agent.
//!
//! the agent watches token requests on a hub and keeps each one holding a
//! live spoke-issued token: it registers the spoke identity once, then mints
//! a replacement token whenever the recorded one gets close to expiry and
//! publishes it back to the request's status.
//!
//! [`Controller`] owns the scheduling (one worker per request, watch-driven
//! with periodic resync); [`TokenRotator`] runs a single rotation pass;
//! [`RotationPolicy`] decides when a pass must mint.

#![warn(missing_docs)]

pub mod cli;
mod controller;
mod http;
mod policy;
mod reconcile;

pub use controller::Controller;
pub use http::router;
pub use policy::RotationPolicy;
pub use reconcile::{Outcome, ReconcileError, TokenRotator};
