//! spoke-side clients for identity registration and token issuance.
//!
//! a spoke is the endpoint tokens are minted against. the agent talks to it
//! through [`SpokeClient`]: register an identity once, then mint bounded
//! tokens for it on every rotation. [`MemorySpoke`] fakes one in process for
//! development; [`HttpSpoke`] speaks to a real one over http(s).

#![warn(missing_docs)]

mod client;
mod error;
mod http;
mod memory;
mod trust;

pub use client::{Identity, IssuedToken, SpokeClient, SpokeClientBoxed, from_config};
pub use error::{Result, SpokeError};
pub use http::HttpSpoke;
pub use memory::MemorySpoke;
pub use trust::{TrustAnchor, TrustAnchorError};
