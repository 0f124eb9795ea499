//! hub-side storage and watch plumbing.
//!
//! the hub is where [`spokemint_types::Request`] objects live. this crate
//! defines the [`RequestStore`] trait the controller programs against, the
//! [`RequestCache`] it reads from, and an in-memory [`MemoryHub`] used by the
//! standalone serve mode and by tests.

#![warn(missing_docs)]

mod cache;
mod error;
mod memory;
mod store;

pub use cache::RequestCache;
pub use error::{HubError, Result};
pub use memory::MemoryHub;
pub use store::{RequestStore, WatchEvent};
