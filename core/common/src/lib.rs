//! Common utilities and types shared across quietsync crates.
//!
//! This module provides the error taxonomy and the two immutable targets
//! (local watch directory and remote destination) every component refers to.

pub mod error;
pub mod types;

pub use error::{Error, Result, SyncError};
pub use types::{RemoteTarget, WatchTarget};
