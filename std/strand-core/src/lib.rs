//!
//! strand-core - Shared Types
//!
//! This crate provides the vocabulary shared across the strand crates:
//!
//! - `SyncError` for operations that fail with a reason rather than a plain
//!   boolean status
//! - `SyncConfig` for process-wide tuning (default stack size, spin sleep,
//!   spin limit, thread name length), loaded from TOML
//! - Millisecond timeouts with `WAIT_INFINITE` as the "never give up" value
//!

pub mod config;
pub mod error;
pub mod timeout;

pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use timeout::*;
