//! CCW Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared plumbing for the CCW RIF pipeline crates:
//!
//! - **Error Handling**: [`CcwError`] and the crate [`Result`] alias
//! - **Environment**: typed readers for `KEY=value` settings
//! - **Logging**: tracing subscriber setup for every binary
//!
//! # Example
//!
//! ```no_run
//! use ccw_common::env;
//! use ccw_common::Result;
//!
//! fn page_size() -> Result<i32> {
//!     Ok(env::parse_or("CCW_RIF_S3_LIST_MAX_KEYS", 1000)?)
//! }
//! ```

pub mod env;
pub mod error;
pub mod logging;

pub use error::{CcwError, Result};
