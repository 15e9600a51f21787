//! RFM Common Library
//!
//! This crate provides shared constants, configuration loading and the
//! event/report types exchanged between the matcher simulator core and
//! its transport collaborators.
//!
//! # Module Structure
//!
//! - [`consts`] - Physical and system-wide constants
//! - [`config`] - Configuration loading traits and shared sections
//! - [`matcher`] - Matcher configuration, report types and the response sink
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! Add to your `Cargo.toml` with alias for shorter imports:
//! ```toml
//! [dependencies]
//! rfm = { package = "rfm_common", path = "../rfm_common" }
//! ```
//!
//! Then import:
//! ```rust
//! use rfm_common::consts::Z0_OHM;
//! use rfm_common::config::{ConfigLoader, SharedConfig};
//! ```

pub mod config;
pub mod consts;
pub mod matcher;
pub mod prelude;
