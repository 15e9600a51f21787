//! Matcher configuration, report types and the response sink.
//!
//! This module contains everything the simulator core shares with its
//! transport collaborators: the device configuration, the structured
//! readings and events the core emits, and the sink those events flow into.

pub mod config;
pub mod sink;
pub mod types;
