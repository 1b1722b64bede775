//! Shared data model for the `sweepr` workspace.
//!
//! Everything the engine consumes (network ranges, port ranges, scan
//! configuration) and produces (the host → open ports mapping) lives here, so
//! that the CLI and the engine agree on one vocabulary.

pub mod config;
pub mod error;
pub mod log;
pub mod network;
pub mod result;

pub use error::ConfigError;
