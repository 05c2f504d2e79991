//! portcullis-core: Configuration and shared types for portcullis
//!
//! This crate provides the daemon configuration structures and error types
//! shared by the daemon and the commander CLI.

pub mod config;
pub mod error;

pub use config::DaemonConfig;
pub use error::ConfigError;
