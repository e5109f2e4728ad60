//! Configuration module for the extraction service
//!
//! This module provides the `ServiceConfig` struct, its fluent builder, and
//! the environment loader used by the binary.

// Sub-modules
pub mod builder;
pub mod env;
pub mod getters;
pub mod types;

// Re-exports for public API
pub use builder::ServiceConfigBuilder;
pub use types::ServiceConfig;
