//! Foundation types for concli.
//!
//! Shared by the engine and the binaries: the error taxonomy and the
//! engine configuration loaded from TOML.

pub mod config;
pub mod error;
