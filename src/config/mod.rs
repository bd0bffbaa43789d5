// src/config/mod.rs
//! Configuration module for the secure-session core.
//!
//! This module manages protocol constants, defaults and runtime settings.

pub mod constants;
pub mod defaults;
pub mod settings;

pub use settings::{Command, ConfigError, CoreArgs, CoreConfig};
