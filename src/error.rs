//! Error types for configuration validation and the `.whiskers` file format.

use std::path::PathBuf;

use thiserror::Error;

/// Failures that can occur while building or loading a [`crate::config::Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("field '{field}' must be positive (got {value})")]
    NotPositive { field: &'static str, value: f32 },

    #[error("field '{field}' must be within {min}..={max} (got {value})")]
    OutOfRange {
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },

    #[error("step '{step_field}' ({step}) does not evenly divide the range of '{range_field}' ({min}..={max})")]
    StepMisaligned {
        range_field: &'static str,
        step_field: &'static str,
        min: f32,
        max: f32,
        step: f32,
    },

    #[error("configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Failures while reading or writing the binary `.whiskers` ancillary format.
#[derive(Debug, Error)]
pub enum WhiskersIoError {
    #[error("bad magic header: expected {expected:?}, found {found:?}")]
    BadHeader { expected: Vec<u8>, found: Vec<u8> },

    #[error("truncated record: expected {expected} more bytes, found {found}")]
    Truncated { expected: usize, found: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
