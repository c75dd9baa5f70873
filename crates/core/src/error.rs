//! Error types shared by the gosuto control-plane.
//!
//! Uses `thiserror` for ergonomic error definitions. Each bounded context
//! gets its own variant so callers can match without stringly-typed checks.

use thiserror::Error;

/// The top-level error type for all gosuto operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("cron error: {0}")]
    Cron(#[from] CronError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config at {path}: {message}")]
    Invalid { path: String, message: String },

    #[error("failed to read config file {path}: {message}")]
    Io { path: String, message: String },
}

#[derive(Debug, Clone, Error)]
pub enum EnvelopeError {
    #[error("event.source must not be empty")]
    MissingSource,

    #[error("event.type must not be empty")]
    MissingType,

    #[error("event.ts must not be zero")]
    MissingTimestamp,

    #[error("event source {0:?} does not match a configured gateway")]
    UnknownSource(String),

    #[error("event source {envelope:?} does not match url source {url:?}")]
    SourceMismatch { envelope: String, url: String },
}

#[derive(Debug, Clone, Error)]
pub enum CronError {
    #[error("expected 5 cron fields (minute hour dom month dow), got {0}")]
    WrongFieldCount(usize),

    #[error("invalid number {value:?} in field {field:?}")]
    InvalidNumber { field: String, value: String },

    #[error("{value} out of range {min}-{max}")]
    OutOfRange { value: u32, min: u32, max: u32 },

    #[error("invalid range {start}-{end} for bounds {min}-{max}")]
    InvalidRange {
        start: u32,
        end: u32,
        min: u32,
        max: u32,
    },

    #[error("step must be greater than zero")]
    ZeroStep,

    #[error("step {step} spans or exceeds the field width {start}-{end}")]
    StepTooLarge { step: u32, start: u32, end: u32 },

    #[error("field produced no values")]
    EmptyField,

    #[error("no matching instant found within search horizon")]
    NoMatch,
}
