//! # gosuto-core
//!
//! Domain types shared by the gosuto control-plane: the error taxonomy, the
//! clock abstraction used for deterministic scheduler tests, and the event
//! envelope that flows from gateways into `HandleEvent`.
//!
//! This crate has no HTTP or YAML dependencies — it defines the vocabulary
//! that `gosuto-config`, `gosuto-security`, `gosuto-gateway`, and
//! `gosuto-acp` all build on.

pub mod clock;
pub mod envelope;
pub mod error;

pub use clock::{Clock, FakeClock, SystemClock};
pub use envelope::{Event, EventParseError, Payload};
pub use error::{ConfigError, CronError, EnvelopeError, Error, Result};
