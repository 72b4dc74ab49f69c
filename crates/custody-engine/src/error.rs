//! Error types for custody-engine operations.
//!
//! Most of the engine is deliberately infallible: ICS decoding, schedule
//! validation, and store mutations degrade to empty results or no-ops.
//! These variants cover the few places where a caller asked for something
//! that cannot be computed.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CustodyError {
    #[error("Invalid recurrence rule: {0}")]
    InvalidRule(String),

    #[error("Invalid datetime: {0}")]
    InvalidDatetime(String),

    #[error("Invalid time of day: {0}")]
    InvalidTime(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CustodyError>;
