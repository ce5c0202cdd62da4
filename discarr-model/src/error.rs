use thiserror::Error;

/// Errors produced by model constructors and parsers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid ledger timestamp '{raw}'")]
    InvalidTimestamp { raw: String },
    #[error("download id must not be empty")]
    EmptyId,
}
