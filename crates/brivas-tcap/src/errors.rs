//! Error types for the TCAP codec

use crate::asn1::Tag;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, TcapError>;

/// TCAP codec errors
///
/// Every parse and marshal entry point returns one of these instead of
/// panicking, so a transport can drop a single bad message and keep going.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TcapError {
    #[error("Malformed tag: {0}")]
    MalformedTag(String),

    #[error("Unknown tag: {0}")]
    UnknownTag(Tag),

    #[error("Indefinite length encoding is not supported")]
    UnsupportedIndefiniteLength,

    #[error("Length overflow: {0} length octets")]
    LengthOverflow(usize),

    #[error("Truncated input: need {needed} bytes, got {available}")]
    TruncatedInput { needed: usize, available: usize },

    #[error("Inconsistent length: declared {declared}, actual {actual}")]
    InconsistentLength { declared: usize, actual: usize },

    #[error("Destination too small: need {needed} bytes, got {available}")]
    DestinationTooSmall { needed: usize, available: usize },

    #[error("Unexpected tag: expected {expected}, found {found}")]
    UnexpectedTag { expected: Tag, found: Tag },

    #[error("Missing element: {0}")]
    MissingElement(&'static str),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Nesting deeper than {0} levels")]
    NestingTooDeep(usize),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TcapError {
    pub(crate) fn truncated(needed: usize, available: usize) -> Self {
        Self::TruncatedInput { needed, available }
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedTag(_) => "malformed_tag",
            Self::UnknownTag(_) => "unknown_tag",
            Self::UnsupportedIndefiniteLength => "indefinite_length",
            Self::LengthOverflow(_) => "length_overflow",
            Self::TruncatedInput { .. } => "truncated_input",
            Self::InconsistentLength { .. } => "inconsistent_length",
            Self::DestinationTooSmall { .. } => "destination_too_small",
            Self::UnexpectedTag { .. } => "unexpected_tag",
            Self::MissingElement(_) => "missing_element",
            Self::InvalidValue(_) => "invalid_value",
            Self::NestingTooDeep(_) => "nesting_too_deep",
            Self::Config(_) => "config",
        }
    }
}

impl From<config::ConfigError> for TcapError {
    fn from(err: config::ConfigError) -> Self {
        TcapError::Config(err.to_string())
    }
}
