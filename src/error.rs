//! Error types and handling for the PDF structure forensics library
//! Author: kartik4091
//!
//! Only an empty or header-less buffer is fatal for an analysis run. Every
//! other problem found inside a document is recovered locally and surfaced as
//! an anomaly or a warning; the parse-level variants below are what the
//! object parser hands back to the stage that recovers from them.

use std::{io, result::Result as StdResult};

use thiserror::Error;

/// Custom result type for forensics operations
pub type Result<T> = StdResult<T, Error>;

/// Core error type for forensics operations
#[derive(Error, Debug)]
#[non_exhaustive]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    #[error("Input buffer is empty")]
    EmptyInput,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("PDF structure error: {0}")]
    StructureError(#[from] StructureError),

    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),

    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

// -------------------- Sub-Error Categories --------------------

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StructureError {
    #[error("Invalid PDF header: {0}")]
    InvalidHeader(String),

    #[error("Invalid xref section: {0}")]
    InvalidXref(String),

    #[error("Invalid trailer: {0}")]
    InvalidTrailer(String),

    #[error("Invalid object stream: {0}")]
    InvalidObjectStream(String),
}

/// Reasons a single object body failed to parse.
///
/// Every variant carries the absolute byte offset where parsing gave up so
/// the unparseable region can be reported alongside the raw bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    #[error("unexpected token {found:?} at offset {offset}")]
    UnexpectedToken { offset: usize, found: String },

    #[error("unterminated string starting at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("unterminated array starting at offset {offset}")]
    UnterminatedArray { offset: usize },

    #[error("unterminated dictionary starting at offset {offset}")]
    UnterminatedDictionary { offset: usize },

    #[error("invalid numeric literal {literal:?} at offset {offset}")]
    InvalidNumber { offset: usize, literal: String },

    #[error("input truncated at offset {offset}")]
    Truncated { offset: usize },

    #[error("stream at offset {offset} has no usable length: {detail}")]
    StreamLengthMismatch { offset: usize, detail: String },

    #[error("nesting deeper than {limit} levels at offset {offset}")]
    DepthExceeded { offset: usize, limit: usize },

    #[error("object header mismatch at offset {offset}: {detail}")]
    HeaderMismatch { offset: usize, detail: String },
}

impl ParseError {
    /// Offset where the failure was detected
    pub fn offset(&self) -> usize {
        match self {
            ParseError::UnexpectedToken { offset, .. }
            | ParseError::UnterminatedString { offset }
            | ParseError::UnterminatedArray { offset }
            | ParseError::UnterminatedDictionary { offset }
            | ParseError::InvalidNumber { offset, .. }
            | ParseError::Truncated { offset }
            | ParseError::StreamLengthMismatch { offset, .. }
            | ParseError::DepthExceeded { offset, .. }
            | ParseError::HeaderMismatch { offset, .. } => *offset,
        }
    }

    pub fn is_truncation(&self) -> bool {
        matches!(self, ParseError::Truncated { .. })
    }
}
