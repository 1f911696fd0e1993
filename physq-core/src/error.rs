//! Error taxonomy
//!
//! Every failure is raised synchronously at the point of violation and
//! carries a machine-readable code alongside the human-readable message.

use std::fmt;
use thiserror::Error;
use crate::DimensionVector;

/// Standard error codes (machine-readable)
pub mod codes {
    pub const SYMBOL_COLLISION: &str = "SYMBOL_COLLISION";
    pub const INVALID_SYMBOL: &str = "INVALID_SYMBOL";
    pub const DUPLICATE_DEFINITION: &str = "DUPLICATE_DEFINITION";
    pub const AMBIGUOUS_DEFINITION: &str = "AMBIGUOUS_DEFINITION";
    pub const INVALID_SCALE: &str = "INVALID_SCALE";
    pub const UNKNOWN_UNIT: &str = "UNKNOWN_UNIT";
    pub const INVALID_TABLE: &str = "INVALID_TABLE";
    pub const EXPONENT_OVERFLOW: &str = "EXPONENT_OVERFLOW";
    pub const PARSE_ERROR: &str = "PARSE_ERROR";
    pub const DIMENSION_MISMATCH: &str = "DIMENSION_MISMATCH";
    pub const TYPE_ERROR: &str = "TYPE_ERROR";
    pub const SHAPE_MISMATCH: &str = "SHAPE_MISMATCH";
    pub const ARG_TYPE: &str = "ARG_TYPE";
    pub const UNSUPPORTED: &str = "UNSUPPORTED";
}

/// What went wrong while reading a quantity literal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Nothing but whitespace
    Empty,
    /// `*` or `/` with nothing after it
    DanglingOperator,
    /// A number that is not attached to a unit
    MissingUnit,
    /// An operator or end of input where a unit was expected
    ExpectedUnit,
    MalformedNumber,
    MalformedPower,
    UnexpectedCharacter,
    /// No prefix split of the token names a registered unit
    UnknownUnit,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ParseErrorKind::Empty => "empty expression",
            ParseErrorKind::DanglingOperator => "dangling operator",
            ParseErrorKind::MissingUnit => "number is not attached to a unit",
            ParseErrorKind::ExpectedUnit => "expected a unit",
            ParseErrorKind::MalformedNumber => "malformed number",
            ParseErrorKind::MalformedPower => "malformed power",
            ParseErrorKind::UnexpectedCharacter => "unexpected character",
            ParseErrorKind::UnknownUnit => "unknown unit",
        };
        f.write_str(text)
    }
}

/// Malformed literal, pointing at the offending substring
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid (sub)expression {fragment:?} in {input:?}: {kind}")]
pub struct ParseError {
    pub input: String,
    pub fragment: String,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(input: &str, fragment: &str, kind: ParseErrorKind) -> Self {
        ParseError {
            input: input.to_string(),
            fragment: fragment.to_string(),
            kind,
        }
    }
}

/// Failure reported by a payload backend
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PayloadError {
    #[error("shape mismatch for {op}: {left:?} and {right:?}")]
    ShapeMismatch {
        op: String,
        left: Vec<usize>,
        right: Vec<usize>,
    },

    #[error("invalid arguments for {op}: {reason}")]
    InvalidArguments { op: String, reason: String },

    #[error("{op} is not supported by the {backend} backend")]
    Unsupported { op: String, backend: &'static str },
}

impl PayloadError {
    pub fn invalid(op: impl Into<String>, reason: impl Into<String>) -> Self {
        PayloadError::InvalidArguments { op: op.into(), reason: reason.into() }
    }
}

/// Errors raised by registries, the literal parser and quantity operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnitError {
    #[error("dimension {0:?} is already in use")]
    SymbolCollision(String),

    #[error("invalid symbol {symbol:?}: {reason}")]
    InvalidSymbol { symbol: String, reason: &'static str },

    #[error("cannot define {0:?}: unit is already defined")]
    DuplicateDefinition(String),

    #[error("cannot define {symbol:?}: unit collides with {}", .collisions.join(", "))]
    AmbiguousDefinition { symbol: String, collisions: Vec<String> },

    #[error("cannot define {symbol:?}: scale {scale} is not a positive finite number")]
    InvalidScale { symbol: String, scale: f64 },

    #[error("unknown unit {0:?}")]
    UnknownUnit(String),

    #[error("invalid unit table: {0}")]
    InvalidTable(String),

    #[error("exponent of {0:?} is out of range")]
    ExponentOverflow(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("incompatible arguments for {op}: {}", join_dimensions(.dimensions))]
    DimensionMismatch { op: String, dimensions: Vec<DimensionVector> },

    #[error("expected {expected}, got {found}")]
    TypeMismatch { expected: String, found: DimensionVector },

    #[error(transparent)]
    Payload(#[from] PayloadError),
}

impl UnitError {
    pub fn mismatch(op: impl Into<String>, dimensions: Vec<DimensionVector>) -> Self {
        UnitError::DimensionMismatch { op: op.into(), dimensions }
    }

    /// Machine-readable code, see [`codes`]
    pub fn code(&self) -> &'static str {
        match self {
            UnitError::SymbolCollision(_) => codes::SYMBOL_COLLISION,
            UnitError::InvalidSymbol { .. } => codes::INVALID_SYMBOL,
            UnitError::DuplicateDefinition(_) => codes::DUPLICATE_DEFINITION,
            UnitError::AmbiguousDefinition { .. } => codes::AMBIGUOUS_DEFINITION,
            UnitError::InvalidScale { .. } => codes::INVALID_SCALE,
            UnitError::UnknownUnit(_) => codes::UNKNOWN_UNIT,
            UnitError::InvalidTable(_) => codes::INVALID_TABLE,
            UnitError::ExponentOverflow(_) => codes::EXPONENT_OVERFLOW,
            UnitError::Parse(_) => codes::PARSE_ERROR,
            UnitError::DimensionMismatch { .. } => codes::DIMENSION_MISMATCH,
            UnitError::TypeMismatch { .. } => codes::TYPE_ERROR,
            UnitError::Payload(PayloadError::ShapeMismatch { .. }) => codes::SHAPE_MISMATCH,
            UnitError::Payload(PayloadError::InvalidArguments { .. }) => codes::ARG_TYPE,
            UnitError::Payload(PayloadError::Unsupported { .. }) => codes::UNSUPPORTED,
        }
    }
}

fn join_dimensions(dimensions: &[DimensionVector]) -> String {
    dimensions
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
