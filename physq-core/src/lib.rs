//! physq Core - Fundamental types
//!
//! This crate provides the core types used throughout physq:
//! - `DimensionVector`: rational exponent signature of a physical kind
//! - `UnitError`: structured errors with machine-readable codes
//! - `Payload`: the capability interface numeric payloads implement

mod dimension;
mod error;
mod payload;

pub use dimension::{DimensionVector, Exponent, EXPONENT_LIMIT, check_symbol, parse_exponent};
pub use error::{UnitError, ParseError, ParseErrorKind, PayloadError, codes};
pub use payload::{
    Arg, Comparison, Native, Op, Payload,
    expect_arity, exponent_to_f64, powr,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{DimensionVector, Exponent, UnitError, Payload, Op, Comparison};
    pub use crate::error::codes;
}
