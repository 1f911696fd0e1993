//! physq Units - Registry, literals and dimensioned quantities
//!
//! Provides the unit side of physq on top of the core dimension algebra:
//! - Registry of base dimensions, units (with metric prefixes) and named kinds
//! - Literal parser: `"7μN*5h/6g"`, `"9.81m/s2"`, `"/s"`, `"m^1_2"`
//! - Formatter: `".1m/s"` style format specs
//! - `Quantity<V>`: any payload backend, dimension checked through the
//!   dispatch layer
//!
//! Seeded SI units:
//! - Base (m, s, g, A, K, mol, cd, rad, deg)
//! - Derived (N, Pa, J, W, Hz, C, V, F, Ω, S, Wb, T, H, lm, lx, Bq, Gy, Sv, kat)
//! - Other (min, h, day, au, ha, L, t, Da, eV)

mod dispatch;
mod format;
mod kind;
mod parse;
mod quantity;
mod registry;
mod unit;

pub use dispatch::{DimensionRule, Dispatcher, Operand, Outcome};
pub use format::{FormatSpec, Formatter};
pub use kind::Kind;
pub use parse::parse_quantity;
pub use quantity::Quantity;
pub use registry::{Definition, Registry, SI};
pub use unit::{prefix_multiplier, prefix_splits, Unit, PREFIXES};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{Dispatcher, Formatter, Kind, Operand, Outcome, Quantity, Registry};
}
