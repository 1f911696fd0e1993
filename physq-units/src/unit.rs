//! Unit representation and metric prefixes

use std::fmt;
use serde::{Deserialize, Serialize};
use physq_core::DimensionVector;

/// SI prefixes and their multipliers
///
/// Fixed and not extensible. Two-character prefixes come first so that the
/// longest match is always tried before a shorter one.
pub const PREFIXES: [(&str, f64); 20] = [
    ("da", 1e1),
    ("Y", 1e24),
    ("Z", 1e21),
    ("E", 1e18),
    ("P", 1e15),
    ("T", 1e12),
    ("G", 1e9),
    ("M", 1e6),
    ("k", 1e3),
    ("h", 1e2),
    ("d", 1e-1),
    ("c", 1e-2),
    ("m", 1e-3),
    ("μ", 1e-6),
    ("n", 1e-9),
    ("p", 1e-12),
    ("f", 1e-15),
    ("a", 1e-18),
    ("z", 1e-21),
    ("y", 1e-24),
];

/// Multiplier of a prefix symbol
pub fn prefix_multiplier(prefix: &str) -> Option<f64> {
    PREFIXES.iter().find(|(p, _)| *p == prefix).map(|(_, m)| *m)
}

/// Every reading of `token` as prefix + symbol, longest prefix first,
/// ending with the unprefixed reading
pub fn prefix_splits(token: &str) -> impl Iterator<Item = (f64, &str)> {
    PREFIXES
        .iter()
        .filter_map(move |(prefix, multiplier)| {
            token
                .strip_prefix(prefix)
                .filter(|rest| !rest.is_empty())
                .map(|rest| (*multiplier, rest))
        })
        .chain(std::iter::once((1.0, token)))
}

/// A named (scale, dimension) pair
///
/// `scale` converts a magnitude in this unit to the coherent reference
/// system: `reference_value = value * scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    /// The unit symbol (e.g., "m", "N", "Ω")
    pub symbol: String,
    /// Factor relative to the reference system
    pub scale: f64,
    /// The dimensional signature
    pub dimension: DimensionVector,
}

impl Unit {
    pub fn new(symbol: &str, scale: f64, dimension: DimensionVector) -> Self {
        Unit {
            symbol: symbol.to_string(),
            scale,
            dimension,
        }
    }

    /// Check if this unit carries no extra scale factor
    pub fn is_coherent(&self) -> bool {
        self.scale == 1.0
    }

    /// Check if two units measure the same kind of quantity
    pub fn is_compatible(&self, other: &Unit) -> bool {
        self.dimension == other.dimension
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}
