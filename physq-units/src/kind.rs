//! Named kinds of quantity (Velocity, Force, ...)

use std::fmt;
use physq_core::{DimensionVector, Payload, UnitError};
use crate::quantity::Quantity;
use crate::registry::Registry;

/// A dimension under a human name
///
/// Used to validate that a quantity is of the expected physical kind, e.g.
/// `Velocity` accepts `"8km/h"` but rejects `"8km"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kind {
    pub name: String,
    pub dimension: DimensionVector,
}

impl Kind {
    pub fn new(name: &str, dimension: DimensionVector) -> Self {
        Kind {
            name: name.to_string(),
            dimension,
        }
    }

    /// Parse a literal and require it to be of this kind
    pub fn parse(&self, registry: &Registry, literal: &str) -> Result<Quantity<f64>, UnitError> {
        self.check(registry.parse(literal)?)
    }

    /// Pass `quantity` through if it is of this kind
    pub fn check<V: Payload>(&self, quantity: Quantity<V>) -> Result<Quantity<V>, UnitError> {
        if *quantity.dimension() != self.dimension {
            return Err(UnitError::TypeMismatch {
                expected: self.to_string(),
                found: quantity.dimension().clone(),
            });
        }
        Ok(quantity)
    }

    /// One reference unit of this kind
    pub fn reference_quantity(&self) -> Quantity<f64> {
        Quantity::reference(self.dimension.clone())
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.dimension)
    }
}
