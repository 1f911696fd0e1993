//! Dimension-checked dispatch of payload operations
//!
//! Every operation on a quantity goes through [`Dispatcher::evaluate`]:
//! operands are unwrapped into backend arguments (literals are parsed on
//! the way), the result dimension is derived from the operation's
//! [`DimensionRule`], and only then is the payload backend asked to run the
//! operation natively.

use std::collections::HashMap;
use tracing::trace;
use physq_core::{Arg, DimensionVector, Exponent, Native, Op, Payload, PayloadError, UnitError};
use crate::quantity::Quantity;
use crate::registry::Registry;

/// How an operation derives its result dimension from its operands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionRule {
    /// All operands share one dimension, which the result keeps
    Uniform,
    /// Sum of all operand dimensions
    Product,
    /// First operand's dimension minus the second's
    Quotient,
    /// Single operand's dimension scaled by the exponent
    Power(Exponent),
    /// All operands share one dimension, the result is dimensionless
    Predicate,
}

impl DimensionRule {
    /// Built-in rule for an operation, `None` for custom operations
    pub fn for_op(op: &Op) -> Option<DimensionRule> {
        let rule = match op {
            Op::Add | Op::Sub | Op::Hypot | Op::Neg | Op::Abs => DimensionRule::Uniform,
            Op::Sum | Op::Mean | Op::Min | Op::Max | Op::Ptp | Op::Trace => DimensionRule::Uniform,
            Op::Transpose
            | Op::Reshape(_)
            | Op::BroadcastTo(_)
            | Op::Take(_)
            | Op::Index(_)
            | Op::Set(_)
            | Op::Concatenate => DimensionRule::Uniform,
            Op::Mul | Op::MatMul => DimensionRule::Product,
            Op::Div => DimensionRule::Quotient,
            Op::Pow(power) => DimensionRule::Power(*power),
            Op::Sqrt => DimensionRule::Power(Exponent::new(1, 2)),
            Op::Compare(_) | Op::IsFinite | Op::IsNan => DimensionRule::Predicate,
            Op::Custom(_) => return None,
        };
        Some(rule)
    }

    /// Result dimension for `dimensions`, or why they are incompatible
    pub fn derive(&self, op: &Op, dimensions: &[DimensionVector]) -> Result<DimensionVector, UnitError> {
        match self {
            DimensionRule::Uniform | DimensionRule::Predicate => {
                let first = dimensions.first().cloned().unwrap_or_default();
                if dimensions.iter().any(|d| *d != first) {
                    return Err(UnitError::mismatch(op.name(), dimensions.to_vec()));
                }
                if *self == DimensionRule::Predicate {
                    Ok(DimensionVector::DIMENSIONLESS)
                } else {
                    Ok(first)
                }
            }
            DimensionRule::Product => dimensions
                .iter()
                .try_fold(DimensionVector::DIMENSIONLESS, |acc, d| acc.combine(d)),
            DimensionRule::Quotient => match dimensions {
                [numerator, denominator] => numerator.divide(denominator),
                _ => Err(PayloadError::invalid(
                    op.name(),
                    format!("expected 2 arguments, got {}", dimensions.len()),
                )
                .into()),
            },
            DimensionRule::Power(power) => match dimensions {
                [base] => base.scale(*power),
                _ => Err(PayloadError::invalid(
                    op.name(),
                    format!("expected 1 argument, got {}", dimensions.len()),
                )
                .into()),
            },
        }
    }
}

/// An operand of a quantity operation
///
/// Anything that can stand next to a quantity: another quantity, a raw
/// payload or plain number (both dimensionless), a scalar quantity, or a
/// literal string that is parsed before the operation runs.
#[derive(Debug, Clone)]
pub enum Operand<'a, V: Payload> {
    Quantity(&'a Quantity<V>),
    Value(&'a V),
    Number(f64),
    Measure(Quantity<f64>),
    Literal(&'a str),
}

impl<'a, V: Payload> From<&'a Quantity<V>> for Operand<'a, V> {
    fn from(quantity: &'a Quantity<V>) -> Self {
        Operand::Quantity(quantity)
    }
}

impl<V: Payload> From<f64> for Operand<'_, V> {
    fn from(number: f64) -> Self {
        Operand::Number(number)
    }
}

impl<V: Payload> From<Quantity<f64>> for Operand<'_, V> {
    fn from(quantity: Quantity<f64>) -> Self {
        Operand::Measure(quantity)
    }
}

impl<'a, V: Payload> From<&'a str> for Operand<'a, V> {
    fn from(literal: &'a str) -> Self {
        Operand::Literal(literal)
    }
}

/// Result of a dispatched operation
///
/// Dimensionless results are unwrapped to raw values.
#[derive(Debug, Clone)]
pub enum Outcome<V: Payload> {
    Quantity(Quantity<V>),
    Value(V),
    Scalar(Quantity<f64>),
    Number(f64),
    Mask(V::Mask),
}

impl<V: Payload> Outcome<V> {
    pub fn into_quantity(self) -> Option<Quantity<V>> {
        match self {
            Outcome::Quantity(q) => Some(q),
            _ => None,
        }
    }

    pub fn into_mask(self) -> Option<V::Mask> {
        match self {
            Outcome::Mask(m) => Some(m),
            _ => None,
        }
    }
}

/// Interception layer between quantities and their payload backend
#[derive(Debug, Clone)]
pub struct Dispatcher<'r> {
    registry: &'r Registry,
    custom: HashMap<String, DimensionRule>,
}

impl Dispatcher<'static> {
    /// Dispatcher resolving literals against the global SI registry
    pub fn global() -> Self {
        Dispatcher::new(Registry::global())
    }
}

impl<'r> Dispatcher<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Dispatcher {
            registry,
            custom: HashMap::new(),
        }
    }

    /// Register the dimension rule of a backend specific operation
    pub fn with_rule(mut self, name: impl Into<String>, rule: DimensionRule) -> Self {
        self.custom.insert(name.into(), rule);
        self
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Rule for `op`: built-in or registered
    pub fn rule<V: Payload>(&self, op: &Op) -> Result<DimensionRule, UnitError> {
        if let Some(rule) = DimensionRule::for_op(op) {
            return Ok(rule);
        }
        self.custom.get(op.name()).copied().ok_or_else(|| {
            PayloadError::Unsupported {
                op: op.name().to_string(),
                backend: V::BACKEND,
            }
            .into()
        })
    }

    /// Backend argument and dimension of an operand
    pub fn resolve<V: Payload>(&self, operand: Operand<'_, V>) -> Result<(Arg<V>, DimensionVector), UnitError> {
        let resolved = match operand {
            Operand::Quantity(q) => (Arg::Value(q.payload().clone()), q.dimension().clone()),
            Operand::Value(v) => (Arg::Value(v.clone()), DimensionVector::DIMENSIONLESS),
            Operand::Number(x) => (Arg::Scalar(x), DimensionVector::DIMENSIONLESS),
            Operand::Measure(q) => {
                let (x, dimension) = q.into_parts();
                (Arg::Scalar(x), dimension)
            }
            Operand::Literal(literal) => {
                let (x, dimension) = self.registry.parse(literal)?.into_parts();
                (Arg::Scalar(x), dimension)
            }
        };
        Ok(resolved)
    }

    /// Check dimensions, run the operation natively, return the raw result
    /// together with its dimension
    pub fn evaluate<V: Payload>(
        &self,
        op: &Op,
        operands: Vec<Operand<'_, V>>,
    ) -> Result<(Native<V>, DimensionVector), UnitError> {
        let rule = self.rule::<V>(op)?;

        let mut args = Vec::with_capacity(operands.len());
        let mut dimensions = Vec::with_capacity(operands.len());
        for operand in operands {
            let (arg, dimension) = self.resolve(operand)?;
            args.push(arg);
            dimensions.push(dimension);
        }

        let dimension = rule.derive(op, &dimensions)?;
        trace!(op = op.name(), backend = V::BACKEND, result = %dimension, "dispatch");
        let native = V::apply(op, args)?;
        Ok((native, dimension))
    }

    // ========== Quantity operations ==========

    /// Dispatch `op` expecting a payload result
    pub fn quantity<V: Payload>(&self, op: &Op, operands: Vec<Operand<'_, V>>) -> Result<Quantity<V>, UnitError> {
        let (native, dimension) = self.evaluate(op, operands)?;
        Ok(Quantity::new(native.into_value(op)?, dimension))
    }

    /// Dispatch a reduction or element access
    pub fn scalar<V: Payload>(&self, op: &Op, operands: Vec<Operand<'_, V>>) -> Result<Quantity<f64>, UnitError> {
        let (native, dimension) = self.evaluate(op, operands)?;
        Ok(Quantity::new(native.into_scalar(op)?, dimension))
    }

    /// Dispatch a predicate
    pub fn mask<V: Payload>(&self, op: &Op, operands: Vec<Operand<'_, V>>) -> Result<V::Mask, UnitError> {
        let (native, _) = self.evaluate(op, operands)?;
        Ok(native.into_mask(op)?)
    }

    /// Wrap a payload given in `unit`
    pub fn with_unit<V: Payload>(&self, value: V, unit: &str) -> Result<Quantity<V>, UnitError> {
        self.quantity(&Op::Mul, vec![Operand::Value(&value), Operand::Literal(unit)])
    }

    /// Payload ratio of `quantity` to an operand of the same dimension
    pub fn ratio<V: Payload>(&self, quantity: &Quantity<V>, rhs: Operand<'_, V>) -> Result<V, UnitError> {
        let (arg, dimension) = self.resolve(rhs)?;
        if dimension != *quantity.dimension() {
            return Err(UnitError::mismatch("ratio", vec![quantity.dimension().clone(), dimension]));
        }
        let op = Op::Div;
        Ok(V::apply(&op, vec![Arg::Value(quantity.payload().clone()), arg])?.into_value(&op)?)
    }

    /// Magnitude of `quantity` expressed in `unit`
    pub fn in_units<V: Payload>(&self, quantity: &Quantity<V>, unit: &str) -> Result<V, UnitError> {
        self.ratio(quantity, Operand::Literal(unit))
    }

    /// Dispatch `op` and wrap the result
    pub fn call<V: Payload>(&self, op: &Op, operands: Vec<Operand<'_, V>>) -> Result<Outcome<V>, UnitError> {
        let (native, dimension) = self.evaluate(op, operands)?;
        let outcome = match native {
            Native::Value(v) if dimension.is_dimensionless() => Outcome::Value(v),
            Native::Value(v) => Outcome::Quantity(Quantity::new(v, dimension)),
            Native::Scalar(x) if dimension.is_dimensionless() => Outcome::Number(x),
            Native::Scalar(x) => Outcome::Scalar(Quantity::new(x, dimension)),
            Native::Mask(m) => Outcome::Mask(m),
        };
        Ok(outcome)
    }
}
