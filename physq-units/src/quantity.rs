//! Quantity type - a payload in reference units with its dimension

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Div, Mul, Neg};
use std::str::FromStr;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use physq_core::{
    Comparison, DimensionVector, Exponent, Op, ParseError, ParseErrorKind, Payload,
    PayloadError, UnitError,
};
use crate::dispatch::{Dispatcher, Operand};
use crate::format::Formatter;
use crate::registry::Registry;

/// A physical quantity: an opaque payload stored in the reference system
/// together with its dimension
///
/// The payload never leaves the container except through [`ratio`],
/// [`in_units`] or, for dimensionless quantities, [`into_value`]. All
/// operations are dimension checked and return new quantities.
///
/// Literal operands of these methods resolve against the global SI
/// registry. For units of another registry run the same operations through
/// [`Dispatcher::new`] over that registry.
///
/// [`ratio`]: Quantity::ratio
/// [`in_units`]: Quantity::in_units
/// [`into_value`]: Quantity::into_value
#[derive(Debug, Clone)]
pub struct Quantity<V> {
    value: V,
    dimension: DimensionVector,
}

impl<V: Payload> Quantity<V> {
    /// Wrap a payload that is already in reference units
    pub fn new(value: V, dimension: DimensionVector) -> Self {
        Quantity { value, dimension }
    }

    /// Wrap a payload given in `unit`, e.g. `Quantity::with_unit(3.0, "km/h")`
    pub fn with_unit(value: V, unit: &str) -> Result<Self, UnitError> {
        Dispatcher::global().with_unit(value, unit)
    }

    pub fn dimension(&self) -> &DimensionVector {
        &self.dimension
    }

    pub fn is_dimensionless(&self) -> bool {
        self.dimension.is_dimensionless()
    }

    pub(crate) fn payload(&self) -> &V {
        &self.value
    }

    pub(crate) fn into_parts(self) -> (V, DimensionVector) {
        (self.value, self.dimension)
    }

    fn operands<'a>(&'a self, rest: Vec<Operand<'a, V>>) -> Vec<Operand<'a, V>> {
        let mut operands = Vec::with_capacity(rest.len() + 1);
        operands.push(Operand::Quantity(self));
        operands.extend(rest);
        operands
    }

    fn value_op<'a>(&'a self, op: Op, rest: Vec<Operand<'a, V>>) -> Result<Quantity<V>, UnitError> {
        Dispatcher::global().quantity(&op, self.operands(rest))
    }

    fn scalar_op(&self, op: Op) -> Result<Quantity<f64>, UnitError> {
        Dispatcher::global().scalar(&op, vec![Operand::Quantity(self)])
    }

    fn mask_op<'a>(&'a self, op: Op, rest: Vec<Operand<'a, V>>) -> Result<V::Mask, UnitError> {
        Dispatcher::global().mask(&op, self.operands(rest))
    }

    // ========== Arithmetic ==========

    /// Add (dimensions must match)
    pub fn try_add<'a>(&'a self, rhs: impl Into<Operand<'a, V>>) -> Result<Self, UnitError> {
        self.value_op(Op::Add, vec![rhs.into()])
    }

    /// Subtract (dimensions must match)
    pub fn try_sub<'a>(&'a self, rhs: impl Into<Operand<'a, V>>) -> Result<Self, UnitError> {
        self.value_op(Op::Sub, vec![rhs.into()])
    }

    /// Elementwise `sqrt(self² + rhs²)` (dimensions must match)
    pub fn hypot<'a>(&'a self, rhs: impl Into<Operand<'a, V>>) -> Result<Self, UnitError> {
        self.value_op(Op::Hypot, vec![rhs.into()])
    }

    /// Elementwise product; dimensions combine
    pub fn try_mul<'a>(&'a self, rhs: impl Into<Operand<'a, V>>) -> Result<Self, UnitError> {
        self.value_op(Op::Mul, vec![rhs.into()])
    }

    /// Matrix product; dimensions combine
    pub fn matmul<'a>(&'a self, rhs: impl Into<Operand<'a, V>>) -> Result<Self, UnitError> {
        self.value_op(Op::MatMul, vec![rhs.into()])
    }

    /// Elementwise quotient; the result keeps the quotient dimension even when
    /// it is dimensionless (see [`ratio`](Self::ratio) to unwrap)
    pub fn try_div<'a>(&'a self, rhs: impl Into<Operand<'a, V>>) -> Result<Self, UnitError> {
        self.value_op(Op::Div, vec![rhs.into()])
    }

    /// Raise to an integer or rational power
    pub fn pow(&self, power: impl Into<Exponent>) -> Result<Self, UnitError> {
        self.value_op(Op::Pow(power.into()), Vec::new())
    }

    pub fn sqrt(&self) -> Result<Self, UnitError> {
        self.value_op(Op::Sqrt, Vec::new())
    }

    pub fn negated(&self) -> Result<Self, UnitError> {
        self.value_op(Op::Neg, Vec::new())
    }

    pub fn abs(&self) -> Result<Self, UnitError> {
        self.value_op(Op::Abs, Vec::new())
    }

    // ========== Comparisons ==========

    /// Elementwise comparison (dimensions must match)
    pub fn compare<'a>(
        &'a self,
        comparison: Comparison,
        rhs: impl Into<Operand<'a, V>>,
    ) -> Result<V::Mask, UnitError> {
        self.mask_op(Op::Compare(comparison), vec![rhs.into()])
    }

    pub fn is_finite(&self) -> Result<V::Mask, UnitError> {
        self.mask_op(Op::IsFinite, Vec::new())
    }

    pub fn is_nan(&self) -> Result<V::Mask, UnitError> {
        self.mask_op(Op::IsNan, Vec::new())
    }

    // ========== Reductions ==========

    pub fn sum(&self) -> Result<Quantity<f64>, UnitError> {
        self.scalar_op(Op::Sum)
    }

    pub fn mean(&self) -> Result<Quantity<f64>, UnitError> {
        self.scalar_op(Op::Mean)
    }

    pub fn min(&self) -> Result<Quantity<f64>, UnitError> {
        self.scalar_op(Op::Min)
    }

    pub fn max(&self) -> Result<Quantity<f64>, UnitError> {
        self.scalar_op(Op::Max)
    }

    /// Peak to peak (max - min)
    pub fn ptp(&self) -> Result<Quantity<f64>, UnitError> {
        self.scalar_op(Op::Ptp)
    }

    pub fn trace(&self) -> Result<Quantity<f64>, UnitError> {
        self.scalar_op(Op::Trace)
    }

    // ========== Shape ==========

    pub fn transpose(&self) -> Result<Self, UnitError> {
        self.value_op(Op::Transpose, Vec::new())
    }

    pub fn reshape(&self, shape: &[usize]) -> Result<Self, UnitError> {
        self.value_op(Op::Reshape(shape.to_vec()), Vec::new())
    }

    pub fn broadcast_to(&self, shape: &[usize]) -> Result<Self, UnitError> {
        self.value_op(Op::BroadcastTo(shape.to_vec()), Vec::new())
    }

    /// Elements at flat (row-major) positions
    pub fn take(&self, indices: &[usize]) -> Result<Self, UnitError> {
        self.value_op(Op::Take(indices.to_vec()), Vec::new())
    }

    /// Element at a flat position
    pub fn index(&self, index: usize) -> Result<Quantity<f64>, UnitError> {
        self.scalar_op(Op::Index(index))
    }

    /// Copy with the element at `index` replaced (dimensions must match)
    pub fn with_item<'a>(&'a self, index: usize, item: impl Into<Operand<'a, V>>) -> Result<Self, UnitError> {
        self.value_op(Op::Set(index), vec![item.into()])
    }

    /// Join quantities of one dimension along the first axis
    pub fn concatenate(parts: &[Quantity<V>]) -> Result<Self, UnitError> {
        if parts.is_empty() {
            return Err(PayloadError::invalid(Op::Concatenate.name(), "nothing to concatenate").into());
        }
        let operands = parts.iter().map(Operand::Quantity).collect();
        Dispatcher::global().quantity(&Op::Concatenate, operands)
    }

    // ========== Extraction ==========

    /// Payload ratio to a quantity of the same dimension
    pub fn ratio<'a>(&'a self, rhs: impl Into<Operand<'a, V>>) -> Result<V, UnitError> {
        Dispatcher::global().ratio(self, rhs.into())
    }

    /// Magnitude expressed in `unit`, e.g. `q.in_units("km/h")`
    pub fn in_units(&self, unit: &str) -> Result<V, UnitError> {
        Dispatcher::global().in_units(self, unit)
    }

    /// Raw payload of a dimensionless quantity
    pub fn into_value(self) -> Result<V, UnitError> {
        if !self.dimension.is_dimensionless() {
            return Err(UnitError::TypeMismatch {
                expected: "dimensionless quantity".to_string(),
                found: self.dimension,
            });
        }
        Ok(self.value)
    }

    // ========== Metadata ==========

    pub fn shape(&self) -> Vec<usize> {
        self.value.shape()
    }

    pub fn size(&self) -> usize {
        self.value.size()
    }

    pub fn ndim(&self) -> usize {
        self.value.ndim()
    }

    /// Each element as a scalar quantity, row-major
    pub fn iter(&self) -> impl Iterator<Item = Quantity<f64>> + '_ {
        self.value
            .elements()
            .into_iter()
            .map(move |x| Quantity::new(x, self.dimension.clone()))
    }
}

impl Quantity<f64> {
    /// One reference unit of `dimension`
    pub fn reference(dimension: DimensionVector) -> Self {
        Quantity::new(1.0, dimension)
    }

    /// Ordering between quantities of the same dimension
    pub fn try_partial_cmp(&self, other: &Quantity<f64>) -> Result<Option<Ordering>, UnitError> {
        if self.dimension != other.dimension {
            return Err(UnitError::mismatch(
                "compare",
                vec![self.dimension.clone(), other.dimension.clone()],
            ));
        }
        Ok(self.value.partial_cmp(&other.value))
    }

    /// Render with a format spec such as `".1m/s"`, see [`Formatter`]
    pub fn format(&self, spec: &str) -> Result<String, UnitError> {
        Formatter::global().format(self, spec)
    }
}

/// Fails only when an exponent leaves the representable range
impl Mul for Quantity<f64> {
    type Output = Result<Quantity<f64>, UnitError>;

    fn mul(self, rhs: Quantity<f64>) -> Self::Output {
        let dimension = self.dimension.combine(&rhs.dimension)?;
        Ok(Quantity::new(self.value * rhs.value, dimension))
    }
}

impl Div for Quantity<f64> {
    type Output = Result<Quantity<f64>, UnitError>;

    fn div(self, rhs: Quantity<f64>) -> Self::Output {
        let dimension = self.dimension.divide(&rhs.dimension)?;
        Ok(Quantity::new(self.value / rhs.value, dimension))
    }
}

impl Mul<f64> for Quantity<f64> {
    type Output = Quantity<f64>;

    fn mul(self, rhs: f64) -> Quantity<f64> {
        Quantity::new(self.value * rhs, self.dimension)
    }
}

impl Div<f64> for Quantity<f64> {
    type Output = Quantity<f64>;

    fn div(self, rhs: f64) -> Quantity<f64> {
        Quantity::new(self.value / rhs, self.dimension)
    }
}

impl Mul<Quantity<f64>> for f64 {
    type Output = Quantity<f64>;

    fn mul(self, rhs: Quantity<f64>) -> Quantity<f64> {
        Quantity::new(self * rhs.value, rhs.dimension)
    }
}

impl Neg for Quantity<f64> {
    type Output = Quantity<f64>;

    fn neg(self) -> Quantity<f64> {
        Quantity::new(-self.value, self.dimension)
    }
}

/// `value[D]` in reference units, e.g. `21[L/T]`; a precision is forwarded to the payload
impl<V: Payload + fmt::Display> fmt::Display for Quantity<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match f.precision() {
            Some(precision) => write!(f, "{:.*}{}", precision, self.value, self.dimension),
            None => write!(f, "{}{}", self.value, self.dimension),
        }
    }
}

impl FromStr for Quantity<f64> {
    type Err = UnitError;

    /// Canonical `value[D]` text or any literal known to the global registry
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some((number, dimension)) = trimmed
            .strip_suffix(']')
            .and_then(|body| body.rsplit_once('['))
        {
            let value: f64 = number
                .trim()
                .parse()
                .map_err(|_| ParseError::new(s, number, ParseErrorKind::MalformedNumber))?;
            let dimension: DimensionVector = dimension.parse()?;
            return Ok(Quantity::new(value, dimension));
        }
        Registry::global().parse(trimmed)
    }
}

impl Serialize for Quantity<f64> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Quantity<f64> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
