//! physq - Dimension-safe physical quantities
//!
//! ```text
//! "7μN*5h/6g"  --parse-->  Quantity { 21.0, [L/T] }  --format ".1m/s"-->  "21.0m/s"
//! ```
//!
//! Ties the workspace together:
//! - `physq-core`: dimension algebra, errors, payload interface
//! - `physq-units`: registries, literal parser, formatter, `Quantity<V>`
//! - `physq-array`: nalgebra matrices as quantity payloads

pub use physq_array::Matrix;
pub use physq_core::{
    codes, Comparison, DimensionVector, Exponent, Op, ParseError, ParseErrorKind, Payload,
    PayloadError, UnitError,
};
pub use physq_units::{
    parse_quantity, Definition, DimensionRule, Dispatcher, FormatSpec, Formatter, Kind, Operand,
    Outcome, Quantity, Registry, Unit, PREFIXES, SI,
};

use std::sync::Arc;
use tracing::debug;

/// Quantity engine over one registry
///
/// Clones share the registry, so units defined through one handle are
/// visible through every other.
#[derive(Debug, Clone)]
pub struct Physq {
    registry: Arc<Registry>,
    default_precision: Option<usize>,
}

impl Physq {
    pub fn new(registry: Registry) -> Self {
        Self::shared(Arc::new(registry))
    }

    pub fn shared(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            default_precision: None,
        }
    }

    /// Engine over a fresh SI registry
    pub fn with_si() -> Self {
        Self::new(Registry::si())
    }

    /// Precision used by [`Physq::format`] when the spec has none
    pub fn with_precision(mut self, precision: usize) -> Self {
        self.default_precision = Some(precision);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn parse(&self, literal: &str) -> Result<Quantity<f64>, UnitError> {
        self.registry.parse(literal)
    }

    /// Parse a literal that must be of the named kind
    pub fn parse_as(&self, kind: &str, literal: &str) -> Result<Quantity<f64>, UnitError> {
        let quantity = self.parse(literal)?;
        match self.registry.kind(kind) {
            Some(kind) => kind.check(quantity),
            None => Err(UnitError::TypeMismatch {
                expected: kind.to_string(),
                found: quantity.dimension().clone(),
            }),
        }
    }

    pub fn format(&self, quantity: &Quantity<f64>, spec: &str) -> Result<String, UnitError> {
        self.formatter().format(quantity, spec)
    }

    pub fn formatter(&self) -> Formatter<'_> {
        let formatter = Formatter::new(&self.registry);
        match self.default_precision {
            Some(precision) => formatter.with_precision(precision),
            None => formatter,
        }
    }

    pub fn dispatcher(&self) -> Dispatcher<'_> {
        Dispatcher::new(&self.registry)
    }

    // ========== Operations resolving literals in this registry ==========

    /// Wrap a payload given in `unit`
    pub fn with_unit<V: Payload>(&self, value: V, unit: &str) -> Result<Quantity<V>, UnitError> {
        self.dispatcher().with_unit(value, unit)
    }

    pub fn in_units<V: Payload>(&self, quantity: &Quantity<V>, unit: &str) -> Result<V, UnitError> {
        self.dispatcher().in_units(quantity, unit)
    }

    pub fn ratio<'a, V: Payload + 'a>(
        &self,
        quantity: &Quantity<V>,
        rhs: impl Into<Operand<'a, V>>,
    ) -> Result<V, UnitError> {
        self.dispatcher().ratio(quantity, rhs.into())
    }

    pub fn add<'a, V: Payload>(
        &self,
        lhs: &'a Quantity<V>,
        rhs: impl Into<Operand<'a, V>>,
    ) -> Result<Quantity<V>, UnitError> {
        self.dispatcher().quantity(&Op::Add, vec![Operand::Quantity(lhs), rhs.into()])
    }

    pub fn sub<'a, V: Payload>(
        &self,
        lhs: &'a Quantity<V>,
        rhs: impl Into<Operand<'a, V>>,
    ) -> Result<Quantity<V>, UnitError> {
        self.dispatcher().quantity(&Op::Sub, vec![Operand::Quantity(lhs), rhs.into()])
    }

    pub fn mul<'a, V: Payload>(
        &self,
        lhs: &'a Quantity<V>,
        rhs: impl Into<Operand<'a, V>>,
    ) -> Result<Quantity<V>, UnitError> {
        self.dispatcher().quantity(&Op::Mul, vec![Operand::Quantity(lhs), rhs.into()])
    }

    pub fn div<'a, V: Payload>(
        &self,
        lhs: &'a Quantity<V>,
        rhs: impl Into<Operand<'a, V>>,
    ) -> Result<Quantity<V>, UnitError> {
        self.dispatcher().quantity(&Op::Div, vec![Operand::Quantity(lhs), rhs.into()])
    }

    pub fn compare<'a, V: Payload>(
        &self,
        lhs: &'a Quantity<V>,
        comparison: Comparison,
        rhs: impl Into<Operand<'a, V>>,
    ) -> Result<V::Mask, UnitError> {
        self.dispatcher().mask(&Op::Compare(comparison), vec![Operand::Quantity(lhs), rhs.into()])
    }

    /// Register a new base dimension together with its reference unit
    pub fn base_unit(&self, dimension: &str, unit: &str) -> Result<DimensionVector, UnitError> {
        let vector = self.registry.create_dimension(dimension)?;
        self.registry.define_scaled(unit, 1.0, vector.clone())?;
        debug!(dimension, unit, "registered base unit");
        Ok(vector)
    }

    /// Kind registered for the quantity's dimension, if any
    pub fn kind_of(&self, quantity: &Quantity<f64>) -> Option<Kind> {
        self.registry.kind_of(quantity.dimension())
    }

    /// `value[D]` followed by the kind name when one is registered
    pub fn describe(&self, quantity: &Quantity<f64>) -> String {
        match self.kind_of(quantity) {
            Some(kind) => format!("{} ({})", quantity, kind.name),
            None => quantity.to_string(),
        }
    }
}

impl Default for Physq {
    fn default() -> Self {
        Self::with_si()
    }
}

/// Unit definition table for [`Registry::define_units`]
///
/// ```ignore
/// registry.define_units(units! { ly: "9460730472580800m", pc: "3.0857e16m" })?;
/// ```
#[macro_export]
macro_rules! units {
    {} => { ::std::vec::Vec::<(&str, &str)>::new() };
    { $($symbol:ident : $definition:expr),* $(,)? } => {
        vec![$((stringify!($symbol), $definition)),*]
    };
}

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        codes, DimensionVector, Dispatcher, Formatter, Kind, Matrix, Operand, Outcome, Physq,
        Quantity, Registry, UnitError,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_physq() -> Physq {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        Physq::with_si()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-12 * a.abs().max(b.abs())
    }

    #[test]
    fn test_compound_literal_to_velocity() {
        let physq = test_physq();
        let v = physq.parse("7μN*5h/6g").unwrap();
        assert_eq!(*v.dimension(), "L/T".parse().unwrap());
        assert!(close(v.in_units("m/s").unwrap(), 21.0));
        assert_eq!(physq.format(&v, ".1m/s").unwrap(), "21.0m/s");
        assert!(physq.describe(&v).ends_with("[L/T] (Velocity)"));
    }

    #[test]
    fn test_kind_guard() {
        let physq = test_physq();
        assert!(physq.parse_as("Velocity", "8km/h").is_ok());
        let err = physq.parse_as("Velocity", "8km").unwrap_err();
        assert!(matches!(err, UnitError::TypeMismatch { .. }));
        assert_eq!(err.code(), codes::TYPE_ERROR);
        assert!(physq.parse_as("Nonsense", "8km").is_err());
    }

    #[test]
    fn test_redefinition_rejected() {
        let physq = test_physq();
        let err = physq.registry().define_unit("deg", "3.14rad").unwrap_err();
        assert_eq!(err, UnitError::DuplicateDefinition("deg".to_string()));
        let err = physq.registry().create_dimension("L").unwrap_err();
        assert_eq!(err.code(), codes::SYMBOL_COLLISION);
    }

    #[test]
    fn test_new_base_dimension() {
        let physq = test_physq();
        physq.base_unit("X", "xu").unwrap();
        let rate = physq.parse("3xu/s").unwrap();
        assert_eq!(rate.to_string(), "3[X/T]");
        assert_eq!(physq.format(&rate, ".2kxu/min").unwrap(), "0.18kxu/min");
        assert_eq!(physq.describe(&rate), "3[X/T]");
    }

    #[test]
    fn test_engine_operations_resolve_engine_units() {
        let physq = test_physq();
        physq.base_unit("X", "xu").unwrap();
        let amount = physq.parse("3xu").unwrap();
        assert!(close(physq.in_units(&amount, "xu").unwrap(), 3.0));
        assert!(close(physq.in_units(&amount, "mxu").unwrap(), 3000.0));
        let more = physq.add(&amount, "1xu").unwrap();
        assert!(close(physq.in_units(&more, "xu").unwrap(), 4.0));
        assert!(close(physq.ratio(&more, "2xu").unwrap(), 2.0));
        assert!(physq.compare(&more, Comparison::Gt, "3500mxu").unwrap());
        let rate = physq.div(&amount, "1min").unwrap();
        assert_eq!(physq.format(&rate, ".2xu/s").unwrap(), "0.05xu/s");

        // The global registry knows nothing of xu
        assert!(amount.in_units("xu").is_err());
        assert!(amount.try_add("1xu").is_err());
    }

    #[test]
    fn test_engine_units_on_matrix_payloads() {
        let physq = test_physq();
        physq.registry().define_unit("ly", "9460730472580800m").unwrap();
        let d = physq.with_unit(Matrix::row(&[1.0, 2.0]), "ly").unwrap();
        assert_eq!(physq.in_units(&d, "ly").unwrap().row_major(), vec![1.0, 2.0]);
        let sum = physq.sub(&d, "1ly").unwrap();
        assert_eq!(physq.in_units(&sum, "ly").unwrap().row_major(), vec![0.0, 1.0]);
        let area = physq.mul(&d, "1ly").unwrap();
        assert_eq!(*area.dimension(), "L^2".parse().unwrap());
    }

    #[test]
    fn test_engines_share_registry() {
        let physq = test_physq();
        let other = physq.clone();
        other.registry().define_unit("ly", "9460730472580800m").unwrap();
        let d = physq.parse("2ly").unwrap();
        assert!(close(d.in_units("m").unwrap(), 2.0 * 9460730472580800.0));
        assert!(close(physq.in_units(&d, "ly").unwrap(), 2.0));
    }

    #[test]
    fn test_concurrent_definition_succeeds_once() {
        let physq = test_physq();
        let registry = physq.registry();
        let successes = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| registry.define_unit("ly", "9460730472580800m").is_ok()))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join())
                .filter(|joined| matches!(joined, Ok(true)))
                .count()
        });
        assert_eq!(successes, 1);
        assert!(registry.unit("ly").is_some());
    }

    #[test]
    fn test_batch_partial_success() {
        let physq = test_physq();
        let table = units! { ly: "9460730472580800m", deg: "1rad", pc: "3.0857e16m" };
        let err = physq.registry().define_units(table).unwrap_err();
        assert_eq!(err.code(), codes::DUPLICATE_DEFINITION);
        assert!(physq.registry().unit("ly").is_some());
        assert!(physq.registry().unit("pc").is_none());
    }

    #[test]
    fn test_format_parse_round_trip() {
        let physq = test_physq().with_precision(3);
        for (literal, unit) in [("9.81m/s2", "m/s2"), ("4.2kJ", "kJ"), ("1.5h", "min")] {
            let quantity = physq.parse(literal).unwrap();
            let text = physq.format(&quantity, unit).unwrap();
            let back = physq.parse(&text).unwrap();
            assert!(close(back.in_units(unit).unwrap(), quantity.in_units(unit).unwrap()));
        }
    }

    #[test]
    fn test_inverse_law() {
        let physq = test_physq();
        for literal in ["3m", "7μN*5h/6g", "2kg*m2/s3", "5m^1_2"] {
            let q = physq.parse(literal).unwrap();
            let ratio = (q.clone() / q.clone()).unwrap();
            assert!(ratio.is_dimensionless());
            assert!(close(ratio.into_value().unwrap(), 1.0));
            let back = q.pow(-1).unwrap().pow(-1).unwrap();
            assert_eq!(back.dimension(), q.dimension());
        }
    }

    #[test]
    fn test_matrix_payload_through_dispatcher() {
        let physq = test_physq();
        let forces = Quantity::with_unit(Matrix::row(&[1.0, 2.0]), "kN").unwrap();
        let outcome = physq
            .dispatcher()
            .call(&Op::Div, vec![Operand::from(&forces), Operand::Literal("1N")])
            .unwrap();
        match outcome {
            Outcome::Value(ratio) => assert_eq!(ratio.row_major(), vec![1000.0, 2000.0]),
            other => panic!("expected a raw value, got {other:?}"),
        }
    }

    #[test]
    fn test_serde_canonical_text() {
        let physq = test_physq();
        let q = physq.parse("36km/h").unwrap();
        let json = serde_json::to_string(&q).unwrap();
        assert_eq!(json, "\"10[L/T]\"");
    }
}
