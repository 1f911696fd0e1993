//! Rendering quantities in a chosen unit
//!
//! A format spec is a numeric part followed by a unit literal: `".1m/s"`,
//! `"8.3km"`, `",.0m"`. The numeric part is `'0'? width? ','? ('.' precision)?`;
//! the unit is parsed against the registry and appended verbatim. A leading
//! `0` pads with zeros after the sign instead of spaces.

use physq_core::{ParseError, ParseErrorKind, UnitError};
use crate::dispatch::{Dispatcher, Operand};
use crate::quantity::Quantity;
use crate::registry::Registry;

/// Parsed format spec
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSpec {
    /// Minimum width of the numeric part, right aligned
    pub width: Option<usize>,
    /// Pad with `0` after the sign rather than with leading spaces
    pub zero_fill: bool,
    /// Thousands separator in the integer part
    pub grouping: bool,
    /// Fractional digits; general float rendering when absent
    pub precision: Option<usize>,
    /// Target unit literal
    pub unit: String,
}

impl FormatSpec {
    pub fn parse(spec: &str) -> Result<FormatSpec, UnitError> {
        let split = spec
            .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))
            .unwrap_or(spec.len());
        let (numeric, unit) = spec.split_at(split);
        if unit.trim().is_empty() {
            return Err(ParseError::new(spec, spec, ParseErrorKind::ExpectedUnit).into());
        }

        let malformed = || UnitError::from(ParseError::new(spec, numeric, ParseErrorKind::MalformedNumber));
        let (head, precision) = match numeric.split_once('.') {
            Some((head, digits)) => {
                if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                    return Err(malformed());
                }
                (head, Some(digits.parse::<usize>().map_err(|_| malformed())?))
            }
            None => (numeric, None),
        };
        let (width, grouping) = match head.strip_suffix(',') {
            Some(width) => (width, true),
            None => (head, false),
        };
        if width.contains(',') {
            return Err(malformed());
        }
        let (width, zero_fill) = match width.strip_prefix('0') {
            Some(rest) => (rest, true),
            None => (width, false),
        };
        let width = if width.is_empty() {
            None
        } else {
            Some(width.parse::<usize>().map_err(|_| malformed())?)
        };

        Ok(FormatSpec {
            width,
            zero_fill,
            grouping,
            precision,
            unit: unit.to_string(),
        })
    }
}

/// Renders scalar quantities in target units
#[derive(Debug, Clone, Copy)]
pub struct Formatter<'r> {
    registry: &'r Registry,
    precision: Option<usize>,
}

impl Formatter<'static> {
    pub fn global() -> Self {
        Formatter::new(Registry::global())
    }
}

impl<'r> Formatter<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Formatter {
            registry,
            precision: None,
        }
    }

    /// Precision used when a spec carries none
    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = Some(precision);
        self
    }

    /// Render with a spec such as `".1m/s"`
    pub fn format(&self, quantity: &Quantity<f64>, spec: &str) -> Result<String, UnitError> {
        self.render(quantity, &FormatSpec::parse(spec)?)
    }

    /// Render in `unit` with an explicit precision
    pub fn format_in(
        &self,
        quantity: &Quantity<f64>,
        unit: &str,
        precision: Option<usize>,
    ) -> Result<String, UnitError> {
        let spec = FormatSpec {
            width: None,
            zero_fill: false,
            grouping: false,
            precision,
            unit: unit.to_string(),
        };
        self.render(quantity, &spec)
    }

    pub fn render(&self, quantity: &Quantity<f64>, spec: &FormatSpec) -> Result<String, UnitError> {
        let target = self.registry.parse(&spec.unit)?;
        if target.dimension() != quantity.dimension() {
            return Err(UnitError::mismatch(
                "format",
                vec![quantity.dimension().clone(), target.dimension().clone()],
            ));
        }
        let value = Dispatcher::new(self.registry).ratio(quantity, Operand::Quantity(&target))?;

        let mut number = match spec.precision.or(self.precision) {
            Some(precision) => format!("{:.*}", precision, value),
            None => format!("{}", value),
        };
        if spec.grouping {
            number = group_thousands(&number);
        }
        let width = spec.width.unwrap_or(0);
        if spec.zero_fill {
            number = zero_pad(&number, width);
        }
        Ok(format!("{:>width$}{}", number, spec.unit, width = width))
    }
}

/// Left-pad with zeros to `width`, keeping a sign in front
fn zero_pad(number: &str, width: usize) -> String {
    let (sign, unsigned) = match number.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", number),
    };
    let digits = width.saturating_sub(sign.len());
    format!("{}{:0>digits$}", sign, unsigned, digits = digits)
}

/// Insert `,` every three digits of the integer part
fn group_thousands(number: &str) -> String {
    let (sign, unsigned) = match number.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", number),
    };
    let split = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());
    let (integer, rest) = unsigned.split_at(split);

    let mut grouped = String::with_capacity(number.len() + integer.len() / 3);
    grouped.push_str(sign);
    for (i, c) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped.push_str(rest);
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use physq_core::codes;

    fn q(literal: &str) -> Quantity<f64> {
        Registry::global().parse(literal).unwrap()
    }

    #[test]
    fn test_parse_spec() {
        let spec = FormatSpec::parse(".1m/s").unwrap();
        assert_eq!(spec.precision, Some(1));
        assert_eq!(spec.unit, "m/s");
        assert!(!spec.grouping);
        assert_eq!(spec.width, None);

        let spec = FormatSpec::parse("10,.2km").unwrap();
        assert_eq!(spec.width, Some(10));
        assert!(spec.grouping);
        assert_eq!(spec.precision, Some(2));
        assert_eq!(spec.unit, "km");

        let spec = FormatSpec::parse("kN").unwrap();
        assert_eq!(spec.precision, None);
    }

    #[test]
    fn test_parse_spec_errors() {
        assert!(FormatSpec::parse(".1").is_err());
        assert!(FormatSpec::parse("").is_err());
        assert!(FormatSpec::parse("..1m").is_err());
        assert!(FormatSpec::parse(".m").is_err());
        assert!(FormatSpec::parse("1,2.1m").is_err());
    }

    #[test]
    fn test_format_precision() {
        let v = q("7μN*5h/6g");
        assert_eq!(Formatter::global().format(&v, ".1m/s").unwrap(), "21.0m/s");
        assert_eq!(Formatter::global().format(&v, ".3km/h").unwrap(), "75.600km/h");
    }

    #[test]
    fn test_format_general() {
        let d = q("1500m");
        assert_eq!(Formatter::global().format(&d, "km").unwrap(), "1.5km");
    }

    #[test]
    fn test_default_precision() {
        let formatter = Formatter::global().with_precision(2);
        assert_eq!(formatter.format(&q("1500m"), "km").unwrap(), "1.50km");
        assert_eq!(formatter.format(&q("1500m"), ".0km").unwrap(), "2km");
    }

    #[test]
    fn test_format_grouping_and_width() {
        let formatter = Formatter::global();
        assert_eq!(formatter.format(&q("1234567m"), ",.0m").unwrap(), "1,234,567m");
        assert_eq!(formatter.format(&q("-1234.5m"), ",.1m").unwrap(), "-1,234.5m");
        assert_eq!(formatter.format(&q("12m"), "6.1m").unwrap(), "  12.0m");
    }

    #[test]
    fn test_format_zero_fill() {
        let spec = FormatSpec::parse("08.1m").unwrap();
        assert!(spec.zero_fill);
        assert_eq!(spec.width, Some(8));
        assert!(!FormatSpec::parse("8.1m").unwrap().zero_fill);

        let formatter = Formatter::global();
        assert_eq!(formatter.format(&q("12m"), "08.1m").unwrap(), "000012.0m");
        assert_eq!(formatter.format(&q("-12m"), "08.1m").unwrap(), "-00012.0m");
        assert_eq!(formatter.format(&q("123456m"), "04.0m").unwrap(), "123456m");
        assert_eq!(formatter.format(&q("12m"), "0.1m").unwrap(), "12.0m");
    }

    #[test]
    fn test_format_in() {
        let formatter = Formatter::global();
        assert_eq!(formatter.format_in(&q("90min"), "h", Some(2)).unwrap(), "1.50h");
    }

    #[test]
    fn test_format_mismatch() {
        let err = Formatter::global().format(&q("3m"), ".1s").unwrap_err();
        assert!(matches!(err, UnitError::DimensionMismatch { ref op, .. } if op == "format"));
        assert_eq!(err.code(), codes::DIMENSION_MISMATCH);
    }

    #[test]
    fn test_round_trip() {
        for (literal, unit) in [("3.25km/h", "km/h"), ("12kN*m", "kN*m"), ("/ms", "/ms")] {
            let quantity = q(literal);
            let value = quantity.in_units(unit).unwrap();
            let number = literal.strip_suffix(unit).unwrap_or("1");
            let expected: f64 = if number.is_empty() { 1.0 } else { number.parse().unwrap() };
            assert!((value - expected).abs() < 1e-9 * expected.abs());
            assert!(Formatter::global().format(&quantity, unit).unwrap().ends_with(unit));
        }
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands("999"), "999");
        assert_eq!(group_thousands("1000"), "1,000");
        assert_eq!(group_thousands("-12345.678"), "-12,345.678");
    }
}
