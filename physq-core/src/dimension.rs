//! Dimensional analysis types
//!
//! A physical dimension is a vector of exponents over named base symbols
//! (T, L, M, ... plus any user-created ones). Exponents are exact rationals
//! so that square roots of areas stay lengths.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use num_rational::Rational32;
use num_traits::{CheckedAdd, CheckedMul, Signed, Zero};
use serde::{Deserialize, Serialize};
use crate::error::{ParseError, ParseErrorKind, UnitError};

/// Exponent of a single base symbol
pub type Exponent = Rational32;

/// Largest numerator or denominator accepted in exponent text
pub const EXPONENT_LIMIT: i32 = 1 << 16;

/// Characters that may never appear in a dimension or unit symbol
const RESERVED: &[char] = &['*', '/', '^', '_', '+', '-', '.', ',', '[', ']', '(', ')'];

/// Check that `symbol` can be used as a dimension or unit symbol
///
/// Symbols are non-empty and carry no digits, whitespace, operators or
/// brackets, so that they never interfere with the literal grammar.
pub fn check_symbol(symbol: &str) -> Result<(), &'static str> {
    if symbol.is_empty() {
        return Err("symbol is empty");
    }
    if symbol.chars().any(|c| c.is_ascii_digit()) {
        return Err("symbol contains a digit");
    }
    if symbol.chars().any(char::is_whitespace) {
        return Err("symbol contains whitespace");
    }
    if symbol.chars().any(|c| RESERVED.contains(&c)) {
        return Err("symbol contains an operator or bracket");
    }
    Ok(())
}

/// Exponent signature of a physical quantity
///
/// Canonical form: symbols with exponent zero are never stored, so derived
/// equality is structural equality of the physical kind. No stored numerator
/// is `i32::MIN`, so negation and `abs` never overflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, Exponent>", into = "BTreeMap<String, Exponent>")]
pub struct DimensionVector {
    powers: BTreeMap<String, Exponent>,
}

impl DimensionVector {
    /// Dimensionless (empty mapping), the identity of [`combine`](Self::combine)
    pub const DIMENSIONLESS: DimensionVector = DimensionVector { powers: BTreeMap::new() };

    /// Singleton vector `{symbol: 1}`
    pub fn base(symbol: &str) -> Self {
        let mut powers = BTreeMap::new();
        powers.insert(symbol.to_string(), Exponent::from_integer(1));
        DimensionVector { powers }
    }

    /// Build from (symbol, exponent) pairs; repeated symbols are summed
    pub fn from_powers<S, I>(pairs: I) -> Result<Self, UnitError>
    where
        S: Into<String>,
        I: IntoIterator<Item = (S, Exponent)>,
    {
        let mut powers: BTreeMap<String, Exponent> = BTreeMap::new();
        for (symbol, power) in pairs {
            add_power(&mut powers, symbol.into(), power)?;
        }
        powers.retain(|_, p| !p.is_zero());
        Ok(DimensionVector { powers })
    }

    pub fn is_dimensionless(&self) -> bool {
        self.powers.is_empty()
    }

    /// Exponent of `symbol` (zero when absent)
    pub fn power(&self, symbol: &str) -> Exponent {
        self.powers.get(symbol).copied().unwrap_or_else(Exponent::zero)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Exponent)> {
        self.powers.iter().map(|(s, p)| (s.as_str(), *p))
    }

    /// Number of symbols with a nonzero exponent
    pub fn len(&self) -> usize {
        self.powers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.powers.is_empty()
    }

    /// Exponentwise sum (dimension of a product)
    pub fn combine(&self, other: &DimensionVector) -> Result<DimensionVector, UnitError> {
        let mut powers = self.powers.clone();
        for (symbol, power) in &other.powers {
            add_power(&mut powers, symbol.clone(), *power)?;
        }
        powers.retain(|_, p| !p.is_zero());
        Ok(DimensionVector { powers })
    }

    /// Exponentwise negation (dimension of a reciprocal)
    pub fn invert(&self) -> DimensionVector {
        DimensionVector {
            powers: self.powers.iter().map(|(s, p)| (s.clone(), -*p)).collect(),
        }
    }

    /// Dimension of a quotient
    pub fn divide(&self, other: &DimensionVector) -> Result<DimensionVector, UnitError> {
        self.combine(&other.invert())
    }

    /// Exponentwise multiply by a rational power (dimension of `x^p`)
    pub fn scale(&self, power: Exponent) -> Result<DimensionVector, UnitError> {
        if power.is_zero() {
            return Ok(DimensionVector::DIMENSIONLESS);
        }
        let powers = self
            .powers
            .iter()
            .map(|(s, p)| {
                let scaled = p.checked_mul(&power).filter(representable);
                scaled.map(|p| (s.clone(), p)).ok_or_else(|| UnitError::ExponentOverflow(s.clone()))
            })
            .collect::<Result<_, _>>()?;
        Ok(DimensionVector { powers })
    }

    /// Canonical name without brackets, e.g. `M*L/T^2`
    ///
    /// Factors are ordered by exponent, then symbol, both descending.
    pub fn name(&self) -> String {
        let mut factors: Vec<(&String, &Exponent)> = self.powers.iter().collect();
        factors.sort_by(|a, b| b.1.cmp(a.1).then_with(|| b.0.cmp(a.0)));

        let mut name = String::new();
        for (symbol, power) in factors {
            if power.is_positive() {
                if !name.is_empty() {
                    name.push('*');
                }
            } else {
                name.push('/');
            }
            name.push_str(symbol);
            let magnitude = power.abs();
            if magnitude != Exponent::from_integer(1) {
                name.push('^');
                name.push_str(&format_exponent(magnitude));
            }
        }
        name
    }
}

fn representable(power: &Exponent) -> bool {
    *power.numer() != i32::MIN
}

fn add_power(
    powers: &mut BTreeMap<String, Exponent>,
    symbol: String,
    power: Exponent,
) -> Result<(), UnitError> {
    let current = powers.get(&symbol).copied().unwrap_or_else(Exponent::zero);
    match current.checked_add(&power).filter(representable) {
        Some(sum) => {
            powers.insert(symbol, sum);
            Ok(())
        }
        None => Err(UnitError::ExponentOverflow(symbol)),
    }
}

impl TryFrom<BTreeMap<String, Exponent>> for DimensionVector {
    type Error = UnitError;

    fn try_from(powers: BTreeMap<String, Exponent>) -> Result<Self, Self::Error> {
        DimensionVector::from_powers(powers)
    }
}

impl From<DimensionVector> for BTreeMap<String, Exponent> {
    fn from(dimension: DimensionVector) -> Self {
        dimension.powers
    }
}

/// Render a nonnegative exponent as `n` or `n_d`
fn format_exponent(power: Exponent) -> String {
    if power.is_integer() {
        power.numer().to_string()
    } else {
        format!("{}_{}", power.numer(), power.denom())
    }
}

/// Parse `n`, `-n`, `n_d` or `-n_d`, each part at most [`EXPONENT_LIMIT`]
pub fn parse_exponent(text: &str) -> Option<Exponent> {
    let (numer, denom) = match text.split_once('_') {
        Some((n, d)) => (n, Some(d)),
        None => (text, None),
    };
    let digits = numer.strip_prefix('-').unwrap_or(numer);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let numer: i32 = numer.parse().ok()?;
    let denom: i32 = match denom {
        Some(d) if !d.is_empty() && d.chars().all(|c| c.is_ascii_digit()) => d.parse().ok()?,
        Some(_) => return None,
        None => 1,
    };
    if denom == 0 || numer.unsigned_abs() > EXPONENT_LIMIT.unsigned_abs() || denom > EXPONENT_LIMIT {
        return None;
    }
    Some(Exponent::new(numer, denom))
}

impl fmt::Display for DimensionVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.name())
    }
}

impl FromStr for DimensionVector {
    type Err = ParseError;

    /// Inverse of the canonical name, brackets optional: `[L/T]`, `M*L/T^2`, `/T`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let inner = trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .unwrap_or(trimmed);

        let mut pairs = Vec::new();
        for (i, part) in inner.split('*').enumerate() {
            for (j, factor) in part.split('/').enumerate() {
                if factor.is_empty() {
                    // Only "/T" (an empty numerator) or "" (dimensionless) may be empty
                    if i == 0 && j == 0 && (inner.is_empty() || part.starts_with('/')) {
                        continue;
                    }
                    return Err(ParseError::new(s, part, ParseErrorKind::DanglingOperator));
                }
                let (symbol, power) = match factor.split_once('^') {
                    Some((symbol, exp)) => {
                        let power = parse_exponent(exp)
                            .ok_or_else(|| ParseError::new(s, factor, ParseErrorKind::MalformedPower))?;
                        (symbol, power)
                    }
                    None => (factor, Exponent::from_integer(1)),
                };
                if check_symbol(symbol).is_err() {
                    return Err(ParseError::new(s, factor, ParseErrorKind::UnexpectedCharacter));
                }
                let power = if j == 0 { power } else { -power };
                pairs.push((symbol.to_string(), power));
            }
        }
        DimensionVector::from_powers(pairs)
            .map_err(|_| ParseError::new(s, inner, ParseErrorKind::MalformedPower))
    }
}
