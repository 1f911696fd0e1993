//! Quantity literal parsing - `"7μN*5h/6g"`, `"9.81m/s2"`, `"/s"`
//!
//! Grammar (whitespace between tokens is ignored):
//!
//! ```text
//! expr          := '/'? signed_factor ( ('*' | '/') factor )*
//! signed_factor := ('-' | '+')? factor
//! factor        := number? unit_token power?
//! power         := digits ('_' digits)? | '^' '-'? digits ('_' digits)?
//! ```
//!
//! Each factor contributes `number * scale^power`; a `/` divides by the
//! single factor that follows it. Numbers always attach to a unit.

use tracing::trace;
use physq_core::{
    parse_exponent, powr, DimensionVector, Exponent, ParseError, ParseErrorKind, UnitError,
};
use crate::quantity::Quantity;
use crate::registry::Registry;

/// Characters that end a unit token
const TOKEN_BREAK: &[char] = &['*', '/', '^', '_', '+', '-', '.', ','];

/// Parse `input` against `registry`
pub fn parse_quantity(registry: &Registry, input: &str) -> Result<Quantity<f64>, UnitError> {
    let mut cursor = Cursor::new(input);
    cursor.skip_whitespace();
    if cursor.at_end() {
        return Err(cursor.error(input, ParseErrorKind::Empty).into());
    }

    let mut divide = cursor.eat('/');
    let negative = match cursor.peek() {
        Some('-') => {
            cursor.bump();
            true
        }
        Some('+') => {
            cursor.bump();
            false
        }
        _ => false,
    };

    let mut scale = 1.0;
    let mut dimension = DimensionVector::DIMENSIONLESS;
    loop {
        cursor.skip_whitespace();
        let (factor_scale, factor_dimension) = parse_factor(registry, &mut cursor)?;
        if divide {
            scale /= factor_scale;
            dimension = dimension.divide(&factor_dimension)?;
        } else {
            scale *= factor_scale;
            dimension = dimension.combine(&factor_dimension)?;
        }

        cursor.skip_whitespace();
        let start = cursor.pos;
        match cursor.peek() {
            None => break,
            Some('*') => divide = false,
            Some('/') => divide = true,
            Some(_) => {
                let fragment = cursor.take_char();
                return Err(ParseError::new(input, fragment, ParseErrorKind::UnexpectedCharacter).into());
            }
        }
        cursor.bump();
        cursor.skip_whitespace();
        if cursor.at_end() {
            let operator = &input[start..start + 1];
            return Err(ParseError::new(input, operator, ParseErrorKind::DanglingOperator).into());
        }
    }

    if negative {
        scale = -scale;
    }
    trace!(input, scale, dimension = %dimension, "parsed quantity");
    Ok(Quantity::new(scale, dimension))
}

/// One `number? unit_token power?` factor as (scale, dimension)
fn parse_factor(registry: &Registry, cursor: &mut Cursor<'_>) -> Result<(f64, DimensionVector), UnitError> {
    let input = cursor.input;
    let start = cursor.pos;

    let number = parse_number(cursor)?;
    cursor.skip_whitespace();

    let token = cursor.take_while(|c| !(c.is_ascii_digit() || c.is_whitespace() || TOKEN_BREAK.contains(&c)));
    if token.is_empty() {
        let kind = match (number, cursor.peek()) {
            (Some(_), None) | (Some(_), Some('*')) | (Some(_), Some('/')) => {
                return Err(ParseError::new(input, &input[start..cursor.pos], ParseErrorKind::MissingUnit).into());
            }
            (None, None) => ParseErrorKind::DanglingOperator,
            (_, Some('*')) | (_, Some('/')) => ParseErrorKind::ExpectedUnit,
            _ => ParseErrorKind::UnexpectedCharacter,
        };
        let fragment = if cursor.at_end() { input.trim() } else { cursor.take_char() };
        return Err(ParseError::new(input, fragment, kind).into());
    }

    let power = parse_power(cursor)?;
    let (unit_scale, unit_dimension) = registry
        .lookup(token)
        .map_err(|_| ParseError::new(input, token, ParseErrorKind::UnknownUnit))?;

    let factor_scale = number.unwrap_or(1.0) * powr(unit_scale, power);
    let factor_dimension = unit_dimension.scale(power)?;
    trace!(token, %power, factor_scale, "resolved factor");
    Ok((factor_scale, factor_dimension))
}

/// Optional decimal or scientific number; the exponent is only taken when
/// digits follow the `e`, so `2eV` reads as two electronvolts
fn parse_number(cursor: &mut Cursor<'_>) -> Result<Option<f64>, UnitError> {
    let input = cursor.input;
    let start = cursor.pos;
    let starts_number = match cursor.peek() {
        Some(c) if c.is_ascii_digit() => true,
        Some('.') => cursor.peek_nth(1).is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    };
    if !starts_number {
        return Ok(None);
    }

    cursor.take_while(|c| c.is_ascii_digit());
    if cursor.eat('.') {
        cursor.take_while(|c| c.is_ascii_digit());
    }
    if matches!(cursor.peek(), Some('e') | Some('E')) {
        let exponent_digits = match cursor.peek_nth(1) {
            Some(c) if c.is_ascii_digit() => true,
            Some('-') | Some('+') => cursor.peek_nth(2).is_some_and(|c| c.is_ascii_digit()),
            _ => false,
        };
        if exponent_digits {
            cursor.bump();
            if matches!(cursor.peek(), Some('-') | Some('+')) {
                cursor.bump();
            }
            cursor.take_while(|c| c.is_ascii_digit());
        }
    }

    let text = &input[start..cursor.pos];
    if cursor.peek() == Some('.') {
        cursor.bump();
        return Err(ParseError::new(input, &input[start..cursor.pos], ParseErrorKind::MalformedNumber).into());
    }
    text.parse::<f64>()
        .map(Some)
        .map_err(|_| ParseError::new(input, text, ParseErrorKind::MalformedNumber).into())
}

/// Optional `2`, `1_2`, `^-1` or `^3_2` power suffix
fn parse_power(cursor: &mut Cursor<'_>) -> Result<Exponent, UnitError> {
    let input = cursor.input;
    let start = cursor.pos;
    let text_start = match cursor.peek() {
        Some('^') => {
            cursor.bump();
            let text_start = cursor.pos;
            cursor.eat('-');
            text_start
        }
        Some(c) if c.is_ascii_digit() => start,
        Some('_') => {
            cursor.bump();
            return Err(ParseError::new(input, &input[start..cursor.pos], ParseErrorKind::MalformedPower).into());
        }
        _ => return Ok(Exponent::from_integer(1)),
    };

    cursor.take_while(|c| c.is_ascii_digit());
    if cursor.eat('_') {
        cursor.take_while(|c| c.is_ascii_digit());
    }
    parse_exponent(&input[text_start..cursor.pos])
        .ok_or_else(|| ParseError::new(input, &input[start..cursor.pos], ParseErrorKind::MalformedPower).into())
}

/// Character cursor over the literal, positions are byte offsets
struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Cursor { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Consume one character and return it as a slice
    fn take_char(&mut self) -> &'a str {
        let start = self.pos;
        self.bump();
        &self.input[start..self.pos]
    }

    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !keep(c) {
                break;
            }
            self.bump();
        }
        &self.input[start..self.pos]
    }

    fn skip_whitespace(&mut self) {
        self.take_while(char::is_whitespace);
    }

    fn error(&self, fragment: &str, kind: ParseErrorKind) -> ParseError {
        ParseError::new(self.input, fragment, kind)
    }
}
