//! Numeric payload contract
//!
//! A quantity stores an opaque payload. Whatever the payload is (a plain
//! `f64`, a matrix from an array library, ...) it has to implement
//! [`Payload`]: a single entry point that runs an [`Op`] natively on
//! unwrapped arguments, plus shape introspection. Dimension bookkeeping never
//! reaches the payload; it is done before `apply` is called.

use std::fmt;
use crate::dimension::Exponent;
use crate::error::PayloadError;

/// Elementwise comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
}

impl Comparison {
    pub fn name(&self) -> &'static str {
        match self {
            Comparison::Lt => "lt",
            Comparison::Le => "le",
            Comparison::Eq => "eq",
            Comparison::Ne => "ne",
            Comparison::Gt => "gt",
            Comparison::Ge => "ge",
        }
    }

    pub fn holds(&self, a: f64, b: f64) -> bool {
        match self {
            Comparison::Lt => a < b,
            Comparison::Le => a <= b,
            Comparison::Eq => a == b,
            Comparison::Ne => a != b,
            Comparison::Gt => a > b,
            Comparison::Ge => a >= b,
        }
    }
}

/// Operation a payload backend may be asked to run
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    // Binary arithmetic
    Add,
    Sub,
    Hypot,
    Mul,
    MatMul,
    Div,
    Pow(Exponent),
    Sqrt,

    // Unary, dimension preserving
    Neg,
    Abs,

    // Reductions
    Sum,
    Mean,
    Min,
    Max,
    Ptp,
    Trace,

    // Shape manipulation
    Transpose,
    Reshape(Vec<usize>),
    BroadcastTo(Vec<usize>),
    /// Elements at flat (row-major) positions
    Take(Vec<usize>),
    /// Single element at a flat position
    Index(usize),
    /// Copy with the element at a flat position replaced
    Set(usize),
    Concatenate,

    // Predicates
    Compare(Comparison),
    IsFinite,
    IsNan,

    /// Backend specific operation, needs a registered dimension rule
    Custom(String),
}

impl Op {
    pub fn name(&self) -> &str {
        match self {
            Op::Add => "add",
            Op::Sub => "subtract",
            Op::Hypot => "hypot",
            Op::Mul => "multiply",
            Op::MatMul => "matmul",
            Op::Div => "divide",
            Op::Pow(_) => "power",
            Op::Sqrt => "sqrt",
            Op::Neg => "negative",
            Op::Abs => "absolute",
            Op::Sum => "sum",
            Op::Mean => "mean",
            Op::Min => "min",
            Op::Max => "max",
            Op::Ptp => "ptp",
            Op::Trace => "trace",
            Op::Transpose => "transpose",
            Op::Reshape(_) => "reshape",
            Op::BroadcastTo(_) => "broadcast_to",
            Op::Take(_) => "take",
            Op::Index(_) => "getitem",
            Op::Set(_) => "setitem",
            Op::Concatenate => "concatenate",
            Op::Compare(c) => c.name(),
            Op::IsFinite => "isfinite",
            Op::IsNan => "isnan",
            Op::Custom(name) => name.as_str(),
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unwrapped argument handed to a backend
#[derive(Debug, Clone, PartialEq)]
pub enum Arg<V> {
    Value(V),
    /// Plain number, broadcast by the backend where needed
    Scalar(f64),
}

/// Result of a native operation
#[derive(Debug, Clone, PartialEq)]
pub enum Native<V: Payload> {
    Value(V),
    Scalar(f64),
    Mask(V::Mask),
}

impl<V: Payload> Native<V> {
    pub fn into_value(self, op: &Op) -> Result<V, PayloadError> {
        match self {
            Native::Value(v) => Ok(v),
            _ => Err(PayloadError::invalid(op.name(), "backend did not return a payload value")),
        }
    }

    pub fn into_scalar(self, op: &Op) -> Result<f64, PayloadError> {
        match self {
            Native::Scalar(x) => Ok(x),
            _ => Err(PayloadError::invalid(op.name(), "backend did not return a scalar")),
        }
    }

    pub fn into_mask(self, op: &Op) -> Result<V::Mask, PayloadError> {
        match self {
            Native::Mask(m) => Ok(m),
            _ => Err(PayloadError::invalid(op.name(), "backend did not return a mask")),
        }
    }
}

/// Capability interface a quantity payload must satisfy
pub trait Payload: Clone + fmt::Debug + Sized {
    /// Result of elementwise predicates (`bool` for scalars)
    type Mask: Clone + fmt::Debug + PartialEq;

    /// Backend name used in error messages
    const BACKEND: &'static str;

    /// Run `op` natively on unwrapped arguments
    fn apply(op: &Op, args: Vec<Arg<Self>>) -> Result<Native<Self>, PayloadError>;

    fn shape(&self) -> Vec<usize>;

    /// Elements in row-major order
    fn elements(&self) -> Vec<f64>;

    fn size(&self) -> usize {
        self.shape().iter().product()
    }

    fn ndim(&self) -> usize {
        self.shape().len()
    }
}

/// Exponent as a float, exact for integers
pub fn exponent_to_f64(power: Exponent) -> f64 {
    f64::from(*power.numer()) / f64::from(*power.denom())
}

/// `base^power`, using integer powers where possible
pub fn powr(base: f64, power: Exponent) -> f64 {
    if power.is_integer() {
        base.powi(*power.numer())
    } else {
        base.powf(exponent_to_f64(power))
    }
}

/// Check argument count
pub fn expect_arity<V>(op: &Op, args: &[Arg<V>], count: usize) -> Result<(), PayloadError> {
    if args.len() != count {
        return Err(PayloadError::invalid(
            op.name(),
            format!("expected {} arguments, got {}", count, args.len()),
        ));
    }
    Ok(())
}

fn scalar(arg: &Arg<f64>) -> f64 {
    match arg {
        Arg::Value(v) => *v,
        Arg::Scalar(x) => *x,
    }
}

fn unary(op: &Op, args: &[Arg<f64>]) -> Result<f64, PayloadError> {
    expect_arity(op, args, 1)?;
    Ok(scalar(&args[0]))
}

fn binary(op: &Op, args: &[Arg<f64>]) -> Result<(f64, f64), PayloadError> {
    expect_arity(op, args, 2)?;
    Ok((scalar(&args[0]), scalar(&args[1])))
}

/// Scalar backend
impl Payload for f64 {
    type Mask = bool;

    const BACKEND: &'static str = "scalar";

    fn apply(op: &Op, args: Vec<Arg<f64>>) -> Result<Native<f64>, PayloadError> {
        let value = match op {
            Op::Add => binary(op, &args).map(|(a, b)| a + b)?,
            Op::Sub => binary(op, &args).map(|(a, b)| a - b)?,
            Op::Hypot => binary(op, &args).map(|(a, b)| a.hypot(b))?,
            Op::Mul => binary(op, &args).map(|(a, b)| a * b)?,
            Op::Div => binary(op, &args).map(|(a, b)| a / b)?,
            Op::Pow(power) => powr(unary(op, &args)?, *power),
            Op::Sqrt => unary(op, &args)?.sqrt(),
            Op::Neg => -unary(op, &args)?,
            Op::Abs => unary(op, &args)?.abs(),
            Op::Sum | Op::Mean | Op::Min | Op::Max => {
                return Ok(Native::Scalar(unary(op, &args)?));
            }
            Op::Ptp => {
                unary(op, &args)?;
                return Ok(Native::Scalar(0.0));
            }
            Op::Transpose => unary(op, &args)?,
            Op::Compare(comparison) => {
                let (a, b) = binary(op, &args)?;
                return Ok(Native::Mask(comparison.holds(a, b)));
            }
            Op::IsFinite => return Ok(Native::Mask(unary(op, &args)?.is_finite())),
            Op::IsNan => return Ok(Native::Mask(unary(op, &args)?.is_nan())),
            _ => {
                return Err(PayloadError::Unsupported {
                    op: op.name().to_string(),
                    backend: Self::BACKEND,
                })
            }
        };
        Ok(Native::Value(value))
    }

    fn shape(&self) -> Vec<usize> {
        Vec::new()
    }

    fn elements(&self) -> Vec<f64> {
        vec![*self]
    }
}
