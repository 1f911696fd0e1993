//! Payload contract for [`Matrix`]
//!
//! Elementwise operations broadcast plain scalars; two matrices must have the
//! same shape. Flat positions (`take`, `getitem`, `setitem`) are row-major.

use nalgebra::{DMatrix, Scalar};
use tracing::trace;
use physq_core::{expect_arity, powr, Arg, Native, Op, Payload, PayloadError};
use crate::matrix::Matrix;

impl Payload for Matrix {
    type Mask = DMatrix<bool>;

    const BACKEND: &'static str = "nalgebra";

    fn apply(op: &Op, args: Vec<Arg<Matrix>>) -> Result<Native<Matrix>, PayloadError> {
        trace!(op = op.name(), args = args.len(), "nalgebra apply");
        let value = match op {
            Op::Add => zip_with(op, args, |a, b| a + b)?,
            Op::Sub => zip_with(op, args, |a, b| a - b)?,
            Op::Hypot => zip_with(op, args, f64::hypot)?,
            Op::Mul => zip_with(op, args, |a, b| a * b)?,
            Op::Div => zip_with(op, args, |a, b| a / b)?,
            Op::MatMul => matmul(op, args)?,
            Op::Pow(power) => unary(op, args)?.map(|x| powr(x, *power)),
            Op::Sqrt => unary(op, args)?.map(f64::sqrt),
            Op::Neg => -unary(op, args)?,
            Op::Abs => unary(op, args)?.abs(),
            Op::Sum | Op::Mean | Op::Min | Op::Max | Op::Ptp | Op::Trace => {
                return reduce(op, unary(op, args)?).map(Native::Scalar);
            }
            Op::Transpose => unary(op, args)?.transpose(),
            Op::Reshape(shape) => reshape(op, unary(op, args)?, shape)?,
            Op::BroadcastTo(shape) => broadcast(op, unary(op, args)?, shape)?,
            Op::Take(indices) => {
                let elements = row_major(&unary(op, args)?);
                let picked = indices
                    .iter()
                    .map(|&i| element(op, &elements, i))
                    .collect::<Result<Vec<f64>, _>>()?;
                DMatrix::from_row_slice(1, picked.len(), &picked)
            }
            Op::Index(index) => {
                let elements = row_major(&unary(op, args)?);
                return element(op, &elements, *index).map(Native::Scalar);
            }
            Op::Set(index) => set_item(op, args, *index)?,
            Op::Concatenate => concatenate(op, args)?,
            Op::Compare(comparison) => {
                return zip_with(op, args, |a, b| comparison.holds(a, b)).map(Native::Mask);
            }
            Op::IsFinite => return Ok(Native::Mask(unary(op, args)?.map(f64::is_finite))),
            Op::IsNan => return Ok(Native::Mask(unary(op, args)?.map(f64::is_nan))),
            Op::Custom(_) => {
                return Err(PayloadError::Unsupported {
                    op: op.name().to_string(),
                    backend: Self::BACKEND,
                })
            }
        };
        Ok(Native::Value(Matrix::from_dmatrix(value)))
    }

    fn shape(&self) -> Vec<usize> {
        vec![self.rows(), self.cols()]
    }

    fn elements(&self) -> Vec<f64> {
        self.row_major()
    }
}

fn shape_of(data: &DMatrix<f64>) -> Vec<usize> {
    vec![data.nrows(), data.ncols()]
}

fn row_major(data: &DMatrix<f64>) -> Vec<f64> {
    data.transpose().iter().copied().collect()
}

fn element(op: &Op, elements: &[f64], index: usize) -> Result<f64, PayloadError> {
    elements.get(index).copied().ok_or_else(|| {
        PayloadError::invalid(
            op.name(),
            format!("index {} out of bounds for {} elements", index, elements.len()),
        )
    })
}

/// Single matrix argument
fn unary(op: &Op, args: Vec<Arg<Matrix>>) -> Result<DMatrix<f64>, PayloadError> {
    expect_arity(op, &args, 1)?;
    match args.into_iter().next() {
        Some(Arg::Value(m)) => Ok(m.into_dmatrix()),
        _ => Err(PayloadError::invalid(op.name(), "expected an array argument")),
    }
}

/// Elementwise binary operation, broadcasting scalars
fn zip_with<T: Scalar>(
    op: &Op,
    args: Vec<Arg<Matrix>>,
    f: impl Fn(f64, f64) -> T,
) -> Result<DMatrix<T>, PayloadError> {
    expect_arity(op, &args, 2)?;
    let mut args = args.into_iter();
    match (args.next(), args.next()) {
        (Some(Arg::Value(a)), Some(Arg::Value(b))) => {
            if a.data.shape() != b.data.shape() {
                return Err(PayloadError::ShapeMismatch {
                    op: op.name().to_string(),
                    left: shape_of(&a.data),
                    right: shape_of(&b.data),
                });
            }
            Ok(a.data.zip_map(&b.data, |x, y| f(x, y)))
        }
        (Some(Arg::Value(a)), Some(Arg::Scalar(s))) => Ok(a.data.map(|x| f(x, s))),
        (Some(Arg::Scalar(s)), Some(Arg::Value(b))) => Ok(b.data.map(|y| f(s, y))),
        (Some(Arg::Scalar(s)), Some(Arg::Scalar(t))) => Ok(DMatrix::from_element(1, 1, f(s, t))),
        _ => Err(PayloadError::invalid(op.name(), "expected 2 arguments")),
    }
}

fn matmul(op: &Op, args: Vec<Arg<Matrix>>) -> Result<DMatrix<f64>, PayloadError> {
    expect_arity(op, &args, 2)?;
    let mut args = args.into_iter();
    match (args.next(), args.next()) {
        (Some(Arg::Value(a)), Some(Arg::Value(b))) => {
            if a.cols() != b.rows() {
                return Err(PayloadError::ShapeMismatch {
                    op: op.name().to_string(),
                    left: shape_of(&a.data),
                    right: shape_of(&b.data),
                });
            }
            Ok(&a.data * &b.data)
        }
        _ => Err(PayloadError::invalid(op.name(), "matrix product needs two arrays")),
    }
}

fn reduce(op: &Op, data: DMatrix<f64>) -> Result<f64, PayloadError> {
    if data.is_empty() {
        return Err(PayloadError::invalid(op.name(), "empty array"));
    }
    let min = || data.iter().copied().fold(f64::INFINITY, f64::min);
    let max = || data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let result = match op {
        Op::Sum => data.sum(),
        Op::Mean => data.sum() / data.len() as f64,
        Op::Min => min(),
        Op::Max => max(),
        Op::Ptp => max() - min(),
        Op::Trace => {
            if !data.is_square() {
                return Err(PayloadError::invalid(
                    op.name(),
                    format!("matrix must be square, got {}x{}", data.nrows(), data.ncols()),
                ));
            }
            data.trace()
        }
        _ => return Err(PayloadError::invalid(op.name(), "not a reduction")),
    };
    Ok(result)
}

/// `[n]` reads as a 1 x n row, `[r, c]` as is
fn target_shape(op: &Op, shape: &[usize]) -> Result<(usize, usize), PayloadError> {
    match *shape {
        [n] => Ok((1, n)),
        [rows, cols] => Ok((rows, cols)),
        _ => Err(PayloadError::invalid(
            op.name(),
            format!("{}-dimensional shapes are not supported", shape.len()),
        )),
    }
}

fn reshape(op: &Op, data: DMatrix<f64>, shape: &[usize]) -> Result<DMatrix<f64>, PayloadError> {
    let (rows, cols) = target_shape(op, shape)?;
    if rows.checked_mul(cols) != Some(data.len()) {
        return Err(PayloadError::ShapeMismatch {
            op: op.name().to_string(),
            left: shape_of(&data),
            right: shape.to_vec(),
        });
    }
    Ok(DMatrix::from_row_slice(rows, cols, &row_major(&data)))
}

fn broadcast(op: &Op, data: DMatrix<f64>, shape: &[usize]) -> Result<DMatrix<f64>, PayloadError> {
    let (rows, cols) = target_shape(op, shape)?;
    let (src_rows, src_cols) = data.shape();
    let fits = |src: usize, dst: usize| src == dst || src == 1;
    if !(fits(src_rows, rows) && fits(src_cols, cols)) {
        return Err(PayloadError::ShapeMismatch {
            op: op.name().to_string(),
            left: shape_of(&data),
            right: shape.to_vec(),
        });
    }
    Ok(DMatrix::from_fn(rows, cols, |r, c| {
        data[(if src_rows == 1 { 0 } else { r }, if src_cols == 1 { 0 } else { c })]
    }))
}

fn set_item(op: &Op, args: Vec<Arg<Matrix>>, index: usize) -> Result<DMatrix<f64>, PayloadError> {
    expect_arity(op, &args, 2)?;
    let mut args = args.into_iter();
    let (mut data, item) = match (args.next(), args.next()) {
        (Some(Arg::Value(m)), Some(Arg::Scalar(x))) => (m.into_dmatrix(), x),
        (Some(Arg::Value(m)), Some(Arg::Value(v))) if v.data.len() == 1 => (m.into_dmatrix(), v.data[0]),
        _ => return Err(PayloadError::invalid(op.name(), "expected an array and a single value")),
    };
    let cols = data.ncols();
    if index >= data.len() {
        return Err(PayloadError::invalid(
            op.name(),
            format!("index {} out of bounds for {} elements", index, data.len()),
        ));
    }
    data[(index / cols, index % cols)] = item;
    Ok(data)
}

/// Stack arrays with equal column counts on top of each other
fn concatenate(op: &Op, args: Vec<Arg<Matrix>>) -> Result<DMatrix<f64>, PayloadError> {
    let mut parts = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            Arg::Value(m) => parts.push(m.into_dmatrix()),
            Arg::Scalar(_) => return Err(PayloadError::invalid(op.name(), "cannot concatenate a scalar")),
        }
    }
    let Some(first) = parts.first() else {
        return Err(PayloadError::invalid(op.name(), "nothing to concatenate"));
    };
    let cols = first.ncols();
    if let Some(bad) = parts.iter().find(|p| p.ncols() != cols) {
        return Err(PayloadError::ShapeMismatch {
            op: op.name().to_string(),
            left: shape_of(first),
            right: shape_of(bad),
        });
    }
    let rows = parts.iter().map(|p| p.nrows()).sum();
    let elements: Vec<f64> = parts.iter().flat_map(row_major).collect();
    Ok(DMatrix::from_row_slice(rows, cols, &elements))
}

#[cfg(test)]
mod tests {
    use super::*;
    use physq_core::{Comparison, Exponent};

    fn m(rows: &[Vec<f64>]) -> Matrix {
        Matrix::from_rows(rows).unwrap()
    }

    fn values(args: Vec<Matrix>) -> Vec<Arg<Matrix>> {
        args.into_iter().map(Arg::Value).collect()
    }

    fn value(native: Native<Matrix>) -> Matrix {
        match native {
            Native::Value(v) => v,
            other => panic!("expected a value, got {other:?}"),
        }
    }

    #[test]
    fn test_elementwise() {
        let a = m(&[vec![1.0, 2.0], vec![3.0, 4.0]]);
        let b = m(&[vec![10.0, 20.0], vec![30.0, 40.0]]);
        let sum = value(Matrix::apply(&Op::Add, values(vec![a.clone(), b.clone()])).unwrap());
        assert_eq!(sum.row_major(), vec![11.0, 22.0, 33.0, 44.0]);
        let quotient = value(Matrix::apply(&Op::Div, values(vec![b, a])).unwrap());
        assert_eq!(quotient.row_major(), vec![10.0; 4]);
    }

    #[test]
    fn test_scalar_broadcast() {
        let a = m(&[vec![1.0, 2.0, 3.0]]);
        let scaled = value(Matrix::apply(&Op::Mul, vec![Arg::Value(a.clone()), Arg::Scalar(2.0)]).unwrap());
        assert_eq!(scaled.row_major(), vec![2.0, 4.0, 6.0]);
        let flipped = value(Matrix::apply(&Op::Sub, vec![Arg::Scalar(10.0), Arg::Value(a)]).unwrap());
        assert_eq!(flipped.row_major(), vec![9.0, 8.0, 7.0]);
    }

    #[test]
    fn test_shape_mismatch() {
        let a = m(&[vec![1.0, 2.0]]);
        let b = m(&[vec![1.0], vec![2.0]]);
        let err = Matrix::apply(&Op::Add, values(vec![a, b])).unwrap_err();
        assert!(matches!(err, PayloadError::ShapeMismatch { ref left, ref right, .. }
            if *left == vec![1, 2] && *right == vec![2, 1]));
    }

    #[test]
    fn test_matmul() {
        let a = m(&[vec![1.0, 2.0], vec![3.0, 4.0]]);
        let b = Matrix::column(&[1.0, 1.0]);
        let product = value(Matrix::apply(&Op::MatMul, values(vec![a.clone(), b])).unwrap());
        assert_eq!(product.row_major(), vec![3.0, 7.0]);
        let err = Matrix::apply(&Op::MatMul, values(vec![Matrix::row(&[1.0, 2.0, 3.0]), a])).unwrap_err();
        assert!(matches!(err, PayloadError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_power() {
        let a = m(&[vec![4.0, 9.0]]);
        let squared = value(Matrix::apply(&Op::Pow(Exponent::from_integer(2)), values(vec![a.clone()])).unwrap());
        assert_eq!(squared.row_major(), vec![16.0, 81.0]);
        let root = value(Matrix::apply(&Op::Sqrt, values(vec![a])).unwrap());
        assert_eq!(root.row_major(), vec![2.0, 3.0]);
    }

    #[test]
    fn test_reductions() {
        let a = m(&[vec![1.0, 5.0], vec![-2.0, 4.0]]);
        let run = |op: Op| match Matrix::apply(&op, values(vec![a.clone()])).unwrap() {
            Native::Scalar(x) => x,
            other => panic!("expected a scalar, got {other:?}"),
        };
        assert_eq!(run(Op::Sum), 8.0);
        assert_eq!(run(Op::Mean), 2.0);
        assert_eq!(run(Op::Min), -2.0);
        assert_eq!(run(Op::Max), 5.0);
        assert_eq!(run(Op::Ptp), 7.0);
        assert_eq!(run(Op::Trace), 5.0);
    }

    #[test]
    fn test_reduction_errors() {
        let empty = Matrix::from_dmatrix(DMatrix::zeros(0, 0));
        assert!(Matrix::apply(&Op::Sum, values(vec![empty])).is_err());
        let wide = Matrix::row(&[1.0, 2.0]);
        assert!(Matrix::apply(&Op::Trace, values(vec![wide])).is_err());
    }

    #[test]
    fn test_reshape_row_major() {
        let a = Matrix::row(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let reshaped = value(Matrix::apply(&Op::Reshape(vec![2, 3]), values(vec![a.clone()])).unwrap());
        assert_eq!(reshaped.data[(1, 0)], 4.0);
        assert!(Matrix::apply(&Op::Reshape(vec![4, 2]), values(vec![a])).is_err());
    }

    #[test]
    fn test_broadcast() {
        let row = Matrix::row(&[1.0, 2.0]);
        let grid = value(Matrix::apply(&Op::BroadcastTo(vec![3, 2]), values(vec![row.clone()])).unwrap());
        assert_eq!(grid.row_major(), vec![1.0, 2.0, 1.0, 2.0, 1.0, 2.0]);
        assert!(Matrix::apply(&Op::BroadcastTo(vec![3, 3]), values(vec![row])).is_err());
    }

    #[test]
    fn test_take_index_set() {
        let a = m(&[vec![1.0, 2.0], vec![3.0, 4.0]]);
        let taken = value(Matrix::apply(&Op::Take(vec![3, 0]), values(vec![a.clone()])).unwrap());
        assert_eq!(taken.row_major(), vec![4.0, 1.0]);

        let item = Matrix::apply(&Op::Index(2), values(vec![a.clone()])).unwrap();
        assert_eq!(item, Native::Scalar(3.0));
        assert!(Matrix::apply(&Op::Index(4), values(vec![a.clone()])).is_err());

        let updated = value(Matrix::apply(&Op::Set(1), vec![Arg::Value(a), Arg::Scalar(9.0)]).unwrap());
        assert_eq!(updated.row_major(), vec![1.0, 9.0, 3.0, 4.0]);
    }

    #[test]
    fn test_concatenate() {
        let a = Matrix::row(&[1.0, 2.0]);
        let b = m(&[vec![3.0, 4.0], vec![5.0, 6.0]]);
        let stacked = value(Matrix::apply(&Op::Concatenate, values(vec![a.clone(), b])).unwrap());
        assert_eq!(stacked.shape(), vec![3, 2]);
        assert_eq!(stacked.row_major(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let err = Matrix::apply(&Op::Concatenate, values(vec![a, Matrix::column(&[1.0])])).unwrap_err();
        assert!(matches!(err, PayloadError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_masks() {
        let a = Matrix::row(&[1.0, f64::NAN, 3.0]);
        let lt = Matrix::apply(&Op::Compare(Comparison::Lt), vec![Arg::Value(a.clone()), Arg::Scalar(2.0)]).unwrap();
        assert_eq!(lt, Native::Mask(DMatrix::from_row_slice(1, 3, &[true, false, false])));
        let nan = Matrix::apply(&Op::IsNan, values(vec![a])).unwrap();
        assert_eq!(nan, Native::Mask(DMatrix::from_row_slice(1, 3, &[false, true, false])));
    }

    #[test]
    fn test_unsupported_custom() {
        let err = Matrix::apply(&Op::Custom("fft".into()), values(vec![Matrix::row(&[1.0])])).unwrap_err();
        assert!(matches!(err, PayloadError::Unsupported { backend: "nalgebra", .. }));
    }

    #[test]
    fn test_shape_metadata() {
        let a = m(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        assert_eq!(a.shape(), vec![2, 3]);
        assert_eq!(a.size(), 6);
        assert_eq!(a.ndim(), 2);
        assert_eq!(a.elements(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }
}
