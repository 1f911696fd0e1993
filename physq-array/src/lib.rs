//! physq Array - nalgebra payload backend
//!
//! Lets dimensioned quantities carry whole matrices:
//! - Elementwise arithmetic with scalar broadcasting
//! - Matrix product, transpose, reshape, broadcast
//! - Reductions (sum, mean, min, max, ptp, trace)
//! - Row-major take / getitem / setitem, vertical concatenation
//! - Comparison and NaN / finiteness masks as `DMatrix<bool>`
//!
//! Dimension bookkeeping stays in `physq-units`; this crate only runs the
//! numeric side of each operation.

mod backend;
mod matrix;

pub use matrix::Matrix;

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;
    use physq_core::{codes, Comparison, DimensionVector, UnitError};
    use physq_units::{Dispatcher, Operand, Outcome, Quantity};

    fn lengths(values: &[f64]) -> Quantity<Matrix> {
        Quantity::with_unit(Matrix::row(values), "m").unwrap()
    }

    #[test]
    fn test_quantity_with_unit() {
        let q = Quantity::with_unit(Matrix::row(&[1.0, 2.5]), "km").unwrap();
        assert_eq!(q.in_units("m").unwrap().row_major(), vec![1000.0, 2500.0]);
        assert_eq!(q.shape(), vec![1, 2]);
        assert_eq!(q.size(), 2);
        assert_eq!(q.ndim(), 2);
    }

    #[test]
    fn test_add_requires_equal_dimensions() {
        let a = lengths(&[1.0, 2.0]);
        let b = Quantity::with_unit(Matrix::row(&[1.0, 1.0]), "km").unwrap();
        let sum = a.try_add(&b).unwrap();
        assert_eq!(sum.in_units("m").unwrap().row_major(), vec![1001.0, 1002.0]);

        let t = Quantity::with_unit(Matrix::row(&[1.0, 1.0]), "s").unwrap();
        let err = a.try_add(&t).unwrap_err();
        assert_eq!(err.code(), codes::DIMENSION_MISMATCH);
    }

    #[test]
    fn test_shape_mismatch_surfaces() {
        let a = lengths(&[1.0, 2.0]);
        let b = lengths(&[1.0, 2.0, 3.0]);
        let err = a.try_add(&b).unwrap_err();
        assert_eq!(err.code(), codes::SHAPE_MISMATCH);
    }

    #[test]
    fn test_matmul_combines_dimensions() {
        let force = Quantity::with_unit(Matrix::from_rows(&[vec![1.0, 0.0], vec![0.0, 2.0]]).unwrap(), "N").unwrap();
        let distance = Quantity::with_unit(Matrix::column(&[3.0, 4.0]), "m").unwrap();
        let work = force.matmul(&distance).unwrap();
        assert_eq!(*work.dimension(), "M*L^2/T^2".parse().unwrap());
        assert_eq!(work.in_units("J").unwrap().row_major(), vec![3.0, 8.0]);
    }

    #[test]
    fn test_scalar_quantity_operand() {
        let a = lengths(&[2.0, 4.0]);
        let per_second = a.try_div(Operand::Literal("2s")).unwrap();
        assert_eq!(*per_second.dimension(), "L/T".parse().unwrap());
        let area = a.try_mul(Quantity::with_unit(3.0_f64, "m").unwrap()).unwrap();
        assert_eq!(area.in_units("m2").unwrap().row_major(), vec![6.0, 12.0]);
    }

    #[test]
    fn test_reductions_are_scalar_quantities() {
        let a = lengths(&[1.0, 2.0, 6.0]);
        assert_eq!(a.sum().unwrap().to_string(), "9[L]");
        assert_eq!(a.mean().unwrap().to_string(), "3[L]");
        assert_eq!(a.max().unwrap().to_string(), "6[L]");
        assert_eq!(a.ptp().unwrap().to_string(), "5[L]");
    }

    #[test]
    fn test_sqrt_halves_dimension() {
        let area = Quantity::with_unit(Matrix::row(&[4.0, 9.0]), "m2").unwrap();
        let side = area.sqrt().unwrap();
        assert_eq!(*side.dimension(), DimensionVector::base("L"));
        assert_eq!(side.in_units("m").unwrap().row_major(), vec![2.0, 3.0]);
    }

    #[test]
    fn test_compare_mask() {
        let a = lengths(&[500.0, 1500.0]);
        let mask = a.compare(Comparison::Gt, "1km").unwrap();
        assert_eq!(mask, DMatrix::from_row_slice(1, 2, &[false, true]));
        assert!(matches!(
            a.compare(Comparison::Gt, "1s"),
            Err(UnitError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_shape_ops_keep_dimension() {
        let a = lengths(&[1.0, 2.0, 3.0, 4.0]);
        let grid = a.reshape(&[2, 2]).unwrap();
        assert_eq!(grid.shape(), vec![2, 2]);
        assert_eq!(*grid.transpose().unwrap().dimension(), DimensionVector::base("L"));
        assert_eq!(grid.trace().unwrap().to_string(), "5[L]");
        assert_eq!(grid.index(2).unwrap().to_string(), "3[L]");
        let picked = grid.take(&[3]).unwrap();
        assert_eq!(picked.in_units("m").unwrap().row_major(), vec![4.0]);
    }

    #[test]
    fn test_with_item() {
        let a = lengths(&[1.0, 2.0]);
        let updated = a.with_item(0, "1km").unwrap();
        assert_eq!(updated.in_units("m").unwrap().row_major(), vec![1000.0, 2.0]);
        assert!(a.with_item(0, "1s").is_err());
    }

    #[test]
    fn test_concatenate() {
        let a = lengths(&[1.0, 2.0]);
        let b = Quantity::with_unit(Matrix::row(&[3.0, 4.0]), "km").unwrap();
        let stacked = Quantity::concatenate(&[a.clone(), b]).unwrap();
        assert_eq!(stacked.shape(), vec![2, 2]);
        let t = Quantity::with_unit(Matrix::row(&[3.0, 4.0]), "s").unwrap();
        assert!(Quantity::concatenate(&[a, t]).is_err());
    }

    #[test]
    fn test_display_matrix_quantity() {
        let speeds = Quantity::with_unit(Matrix::row(&[1.0, 2.5]), "m/s").unwrap();
        assert_eq!(speeds.to_string(), "[[1, 2.5]][L/T]");
        let grid = Quantity::with_unit(Matrix::column(&[1.0, 2.0]), "km").unwrap();
        assert_eq!(format!("{:.1}", grid), "[[1000.0], [2000.0]][L]");
    }

    #[test]
    fn test_iter_elements() {
        let a = lengths(&[1.0, 2.0]);
        let items: Vec<String> = a.iter().map(|q| q.to_string()).collect();
        assert_eq!(items, vec!["1[L]", "2[L]"]);
    }

    #[test]
    fn test_dispatch_unwraps_dimensionless() {
        let a = lengths(&[2.0, 4.0]);
        let b = lengths(&[1.0, 2.0]);
        let outcome = Dispatcher::global()
            .call(&physq_core::Op::Div, vec![Operand::from(&a), Operand::from(&b)])
            .unwrap();
        match outcome {
            Outcome::Value(ratio) => assert_eq!(ratio.row_major(), vec![2.0, 2.0]),
            other => panic!("expected a raw value, got {other:?}"),
        }
    }
}
