//! Matrix payload type

use std::fmt;
use nalgebra::DMatrix;
use physq_core::PayloadError;

/// Dense f64 matrix used as a quantity payload
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    pub data: DMatrix<f64>,
}

impl Matrix {
    /// Create from nalgebra DMatrix
    pub fn from_dmatrix(data: DMatrix<f64>) -> Self {
        Matrix { data }
    }

    /// Create from nested rows, all of the same length
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, PayloadError> {
        let cols = rows.first().map_or(0, Vec::len);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(PayloadError::invalid(
                    "matrix",
                    format!("row {} has {} columns, expected {}", i, row.len(), cols),
                ));
            }
        }
        let elements: Vec<f64> = rows.iter().flatten().copied().collect();
        Ok(Matrix::from_dmatrix(DMatrix::from_row_slice(rows.len(), cols, &elements)))
    }

    /// Create from row-major elements; `elements` must hold `rows * cols` values
    pub fn from_row_slice(rows: usize, cols: usize, elements: &[f64]) -> Result<Self, PayloadError> {
        if rows.checked_mul(cols) != Some(elements.len()) {
            return Err(PayloadError::invalid(
                "matrix",
                format!("{} elements cannot fill a {}x{} matrix", elements.len(), rows, cols),
            ));
        }
        Ok(Matrix::from_dmatrix(DMatrix::from_row_slice(rows, cols, elements)))
    }

    /// 1 x n row vector
    pub fn row(elements: &[f64]) -> Self {
        Matrix::from_dmatrix(DMatrix::from_row_slice(1, elements.len(), elements))
    }

    /// n x 1 column vector
    pub fn column(elements: &[f64]) -> Self {
        Matrix::from_dmatrix(DMatrix::from_row_slice(elements.len(), 1, elements))
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Elements in row-major order
    pub fn row_major(&self) -> Vec<f64> {
        (0..self.rows())
            .flat_map(|r| (0..self.cols()).map(move |c| self.data[(r, c)]))
            .collect()
    }

    pub fn into_dmatrix(self) -> DMatrix<f64> {
        self.data
    }
}

impl From<DMatrix<f64>> for Matrix {
    fn from(data: DMatrix<f64>) -> Self {
        Matrix::from_dmatrix(data)
    }
}

/// Nested rows, `[[1, 2], [3, 4]]`; a precision applies to every element
impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for r in 0..self.rows() {
            if r > 0 {
                write!(f, ", ")?;
            }
            write!(f, "[")?;
            for c in 0..self.cols() {
                if c > 0 {
                    write!(f, ", ")?;
                }
                match f.precision() {
                    Some(precision) => write!(f, "{:.*}", precision, self.data[(r, c)])?,
                    None => write!(f, "{}", self.data[(r, c)])?,
                }
            }
            write!(f, "]")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows() {
        let m = Matrix::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        assert_eq!(m.rows(), 2);
        assert_eq!(m.cols(), 3);
        assert_eq!(m.data[(1, 0)], 4.0);
        assert_eq!(m.row_major(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_ragged_rows() {
        let err = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, PayloadError::InvalidArguments { .. }));
    }

    #[test]
    fn test_vectors() {
        assert_eq!(Matrix::row(&[1.0, 2.0]).data.shape(), (1, 2));
        assert_eq!(Matrix::column(&[1.0, 2.0]).data.shape(), (2, 1));
    }

    #[test]
    fn test_from_row_slice() {
        let m = Matrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(m.data[(1, 0)], 3.0);
        assert_eq!(Matrix::from_row_slice(0, 3, &[]).unwrap().data.shape(), (0, 3));

        let err = Matrix::from_row_slice(2, 3, &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, PayloadError::InvalidArguments { .. }));
        assert!(Matrix::from_row_slice(usize::MAX, 2, &[]).is_err());
    }

    #[test]
    fn test_display() {
        let m = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.5]]).unwrap();
        assert_eq!(m.to_string(), "[[1, 2], [3, 4.5]]");
        assert_eq!(format!("{:.1}", Matrix::row(&[1.0])), "[[1.0]]");
        assert_eq!(Matrix::from_rows(&[]).unwrap().to_string(), "[]");
    }
}
