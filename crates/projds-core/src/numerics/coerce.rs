//! Typed coercion boundary from loosely-typed numeric input to strict f64
//! storage.
//!
//! JSON numbers, booleans (as 1.0 / 0.0) and numeric strings are accepted.
//! Anything else is a type mismatch; wrong nesting depth or ragged rows are
//! shape mismatches.

use super::ProjectionErrorKind;
use super::view::{LayoutError, OwnedMatrix};
use faer::Mat;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoercionError {
    #[error("expected a rank-{expected} array, got rank {actual}")]
    RankMismatch { expected: usize, actual: usize },
    #[error("row {row} has {actual} columns, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("element {location} is {found}, expected a number")]
    NonNumeric {
        location: String,
        found: &'static str,
    },
    #[error("element {location} is not a finite number: '{value}'")]
    NonFinite { location: String, value: String },
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

impl CoercionError {
    pub fn kind(&self) -> ProjectionErrorKind {
        match self {
            Self::NonNumeric { .. } | Self::NonFinite { .. } => ProjectionErrorKind::TypeMismatch,
            Self::RankMismatch { .. } | Self::RaggedRow { .. } | Self::Layout(_) => {
                ProjectionErrorKind::ShapeMismatch
            }
        }
    }
}

pub fn vector_from_json(value: &Value) -> Result<Vec<f64>, CoercionError> {
    let items = expect_rank(value, 1)?;
    items
        .iter()
        .enumerate()
        .map(|(index, item)| scalar_to_f64(item, || format!("[{index}]")))
        .collect()
}

/// Coerces a nested `[[f64; cols]; rows]` array into row-major storage.
///
/// `[]` is accepted as a 0x0 matrix.
pub fn matrix_from_json(value: &Value) -> Result<OwnedMatrix, CoercionError> {
    let rows = expect_rank(value, 2)?;
    let cols = match rows.first() {
        Some(Value::Array(first)) => first.len(),
        _ => 0,
    };

    let mut data = Vec::with_capacity(rows.len() * cols);
    for (row_index, row) in rows.iter().enumerate() {
        let Value::Array(items) = row else {
            return Err(CoercionError::RankMismatch {
                expected: 2,
                actual: 1,
            });
        };
        if items.len() != cols {
            return Err(CoercionError::RaggedRow {
                row: row_index,
                expected: cols,
                actual: items.len(),
            });
        }
        for (col_index, item) in items.iter().enumerate() {
            data.push(scalar_to_f64(item, || format!("[{row_index}][{col_index}]"))?);
        }
    }

    Ok(OwnedMatrix::from_row_major(rows.len(), cols, data)?)
}

/// Copies a `faer` matrix into column-major storage, which is faer's native
/// element order.
pub fn matrix_from_faer(matrix: &Mat<f64>) -> OwnedMatrix {
    let rows = matrix.nrows();
    let cols = matrix.ncols();
    let mut data = Vec::with_capacity(rows * cols);
    for col in 0..cols {
        for row in 0..rows {
            data.push(matrix[(row, col)]);
        }
    }

    OwnedMatrix::dense_col_major(rows, cols, data)
}

fn expect_rank(value: &Value, expected: usize) -> Result<&[Value], CoercionError> {
    let actual = json_rank(value);
    match value {
        Value::Array(items) if actual == expected || (items.is_empty() && actual <= expected) => {
            Ok(items)
        }
        _ => Err(CoercionError::RankMismatch { expected, actual }),
    }
}

fn json_rank(value: &Value) -> usize {
    match value {
        Value::Array(items) => 1 + items.first().map_or(0, json_rank),
        _ => 0,
    }
}

fn scalar_to_f64(
    value: &Value,
    location: impl FnOnce() -> String,
) -> Result<f64, CoercionError> {
    match value {
        Value::Number(number) => number.as_f64().ok_or_else(|| CoercionError::NonFinite {
            location: location(),
            value: number.to_string(),
        }),
        Value::Bool(flag) => Ok(if *flag { 1.0 } else { 0.0 }),
        Value::String(text) => match text.trim().parse::<f64>() {
            Ok(parsed) if parsed.is_finite() => Ok(parsed),
            Ok(_) => Err(CoercionError::NonFinite {
                location: location(),
                value: text.clone(),
            }),
            Err(_) => Err(CoercionError::NonNumeric {
                location: location(),
                found: "a non-numeric string",
            }),
        },
        Value::Null => Err(CoercionError::NonNumeric {
            location: location(),
            found: "null",
        }),
        Value::Array(_) => Err(CoercionError::NonNumeric {
            location: location(),
            found: "an array",
        }),
        Value::Object(_) => Err(CoercionError::NonNumeric {
            location: location(),
            found: "an object",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{CoercionError, matrix_from_faer, matrix_from_json, vector_from_json};
    use crate::numerics::ProjectionErrorKind;
    use crate::numerics::view::StorageOrder;
    use faer::Mat;
    use serde_json::json;

    #[test]
    fn vector_accepts_numbers_booleans_and_numeric_strings() {
        let values = vector_from_json(&json!([1, 2.5, true, " -3e-1 "])).expect("coercion");
        assert_eq!(values, vec![1.0, 2.5, 1.0, -0.3]);
        assert_eq!(vector_from_json(&json!([])).expect("empty"), Vec::<f64>::new());
    }

    #[test]
    fn vector_rejects_non_numeric_elements_as_type_mismatch() {
        let error = vector_from_json(&json!([1.0, "abc"])).expect_err("string");
        assert_eq!(
            error,
            CoercionError::NonNumeric {
                location: "[1]".to_string(),
                found: "a non-numeric string",
            }
        );
        assert_eq!(error.kind(), ProjectionErrorKind::TypeMismatch);

        let error = vector_from_json(&json!(["inf"])).expect_err("non-finite");
        assert_eq!(error.kind(), ProjectionErrorKind::TypeMismatch);
    }

    #[test]
    fn vector_rejects_wrong_rank_as_shape_mismatch() {
        let error = vector_from_json(&json!(3.0)).expect_err("scalar");
        assert_eq!(
            error,
            CoercionError::RankMismatch {
                expected: 1,
                actual: 0,
            }
        );

        let error = vector_from_json(&json!([[1.0]])).expect_err("matrix");
        assert_eq!(error.kind(), ProjectionErrorKind::ShapeMismatch);
    }

    #[test]
    fn matrix_coerces_nested_rows_into_row_major_storage() {
        let matrix = matrix_from_json(&json!([[1, 0], [0, 1], [1, 1]])).expect("coercion");
        assert_eq!(matrix.order(), StorageOrder::RowMajor);
        assert_eq!((matrix.nrows(), matrix.ncols()), (3, 2));
        assert_eq!(matrix.view().get(2, 1), Some(1.0));
        assert_eq!(matrix.view().row_stride(), 2);
    }

    #[test]
    fn matrix_rejects_ragged_rows() {
        let error = matrix_from_json(&json!([[1, 2], [3]])).expect_err("ragged");
        assert_eq!(
            error,
            CoercionError::RaggedRow {
                row: 1,
                expected: 2,
                actual: 1,
            }
        );
    }

    #[test]
    fn matrix_rejects_vectors_and_null_elements() {
        let error = matrix_from_json(&json!([1.0, 2.0])).expect_err("rank 1");
        assert_eq!(
            error,
            CoercionError::RankMismatch {
                expected: 2,
                actual: 1,
            }
        );

        let error = matrix_from_json(&json!([[1.0, null]])).expect_err("null");
        assert_eq!(error.kind(), ProjectionErrorKind::TypeMismatch);
    }

    #[test]
    fn empty_array_coerces_to_empty_matrix() {
        let matrix = matrix_from_json(&json!([])).expect("empty");
        assert_eq!((matrix.nrows(), matrix.ncols()), (0, 0));
    }

    #[test]
    fn faer_matrices_are_copied_in_column_major_order() {
        let mut source = Mat::<f64>::zeros(3, 2);
        for row in 0..3 {
            for col in 0..2 {
                source[(row, col)] = (10 * row + col) as f64;
            }
        }
        let matrix = matrix_from_faer(&source);

        assert_eq!(matrix.order(), StorageOrder::ColMajor);
        assert_eq!(matrix.view().row_stride(), 1);
        assert_eq!(matrix.view().col_stride(), 3);
        assert_eq!(matrix.view().get(2, 1), Some(21.0));
    }
}
