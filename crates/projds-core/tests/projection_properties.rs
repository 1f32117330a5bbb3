use projds_core::domain::ExecutionMode;
use projds_core::numerics::{BatchProjector, MatrixView, OwnedMatrix, ProjectionError, project};
use proptest::prelude::*;

fn naive_projection(h: &[f64], matrices: &[Vec<f64>], samples: usize) -> Vec<Vec<f64>> {
    matrices
        .iter()
        .map(|matrix| {
            (0..samples)
                .map(|col| {
                    h.iter()
                        .enumerate()
                        .fold(0.0, |sum, (row, weight)| sum + weight * matrix[row * samples + col])
                })
                .collect()
        })
        .collect()
}

/// Re-lays a row-major buffer as column-major.
fn transpose_storage(data: &[f64], rows: usize, cols: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(data.len());
    for col in 0..cols {
        for row in 0..rows {
            out.push(data[row * cols + col]);
        }
    }
    out
}

fn batch_strategy() -> impl Strategy<Value = (Vec<f64>, Vec<Vec<f64>>, usize)> {
    (1..6usize, 0..5usize, 1..7usize).prop_flat_map(|(rows, matrices, samples)| {
        (
            prop::collection::vec(-100.0..100.0f64, rows),
            prop::collection::vec(prop::collection::vec(-100.0..100.0f64, rows * samples), matrices),
            Just(samples),
        )
    })
}

proptest! {
    #[test]
    fn prop_matches_naive_triple_loop((h, matrices, samples) in batch_strategy()) {
        let views: Vec<MatrixView<'_>> = matrices
            .iter()
            .map(|data| MatrixView::row_major(data, h.len(), samples).expect("row-major view"))
            .collect();

        let result = project(&h, &views).expect("projection");
        let expected = naive_projection(&h, &matrices, samples);

        if matrices.is_empty() {
            prop_assert_eq!(result.shape(), (0, 0));
        } else {
            prop_assert_eq!(result.to_nested(), expected);
        }
    }

    #[test]
    fn prop_parallel_equals_serial_bit_for_bit((h, matrices, samples) in batch_strategy()) {
        let views: Vec<MatrixView<'_>> = matrices
            .iter()
            .map(|data| MatrixView::row_major(data, h.len(), samples).expect("row-major view"))
            .collect();

        let serial = BatchProjector::new(ExecutionMode::Serial)
            .project(&h, &views)
            .expect("serial");
        let parallel = BatchProjector::new(ExecutionMode::Parallel)
            .project(&h, &views)
            .expect("parallel");

        let serial_bits: Vec<u64> = serial.as_slice().iter().map(|v| v.to_bits()).collect();
        let parallel_bits: Vec<u64> = parallel.as_slice().iter().map(|v| v.to_bits()).collect();
        prop_assert_eq!(serial_bits, parallel_bits);
    }

    #[test]
    fn prop_storage_order_does_not_change_results((h, matrices, samples) in batch_strategy()) {
        let rows = h.len();
        let column_major: Vec<Vec<f64>> = matrices
            .iter()
            .map(|data| transpose_storage(data, rows, samples))
            .collect();

        let row_views: Vec<MatrixView<'_>> = matrices
            .iter()
            .map(|data| MatrixView::row_major(data, rows, samples).expect("row-major view"))
            .collect();
        let col_views: Vec<MatrixView<'_>> = column_major
            .iter()
            .map(|data| MatrixView::col_major(data, rows, samples).expect("col-major view"))
            .collect();

        let from_rows = project(&h, &row_views).expect("row-major projection");
        let from_cols = project(&h, &col_views).expect("col-major projection");
        prop_assert_eq!(from_rows, from_cols);
    }

    #[test]
    fn prop_zero_vector_projects_to_zero((h, matrices, samples) in batch_strategy()) {
        let zeros = vec![0.0; h.len()];
        let views: Vec<MatrixView<'_>> = matrices
            .iter()
            .map(|data| MatrixView::row_major(data, h.len(), samples).expect("row-major view"))
            .collect();

        let result = project(&zeros, &views).expect("projection");
        prop_assert!(result.as_slice().iter().all(|value| *value == 0.0));
    }
}

#[test]
fn padded_and_sliced_layouts_project_like_dense_storage() {
    // 3x2 logical matrix [[1, 2], [3, 4], [5, 6]] embedded in rows of width 4.
    let padded = [1.0, 2.0, -1.0, -1.0, 3.0, 4.0, -1.0, -1.0, 5.0, 6.0, -1.0, -1.0];
    let dense = OwnedMatrix::from_row_major(3, 2, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
        .expect("dense matrix");
    let padded_view = MatrixView::strided(&padded, 3, 2, 4, 1).expect("padded view");

    let h = [1.0, -1.0, 0.5];
    let result = project(&h, &[padded_view, dense.view()]).expect("projection");

    assert_eq!(result.shape(), (2, 2));
    assert_eq!(result.row(0), Some(&[0.5, 1.0][..]));
    assert_eq!(result.row(0), result.row(1));
}

#[test]
fn mismatched_trial_reports_its_index() {
    let good = OwnedMatrix::from_row_major(2, 2, vec![1.0; 4]).expect("good");
    let short = OwnedMatrix::from_row_major(1, 2, vec![1.0; 2]).expect("short");
    let views = [good.view(), good.view(), short.view()];

    let error = project(&[1.0, 1.0], &views).expect_err("row mismatch");
    assert_eq!(
        error,
        ProjectionError::RowCountMismatch {
            index: 2,
            expected: 2,
            actual: 1,
        }
    );
    assert_eq!(error.matrix_index(), Some(2));
}
