use faer::Mat;
use std::ops::Index;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error(
        "strided {rows}x{cols} layout (row_stride={row_stride}, col_stride={col_stride}) needs {required} elements, buffer has {actual}"
    )]
    BufferTooShort {
        rows: usize,
        cols: usize,
        row_stride: usize,
        col_stride: usize,
        required: usize,
        actual: usize,
    },
    #[error("strided {rows}x{cols} layout overflows the addressable element range")]
    OffsetOverflow { rows: usize, cols: usize },
}

/// Borrowed two-dimensional f64 view over a flat buffer.
///
/// Element `(row, col)` lives at `row * row_stride + col * col_stride`, so the
/// same type describes row-major, column-major and sliced storage without a
/// copy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatrixView<'a> {
    data: &'a [f64],
    rows: usize,
    cols: usize,
    row_stride: usize,
    col_stride: usize,
}

impl<'a> MatrixView<'a> {
    pub fn strided(
        data: &'a [f64],
        rows: usize,
        cols: usize,
        row_stride: usize,
        col_stride: usize,
    ) -> Result<Self, LayoutError> {
        let required = required_len(rows, cols, row_stride, col_stride)?;
        if required > data.len() {
            return Err(LayoutError::BufferTooShort {
                rows,
                cols,
                row_stride,
                col_stride,
                required,
                actual: data.len(),
            });
        }

        Ok(Self {
            data,
            rows,
            cols,
            row_stride,
            col_stride,
        })
    }

    pub fn row_major(data: &'a [f64], rows: usize, cols: usize) -> Result<Self, LayoutError> {
        Self::strided(data, rows, cols, cols, 1)
    }

    pub fn col_major(data: &'a [f64], rows: usize, cols: usize) -> Result<Self, LayoutError> {
        Self::strided(data, rows, cols, 1, rows)
    }

    pub fn nrows(&self) -> usize {
        self.rows
    }

    pub fn ncols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    pub fn col_stride(&self) -> usize {
        self.col_stride
    }

    pub fn data(&self) -> &'a [f64] {
        self.data
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.data
            .get(row * self.row_stride + col * self.col_stride)
            .copied()
    }

    /// Column `col` viewed with `row_stride` spacing as an iterator.
    pub fn column(&self, col: usize) -> impl Iterator<Item = f64> + 'a {
        let data = self.data;
        let row_stride = self.row_stride;
        let col_stride = self.col_stride;
        let rows = if col < self.cols { self.rows } else { 0 };
        (0..rows).map(move |row| data[col * col_stride + row * row_stride])
    }
}

fn required_len(
    rows: usize,
    cols: usize,
    row_stride: usize,
    col_stride: usize,
) -> Result<usize, LayoutError> {
    if rows == 0 || cols == 0 {
        return Ok(0);
    }

    (rows - 1)
        .checked_mul(row_stride)
        .and_then(|row_span| {
            (cols - 1)
                .checked_mul(col_stride)
                .and_then(|col_span| row_span.checked_add(col_span))
        })
        .and_then(|last_offset| last_offset.checked_add(1))
        .ok_or(LayoutError::OffsetOverflow { rows, cols })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOrder {
    RowMajor,
    ColMajor,
}

/// Dense owned matrix produced by the coercion boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedMatrix {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
    order: StorageOrder,
}

impl OwnedMatrix {
    pub fn from_row_major(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self, LayoutError> {
        MatrixView::row_major(&data, rows, cols)?;
        Ok(Self {
            data,
            rows,
            cols,
            order: StorageOrder::RowMajor,
        })
    }

    pub fn from_col_major(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self, LayoutError> {
        MatrixView::col_major(&data, rows, cols)?;
        Ok(Self {
            data,
            rows,
            cols,
            order: StorageOrder::ColMajor,
        })
    }

    /// Dense column-major storage whose length is already known to be
    /// `rows * cols`.
    pub(crate) fn dense_col_major(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), rows * cols);
        Self {
            data,
            rows,
            cols,
            order: StorageOrder::ColMajor,
        }
    }

    pub fn nrows(&self) -> usize {
        self.rows
    }

    pub fn ncols(&self) -> usize {
        self.cols
    }

    pub fn order(&self) -> StorageOrder {
        self.order
    }

    pub fn view(&self) -> MatrixView<'_> {
        let (row_stride, col_stride) = match self.order {
            StorageOrder::RowMajor => (self.cols, 1),
            StorageOrder::ColMajor => (1, self.rows),
        };
        MatrixView {
            data: &self.data,
            rows: self.rows,
            cols: self.cols,
            row_stride,
            col_stride,
        }
    }
}

/// Row-major `(matrices, samples)` projection output.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionMatrix {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
}

impl ProjectionMatrix {
    pub(crate) fn from_parts(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), rows * cols);
        Self { data, rows, cols }
    }

    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            rows: 0,
            cols: 0,
        }
    }

    pub fn nrows(&self) -> usize {
        self.rows
    }

    pub fn ncols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.data.get(row * self.cols + col).copied()
    }

    pub fn row(&self, row: usize) -> Option<&[f64]> {
        if row >= self.rows {
            return None;
        }
        let start = row * self.cols;
        Some(&self.data[start..start + self.cols])
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        (0..self.rows).map(move |row| {
            let start = row * self.cols;
            &self.data[start..start + self.cols]
        })
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    pub fn to_nested(&self) -> Vec<Vec<f64>> {
        self.rows().map(<[f64]>::to_vec).collect()
    }

    pub fn to_faer(&self) -> Mat<f64> {
        let mut matrix = Mat::<f64>::zeros(self.rows, self.cols);
        for (row, values) in self.rows().enumerate() {
            for (col, value) in values.iter().copied().enumerate() {
                matrix[(row, col)] = value;
            }
        }
        matrix
    }
}

impl Index<(usize, usize)> for ProjectionMatrix {
    type Output = f64;

    fn index(&self, (row, col): (usize, usize)) -> &Self::Output {
        assert!(
            row < self.rows && col < self.cols,
            "projection index ({row}, {col}) out of bounds for shape ({}, {})",
            self.rows,
            self.cols
        );
        &self.data[row * self.cols + col]
    }
}

#[cfg(test)]
mod tests {
    use super::{LayoutError, MatrixView, OwnedMatrix, ProjectionMatrix, StorageOrder};

    #[test]
    fn row_and_column_major_views_address_the_same_logical_matrix() {
        let row_major = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let col_major = [1.0, 4.0, 2.0, 5.0, 3.0, 6.0];

        let a = MatrixView::row_major(&row_major, 2, 3).expect("row-major view");
        let b = MatrixView::col_major(&col_major, 2, 3).expect("col-major view");

        for row in 0..2 {
            for col in 0..3 {
                assert_eq!(a.get(row, col), b.get(row, col), "({row}, {col})");
            }
        }
        assert_eq!(a.row_stride(), 3);
        assert_eq!(b.row_stride(), 1);
        assert_eq!(b.column(2).collect::<Vec<_>>(), vec![3.0, 6.0]);
    }

    #[test]
    fn strided_view_rejects_short_buffers() {
        let data = [0.0; 5];
        let error = MatrixView::strided(&data, 2, 3, 3, 1).expect_err("buffer too short");
        assert_eq!(
            error,
            LayoutError::BufferTooShort {
                rows: 2,
                cols: 3,
                row_stride: 3,
                col_stride: 1,
                required: 6,
                actual: 5,
            }
        );
    }

    #[test]
    fn strided_view_rejects_overflowing_strides() {
        let data = [0.0; 4];
        let error =
            MatrixView::strided(&data, 3, 1, usize::MAX, 1).expect_err("stride overflow");
        assert_eq!(error, LayoutError::OffsetOverflow { rows: 3, cols: 1 });
    }

    #[test]
    fn padded_row_stride_skips_trailing_elements() {
        // 2x2 logical matrix stored in rows of width 3.
        let data = [1.0, 2.0, -99.0, 3.0, 4.0, -99.0];
        let view = MatrixView::strided(&data, 2, 2, 3, 1).expect("padded view");
        assert_eq!(view.column(1).collect::<Vec<_>>(), vec![2.0, 4.0]);
        assert_eq!(view.get(1, 2), None);
    }

    #[test]
    fn empty_shapes_accept_empty_buffers() {
        let view = MatrixView::row_major(&[], 0, 4).expect("zero rows");
        assert_eq!(view.shape(), (0, 4));
        assert_eq!(view.column(3).count(), 0);

        let huge_stride = MatrixView::strided(&[], 0, 3, 0, usize::MAX).expect("zero rows");
        assert_eq!(huge_stride.column(2).count(), 0);
        assert_eq!(huge_stride.column(7).count(), 0);
    }

    #[test]
    fn owned_matrix_reports_storage_order() {
        let matrix =
            OwnedMatrix::from_col_major(2, 2, vec![1.0, 3.0, 2.0, 4.0]).expect("col-major");
        assert_eq!(matrix.order(), StorageOrder::ColMajor);
        assert_eq!(matrix.view().get(0, 1), Some(2.0));
        assert!(OwnedMatrix::from_row_major(2, 2, vec![1.0]).is_err());
    }

    #[test]
    fn projection_matrix_round_trips_through_faer() {
        let projection = ProjectionMatrix::from_parts(2, 2, vec![1.0, 2.0, 3.0, 4.0]);
        let mat = projection.to_faer();

        assert_eq!(mat.nrows(), 2);
        assert_eq!(mat.ncols(), 2);
        assert_eq!(mat[(1, 0)], 3.0);
        assert_eq!(projection[(0, 1)], 2.0);
        assert_eq!(projection.to_nested(), vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }
}
