use super::coerce::{CoercionError, matrix_from_json, vector_from_json};
use super::view::{MatrixView, OwnedMatrix, ProjectionMatrix};
use crate::domain::ExecutionMode;
use rayon::prelude::*;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectionErrorKind {
    ShapeMismatch,
    TypeMismatch,
    ResourceExhausted,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProjectionError {
    #[error("projection vector could not be coerced: {source}")]
    InvalidVector { source: CoercionError },
    #[error("matrix collection could not be coerced: {source}")]
    InvalidCollection { source: CoercionError },
    #[error("matrix {index} could not be coerced: {source}")]
    InvalidMatrix { index: usize, source: CoercionError },
    #[error("matrix {index} has {actual} rows, expected {expected} to match the projection vector")]
    RowCountMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[error("matrix {index} has {actual} columns, expected {expected} to match matrix 0")]
    ColumnCountMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[error("output shape {matrices}x{samples} overflows the addressable element count")]
    OutputTooLarge { matrices: usize, samples: usize },
    #[error("failed to allocate {elements} elements for the {buffer}")]
    AllocationFailed {
        buffer: &'static str,
        elements: usize,
    },
    #[error("projection cancelled after {completed} matrices")]
    Cancelled { completed: usize },
}

impl ProjectionError {
    pub fn kind(&self) -> ProjectionErrorKind {
        match self {
            Self::InvalidVector { source }
            | Self::InvalidCollection { source }
            | Self::InvalidMatrix { source, .. } => source.kind(),
            Self::RowCountMismatch { .. } | Self::ColumnCountMismatch { .. } => {
                ProjectionErrorKind::ShapeMismatch
            }
            Self::OutputTooLarge { .. } | Self::AllocationFailed { .. } => {
                ProjectionErrorKind::ResourceExhausted
            }
            Self::Cancelled { .. } => ProjectionErrorKind::Cancelled,
        }
    }

    /// Index of the offending matrix, when the failure is tied to one.
    pub fn matrix_index(&self) -> Option<usize> {
        match self {
            Self::InvalidMatrix { index, .. }
            | Self::RowCountMismatch { index, .. }
            | Self::ColumnCountMismatch { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Cooperative cancellation flag shared between a caller and running
/// projections. Observed only between matrices.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy)]
struct StrideEntry<'a> {
    data: &'a [f64],
    row_stride: usize,
    col_stride: usize,
}

/// Projects a fixed vector onto every column of every matrix in a batch.
///
/// Row `i` of the output holds `h . D_i[:, j]` for every column `j`. The
/// accumulation over `k` is strictly sequential, so serial and parallel runs
/// agree bit for bit.
#[derive(Debug, Clone, Default)]
pub struct BatchProjector {
    execution_mode: ExecutionMode,
    cancellation: Option<CancellationToken>,
}

impl BatchProjector {
    pub fn new(execution_mode: ExecutionMode) -> Self {
        Self {
            execution_mode,
            cancellation: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.execution_mode
    }

    pub fn project(
        &self,
        h: &[f64],
        matrices: &[MatrixView<'_>],
    ) -> Result<ProjectionMatrix, ProjectionError> {
        let Some(first) = matrices.first() else {
            return Ok(ProjectionMatrix::empty());
        };

        let rows = h.len();
        let samples = first.ncols();
        let table = stride_table(rows, samples, matrices)?;

        let elements = matrices
            .len()
            .checked_mul(samples)
            .ok_or(ProjectionError::OutputTooLarge {
                matrices: matrices.len(),
                samples,
            })?;
        let mut output = Vec::new();
        output
            .try_reserve_exact(elements)
            .map_err(|_| ProjectionError::AllocationFailed {
                buffer: "projection output",
                elements,
            })?;
        output.resize(elements, 0.0);

        debug!(
            matrices = matrices.len(),
            rows,
            samples,
            mode = %self.execution_mode,
            "projecting batch"
        );

        // Zero rows or zero samples leave the zero-filled output as is.
        if samples > 0 && rows > 0 {
            match self.execution_mode {
                ExecutionMode::Serial => self.accumulate_serial(h, &table, &mut output, samples)?,
                ExecutionMode::Parallel => {
                    self.accumulate_parallel(h, &table, &mut output, samples)?
                }
            }
        } else {
            self.check_cancelled(0)?;
        }

        Ok(ProjectionMatrix::from_parts(
            matrices.len(),
            samples,
            output,
        ))
    }

    /// Coerces loosely-typed JSON input and projects it.
    ///
    /// `h` must be a rank-1 numeric array and `matrices` an array of rank-2
    /// numeric arrays.
    pub fn project_json(
        &self,
        h: &Value,
        matrices: &Value,
    ) -> Result<ProjectionMatrix, ProjectionError> {
        let h = vector_from_json(h).map_err(|source| ProjectionError::InvalidVector { source })?;
        let owned = matrices_from_json(matrices)?;
        let views: Vec<MatrixView<'_>> = owned.iter().map(OwnedMatrix::view).collect();
        self.project(&h, &views)
    }

    fn accumulate_serial(
        &self,
        h: &[f64],
        table: &[StrideEntry<'_>],
        output: &mut [f64],
        samples: usize,
    ) -> Result<(), ProjectionError> {
        for (index, (entry, row)) in table.iter().zip(output.chunks_mut(samples)).enumerate() {
            self.check_cancelled(index)?;
            project_row(h, entry, row);
        }
        Ok(())
    }

    fn accumulate_parallel(
        &self,
        h: &[f64],
        table: &[StrideEntry<'_>],
        output: &mut [f64],
        samples: usize,
    ) -> Result<(), ProjectionError> {
        let completed = AtomicUsize::new(0);
        output
            .par_chunks_mut(samples)
            .zip(table.par_iter())
            .try_for_each(|(row, entry)| {
                self.check_cancelled(completed.load(Ordering::Relaxed))?;
                project_row(h, entry, row);
                completed.fetch_add(1, Ordering::Relaxed);
                Ok(())
            })
    }

    fn check_cancelled(&self, completed: usize) -> Result<(), ProjectionError> {
        match &self.cancellation {
            Some(token) if token.is_cancelled() => Err(ProjectionError::Cancelled { completed }),
            _ => Ok(()),
        }
    }
}

/// Serial projection with no cancellation.
pub fn project(
    h: &[f64],
    matrices: &[MatrixView<'_>],
) -> Result<ProjectionMatrix, ProjectionError> {
    BatchProjector::default().project(h, matrices)
}

/// Coerces a JSON array of matrices, tagging failures with the matrix index.
pub fn matrices_from_json(value: &Value) -> Result<Vec<OwnedMatrix>, ProjectionError> {
    let Value::Array(items) = value else {
        return Err(ProjectionError::InvalidCollection {
            source: CoercionError::RankMismatch {
                expected: 3,
                actual: 0,
            },
        });
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            matrix_from_json(item).map_err(|source| ProjectionError::InvalidMatrix { index, source })
        })
        .collect()
}

fn stride_table<'a>(
    rows: usize,
    samples: usize,
    matrices: &[MatrixView<'a>],
) -> Result<Vec<StrideEntry<'a>>, ProjectionError> {
    let mut table = Vec::new();
    table
        .try_reserve_exact(matrices.len())
        .map_err(|_| ProjectionError::AllocationFailed {
            buffer: "stride table",
            elements: matrices.len(),
        })?;

    for (index, matrix) in matrices.iter().enumerate() {
        if matrix.nrows() != rows {
            return Err(ProjectionError::RowCountMismatch {
                index,
                expected: rows,
                actual: matrix.nrows(),
            });
        }
        if matrix.ncols() != samples {
            return Err(ProjectionError::ColumnCountMismatch {
                index,
                expected: samples,
                actual: matrix.ncols(),
            });
        }
        table.push(StrideEntry {
            data: matrix.data(),
            row_stride: matrix.row_stride(),
            col_stride: matrix.col_stride(),
        });
    }

    Ok(table)
}

/// Only offsets of elements actually read are formed, so every one is bounded
/// by the view's validated `required_len`.
fn project_row(h: &[f64], entry: &StrideEntry<'_>, output: &mut [f64]) {
    for (col, slot) in output.iter_mut().enumerate() {
        let base = col * entry.col_stride;
        let mut sum = 0.0;
        for (k, &weight) in h.iter().enumerate() {
            sum += weight * entry.data[base + k * entry.row_stride];
        }
        *slot = sum;
    }
}
