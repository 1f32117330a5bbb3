pub mod coerce;
pub mod projection;
pub mod view;

pub use coerce::{CoercionError, matrix_from_faer, matrix_from_json, vector_from_json};
pub use projection::{
    BatchProjector, CancellationToken, ProjectionError, ProjectionErrorKind, matrices_from_json,
    project,
};
pub use view::{LayoutError, MatrixView, OwnedMatrix, ProjectionMatrix, StorageOrder};
