use crate::domain::{ComputeResult, ProjdsError};
use crate::numerics::{MatrixView, OwnedMatrix};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub(crate) const HEAD_SHAPE_KEY: &str = "shape";
pub(crate) const HEAD_INDEX_KEY: &str = "idx";
pub(crate) const HEAD_AFFINE_KEY: &str = "affine";

/// On-disk trial dataset: `trials[t][channel][sample]` plus free-form head
/// metadata that is carried into the projection file.
#[derive(Debug, Clone, Deserialize)]
pub(super) struct DatasetFile {
    #[serde(default)]
    pub(super) head: Map<String, Value>,
    pub(super) trials: Value,
}

/// On-disk weight table: `weights[voxel][channel]`, or
/// `weights[z][y][x][channel]` when an `affine` is present.
#[derive(Debug, Clone, Deserialize)]
pub(super) struct WeightsFile {
    pub(super) weights: Value,
    #[serde(default)]
    pub(super) affine: Option<Value>,
}

/// Source position of a projected voxel: a row of a flat weight table or a
/// `(z, y, x)` cell of a weight grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VoxelIndex {
    Flat(usize),
    Grid([usize; 3]),
}

impl fmt::Display for VoxelIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flat(index) => write!(f, "{index}"),
            Self::Grid([z, y, x]) => write!(f, "({z}, {y}, {x})"),
        }
    }
}

/// Spatial frame of a grid-shaped weight table.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelGrid {
    shape: [usize; 3],
    affine: Value,
}

impl VoxelGrid {
    /// `shape` is `(z, y, x)`; `affine` is carried verbatim into the output head.
    pub fn new(shape: [usize; 3], affine: Value) -> Self {
        Self { shape, affine }
    }

    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    pub fn affine(&self) -> &Value {
        &self.affine
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionFile {
    #[serde(default)]
    pub head: Map<String, Value>,
    #[serde(rename = "H")]
    pub cube: Vec<Vec<Vec<f64>>>,
}

impl ProjectionFile {
    /// `(voxels, trials, samples)`; fails when the nested arrays are ragged.
    pub fn shape(&self) -> ComputeResult<(usize, usize, usize)> {
        let voxels = self.cube.len();
        let trials = self.cube.first().map_or(0, Vec::len);
        let samples = self
            .cube
            .first()
            .and_then(|voxel| voxel.first())
            .map_or(0, Vec::len);

        for (voxel_index, voxel) in self.cube.iter().enumerate() {
            if voxel.len() != trials {
                return Err(ragged_cube(format!(
                    "voxel {voxel_index} has {} trials, expected {trials}",
                    voxel.len()
                )));
            }
            for (trial_index, trial) in voxel.iter().enumerate() {
                if trial.len() != samples {
                    return Err(ragged_cube(format!(
                        "voxel {voxel_index} trial {trial_index} has {} samples, expected {samples}",
                        trial.len()
                    )));
                }
            }
        }

        Ok((voxels, trials, samples))
    }

    /// Source index of every voxel in the cube, read from `head.idx`.
    pub fn voxel_indices(&self) -> ComputeResult<Vec<VoxelIndex>> {
        let Some(Value::Array(values)) = self.head.get(HEAD_INDEX_KEY) else {
            return Err(bad_index("head.idx is missing or not an array".to_string()));
        };
        if values.len() != self.cube.len() {
            return Err(bad_index(format!(
                "head.idx has {} entries for {} voxels",
                values.len(),
                self.cube.len()
            )));
        }

        values
            .iter()
            .enumerate()
            .map(|(position, value)| {
                VoxelIndex::deserialize(value).map_err(|_| {
                    bad_index(format!(
                        "head.idx entry {position} is {value}, expected an index or a (z, y, x) triple"
                    ))
                })
            })
            .collect()
    }
}

fn bad_index(message: String) -> ProjdsError {
    ProjdsError::input_validation("INPUT.PROJECTION_INDEX", message)
}

fn ragged_cube(message: String) -> ProjdsError {
    ProjdsError::input_validation("INPUT.PROJECTION_SHAPE", message)
}

/// Trials that all share one `(channels, samples)` shape.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialSet {
    trials: Vec<OwnedMatrix>,
    channels: usize,
    samples: usize,
}

impl TrialSet {
    pub fn new(trials: Vec<OwnedMatrix>) -> ComputeResult<Self> {
        let (channels, samples) = trials
            .first()
            .map_or((0, 0), |trial| (trial.nrows(), trial.ncols()));

        for (index, trial) in trials.iter().enumerate() {
            if trial.nrows() != channels || trial.ncols() != samples {
                return Err(ProjdsError::input_validation(
                    "INPUT.SHAPE_MISMATCH",
                    format!(
                        "trial {index} has shape {}x{}, expected {channels}x{samples}",
                        trial.nrows(),
                        trial.ncols()
                    ),
                ));
            }
        }

        Ok(Self {
            trials,
            channels,
            samples,
        })
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn views(&self) -> Vec<MatrixView<'_>> {
        self.trials.iter().map(OwnedMatrix::view).collect()
    }
}

/// Per-voxel channel weights in projection order.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightTable {
    voxels: Vec<Vec<f64>>,
    indices: Vec<VoxelIndex>,
    grid: Option<VoxelGrid>,
}

impl WeightTable {
    pub fn new(voxels: Vec<Vec<f64>>) -> Self {
        let indices = (0..voxels.len()).map(VoxelIndex::Flat).collect();
        Self {
            voxels,
            indices,
            grid: None,
        }
    }

    /// Builds a table from grid cells stored `z`-major (`cells[(z * Y + y) * X + x]`).
    ///
    /// Cells are visited with `x` outermost and `z` innermost, and cells whose
    /// weights sum to zero are dropped.
    pub fn from_grid(grid: VoxelGrid, mut cells: Vec<Vec<f64>>) -> Self {
        let [depth, height, width] = grid.shape;
        debug_assert_eq!(cells.len(), depth * height * width);

        let mut voxels = Vec::new();
        let mut indices = Vec::new();
        for x in 0..width {
            for y in 0..height {
                for z in 0..depth {
                    let Some(cell) = cells.get_mut((z * height + y) * width + x) else {
                        continue;
                    };
                    let cell = std::mem::take(cell);
                    if cell.iter().sum::<f64>() != 0.0 {
                        voxels.push(cell);
                        indices.push(VoxelIndex::Grid([z, y, x]));
                    }
                }
            }
        }

        Self {
            voxels,
            indices,
            grid: Some(grid),
        }
    }

    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    pub fn voxel(&self, index: usize) -> Option<&[f64]> {
        self.voxels.get(index).map(Vec::as_slice)
    }

    pub fn grid(&self) -> Option<&VoxelGrid> {
        self.grid.as_ref()
    }

    pub fn iter(&self) -> impl Iterator<Item = (VoxelIndex, &[f64])> {
        self.indices
            .iter()
            .copied()
            .zip(self.voxels.iter().map(Vec::as_slice))
    }
}

/// Dense `(voxels, trials, samples)` projection result.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionCube {
    data: Vec<f64>,
    trials: usize,
    samples: usize,
    voxel_indices: Vec<VoxelIndex>,
}

impl ProjectionCube {
    pub(super) fn new(trials: usize, samples: usize) -> Self {
        Self {
            data: Vec::new(),
            trials,
            samples,
            voxel_indices: Vec::new(),
        }
    }

    pub(super) fn push_voxel(&mut self, voxel_index: VoxelIndex, values: &[f64]) {
        debug_assert_eq!(values.len(), self.trials * self.samples);
        self.data.extend_from_slice(values);
        self.voxel_indices.push(voxel_index);
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.voxel_indices.len(), self.trials, self.samples)
    }

    /// Source weight-table index of each kept voxel, in output order.
    pub fn voxel_indices(&self) -> &[VoxelIndex] {
        &self.voxel_indices
    }

    /// First `(voxel, trial, sample, value)` that is infinite or NaN.
    pub fn first_non_finite(&self) -> Option<(VoxelIndex, usize, usize, f64)> {
        let position = self.data.iter().position(|value| !value.is_finite())?;
        let voxel_len = self.trials * self.samples;
        let voxel = self.voxel_indices[position / voxel_len];
        let within = position % voxel_len;
        Some((
            voxel,
            within / self.samples,
            within % self.samples,
            self.data[position],
        ))
    }

    pub fn get(&self, voxel: usize, trial: usize, sample: usize) -> Option<f64> {
        if voxel >= self.voxel_indices.len() || trial >= self.trials || sample >= self.samples {
            return None;
        }
        self.data
            .get((voxel * self.trials + trial) * self.samples + sample)
            .copied()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn to_nested(&self) -> Vec<Vec<Vec<f64>>> {
        let voxel_len = self.trials * self.samples;
        (0..self.voxel_indices.len())
            .map(|voxel| {
                (0..self.trials)
                    .map(|trial| {
                        let start = voxel * voxel_len + trial * self.samples;
                        self.data[start..start + self.samples].to_vec()
                    })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{ProjectionCube, ProjectionFile, TrialSet, VoxelGrid, VoxelIndex, WeightTable};
    use crate::numerics::OwnedMatrix;
    use serde_json::{Map, json};

    #[test]
    fn trial_set_rejects_mixed_shapes() {
        let trials = vec![
            OwnedMatrix::from_row_major(2, 2, vec![1.0; 4]).expect("trial"),
            OwnedMatrix::from_row_major(2, 3, vec![1.0; 6]).expect("trial"),
        ];
        let error = TrialSet::new(trials).expect_err("mixed shapes");
        assert_eq!(error.placeholder(), "INPUT.SHAPE_MISMATCH");
        assert!(error.message().contains("trial 1 has shape 2x3"));
    }

    #[test]
    fn cube_nests_voxel_trial_sample_order() {
        let mut cube = ProjectionCube::new(2, 3);
        cube.push_voxel(VoxelIndex::Flat(4), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        cube.push_voxel(VoxelIndex::Flat(7), &[7.0, 8.0, 9.0, 10.0, 11.0, 12.0]);

        assert_eq!(cube.shape(), (2, 2, 3));
        assert_eq!(cube.voxel_indices(), &[VoxelIndex::Flat(4), VoxelIndex::Flat(7)]);
        assert_eq!(cube.first_non_finite(), None);
        assert_eq!(cube.get(1, 0, 2), Some(9.0));
        assert_eq!(cube.get(2, 0, 0), None);
        assert_eq!(cube.to_nested()[0][1], vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn projection_file_shape_rejects_ragged_cubes() {
        let mut head = Map::new();
        head.insert("idx".to_string(), json!([0, 3]));
        let file = ProjectionFile {
            head,
            cube: vec![vec![vec![1.0, 2.0]], vec![vec![3.0]]],
        };

        let error = file.shape().expect_err("ragged");
        assert_eq!(error.placeholder(), "INPUT.PROJECTION_SHAPE");
        assert_eq!(
            file.voxel_indices().expect("indices"),
            vec![VoxelIndex::Flat(0), VoxelIndex::Flat(3)]
        );
    }

    #[test]
    fn projection_file_indices_must_match_voxels_one_to_one() {
        let cube = vec![vec![vec![1.0]], vec![vec![2.0]]];
        let file_with = |idx: serde_json::Value| {
            let mut head = Map::new();
            head.insert("idx".to_string(), idx);
            ProjectionFile {
                head,
                cube: cube.clone(),
            }
        };

        let grid = file_with(json!([[0, 1, 2], 5]));
        assert_eq!(
            grid.voxel_indices().expect("mixed indices"),
            vec![VoxelIndex::Grid([0, 1, 2]), VoxelIndex::Flat(5)]
        );

        for bad in [json!([0, -1]), json!([0, "1"]), json!([0, [1, 2]]), json!([0]), json!(3)] {
            let error = file_with(bad.clone())
                .voxel_indices()
                .expect_err("malformed idx");
            assert_eq!(error.placeholder(), "INPUT.PROJECTION_INDEX", "idx: {bad}");
        }

        let missing = ProjectionFile {
            head: Map::new(),
            cube,
        };
        assert!(missing.voxel_indices().is_err());
    }

    #[test]
    fn grid_table_visits_x_outer_z_inner_and_drops_empty_cells() {
        // (z, y, x) = (2, 1, 2); cell (1, 0, 0) sums to zero.
        let cells = vec![
            vec![1.0, 0.0],
            vec![2.0, 0.0],
            vec![1.0, -1.0],
            vec![4.0, 0.0],
        ];
        let grid = VoxelGrid::new([2, 1, 2], json!([[1, 0], [0, 1]]));
        let table = WeightTable::from_grid(grid, cells);

        let visited = table
            .iter()
            .map(|(index, weights)| (index, weights[0]))
            .collect::<Vec<_>>();
        assert_eq!(
            visited,
            vec![
                (VoxelIndex::Grid([0, 0, 0]), 1.0),
                (VoxelIndex::Grid([0, 0, 1]), 2.0),
                (VoxelIndex::Grid([1, 0, 1]), 4.0),
            ]
        );
        assert_eq!(table.grid().map(VoxelGrid::shape), Some([2, 1, 2]));
    }

    #[test]
    fn cube_locates_first_non_finite_value() {
        let mut cube = ProjectionCube::new(1, 2);
        cube.push_voxel(VoxelIndex::Flat(0), &[1.0, 2.0]);
        cube.push_voxel(VoxelIndex::Grid([3, 1, 0]), &[5.0, f64::INFINITY]);

        let (voxel, trial, sample, value) = cube.first_non_finite().expect("infinite value");
        assert_eq!((voxel, trial, sample), (VoxelIndex::Grid([3, 1, 0]), 0, 1));
        assert!(value.is_infinite());
    }
}
