use rayon::prelude::*;

use crate::NoiseGenerator;
use crate::error::{EngineError, Result};
use crate::params::{Dimensionality, NoiseParameters};
use crate::sampler::Sampler;

/// Axis-aligned integer box `[origin, origin + size)`.
///
/// Cells are stored x-fastest: `index = (z * height + y) * width + x`, so a 2D
/// region is the usual row-major `map[y][x]` layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    origin: [i64; 3],
    shape: [usize; 3],
    dims: Dimensionality,
}

impl Region {
    pub fn new2(origin: [i64; 2], size: [i64; 2]) -> Result<Self> {
        Self::build([origin[0], origin[1], 0], [size[0], size[1], 1], Dimensionality::Two)
    }

    pub fn new3(origin: [i64; 3], size: [i64; 3]) -> Result<Self> {
        Self::build(origin, size, Dimensionality::Three)
    }

    pub fn new(origin: [i64; 3], size: [i64; 3], dims: Dimensionality) -> Result<Self> {
        match dims {
            Dimensionality::Two => Self::new2([origin[0], origin[1]], [size[0], size[1]]),
            Dimensionality::Three => Self::new3(origin, size),
        }
    }

    fn build(origin: [i64; 3], size: [i64; 3], dims: Dimensionality) -> Result<Self> {
        if size.iter().any(|&s| s <= 0) {
            return Err(EngineError::InvalidRegion { size });
        }
        Ok(Self {
            origin,
            shape: size.map(|s| s as usize),
            dims,
        })
    }

    pub fn origin(&self) -> [i64; 3] {
        self.origin
    }

    /// `[width, height, depth]`; depth is 1 for 2D regions.
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    pub fn dims(&self) -> Dimensionality {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, cell: [usize; 3]) -> bool {
        cell.iter().zip(self.shape.iter()).all(|(c, s)| c < s)
    }

    #[inline]
    pub fn index(&self, cell: [usize; 3]) -> usize {
        let [w, h, _] = self.shape;
        (cell[2] * h + cell[1]) * w + cell[0]
    }

    #[inline]
    pub fn cell(&self, index: usize) -> [usize; 3] {
        let [w, h, _] = self.shape;
        [index % w, (index / w) % h, index / (w * h)]
    }

    pub fn checked_index(&self, cell: [usize; 3]) -> Result<usize> {
        if self.contains(cell) {
            Ok(self.index(cell))
        } else {
            Err(EngineError::OutOfBounds {
                index: cell,
                shape: self.shape,
            })
        }
    }

    /// World coordinate of a cell (origin offset applied, clamped to the i64 range).
    pub fn world(&self, cell: [usize; 3]) -> [i64; 3] {
        [
            self.origin[0].saturating_add(cell[0] as i64),
            self.origin[1].saturating_add(cell[1] as i64),
            self.origin[2].saturating_add(cell[2] as i64),
        ]
    }
}

/// Dense owned samples over a [`Region`]. Immutable once generated.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    region: Region,
    data: Vec<f64>,
}

impl ScalarField {
    pub fn from_samples(region: Region, data: Vec<f64>) -> Result<Self> {
        if data.len() != region.len() {
            return Err(EngineError::ShapeMismatch {
                expected: region.len(),
                actual: data.len(),
            });
        }
        Ok(Self { region, data })
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn shape(&self) -> [usize; 3] {
        self.region.shape()
    }

    pub fn values(&self) -> &[f64] {
        &self.data
    }

    pub fn get(&self, cell: [usize; 3]) -> Result<f64> {
        Ok(self.data[self.region.checked_index(cell)?])
    }

    pub fn min_max(&self) -> (f64, f64) {
        self.data
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }

    /// Min-max rescale into [0, 1]. Never applied implicitly: some thresholds are
    /// calibrated against raw samples, others against normalized ones.
    pub fn normalized(&self) -> ScalarField {
        let (min, max) = self.min_max();
        let range = (max - min).max(0.001); // prevent zero-division
        Self {
            region: self.region,
            data: self.data.iter().map(|v| (v - min) / range).collect(),
        }
    }

    /// Binary voxel world: `true` where the sample exceeds `threshold`.
    pub fn mask_above(&self, threshold: f64) -> Vec<bool> {
        self.data.iter().map(|&v| v > threshold).collect()
    }

    /// Row-major `width * height` copy of layer `z`.
    pub fn slice_z(&self, z: usize) -> Result<Vec<f64>> {
        let [w, h, d] = self.shape();
        if z >= d {
            return Err(EngineError::OutOfBounds {
                index: [0, 0, z],
                shape: self.shape(),
            });
        }
        let start = z * w * h;
        Ok(self.data[start..start + w * h].to_vec())
    }
}

/// Sample every lattice cell of `region`, one sampler call per cell.
///
/// Degenerate regions are rejected when the [`Region`] is built, so this cannot fail.
pub fn generate(region: &Region, params: &NoiseParameters) -> ScalarField {
    generate_with(&Sampler::new(params), region)
}

/// Same as [`generate`] with a prebuilt sampler. Cells are independent and are
/// sampled in parallel.
pub fn generate_with(sampler: &Sampler, region: &Region) -> ScalarField {
    let data = (0..region.len())
        .into_par_iter()
        .map(|i| {
            let [x, y, z] = region.world(region.cell(i));
            match region.dims() {
                Dimensionality::Two => sampler.get2(x as f64, y as f64),
                Dimensionality::Three => sampler.get3(x as f64, y as f64, z as f64),
            }
        })
        .collect();

    ScalarField {
        region: *region,
        data,
    }
}
