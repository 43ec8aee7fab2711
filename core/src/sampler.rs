use crate::NoiseGenerator;
use crate::params::NoiseParameters;
use crate::perlin::Perlin;

/// A 2D or 3D world-space point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coordinate {
    Xy(f64, f64),
    Xyz(f64, f64, f64),
}

struct Octave {
    frequency: f64,
    amplitude: f64,
    // lattice repeat per axis, in cells of this octave
    period: [Option<i64>; 3],
}

/// Fractal (multi-octave) Perlin sampler built once from [`NoiseParameters`].
///
/// Building the permutation table and the octave schedule is the only work done
/// up front; every `get2`/`get3` afterwards is a pure function of the coordinate.
pub struct Sampler {
    params: NoiseParameters,
    perlin: Perlin,
    octaves: Vec<Octave>,
}

impl Sampler {
    pub fn new(params: &NoiseParameters) -> Self {
        let wrap = params.wrap().map(|w| w.as_array());
        let mut octaves = Vec::with_capacity(params.octaves() as usize);
        let mut frequency = 1.0;
        let mut amplitude = 1.0;

        for _ in 0..params.octaves() {
            let mut period = [None; 3];
            if let Some(periods) = wrap {
                for (axis, world_period) in periods.iter().enumerate() {
                    period[axis] =
                        world_period.map(|p| ((p / params.scale()) * frequency).round() as i64);
                }
            }
            octaves.push(Octave {
                frequency,
                amplitude,
                period,
            });
            frequency *= params.lacunarity();
            amplitude *= params.persistence();
        }

        Self {
            params: params.clone(),
            perlin: Perlin::new(params.seed()),
            octaves,
        }
    }

    pub fn params(&self) -> &NoiseParameters {
        &self.params
    }

    pub fn sample(&self, coord: Coordinate) -> f64 {
        match coord {
            Coordinate::Xy(x, y) => self.get2(x, y),
            Coordinate::Xyz(x, y, z) => self.get3(x, y, z),
        }
    }
}

impl NoiseGenerator for Sampler {
    // Fractal sum, deliberately not renormalized: |value| <= sum(persistence^i)
    fn get2(&self, x: f64, y: f64) -> f64 {
        let inv = 1.0 / self.params.scale();
        let (nx, ny) = (x * inv, y * inv);
        self.octaves
            .iter()
            .map(|o| {
                o.amplitude
                    * self.perlin.noise2(
                        nx * o.frequency,
                        ny * o.frequency,
                        [o.period[0], o.period[1]],
                    )
            })
            .sum()
    }

    fn get3(&self, x: f64, y: f64, z: f64) -> f64 {
        let inv = 1.0 / self.params.scale();
        let (nx, ny, nz) = (x * inv, y * inv, z * inv);
        self.octaves
            .iter()
            .map(|o| {
                o.amplitude
                    * self.perlin.noise3(
                        nx * o.frequency,
                        ny * o.frequency,
                        nz * o.frequency,
                        o.period,
                    )
            })
            .sum()
    }
}

/// One-shot sample. Prefer holding a [`Sampler`] when sampling more than once.
pub fn sample(coord: Coordinate, params: &NoiseParameters) -> f64 {
    Sampler::new(params).sample(coord)
}
