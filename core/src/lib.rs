// core holds the noise sampler, field generation, classification, the quadrant
// cache and attractor dynamics. No I/O lives here.
pub mod classify;
pub mod config;
pub mod dynamics;
pub mod engine;
pub mod error;
pub mod field;
pub mod params;
pub mod perlin;
pub mod quadrant;
pub mod sampler;

pub use classify::{Category, ClassificationRule, ClassifiedField, StepPolicy, classify};
pub use config::EngineConfig;
pub use dynamics::{AttractorDynamics, StepReport};
pub use engine::{Engine, TickReport};
pub use error::{EngineError, Result};
pub use field::{Region, ScalarField, generate, generate_with};
pub use params::{Dimensionality, NoiseParameters, WrapPeriods};
pub use quadrant::{
    DensityFalloff, QuadrantCache, QuadrantHandle, QuadrantKey, QuadrantSettings, ViewUpdate,
};
pub use sampler::{Coordinate, Sampler, sample};

// noise generator that can sample 2D or 3D points.
// Implementations must be pure: equal inputs give bit-identical outputs.
pub trait NoiseGenerator {
    // Sample 2D noise at (x, y).
    fn get2(&self, x: f64, y: f64) -> f64;

    // Sample 3D noise at (x, y, z).
    fn get3(&self, x: f64, y: f64, z: f64) -> f64;
}
