use serde::{Deserialize, Serialize};

use crate::classify::{Category, ClassificationRule};
use crate::dynamics::AttractorDynamics;
use crate::error::{EngineError, Result};
use crate::params::{Dimensionality, NoiseParameters};
use crate::quadrant::{DensityFalloff, QuadrantSettings};

/// Everything an [`Engine`](crate::Engine) needs, loadable from JSON.
///
/// Missing fields fall back to [`EngineConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub noise: NoiseParameters,
    pub dimensions: Dimensionality,
    pub quadrant_edge_length: u32,
    pub load_radius: u32,
    pub retention_radius: u32,
    pub classification: ClassificationRule,
    pub density_falloff: Option<DensityFalloff>,
    pub attractor_category: Category,
    pub mobile_categories: Vec<Category>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            noise: NoiseParameters::default(),
            dimensions: Dimensionality::Three,
            quadrant_edge_length: 20,
            load_radius: 1,
            retention_radius: 2,
            classification: ClassificationRule::default(),
            density_falloff: Some(DensityFalloff::default()),
            attractor_category: Category::Extreme,
            mobile_categories: vec![Category::Dense, Category::Sparse],
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.quadrant_edge_length == 0 {
            return Err(EngineError::InvalidParameter(
                "quadrant_edge_length must be positive".to_string(),
            ));
        }
        if self.retention_radius < self.load_radius {
            return Err(EngineError::InvalidParameter(format!(
                "retention_radius {} is smaller than load_radius {}",
                self.retention_radius, self.load_radius
            )));
        }
        if self.mobile_categories.contains(&self.attractor_category) {
            return Err(EngineError::InvalidParameter(format!(
                "{:?} cannot be both attractor and mobile",
                self.attractor_category
            )));
        }
        self.classification.validate()
    }

    pub fn quadrant_settings(&self) -> QuadrantSettings {
        QuadrantSettings {
            dims: self.dimensions,
            edge_length: self.quadrant_edge_length,
            rule: self.classification.clone(),
            falloff: self.density_falloff,
        }
    }

    pub fn dynamics(&self) -> AttractorDynamics {
        AttractorDynamics::new(self.attractor_category, self.mobile_categories.clone())
    }
}
