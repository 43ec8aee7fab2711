use log::{debug, info};
use rayon::prelude::*;

use crate::config::EngineConfig;
use crate::dynamics::{AttractorDynamics, StepReport};
use crate::error::Result;
use crate::quadrant::{QuadrantCache, QuadrantKey, ViewUpdate};

/// Result of one [`Engine::tick`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TickReport {
    pub view: ViewUpdate,
    pub resident: usize,
    pub steps: StepReport,
}

/// Explicit engine state: configuration, the quadrant cache and the dynamics
/// rule. Ticks take `&mut self`, so two ticks never overlap.
pub struct Engine {
    config: EngineConfig,
    cache: QuadrantCache,
    dynamics: AttractorDynamics,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let cache = QuadrantCache::new(&config.noise, config.quadrant_settings())?;
        let dynamics = config.dynamics();
        info!(
            "engine ready: {:?} quadrants of edge {}, load radius {}, retention radius {}",
            config.dimensions,
            config.quadrant_edge_length,
            config.load_radius,
            config.retention_radius
        );
        Ok(Self {
            config,
            cache,
            dynamics,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &QuadrantCache {
        &self.cache
    }

    pub fn dynamics(&self) -> &AttractorDynamics {
        &self.dynamics
    }

    /// Load the viewer's neighbourhood without advancing any quadrant.
    pub fn observe(&mut self, viewer: [f64; 3]) -> ViewUpdate {
        self.cache
            .update_viewer(viewer, self.config.load_radius, self.config.retention_radius)
    }

    /// Move the viewer, then advance every resident quadrant by one attractor
    /// step. Quadrants are stepped in parallel, each under its own write lock.
    pub fn tick(&mut self, viewer: [f64; 3]) -> TickReport {
        let view = self.observe(viewer);
        let resident = self.cache.resident();

        let steps = resident
            .par_iter()
            .map(|(_, handle)| self.dynamics.step(&mut handle.write()))
            .reduce(StepReport::default, merge);

        debug!(
            "tick at {:?}: {} resident, {} loaded, {} evicted, {} moved",
            view.center,
            resident.len(),
            view.loaded.len(),
            view.evicted.len(),
            steps.moved
        );
        TickReport {
            view,
            resident: resident.len(),
            steps,
        }
    }

    /// Advance a single resident quadrant. `None` when it is not resident.
    pub fn step_quadrant(&mut self, key: QuadrantKey) -> Option<StepReport> {
        let handle = self.cache.get(key)?;
        let report = self.dynamics.step(&mut handle.write());
        Some(report)
    }
}

fn merge(a: StepReport, b: StepReport) -> StepReport {
    StepReport {
        attractors: a.attractors + b.attractors,
        mobile: a.mobile + b.mobile,
        moved: a.moved + b.moved,
        overwrites: a.overwrites + b.overwrites,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{Dimensionality, NoiseParameters};

    fn small_config() -> EngineConfig {
        EngineConfig {
            noise: NoiseParameters::new(5.0, 2, 0.5, 2.0, 3).unwrap(),
            dimensions: Dimensionality::Two,
            quadrant_edge_length: 8,
            load_radius: 1,
            retention_radius: 1,
            density_falloff: None,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn rejects_invalid_config() {
        let config = EngineConfig {
            retention_radius: 0,
            load_radius: 2,
            ..small_config()
        };
        assert!(Engine::new(config).is_err());
    }

    #[test]
    fn tick_loads_neighbourhood() {
        let mut engine = Engine::new(small_config()).unwrap();
        let report = engine.tick([0.0, 0.0, 0.0]);
        assert_eq!(report.resident, 9);
        assert_eq!(report.view.loaded.len(), 9);
        assert_eq!(engine.cache().generation_count(), 9);

        // staying in place generates nothing new
        let again = engine.tick([1.0, 1.0, 0.0]);
        assert!(again.view.loaded.is_empty());
        assert_eq!(engine.cache().generation_count(), 9);
    }

    #[test]
    fn ticks_are_reproducible() {
        let mut a = Engine::new(small_config()).unwrap();
        let mut b = Engine::new(small_config()).unwrap();
        for i in 0..4 {
            let viewer = [i as f64 * 5.0, 0.0, 0.0];
            assert_eq!(a.tick(viewer), b.tick(viewer));
        }
        for key in a.cache().resident_keys() {
            let qa = a.cache().get(key).unwrap();
            let qb = b.cache().get(key).unwrap();
            assert_eq!(*qa.read(), *qb.read());
        }
    }

    #[test]
    fn step_quadrant_requires_residency() {
        let mut engine = Engine::new(small_config()).unwrap();
        assert!(engine.step_quadrant([0, 0, 0]).is_none());
        engine.observe([0.0, 0.0, 0.0]);
        assert!(engine.step_quadrant([0, 0, 0]).is_some());
    }
}
