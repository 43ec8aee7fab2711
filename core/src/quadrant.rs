use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use log::debug;
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::classify::{ClassificationRule, ClassifiedField};
use crate::error::{EngineError, Result};
use crate::field::{Region, generate_with};
use crate::params::{Dimensionality, NoiseParameters};
use crate::perlin::mix64;
use crate::sampler::Sampler;

/// Integer triple naming one cube (or tile, z = 0) of world space.
pub type QuadrantKey = [i64; 3];

/// Shared, lockable view of a resident quadrant.
pub type QuadrantHandle = Arc<RwLock<ClassifiedField>>;

// Filled exactly once; concurrent `ensure` callers block on the same cell
type Slot = Arc<OnceLock<QuadrantHandle>>;

/// Acceptance probability for non-empty cells, falling off with the distance
/// between a quadrant and the viewer's quadrant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DensityFalloff {
    pub near: f64,
    pub far: f64,
}

impl DensityFalloff {
    pub fn density(&self, distance: f64) -> f64 {
        self.far.max(self.near / (1.0 + distance))
    }
}

impl Default for DensityFalloff {
    fn default() -> Self {
        Self {
            near: 0.1,
            far: 0.02,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuadrantSettings {
    pub dims: Dimensionality,
    pub edge_length: u32,
    pub rule: ClassificationRule,
    pub falloff: Option<DensityFalloff>,
}

/// What a viewer update changed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewUpdate {
    pub center: QuadrantKey,
    pub loaded: Vec<QuadrantKey>,
    pub evicted: Vec<QuadrantKey>,
}

/// Lazily generated, bounded neighbourhood of classified quadrants.
///
/// Each key is generated at most once while resident. `ensure` on different
/// keys runs concurrently; on the same key the first caller generates and the
/// others wait for its result. `prune` skips entries still being generated.
pub struct QuadrantCache {
    sampler: Arc<Sampler>,
    settings: QuadrantSettings,
    center: Mutex<QuadrantKey>,
    slots: DashMap<QuadrantKey, Slot>,
    generated: AtomicUsize,
}

impl QuadrantCache {
    pub fn new(params: &NoiseParameters, settings: QuadrantSettings) -> Result<Self> {
        if settings.edge_length == 0 {
            return Err(EngineError::InvalidParameter(
                "quadrant edge length must be positive".to_string(),
            ));
        }
        settings.rule.validate()?;
        if let Some(f) = settings.falloff {
            if !(0.0..=1.0).contains(&f.near) || !(0.0..=1.0).contains(&f.far) {
                return Err(EngineError::InvalidParameter(format!(
                    "density falloff must lie in [0, 1], got near {} far {}",
                    f.near, f.far
                )));
            }
        }

        Ok(Self {
            sampler: Arc::new(Sampler::new(params)),
            settings,
            center: Mutex::new([0; 3]),
            slots: DashMap::new(),
            generated: AtomicUsize::new(0),
        })
    }

    pub fn settings(&self) -> &QuadrantSettings {
        &self.settings
    }

    pub fn seed(&self) -> i64 {
        self.sampler.params().seed()
    }

    /// Quadrant containing a world position (floored division by edge length).
    /// Positions past the i64 key range clamp to the outermost key.
    pub fn key_for(&self, position: [f64; 3]) -> QuadrantKey {
        let edge = self.settings.edge_length as f64;
        let z = match self.settings.dims {
            Dimensionality::Two => 0,
            Dimensionality::Three => (position[2] / edge).floor() as i64,
        };
        [
            (position[0] / edge).floor() as i64,
            (position[1] / edge).floor() as i64,
            z,
        ]
    }

    /// World-space box covered by a quadrant.
    pub fn region_for(&self, key: QuadrantKey) -> Region {
        let edge = self.settings.edge_length as i64;
        let origin = key.map(|k| k.saturating_mul(edge));
        // edge_length > 0 is checked on construction
        match self.settings.dims {
            Dimensionality::Two => Region::new2([origin[0], origin[1]], [edge, edge]),
            Dimensionality::Three => Region::new3(origin, [edge; 3]),
        }
        .unwrap_or_else(|_| unreachable!("quadrant edge length is positive"))
    }

    pub fn center(&self) -> QuadrantKey {
        *self.center.lock()
    }

    pub fn set_center(&self, key: QuadrantKey) {
        *self.center.lock() = key;
    }

    /// Generate `key` if absent, otherwise return the resident quadrant.
    pub fn ensure(&self, key: QuadrantKey) -> QuadrantHandle {
        // clone the slot out so the map shard is not locked while generating
        let slot = self
            .slots
            .entry(key)
            .or_insert_with(|| Arc::new(OnceLock::new()))
            .clone();
        slot.get_or_init(|| Arc::new(RwLock::new(self.build(key))))
            .clone()
    }

    /// Install an externally produced quadrant. A resident quadrant wins.
    pub fn adopt(&self, key: QuadrantKey, field: ClassifiedField) -> Result<QuadrantHandle> {
        let expected = self.region_for(key);
        if *field.region() != expected {
            return Err(EngineError::InvalidParameter(format!(
                "field covering {:?} does not match quadrant {key:?}",
                field.region()
            )));
        }
        let slot = self
            .slots
            .entry(key)
            .or_insert_with(|| Arc::new(OnceLock::new()))
            .clone();
        Ok(slot.get_or_init(|| Arc::new(RwLock::new(field))).clone())
    }

    pub fn get(&self, key: QuadrantKey) -> Option<QuadrantHandle> {
        self.slots.get(&key).and_then(|slot| slot.get().cloned())
    }

    pub fn is_resident(&self, key: QuadrantKey) -> bool {
        self.get(key).is_some()
    }

    /// Evict every resident quadrant farther than `radius` (Chebyshev) from
    /// `center`. Returns the evicted keys in ascending order.
    pub fn prune(&self, center: QuadrantKey, radius: u32) -> Vec<QuadrantKey> {
        let mut evicted = Vec::new();
        self.slots.retain(|key, slot| {
            // in-flight generation is never torn down
            let keep = chebyshev(*key, center) <= radius as u64 || slot.get().is_none();
            if !keep {
                evicted.push(*key);
            }
            keep
        });
        evicted.sort_unstable();
        if !evicted.is_empty() {
            debug!("evicted {} quadrants around {center:?}", evicted.len());
        }
        evicted
    }

    /// Recentre on the viewer, make the `load_radius` neighbourhood resident and
    /// drop everything beyond `retention_radius`.
    pub fn update_viewer(
        &self,
        position: [f64; 3],
        load_radius: u32,
        retention_radius: u32,
    ) -> ViewUpdate {
        let center = self.key_for(position);
        self.set_center(center);

        let loaded: Vec<QuadrantKey> = self
            .neighbourhood(center, load_radius)
            .into_iter()
            .filter(|k| !self.is_resident(*k))
            .collect();
        loaded.par_iter().for_each(|&key| {
            self.ensure(key);
        });

        let evicted = self.prune(center, retention_radius);
        ViewUpdate {
            center,
            loaded,
            evicted,
        }
    }

    /// Keys within Chebyshev distance `radius` of `center`, ascending.
    pub fn neighbourhood(&self, center: QuadrantKey, radius: u32) -> Vec<QuadrantKey> {
        let r = radius as i64;
        let z_range = match self.settings.dims {
            Dimensionality::Two => 0..=0,
            Dimensionality::Three => -r..=r,
        };
        let mut keys = Vec::new();
        for dx in -r..=r {
            for dy in -r..=r {
                for dz in z_range.clone() {
                    keys.push([
                        center[0].saturating_add(dx),
                        center[1].saturating_add(dy),
                        center[2].saturating_add(dz),
                    ]);
                }
            }
        }
        // clamped keys at the edge of the range collapse onto each other
        keys.sort_unstable();
        keys.dedup();
        keys
    }

    /// Resident keys, ascending. In-flight generations are not listed.
    pub fn resident_keys(&self) -> Vec<QuadrantKey> {
        let mut keys: Vec<QuadrantKey> = self
            .slots
            .iter()
            .filter(|entry| entry.value().get().is_some())
            .map(|entry| *entry.key())
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Resident quadrants with their handles, ascending by key.
    pub fn resident(&self) -> Vec<(QuadrantKey, QuadrantHandle)> {
        let mut out: Vec<(QuadrantKey, QuadrantHandle)> = self
            .slots
            .iter()
            .filter_map(|entry| entry.value().get().map(|h| (*entry.key(), h.clone())))
            .collect();
        out.sort_unstable_by_key(|(k, _)| *k);
        out
    }

    pub fn len(&self) -> usize {
        self.resident_keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of generate + classify runs performed so far.
    pub fn generation_count(&self) -> usize {
        self.generated.load(Ordering::SeqCst)
    }

    fn build(&self, key: QuadrantKey) -> ClassifiedField {
        self.generated.fetch_add(1, Ordering::SeqCst);
        let region = self.region_for(key);
        let field = generate_with(&self.sampler, &region);
        let rule = self.settings.rule.clone();

        let density = self.settings.falloff.map(|f| {
            let center = self.center();
            f.density(euclidean(key, center))
        });
        debug!("generating quadrant {key:?} (density {density:?})");

        let seed = self.sampler.params().seed();
        match density {
            Some(d) => {
                ClassifiedField::with_acceptance(field, rule, |i| acceptance_draw(seed, key, i) < d)
            }
            None => ClassifiedField::new(field, rule),
        }
    }
}

pub fn chebyshev(a: QuadrantKey, b: QuadrantKey) -> u64 {
    (0..3).map(|i| a[i].abs_diff(b[i])).max().unwrap_or(0)
}

pub fn euclidean(a: QuadrantKey, b: QuadrantKey) -> f64 {
    (0..3)
        .map(|i| {
            let d = a[i].abs_diff(b[i]) as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Uniform draw in [0, 1) keyed by seed, quadrant and cell index. Regenerating
/// a quadrant replays exactly the same draws.
pub fn acceptance_draw(seed: i64, key: QuadrantKey, index: usize) -> f64 {
    let mut h = mix64(seed as u64);
    for k in key {
        h = mix64(h ^ k as u64);
    }
    h = mix64(h ^ index as u64);
    (h >> 11) as f64 / (1u64 << 53) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Category;

    fn settings(dims: Dimensionality, falloff: Option<DensityFalloff>) -> QuadrantSettings {
        QuadrantSettings {
            dims,
            edge_length: 8,
            rule: ClassificationRule::space_density(0.2).unwrap(),
            falloff,
        }
    }

    fn cache(dims: Dimensionality, falloff: Option<DensityFalloff>) -> QuadrantCache {
        let params = NoiseParameters::new(6.0, 2, 0.5, 2.0, 42).unwrap();
        QuadrantCache::new(&params, settings(dims, falloff)).unwrap()
    }

    #[test]
    fn keys_floor_toward_negative() {
        let c = cache(Dimensionality::Three, None);
        assert_eq!(c.key_for([0.0, 7.9, 8.0]), [0, 0, 1]);
        assert_eq!(c.key_for([-0.1, -8.0, -8.1]), [-1, -1, -2]);
        let flat = cache(Dimensionality::Two, None);
        assert_eq!(flat.key_for([17.0, -3.0, 99.0]), [2, -1, 0]);
        assert_eq!(c.region_for([-1, 0, 2]).origin(), [-8, 0, 16]);
    }

    #[test]
    fn ensure_is_idempotent() {
        let c = cache(Dimensionality::Three, None);
        let a = c.ensure([0, 0, 0]);
        let b = c.ensure([0, 0, 0]);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(c.generation_count(), 1);
        assert_eq!(c.resident_keys(), vec![[0, 0, 0]]);
    }

    #[test]
    fn prune_respects_radius_and_center() {
        let c = cache(Dimensionality::Two, None);
        for key in c.neighbourhood([0, 0, 0], 2) {
            c.ensure(key);
        }
        assert_eq!(c.len(), 25);

        let evicted = c.prune([0, 0, 0], 1);
        assert_eq!(evicted.len(), 16);
        assert!(c.resident_keys().iter().all(|k| chebyshev(*k, [0, 0, 0]) <= 1));

        c.prune([0, 0, 0], 0);
        assert_eq!(c.resident_keys(), vec![[0, 0, 0]]);
        // already absent keys are fine
        assert!(c.prune([0, 0, 0], 0).is_empty());
    }

    #[test]
    fn regeneration_after_eviction_is_reproducible() {
        let c = cache(Dimensionality::Three, Some(DensityFalloff::default()));
        let first = c.ensure([1, 0, 0]).read().clone();
        c.prune([5, 5, 5], 0);
        assert!(!c.is_resident([1, 0, 0]));
        let second = c.ensure([1, 0, 0]).read().clone();
        assert_eq!(first, second);
        assert_eq!(c.generation_count(), 2);
    }

    #[test]
    fn far_quadrants_are_sparser() {
        // every cell classifies non-empty, so only the falloff draw decides occupancy
        let params = NoiseParameters::new(6.0, 2, 0.5, 2.0, 42).unwrap();
        let c = QuadrantCache::new(
            &params,
            QuadrantSettings {
                dims: Dimensionality::Two,
                edge_length: 16,
                rule: ClassificationRule::step(vec![(f64::MIN, Category::Dense)]).unwrap(),
                falloff: Some(DensityFalloff { near: 1.0, far: 0.0 }),
            },
        )
        .unwrap();
        let key = [6, 0, 0];

        // viewer on the quadrant: density 1.0
        c.set_center(key);
        let near = c.ensure(key).read().labels().to_vec();
        c.prune([100, 100, 0], 0);
        assert!(!c.is_resident(key));

        // viewer six quadrants away: density 1/7
        c.set_center([0, 0, 0]);
        let far = c.ensure(key).read().labels().to_vec();

        let occupied =
            |labels: &[Category]| labels.iter().filter(|l| **l != Category::Empty).count();
        assert_eq!(occupied(&near), 256);
        assert!(occupied(&far) < occupied(&near));
        // draws are shared, so every far survivor was also kept near
        for (n, f) in near.iter().zip(&far) {
            if *f != Category::Empty {
                assert_eq!(n, f);
            }
        }
    }

    #[test]
    fn prune_skips_in_flight_slots() {
        let c = cache(Dimensionality::Two, None);
        c.ensure([0, 0, 0]);
        // a slot whose generation has not finished yet
        c.slots.insert([9, 9, 0], Arc::new(OnceLock::new()));

        let evicted = c.prune([0, 0, 0], 0);
        assert!(evicted.is_empty());
        assert!(c.slots.contains_key(&[9, 9, 0]));
        assert_eq!(c.resident_keys(), vec![[0, 0, 0]]);

        c.ensure([9, 9, 0]);
        assert!(c.is_resident([9, 9, 0]));
        assert_eq!(c.generation_count(), 2);
        assert_eq!(c.prune([0, 0, 0], 0), vec![[9, 9, 0]]);
    }

    #[test]
    fn extreme_positions_do_not_overflow() {
        let c = cache(Dimensionality::Two, None);
        assert_eq!(c.key_for([1e30, -1e30, 0.0]), [i64::MAX, i64::MIN, 0]);
        let region = c.region_for([i64::MAX, i64::MIN, 0]);
        assert_eq!(region.origin(), [i64::MAX, i64::MIN, 0]);

        let update = c.update_viewer([1e30, -1e30, 0.0], 1, 1);
        assert_eq!(update.center, [i64::MAX, i64::MIN, 0]);
        // neighbours past the range clamp onto the edge keys
        assert_eq!(update.loaded.len(), 4);
        assert_eq!(c.len(), 4);
        for (_, handle) in c.resident() {
            assert!(handle.read().field().values().iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn falloff_curve() {
        let f = DensityFalloff::default();
        assert!((f.density(0.0) - 0.1).abs() < 1e-12);
        assert!((f.density(1.0) - 0.05).abs() < 1e-12);
        assert!((f.density(100.0) - 0.02).abs() < 1e-12);
    }

    #[test]
    fn draws_are_keyed() {
        let a = acceptance_draw(42, [0, 0, 0], 5);
        assert_eq!(a.to_bits(), acceptance_draw(42, [0, 0, 0], 5).to_bits());
        assert!((0.0..1.0).contains(&a));
        assert_ne!(a.to_bits(), acceptance_draw(42, [0, 0, 1], 5).to_bits());
        assert_ne!(a.to_bits(), acceptance_draw(43, [0, 0, 0], 5).to_bits());
    }

    #[test]
    fn viewer_update_loads_and_evicts() {
        let c = cache(Dimensionality::Two, None);
        let first = c.update_viewer([4.0, 4.0, 0.0], 1, 1);
        assert_eq!(first.center, [0, 0, 0]);
        assert_eq!(first.loaded.len(), 9);
        assert!(first.evicted.is_empty());

        let second = c.update_viewer([12.0, 4.0, 0.0], 1, 1);
        assert_eq!(second.center, [1, 0, 0]);
        assert_eq!(second.loaded, vec![[2, -1, 0], [2, 0, 0], [2, 1, 0]]);
        assert_eq!(second.evicted, vec![[-1, -1, 0], [-1, 0, 0], [-1, 1, 0]]);
        assert_eq!(c.len(), 9);
        assert_eq!(c.generation_count(), 12);
    }

    #[test]
    fn adopt_checks_region_and_keeps_resident() {
        let c = cache(Dimensionality::Two, None);
        let region = c.region_for([3, 3, 0]);
        let field = ClassifiedField::new(
            crate::field::ScalarField::from_samples(region, vec![0.0; region.len()]).unwrap(),
            c.settings().rule.clone(),
        );
        let adopted = c.adopt([3, 3, 0], field.clone()).unwrap();
        assert_eq!(c.generation_count(), 0);
        assert!(Arc::ptr_eq(&adopted, &c.ensure([3, 3, 0])));
        assert!(c.adopt([4, 3, 0], field).is_err());
    }
}
