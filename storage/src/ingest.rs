//! Real-data variant: map a point catalogue (e.g. star positions) onto a
//! quadrant lattice instead of generating it from noise.

use log::debug;
use spacemap_core::{Category, ClassificationRule, ClassifiedField, Region, ScalarField};

use crate::error::Result;

/// Step rule that marks every occupied cell `Dense`.
pub fn occupancy_rule() -> Result<ClassificationRule> {
    Ok(ClassificationRule::step(vec![
        (f64::MIN, Category::Empty),
        (0.0, Category::Dense),
    ])?)
}

/// Min-max map `points` into `region` and count points per cell.
///
/// Each axis is rescaled independently onto `[0, extent - 1]` and truncated.
/// An axis with no spread maps every point to cell 0. Flat regions ignore z.
pub fn map_points(points: &[[f64; 3]], region: Region) -> Result<ClassifiedField> {
    let shape = region.shape();
    let mut counts = vec![0.0; region.len()];

    if !points.is_empty() {
        let mut lo = [f64::INFINITY; 3];
        let mut hi = [f64::NEG_INFINITY; 3];
        for p in points {
            for axis in 0..3 {
                lo[axis] = lo[axis].min(p[axis]);
                hi[axis] = hi[axis].max(p[axis]);
            }
        }

        for p in points {
            let mut cell = [0usize; 3];
            for axis in 0..3 {
                let range = hi[axis] - lo[axis];
                if range > 0.0 && shape[axis] > 1 {
                    let t = (p[axis] - lo[axis]) / range;
                    cell[axis] = ((t * (shape[axis] - 1) as f64) as usize).min(shape[axis] - 1);
                }
            }
            counts[region.index(cell)] += 1.0;
        }
    }

    let field = ScalarField::from_samples(region, counts)?;
    let quadrant = ClassifiedField::new(field, occupancy_rule()?);
    debug!(
        "mapped {} points into {} occupied cells",
        points.len(),
        quadrant.counts()[Category::Dense as usize]
    );
    Ok(quadrant)
}
