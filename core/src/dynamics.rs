use log::trace;
use serde::{Deserialize, Serialize};

use crate::classify::{Category, ClassifiedField};

/// Outcome of one attractor step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepReport {
    pub attractors: usize,
    pub mobile: usize,
    /// Entities whose rounded displacement was non-zero.
    pub moved: usize,
    /// Moves that landed on a cell that was not empty at the time.
    pub overwrites: usize,
}

/// Inverse-square pull of mobile cells toward their nearest attractor cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttractorDynamics {
    pub attractor: Category,
    pub mobile: Vec<Category>,
}

impl Default for AttractorDynamics {
    fn default() -> Self {
        Self {
            attractor: Category::Extreme,
            mobile: vec![Category::Dense, Category::Sparse],
        }
    }
}

impl AttractorDynamics {
    pub fn new(attractor: Category, mobile: Vec<Category>) -> Self {
        Self { attractor, mobile }
    }

    /// Advance `field` by one tick, in place.
    ///
    /// Positions are snapshotted first. Entities are then processed grouped by
    /// mobile category (in configured order), ascending (x, y, z) within a group.
    /// Each move clears the source cell and overwrites the destination, so a
    /// later move can erase an earlier arrival. Collisions are left unresolved.
    pub fn step(&self, field: &mut ClassifiedField) -> StepReport {
        let attractors = field.entities(self.attractor);
        if attractors.is_empty() {
            return StepReport::default();
        }

        let region = *field.region();
        let shape = region.shape();
        let mut moves = Vec::new();
        for &category in &self.mobile {
            if category == self.attractor {
                continue;
            }
            for cell in field.entities(category) {
                let target = nearest(&attractors, cell);
                moves.push((cell, displacement(cell, target), category));
            }
        }

        let mut report = StepReport {
            attractors: attractors.len(),
            mobile: moves.len(),
            ..StepReport::default()
        };
        let labels = field.labels_mut();
        for (cell, delta, category) in moves {
            let dest = wrap(cell, delta, shape);
            if dest != cell {
                report.moved += 1;
                if labels[region.index(dest)] != Category::Empty {
                    report.overwrites += 1;
                }
            }
            labels[region.index(cell)] = Category::Empty;
            labels[region.index(dest)] = category;
        }

        trace!(
            "attractor step: {} attractors, {} mobile, {} moved, {} overwrites",
            report.attractors, report.mobile, report.moved, report.overwrites
        );
        report
    }
}

// Euclidean nearest; `attractors` is sorted so the first minimum wins ties
fn nearest(attractors: &[[usize; 3]], cell: [usize; 3]) -> [usize; 3] {
    let mut best = attractors[0];
    let mut best_d2 = f64::INFINITY;
    for &a in attractors {
        let d2 = distance_sq(a, cell);
        if d2 < best_d2 {
            best_d2 = d2;
            best = a;
        }
    }
    best
}

fn distance_sq(a: [usize; 3], b: [usize; 3]) -> f64 {
    (0..3)
        .map(|i| {
            let d = a[i] as f64 - b[i] as f64;
            d * d
        })
        .sum()
}

// round(force * unit) per axis with force = 1 / distance^2
fn displacement(cell: [usize; 3], target: [usize; 3]) -> [i64; 3] {
    let d2 = distance_sq(cell, target);
    if d2 == 0.0 {
        return [0; 3];
    }
    let distance = d2.sqrt();
    let force = 1.0 / d2;
    let mut delta = [0i64; 3];
    for i in 0..3 {
        let unit = (target[i] as f64 - cell[i] as f64) / distance;
        delta[i] = (force * unit).round() as i64;
    }
    delta
}

fn wrap(cell: [usize; 3], delta: [i64; 3], shape: [usize; 3]) -> [usize; 3] {
    let mut out = [0usize; 3];
    for i in 0..3 {
        out[i] = (cell[i] as i64 + delta[i]).rem_euclid(shape[i] as i64) as usize;
    }
    out
}
