use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::field::{Region, ScalarField};

/// Semantic density bucket of a cell.
///
/// Space maps read these as void / gas / star / black hole, terrain maps as
/// water / land / mountain (with `Extreme` unused).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Category {
    #[default]
    Empty = 0,
    Sparse = 1,
    Dense = 2,
    Extreme = 3,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Empty,
        Category::Sparse,
        Category::Dense,
        Category::Extreme,
    ];

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Category {
    type Error = EngineError;

    fn try_from(v: u8) -> Result<Self> {
        Category::ALL
            .get(v as usize)
            .copied()
            .ok_or_else(|| EngineError::InvalidParameter(format!("unknown category byte {v}")))
    }
}

/// Ordered `(bound, category)` buckets.
///
/// A value takes the category of the last bucket whose bound it strictly
/// exceeds; anything at or below the second bound falls into the first bucket.
/// A value sitting exactly on a bound therefore resolves to the earlier bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<(f64, Category)>", into = "Vec<(f64, Category)>")]
pub struct StepPolicy {
    bounds: Vec<f64>,
    categories: Vec<Category>,
}

impl StepPolicy {
    pub fn new(buckets: Vec<(f64, Category)>) -> Result<Self> {
        if buckets.is_empty() {
            return Err(EngineError::InvalidParameter(
                "a step policy needs at least one bucket".to_string(),
            ));
        }
        if buckets.iter().any(|(b, _)| b.is_nan()) {
            return Err(EngineError::InvalidParameter(
                "bucket bounds must not be NaN".to_string(),
            ));
        }
        if buckets.windows(2).any(|w| w[0].0 >= w[1].0) {
            return Err(EngineError::InvalidParameter(
                "bucket bounds must be strictly ascending".to_string(),
            ));
        }
        let (bounds, categories) = buckets.into_iter().unzip();
        Ok(Self { bounds, categories })
    }

    /// Position of the bucket `value` falls into. Non-decreasing in `value`.
    pub fn bucket_index(&self, value: f64) -> usize {
        self.bounds[1..].partition_point(|&b| b < value)
    }

    pub fn apply(&self, value: f64) -> Category {
        self.categories[self.bucket_index(value)]
    }

    pub fn buckets(&self) -> impl Iterator<Item = (f64, Category)> + '_ {
        self.bounds.iter().copied().zip(self.categories.iter().copied())
    }
}

impl TryFrom<Vec<(f64, Category)>> for StepPolicy {
    type Error = EngineError;

    fn try_from(buckets: Vec<(f64, Category)>) -> Result<Self> {
        StepPolicy::new(buckets)
    }
}

impl From<StepPolicy> for Vec<(f64, Category)> {
    fn from(p: StepPolicy) -> Self {
        p.bounds.into_iter().zip(p.categories).collect()
    }
}

/// Pure `f64 -> Category` mapping applied per cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ClassificationRule {
    Step {
        thresholds: StepPolicy,
    },
    /// Logistic soft threshold; the sigmoid output goes through `buckets`.
    Sigmoid {
        steepness: f64,
        threshold: f64,
        buckets: StepPolicy,
    },
}

impl ClassificationRule {
    pub fn step(buckets: Vec<(f64, Category)>) -> Result<Self> {
        Ok(Self::Step {
            thresholds: StepPolicy::new(buckets)?,
        })
    }

    pub fn sigmoid(steepness: f64, threshold: f64, buckets: Vec<(f64, Category)>) -> Result<Self> {
        let rule = Self::Sigmoid {
            steepness,
            threshold,
            buckets: StepPolicy::new(buckets)?,
        };
        rule.validate()?;
        Ok(rule)
    }

    /// Void / gas / star / black hole over raw samples around threshold `t`.
    pub fn space_density(t: f64) -> Result<Self> {
        Self::step(vec![
            (f64::MIN, Category::Extreme),
            (-t, Category::Empty),
            (t / 2.0, Category::Sparse),
            (t, Category::Dense),
        ])
    }

    /// Water / land / mountain over raw samples.
    pub fn terrain() -> Self {
        Self::Step {
            thresholds: StepPolicy {
                bounds: vec![f64::MIN, -0.2, 0.2],
                categories: vec![Category::Empty, Category::Sparse, Category::Dense],
            },
        }
    }

    /// Sigmoid space map: low outputs are black holes, high outputs stars.
    pub fn sigmoid_space(steepness: f64, threshold: f64) -> Result<Self> {
        Self::sigmoid(
            steepness,
            threshold,
            vec![
                (0.0, Category::Extreme),
                (0.2, Category::Empty),
                (0.5, Category::Sparse),
                (0.8, Category::Dense),
            ],
        )
    }

    pub fn validate(&self) -> Result<()> {
        if let Self::Sigmoid {
            steepness,
            threshold,
            ..
        } = self
        {
            if !(steepness.is_finite() && *steepness > 0.0) {
                return Err(EngineError::InvalidParameter(format!(
                    "sigmoid steepness must be positive, got {steepness}"
                )));
            }
            if !threshold.is_finite() {
                return Err(EngineError::InvalidParameter(
                    "sigmoid threshold must be finite".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn apply(&self, value: f64) -> Category {
        match self {
            Self::Step { thresholds } => thresholds.apply(value),
            Self::Sigmoid {
                steepness,
                threshold,
                buckets,
            } => buckets.apply(sigmoid(value, *steepness, *threshold)),
        }
    }
}

impl Default for ClassificationRule {
    fn default() -> Self {
        Self::Sigmoid {
            steepness: 10.0,
            threshold: 0.2,
            buckets: StepPolicy {
                bounds: vec![0.0, 0.2, 0.5, 0.8],
                categories: vec![
                    Category::Extreme,
                    Category::Empty,
                    Category::Sparse,
                    Category::Dense,
                ],
            },
        }
    }
}

#[inline]
pub fn sigmoid(value: f64, steepness: f64, threshold: f64) -> f64 {
    1.0 / (1.0 + (-steepness * (value - threshold)).exp())
}

/// A scalar field together with the rule that labelled it.
///
/// Labels only change through attractor steps, which move them between cells.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedField {
    field: ScalarField,
    rule: ClassificationRule,
    labels: Vec<Category>,
}

impl ClassifiedField {
    pub fn new(field: ScalarField, rule: ClassificationRule) -> Self {
        Self::with_acceptance(field, rule, |_| true)
    }

    /// Classify, then demote to `Empty` every non-empty cell whose index fails
    /// `accept`. Used for distance-dependent generation density.
    pub fn with_acceptance<F>(field: ScalarField, rule: ClassificationRule, accept: F) -> Self
    where
        F: Fn(usize) -> bool + Sync,
    {
        let labels = field
            .values()
            .par_iter()
            .enumerate()
            .map(|(i, &v)| match rule.apply(v) {
                Category::Empty => Category::Empty,
                c if accept(i) => c,
                _ => Category::Empty,
            })
            .collect();
        Self {
            field,
            rule,
            labels,
        }
    }

    /// Reassemble a field from stored parts, e.g. a persisted snapshot.
    pub fn from_parts(
        field: ScalarField,
        rule: ClassificationRule,
        labels: Vec<Category>,
    ) -> Result<Self> {
        if labels.len() != field.values().len() {
            return Err(EngineError::ShapeMismatch {
                expected: field.values().len(),
                actual: labels.len(),
            });
        }
        Ok(Self {
            field,
            rule,
            labels,
        })
    }

    pub fn field(&self) -> &ScalarField {
        &self.field
    }

    pub fn rule(&self) -> &ClassificationRule {
        &self.rule
    }

    pub fn region(&self) -> &Region {
        self.field.region()
    }

    pub fn shape(&self) -> [usize; 3] {
        self.field.shape()
    }

    pub fn labels(&self) -> &[Category] {
        &self.labels
    }

    pub(crate) fn labels_mut(&mut self) -> &mut [Category] {
        &mut self.labels
    }

    pub fn category_at(&self, cell: [usize; 3]) -> Result<Category> {
        Ok(self.labels[self.region().checked_index(cell)?])
    }

    /// Cells currently holding `category`, in ascending (x, y, z) order.
    pub fn entities(&self, category: Category) -> Vec<[usize; 3]> {
        let region = self.region();
        let mut cells: Vec<[usize; 3]> = self
            .labels
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == category)
            .map(|(i, _)| region.cell(i))
            .collect();
        cells.sort_unstable();
        cells
    }

    /// Number of cells per category, indexed by `Category as usize`.
    pub fn counts(&self) -> [usize; 4] {
        let mut counts = [0; 4];
        for c in &self.labels {
            counts[*c as usize] += 1;
        }
        counts
    }

    pub fn slice_z(&self, z: usize) -> Result<Vec<Category>> {
        let [w, h, d] = self.shape();
        if z >= d {
            return Err(EngineError::OutOfBounds {
                index: [0, 0, z],
                shape: self.shape(),
            });
        }
        let start = z * w * h;
        Ok(self.labels[start..start + w * h].to_vec())
    }
}

/// Label every cell of `field` independently. The input field is left untouched.
pub fn classify(field: &ScalarField, rule: &ClassificationRule) -> ClassifiedField {
    ClassifiedField::new(field.clone(), rule.clone())
}
