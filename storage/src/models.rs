use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use spacemap_core::{
    Category, ClassificationRule, ClassifiedField, Dimensionality, QuadrantKey, Region,
    ScalarField,
};

use crate::error::{Result, StorageError};

/// Snapshot of one resident quadrant, including moved labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuadrantDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none", default)]
    pub id: Option<ObjectId>,
    pub seed: i64,
    pub key: Vec<i64>,
    pub origin: Vec<i64>,
    // [width, height, depth]; depth is 1 for flat quadrants
    pub shape: Vec<i64>,
    pub dimensions: Dimensionality,
    pub rule: ClassificationRule,
    // x-fastest, length = width * height * depth
    pub samples: Vec<f64>,
    pub labels: Vec<u8>,
}

impl QuadrantDoc {
    pub fn from_quadrant(seed: i64, key: QuadrantKey, quadrant: &ClassifiedField) -> Self {
        let region = quadrant.region();
        Self {
            id: None,
            seed,
            key: key.to_vec(),
            origin: region.origin().to_vec(),
            shape: region.shape().iter().map(|&s| s as i64).collect(),
            dimensions: region.dims(),
            rule: quadrant.rule().clone(),
            samples: quadrant.field().values().to_vec(),
            labels: quadrant.labels().iter().map(|c| c.as_u8()).collect(),
        }
    }

    pub fn quadrant_key(&self) -> Result<QuadrantKey> {
        triple(&self.key, "key")
    }

    /// Rebuild the classified quadrant, checking every length and label byte.
    pub fn into_quadrant(self) -> Result<(QuadrantKey, ClassifiedField)> {
        let key = self.quadrant_key()?;
        let origin = triple(&self.origin, "origin")?;
        let shape = triple(&self.shape, "shape")?;
        let region = Region::new(origin, shape, self.dimensions)?;
        let field = ScalarField::from_samples(region, self.samples)?;

        let labels = self
            .labels
            .into_iter()
            .map(|b| {
                Category::try_from(b).map_err(|_| StorageError::Corrupt(format!("label byte {b}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let quadrant = ClassifiedField::from_parts(field, self.rule, labels)?;
        Ok((key, quadrant))
    }
}

fn triple(values: &[i64], what: &str) -> Result<[i64; 3]> {
    <[i64; 3]>::try_from(values)
        .map_err(|_| StorageError::Corrupt(format!("{what} has {} components", values.len())))
}
