use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

// Tolerance used when checking that wrap periods land on whole lattice cells
const LATTICE_EPSILON: f64 = 1e-9;

/// Whether fields and quadrants are flat maps or volumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimensionality {
    Two,
    #[default]
    Three,
}

/// World-space repeat periods. `z` only matters for volumetric sampling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WrapPeriods {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl WrapPeriods {
    pub fn new2(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }

    pub fn new3(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z: Some(z) }
    }

    pub fn as_array(&self) -> [Option<f64>; 3] {
        [Some(self.x), Some(self.y), self.z]
    }
}

/// Immutable fractal noise settings, validated once on construction.
///
/// World coordinates are divided by `scale` to reach noise space. Octave `i`
/// samples at frequency `lacunarity^i` with amplitude `persistence^i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNoiseParameters", into = "RawNoiseParameters")]
pub struct NoiseParameters {
    scale: f64,
    octaves: u32,
    persistence: f64,
    lacunarity: f64,
    seed: i64,
    wrap: Option<WrapPeriods>,
}

impl NoiseParameters {
    pub fn new(
        scale: f64,
        octaves: u32,
        persistence: f64,
        lacunarity: f64,
        seed: i64,
    ) -> Result<Self> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(EngineError::InvalidParameter(format!(
                "scale must be positive and finite, got {scale}"
            )));
        }
        if octaves == 0 {
            return Err(EngineError::InvalidParameter(
                "octaves must be at least 1".to_string(),
            ));
        }
        if !(persistence > 0.0 && persistence <= 1.0) {
            return Err(EngineError::InvalidParameter(format!(
                "persistence must lie in (0, 1], got {persistence}"
            )));
        }
        if !(lacunarity.is_finite() && lacunarity > 1.0) {
            return Err(EngineError::InvalidParameter(format!(
                "lacunarity must be greater than 1, got {lacunarity}"
            )));
        }

        Ok(Self {
            scale,
            octaves,
            persistence,
            lacunarity,
            seed,
            wrap: None,
        })
    }

    /// Make the noise tile seamlessly with the given world-space periods.
    ///
    /// Every octave wraps its lattice, so each period must cover a whole number
    /// of lattice cells (`period / scale` integral) and the lacunarity must be
    /// integral for the higher octaves to stay aligned.
    pub fn with_wrap(mut self, wrap: WrapPeriods) -> Result<Self> {
        if !is_integral(self.lacunarity) {
            return Err(EngineError::InvalidParameter(format!(
                "wrapping requires an integral lacunarity, got {}",
                self.lacunarity
            )));
        }
        for period in wrap.as_array().into_iter().flatten() {
            if !(period.is_finite() && period > 0.0) {
                return Err(EngineError::InvalidParameter(format!(
                    "wrap period must be positive, got {period}"
                )));
            }
            let cells = period / self.scale;
            if !is_integral(cells) || cells.round() < 1.0 {
                return Err(EngineError::InvalidParameter(format!(
                    "wrap period {period} is not a whole number of lattice cells at scale {}",
                    self.scale
                )));
            }
        }
        self.wrap = Some(wrap);
        Ok(self)
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn octaves(&self) -> u32 {
        self.octaves
    }

    pub fn persistence(&self) -> f64 {
        self.persistence
    }

    pub fn lacunarity(&self) -> f64 {
        self.lacunarity
    }

    pub fn seed(&self) -> i64 {
        self.seed
    }

    pub fn wrap(&self) -> Option<WrapPeriods> {
        self.wrap
    }

    /// Upper bound on |sample|: the geometric series of octave amplitudes.
    pub fn amplitude_bound(&self) -> f64 {
        (0..self.octaves)
            .map(|i| self.persistence.powi(i as i32))
            .sum()
    }
}

impl Default for NoiseParameters {
    fn default() -> Self {
        Self {
            scale: 10.0,
            octaves: 3,
            persistence: 0.5,
            lacunarity: 2.0,
            seed: 42,
            wrap: None,
        }
    }
}

fn is_integral(v: f64) -> bool {
    (v - v.round()).abs() <= LATTICE_EPSILON * v.abs().max(1.0)
}

#[derive(Serialize, Deserialize)]
struct RawNoiseParameters {
    scale: f64,
    octaves: u32,
    persistence: f64,
    lacunarity: f64,
    seed: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    wrap: Option<WrapPeriods>,
}

impl TryFrom<RawNoiseParameters> for NoiseParameters {
    type Error = EngineError;

    fn try_from(raw: RawNoiseParameters) -> Result<Self> {
        let params = NoiseParameters::new(
            raw.scale,
            raw.octaves,
            raw.persistence,
            raw.lacunarity,
            raw.seed,
        )?;
        match raw.wrap {
            Some(wrap) => params.with_wrap(wrap),
            None => Ok(params),
        }
    }
}

impl From<NoiseParameters> for RawNoiseParameters {
    fn from(p: NoiseParameters) -> Self {
        Self {
            scale: p.scale,
            octaves: p.octaves,
            persistence: p.persistence,
            lacunarity: p.lacunarity,
            seed: p.seed,
            wrap: p.wrap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_parameters() {
        assert!(NoiseParameters::new(0.0, 1, 0.5, 2.0, 0).is_err());
        assert!(NoiseParameters::new(-3.0, 1, 0.5, 2.0, 0).is_err());
        assert!(NoiseParameters::new(10.0, 0, 0.5, 2.0, 0).is_err());
        assert!(NoiseParameters::new(10.0, 2, 0.0, 2.0, 0).is_err());
        assert!(NoiseParameters::new(10.0, 2, 1.5, 2.0, 0).is_err());
        assert!(NoiseParameters::new(10.0, 2, 0.5, 1.0, 0).is_err());
        assert!(NoiseParameters::new(10.0, 2, 0.5, -2.0, 0).is_err());
        assert!(NoiseParameters::new(10.0, 1, 1.0, 2.0, 42).is_ok());
    }

    #[test]
    fn wrap_must_align_with_lattice() {
        let p = NoiseParameters::new(10.0, 3, 0.5, 2.0, 7).unwrap();
        assert!(p.clone().with_wrap(WrapPeriods::new2(40.0, 80.0)).is_ok());
        assert!(p.clone().with_wrap(WrapPeriods::new2(45.0, 80.0)).is_err());
        assert!(p.with_wrap(WrapPeriods::new2(0.0, 80.0)).is_err());

        let fractional = NoiseParameters::new(10.0, 3, 0.5, 2.5, 7).unwrap();
        assert!(fractional.with_wrap(WrapPeriods::new2(40.0, 40.0)).is_err());
    }

    #[test]
    fn geometric_amplitude_bound() {
        let p = NoiseParameters::new(5.0, 3, 0.5, 2.0, 1).unwrap();
        assert!((p.amplitude_bound() - 1.75).abs() < 1e-12);
    }

    #[test]
    fn deserialization_validates() {
        let ok: NoiseParameters = serde_json::from_str(
            r#"{"scale":10.0,"octaves":1,"persistence":1.0,"lacunarity":2.0,"seed":42}"#,
        )
        .unwrap();
        assert_eq!(ok.octaves(), 1);

        let bad = serde_json::from_str::<NoiseParameters>(
            r#"{"scale":10.0,"octaves":0,"persistence":1.0,"lacunarity":2.0,"seed":42}"#,
        );
        assert!(bad.is_err());
    }
}
