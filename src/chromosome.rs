//! Chromosome vectors and their normalization.
//!
//! A chromosome is the 16-dimension summary of a track produced by the
//! feature extractor:
//!
//! ```text
//! [tempo, spectral_centroid, zero_crossing_rate, timbre_0 .. timbre_12]
//! ```
//!
//! Raw dimensions differ by orders of magnitude (the centroid sits in the
//! thousands, the zero-crossing rate between 0 and 1), so every comparison
//! goes through a [`Normalizer`] first.

use crate::error::{OptimizerError, Result};
use serde::{Deserialize, Serialize};

/// Number of dimensions in every chromosome.
pub const CHROMOSOME_LEN: usize = 16;

/// Number of timbre coefficients at the tail of a chromosome.
pub const TIMBRE_COEFFICIENTS: usize = 13;

/// Index of the tempo dimension.
pub const TEMPO: usize = 0;
/// Index of the spectral-centroid dimension.
pub const SPECTRAL_CENTROID: usize = 1;
/// Index of the zero-crossing-rate dimension.
pub const ZERO_CROSSING_RATE: usize = 2;
/// Index of the first timbre coefficient.
pub const TIMBRE_START: usize = 3;

/// Guard added to every reference magnitude before dividing.
pub const NORMALIZATION_EPSILON: f64 = 1e-6;

/// Fixed-length feature vector describing one track.
///
/// The length is part of the type, so a chromosome can never be truncated
/// or padded once constructed. Conversions from variable-length data
/// (JSON, the catalog) fail with [`OptimizerError::DimensionMismatch`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct ChromosomeVector([f64; CHROMOSOME_LEN]);

impl ChromosomeVector {
    #[must_use]
    pub const fn new(values: [f64; CHROMOSOME_LEN]) -> Self {
        Self(values)
    }

    #[must_use]
    pub const fn zeros() -> Self {
        Self([0.0; CHROMOSOME_LEN])
    }

    /// Build a chromosome from its three scalar features and 13 timbre
    /// coefficients.
    #[must_use]
    pub fn from_parts(
        tempo: f64,
        spectral_centroid: f64,
        zero_crossing_rate: f64,
        timbre: [f64; TIMBRE_COEFFICIENTS],
    ) -> Self {
        let mut values = [0.0; CHROMOSOME_LEN];
        values[TEMPO] = tempo;
        values[SPECTRAL_CENTROID] = spectral_centroid;
        values[ZERO_CROSSING_RATE] = zero_crossing_rate;
        values[TIMBRE_START..].copy_from_slice(&timbre);
        Self(values)
    }

    #[must_use]
    pub const fn as_array(&self) -> &[f64; CHROMOSOME_LEN] {
        &self.0
    }

    #[must_use]
    pub fn tempo(&self) -> f64 {
        self.0[TEMPO]
    }

    #[must_use]
    pub fn timbre(&self) -> &[f64] {
        &self.0[TIMBRE_START..]
    }

    /// True when no dimension is NaN or infinite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    #[must_use]
    pub fn dot(&self, other: &Self) -> f64 {
        self.0.iter().zip(other.0.iter()).map(|(a, b)| a * b).sum()
    }

    /// Euclidean norm.
    #[must_use]
    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Elementwise mean of `vectors`, or `None` for an empty slice.
    #[must_use]
    pub fn mean(vectors: &[Self]) -> Option<Self> {
        Self::mean_of(vectors.iter())
    }

    /// Elementwise mean over borrowed vectors, or `None` when empty.
    pub fn mean_of<'a, I>(vectors: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Self>,
    {
        let mut sum = [0.0; CHROMOSOME_LEN];
        let mut count = 0_usize;
        for vector in vectors {
            for (acc, value) in sum.iter_mut().zip(vector.0.iter()) {
                *acc += value;
            }
            count += 1;
        }

        if count == 0 {
            return None;
        }

        #[allow(clippy::cast_precision_loss)]
        let divisor = count as f64;
        Some(Self(sum.map(|v| v / divisor)))
    }

    /// Elementwise combination of two vectors.
    #[must_use]
    pub fn zip_with(&self, other: &Self, f: impl Fn(f64, f64) -> f64) -> Self {
        let mut out = [0.0; CHROMOSOME_LEN];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = f(self.0[i], other.0[i]);
        }
        Self(out)
    }
}

impl Default for ChromosomeVector {
    fn default() -> Self {
        Self::zeros()
    }
}

impl From<[f64; CHROMOSOME_LEN]> for ChromosomeVector {
    fn from(values: [f64; CHROMOSOME_LEN]) -> Self {
        Self(values)
    }
}

impl TryFrom<&[f64]> for ChromosomeVector {
    type Error = OptimizerError;

    fn try_from(values: &[f64]) -> Result<Self> {
        let array: [f64; CHROMOSOME_LEN] =
            values
                .try_into()
                .map_err(|_| OptimizerError::DimensionMismatch {
                    expected: CHROMOSOME_LEN,
                    actual: values.len(),
                })?;
        Ok(Self(array))
    }
}

impl TryFrom<Vec<f64>> for ChromosomeVector {
    type Error = OptimizerError;

    fn try_from(values: Vec<f64>) -> Result<Self> {
        Self::try_from(values.as_slice())
    }
}

impl From<ChromosomeVector> for Vec<f64> {
    fn from(vector: ChromosomeVector) -> Self {
        vector.0.to_vec()
    }
}

/// Per-dimension reference magnitudes used to rescale raw chromosomes.
///
/// Different genres need different scaling, so references always come from
/// configuration. [`Normalizer::default`] is the general-purpose profile:
/// tempo 200, centroid 5000, zero-crossing rate 1 and 200 for every timbre
/// coefficient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalizer {
    references: [f64; CHROMOSOME_LEN],
}

impl Normalizer {
    /// Create a normalizer, rejecting references that are not strictly
    /// positive and finite.
    pub fn new(references: [f64; CHROMOSOME_LEN]) -> Result<Self> {
        if let Some((index, value)) = references
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v <= 0.0)
        {
            return Err(OptimizerError::InvalidConfig(format!(
                "normalization reference {index} must be positive and finite, got {value}"
            )));
        }
        Ok(Self { references })
    }

    /// References for a profile with a custom timbre magnitude.
    #[must_use]
    pub fn references_with_timbre(timbre_reference: f64) -> [f64; CHROMOSOME_LEN] {
        let mut references = [timbre_reference; CHROMOSOME_LEN];
        references[TEMPO] = 200.0;
        references[SPECTRAL_CENTROID] = 5000.0;
        references[ZERO_CROSSING_RATE] = 1.0;
        references
    }

    /// Divide each dimension by its reference magnitude.
    #[must_use]
    pub fn normalize(&self, vector: &ChromosomeVector) -> ChromosomeVector {
        let mut out = [0.0; CHROMOSOME_LEN];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = vector.0[i] / (self.references[i] + NORMALIZATION_EPSILON);
        }
        ChromosomeVector(out)
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            references: Self::references_with_timbre(200.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ChromosomeVector {
        ChromosomeVector::from_parts(120.0, 2500.0, 0.1, [50.0; TIMBRE_COEFFICIENTS])
    }

    #[test]
    fn test_from_parts_layout() {
        let v = sample();
        assert_eq!(v.tempo(), 120.0);
        assert_eq!(v.as_array()[SPECTRAL_CENTROID], 2500.0);
        assert_eq!(v.as_array()[ZERO_CROSSING_RATE], 0.1);
        assert_eq!(v.timbre().len(), TIMBRE_COEFFICIENTS);
        assert!(v.timbre().iter().all(|&t| t == 50.0));
    }

    #[test]
    fn test_zip_with_is_elementwise() {
        let a = ChromosomeVector::new([3.0; CHROMOSOME_LEN]);
        let diff = sample().zip_with(&a, |x, y| x - y);
        assert_eq!(diff.tempo(), 117.0);
        assert!(diff.timbre().iter().all(|&t| t == 47.0));
    }

    #[test]
    fn test_wrong_length_is_rejected() {
        let err = ChromosomeVector::try_from(vec![1.0; 15]).unwrap_err();
        assert_eq!(
            err,
            OptimizerError::DimensionMismatch { expected: 16, actual: 15 }
        );

        let err = ChromosomeVector::try_from(vec![1.0; 17]).unwrap_err();
        assert_eq!(
            err,
            OptimizerError::DimensionMismatch { expected: 16, actual: 17 }
        );
    }

    #[test]
    fn test_json_requires_sixteen_values() {
        let ok: ChromosomeVector = serde_json::from_str(
            "[1,2,3,4,5,6,7,8,9,10,11,12,13,14,15,16]",
        )
        .unwrap();
        assert_eq!(ok.as_array()[15], 16.0);

        let short: std::result::Result<ChromosomeVector, _> = serde_json::from_str("[1,2,3]");
        assert!(short.is_err());

        let text = serde_json::to_string(&ok).unwrap();
        assert!(text.starts_with('['));
    }

    #[test]
    fn test_mean_of_vectors() {
        let a = ChromosomeVector::new([2.0; CHROMOSOME_LEN]);
        let b = ChromosomeVector::new([4.0; CHROMOSOME_LEN]);
        let mean = ChromosomeVector::mean(&[a, b]).unwrap();
        assert!(mean.as_array().iter().all(|&v| (v - 3.0).abs() < 1e-12));
        assert!(ChromosomeVector::mean(&[]).is_none());
    }

    #[test]
    fn test_default_normalizer_scales_into_unit_range() {
        let normalizer = Normalizer::default();
        let scaled = normalizer.normalize(&sample());

        assert!((scaled.tempo() - 0.6).abs() < 1e-6);
        assert!((scaled.as_array()[SPECTRAL_CENTROID] - 0.5).abs() < 1e-6);
        assert!((scaled.as_array()[ZERO_CROSSING_RATE] - 0.1).abs() < 1e-6);
        assert!((scaled.timbre()[0] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_zero_reference_is_invalid() {
        let mut references = Normalizer::references_with_timbre(200.0);
        references[4] = 0.0;
        assert!(matches!(
            Normalizer::new(references),
            Err(OptimizerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_non_finite_detection() {
        let mut values = [1.0; CHROMOSOME_LEN];
        assert!(ChromosomeVector::new(values).is_finite());
        values[7] = f64::NAN;
        assert!(!ChromosomeVector::new(values).is_finite());
        values[7] = f64::INFINITY;
        assert!(!ChromosomeVector::new(values).is_finite());
    }
}
