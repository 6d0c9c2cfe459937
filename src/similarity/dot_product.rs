use mzpeaks::Tolerance;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{clamp_normalized, SimilarityChecker};
use crate::peaks::{Peak, PeakMatches};

/// How peak intensities are transformed before they are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum IntensityTransform {
    Raw,
    /// Dampens the dominance of a few very intense peaks
    #[default]
    Sqrt,
    Log,
}

impl IntensityTransform {
    #[inline]
    pub fn apply(&self, intensity: f32) -> f64 {
        let intensity = intensity.max(0.0) as f64;
        match self {
            Self::Raw => intensity,
            Self::Sqrt => intensity.sqrt(),
            Self::Log => intensity.ln_1p(),
        }
    }
}

/// The cosine of the angle between two spectra's intensity vectors, in `[0, 1]`.
///
/// Only shared peaks contribute to the dot product while all peaks contribute to the
/// norms, so unmatched intensity lowers the score. Two spectra without shared peaks
/// score `0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedDotProduct {
    pub tolerance: Tolerance,
    pub peak_filtering: bool,
    pub transform: IntensityTransform,
}

impl Default for NormalizedDotProduct {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::Da(0.5),
            peak_filtering: false,
            transform: IntensityTransform::default(),
        }
    }
}

impl NormalizedDotProduct {
    pub fn new(tolerance: Tolerance, peak_filtering: bool) -> Self {
        Self {
            tolerance,
            peak_filtering,
            ..Default::default()
        }
    }

    pub fn with_transform(mut self, transform: IntensityTransform) -> Self {
        self.transform = transform;
        self
    }

    fn norm(&self, peaks: &[Peak]) -> f64 {
        peaks
            .iter()
            .map(|p| {
                let v = self.transform.apply(p.intensity);
                v * v
            })
            .sum()
    }
}

impl SimilarityChecker for NormalizedDotProduct {
    fn fragment_tolerance(&self) -> Tolerance {
        self.tolerance
    }

    fn set_fragment_tolerance(&mut self, tolerance: Tolerance) {
        self.tolerance = tolerance;
    }

    fn peak_filtering(&self) -> bool {
        self.peak_filtering
    }

    fn set_peak_filtering(&mut self, enabled: bool) {
        self.peak_filtering = enabled;
    }

    fn assess_matches(&self, matches: &PeakMatches) -> f64 {
        if matches.is_empty() {
            return 0.0;
        }
        let dot: f64 = matches
            .iter()
            .map(|(a, b)| self.transform.apply(a.intensity) * self.transform.apply(b.intensity))
            .sum();
        let norm_a = self.norm(matches.peaks_a());
        let norm_b = self.norm(matches.peaks_b());
        if norm_a <= 0.0 || norm_b <= 0.0 {
            return 0.0;
        }
        clamp_normalized(dot / (norm_a.sqrt() * norm_b.sqrt()))
    }
}

/// The geometric mean of the fraction of each spectrum's total intensity carried by
/// shared peaks, in `[0, 1]`. Spectra without shared peaks score `0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExplainedIntensity {
    pub tolerance: Tolerance,
    pub peak_filtering: bool,
}

impl Default for ExplainedIntensity {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::Da(0.5),
            peak_filtering: false,
        }
    }
}

impl ExplainedIntensity {
    pub fn new(tolerance: Tolerance, peak_filtering: bool) -> Self {
        Self {
            tolerance,
            peak_filtering,
        }
    }
}

impl SimilarityChecker for ExplainedIntensity {
    fn fragment_tolerance(&self) -> Tolerance {
        self.tolerance
    }

    fn set_fragment_tolerance(&mut self, tolerance: Tolerance) {
        self.tolerance = tolerance;
    }

    fn peak_filtering(&self) -> bool {
        self.peak_filtering
    }

    fn set_peak_filtering(&mut self, enabled: bool) {
        self.peak_filtering = enabled;
    }

    fn assess_matches(&self, matches: &PeakMatches) -> f64 {
        if matches.is_empty() {
            return 0.0;
        }
        let total = |peaks: &[Peak]| -> f64 { peaks.iter().map(|p| p.intensity.max(0.0) as f64).sum() };
        let total_a = total(matches.peaks_a());
        let total_b = total(matches.peaks_b());
        if total_a <= 0.0 || total_b <= 0.0 {
            return 0.0;
        }
        let (shared_a, shared_b) = matches.iter().fold((0.0, 0.0), |(sa, sb), (a, b)| {
            (sa + a.intensity.max(0.0) as f64, sb + b.intensity.max(0.0) as f64)
        });
        clamp_normalized(((shared_a / total_a) * (shared_b / total_b)).sqrt())
    }
}
