//! Scoring the similarity of two spectra.
//!
//! A [`SimilarityChecker`] first pairs the shared peaks of two spectra (see
//! [`PeakMatches`]) and then scores the pairing. Higher scores mean more similar spectra.
use std::fmt;

use mzpeaks::Tolerance;

use crate::peaks::{match_peaks, PeakMatches};
use crate::spectrum::Spectrum;

pub mod combined;
pub mod dot_product;

pub use crate::similarity::combined::CombinedSimilarity;
pub use crate::similarity::dot_product::{ExplainedIntensity, IntensityTransform, NormalizedDotProduct};

/// Normalized scores above `1.0` by at most this much are treated as rounding error
pub const SCORE_EPSILON: f64 = 1e-8;

/// The minimum number of peaks compared when peak filtering is enabled
pub const MIN_PEAKS_COMPARED: usize = 20;

/// The number of peaks compared per 1000 Da of precursor mass when peak filtering is enabled
pub const PEAKS_PER_1000_DA: f64 = 15.0;

/// The number of most intense peaks of `spectrum` that take part in a filtered comparison
pub fn peaks_to_compare(spectrum: &Spectrum) -> usize {
    let charge = spectrum.precursor_charge.max(1) as f64;
    let mass = spectrum.precursor_mz as f64 * charge;
    ((PEAKS_PER_1000_DA * mass / 1000.0) as usize).max(MIN_PEAKS_COMPARED)
}

/// Clamp a score that should lie in `[0, 1]` against floating point overshoot
pub fn clamp_normalized(score: f64) -> f64 {
    debug_assert!(
        score <= 1.0 + SCORE_EPSILON,
        "Normalized similarity score {score} exceeds 1"
    );
    if score > 1.0 {
        if score > 1.0 + SCORE_EPSILON {
            log::warn!("Clamping normalized similarity score {score} to 1.0");
        }
        1.0
    } else if score < 0.0 {
        0.0
    } else {
        score
    }
}

/// Scores how similar two spectra are.
///
/// Implementations must be commutative and document the range of their scores.
pub trait SimilarityChecker: Send + Sync + fmt::Debug {
    /// The m/z tolerance within which two peaks are considered shared
    fn fragment_tolerance(&self) -> Tolerance;

    fn set_fragment_tolerance(&mut self, tolerance: Tolerance);

    /// Whether spectra are reduced to their most intense peaks before matching
    fn peak_filtering(&self) -> bool;

    fn set_peak_filtering(&mut self, enabled: bool);

    /// Score an already computed peak matching
    fn assess_matches(&self, matches: &PeakMatches) -> f64;

    /// Match the peaks of two spectra and score the result
    fn assess_similarity(&self, spectrum_a: &Spectrum, spectrum_b: &Spectrum) -> f64 {
        let tolerance = self.fragment_tolerance();
        if self.peak_filtering() {
            let filtered_a = spectrum_a.highest_peaks(peaks_to_compare(spectrum_a));
            let filtered_b = spectrum_b.highest_peaks(peaks_to_compare(spectrum_b));
            self.assess_matches(&match_peaks(&filtered_a, &filtered_b, tolerance))
        } else {
            self.assess_matches(&match_peaks(spectrum_a, spectrum_b, tolerance))
        }
    }
}

impl<T: SimilarityChecker + ?Sized> SimilarityChecker for Box<T> {
    fn fragment_tolerance(&self) -> Tolerance {
        (**self).fragment_tolerance()
    }

    fn set_fragment_tolerance(&mut self, tolerance: Tolerance) {
        (**self).set_fragment_tolerance(tolerance)
    }

    fn peak_filtering(&self) -> bool {
        (**self).peak_filtering()
    }

    fn set_peak_filtering(&mut self, enabled: bool) {
        (**self).set_peak_filtering(enabled)
    }

    fn assess_matches(&self, matches: &PeakMatches) -> f64 {
        (**self).assess_matches(matches)
    }

    fn assess_similarity(&self, spectrum_a: &Spectrum, spectrum_b: &Spectrum) -> f64 {
        (**self).assess_similarity(spectrum_a, spectrum_b)
    }
}
