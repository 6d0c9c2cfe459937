//! Pairing of peaks shared between two spectra.
//!
//! Every [`SimilarityChecker`](crate::similarity::SimilarityChecker) scores a pair of
//! spectra from the same [`PeakMatches`], so the matching can be computed once and
//! reused by several metrics.
use mzpeaks::Tolerance;

use super::peak::Peak;
use crate::spectrum::Spectrum;

/// The set of one-to-one peak pairings between two m/z-sorted peak lists.
#[derive(Debug, Clone)]
pub struct PeakMatches<'a> {
    peaks_a: &'a [Peak],
    peaks_b: &'a [Peak],
    pairs: Vec<(usize, usize)>,
}

impl<'a> PeakMatches<'a> {
    /// Match the peaks of two spectra
    pub fn from_spectra(spectrum_a: &'a Spectrum, spectrum_b: &'a Spectrum, tolerance: Tolerance) -> Self {
        Self::from_peaks(&spectrum_a.peaks, &spectrum_b.peaks, tolerance)
    }

    /// Match two m/z-sorted peak lists
    pub fn from_peaks(peaks_a: &'a [Peak], peaks_b: &'a [Peak], tolerance: Tolerance) -> Self {
        let pairs = match_peak_lists(peaks_a, peaks_b, tolerance);
        Self {
            peaks_a,
            peaks_b,
            pairs,
        }
    }

    pub fn peaks_a(&self) -> &'a [Peak] {
        self.peaks_a
    }

    pub fn peaks_b(&self) -> &'a [Peak] {
        self.peaks_b
    }

    /// The matched index pairs, ascending in both lists
    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }

    /// The number of shared peaks
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Iterate over the matched peak pairs
    pub fn iter(&self) -> impl Iterator<Item = (&'a Peak, &'a Peak)> + '_ {
        self.pairs
            .iter()
            .map(|(i, j)| (&self.peaks_a[*i], &self.peaks_b[*j]))
    }

    /// The same matching seen from the other spectrum's side
    pub fn swapped(&self) -> PeakMatches<'a> {
        PeakMatches {
            peaks_a: self.peaks_b,
            peaks_b: self.peaks_a,
            pairs: self.pairs.iter().map(|(i, j)| (*j, *i)).collect(),
        }
    }
}

/// Match the peaks of two spectra, see [`match_peak_lists`]
pub fn match_peaks<'a>(
    spectrum_a: &'a Spectrum,
    spectrum_b: &'a Spectrum,
    tolerance: Tolerance,
) -> PeakMatches<'a> {
    PeakMatches::from_spectra(spectrum_a, spectrum_b, tolerance)
}

#[inline]
fn distance(a: f32, b: f32) -> f64 {
    (a as f64 - b as f64).abs()
}

/// Greedily pair peaks from two m/z-sorted lists in a single merge walk.
///
/// When the current peaks `a[i]` and `b[j]` are within `tolerance`, the neighboring
/// choices `(i, j + 1)` and `(i + 1, j)` are checked first: if either is strictly
/// closer, the peak it leaves out is skipped so it can pair with its better partner.
/// A closer `(i + 1, j + 1)` pair does not conflict with `(i, j)`, so both are kept.
/// Otherwise the cursor at the smaller m/z advances.
pub fn match_peak_lists(
    peaks_a: &[Peak],
    peaks_b: &[Peak],
    tolerance: Tolerance,
) -> Vec<(usize, usize)> {
    let mut pairs = Vec::with_capacity(peaks_a.len().min(peaks_b.len()));
    let (mut i, mut j) = (0, 0);
    let (n, m) = (peaks_a.len(), peaks_b.len());

    while i < n && j < m {
        let mz_a = peaks_a[i].mz;
        let mz_b = peaks_b[j].mz;
        if tolerance.test(mz_a as f64, mz_b as f64) {
            let current = distance(mz_a, mz_b);
            let with_next_b = peaks_b
                .get(j + 1)
                .map(|p| distance(mz_a, p.mz))
                .unwrap_or(f64::INFINITY);
            let with_next_a = peaks_a
                .get(i + 1)
                .map(|p| distance(p.mz, mz_b))
                .unwrap_or(f64::INFINITY);

            if with_next_b < current && with_next_b <= with_next_a {
                j += 1;
            } else if with_next_a < current {
                i += 1;
            } else {
                pairs.push((i, j));
                i += 1;
                j += 1;
            }
        } else if mz_a < mz_b {
            i += 1;
        } else {
            j += 1;
        }
    }
    pairs
}
