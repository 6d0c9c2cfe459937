//! The [`Peak`] type: an m/z coordinate with an accumulated intensity and the number
//! of source spectra that observed it.
use std::cmp;
use std::fmt;
use std::hash;

use mzpeaks::prelude::*;
use mzpeaks::{CentroidPeak, MZ};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The default number of m/z subdivisions per unit used when rounding peaks
/// before they are accumulated, e.g. `1000` keeps three decimal digits.
pub const DEFAULT_MZ_PRECISION: u32 = 1000;

/// Round `mz` to `1 / precision` units.
#[inline]
pub fn round_mz(mz: f32, precision: u32) -> f32 {
    let precision = precision as f64;
    ((mz as f64 * precision).round() / precision) as f32
}

/// A single peak of a (consensus) spectrum.
///
/// `count` records how many source spectra contributed to this m/z position. Peaks
/// read from a single spectrum carry a count of `1`.
///
/// Peaks are totally ordered by m/z, then intensity, then count, so that sorted peak
/// lists are deterministic even when m/z values collide.
#[derive(Default, Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Peak {
    pub mz: f32,
    pub intensity: f32,
    pub count: i32,
}

impl Peak {
    pub fn new(mz: f32, intensity: f32, count: i32) -> Peak {
        Peak {
            mz,
            intensity,
            count,
        }
    }

    /// Convert any centroid from the `mzpeaks` ecosystem into a single-observation peak
    pub fn from_centroid<C: CentroidLike>(peak: &C) -> Peak {
        Peak::new(peak.coordinate() as f32, peak.intensity(), 1)
    }

    /// A copy of this peak with its m/z rounded to `1 / precision` units
    #[inline]
    pub fn rounded(&self, precision: u32) -> Peak {
        Peak::new(round_mz(self.mz, precision), self.intensity, self.count)
    }

    /// Combine two peaks at the same m/z position, summing intensities and counts
    #[inline]
    pub fn accumulate(&self, other: &Peak) -> Peak {
        Peak::new(
            self.mz,
            self.intensity + other.intensity,
            self.count + other.count,
        )
    }

    /// Combine two nearby peaks into one located at their intensity-weighted mean m/z.
    ///
    /// When both peaks have no intensity the unweighted mean is used.
    pub fn merge_weighted(&self, other: &Peak) -> Peak {
        let total = self.intensity as f64 + other.intensity as f64;
        let mz = if total > 0.0 {
            (self.mz as f64 * self.intensity as f64 + other.mz as f64 * other.intensity as f64)
                / total
        } else {
            (self.mz as f64 + other.mz as f64) / 2.0
        };
        Peak::new(mz as f32, total as f32, self.count + other.count)
    }

    /// A copy of this peak with its intensity multiplied by `factor`
    #[inline]
    pub fn scaled(&self, factor: f64) -> Peak {
        Peak::new(self.mz, (self.intensity as f64 * factor) as f32, self.count)
    }
}

impl fmt::Display for Peak {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Peak({}, {}, {})", self.mz, self.intensity, self.count)
    }
}

impl hash::Hash for Peak {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.mz.to_bits().hash(state);
        self.intensity.to_bits().hash(state);
        self.count.hash(state);
    }
}

impl cmp::Ord for Peak {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        self.mz
            .total_cmp(&other.mz)
            .then_with(|| self.intensity.total_cmp(&other.intensity))
            .then_with(|| self.count.cmp(&other.count))
    }
}

impl cmp::PartialOrd for Peak {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl cmp::PartialEq for Peak {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl cmp::Eq for Peak {}

impl CoordinateLike<MZ> for Peak {
    #[inline]
    fn coordinate(&self) -> f64 {
        self.mz as f64
    }
}

impl IntensityMeasurement for Peak {
    #[inline]
    fn intensity(&self) -> f32 {
        self.intensity
    }
}

impl From<Peak> for CentroidPeak {
    fn from(peak: Peak) -> Self {
        CentroidPeak::new(peak.mz as f64, peak.intensity, 0)
    }
}

impl From<&CentroidPeak> for Peak {
    fn from(peak: &CentroidPeak) -> Self {
        Peak::from_centroid(peak)
    }
}

/// Sort a peak list by m/z using the total [`Peak`] order
#[inline]
pub fn sort_by_mz(peaks: &mut [Peak]) {
    peaks.sort_unstable();
}

/// The sum of the `count` field over a peak list
pub fn total_count(peaks: &[Peak]) -> i64 {
    peaks.iter().map(|p| p.count as i64).sum()
}
