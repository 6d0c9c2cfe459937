//! Configuration for consensus spectrum builders and clustering engines.
//!
//! Configuration values are plain immutable structs created once and handed to the
//! factories and engines that need them. Every struct has a [`Default`] carrying the
//! standard parameters and `with_*` methods to override individual values.
use mzpeaks::Tolerance;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::peaks::DEFAULT_MZ_PRECISION;

/// Parameters controlling how a consensus spectrum accumulates and summarizes peaks
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConsensusConfig {
    /// Below this many spectra, peaks are merged into the accumulated peak list
    /// as soon as they are added
    pub small_cluster_size: usize,
    /// Below this many spectra, held peaks are flushed every `medium_flush_interval` additions,
    /// afterwards every `large_flush_interval` additions
    pub medium_cluster_size: usize,
    pub medium_flush_interval: usize,
    pub large_flush_interval: usize,
    /// Peaks less intense than this fraction of the weakest consensus peak are
    /// discarded once the cluster is no longer small
    pub noise_gate_fraction: f32,
    /// Whether to round incoming m/z values to `1 / mz_precision` units
    pub round_mz: bool,
    pub mz_precision: u32,
    /// The m/z threshold increment of the gradual identical-peak merge
    pub merge_step: f32,
    /// The final m/z threshold of the gradual identical-peak merge
    pub merge_final_threshold: f32,
    /// The number of peaks kept per m/z bin by the noise filter
    pub peaks_per_bin: usize,
    pub bin_width: f32,
    /// The fragment ion tolerance (Da) the greedy builder derives its merge thresholds from.
    ///
    /// This is independent of [`ClusteringConfig::fragment_tolerance`], which only the
    /// similarity checkers see. Use [`ConsensusConfig::with_fragment_ion_tolerance`] to
    /// keep the two in step.
    pub fragment_tolerance: f32,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            small_cluster_size: 100,
            medium_cluster_size: 1000,
            medium_flush_interval: 100,
            large_flush_interval: 400,
            noise_gate_fraction: 0.4,
            round_mz: true,
            mz_precision: DEFAULT_MZ_PRECISION,
            merge_step: 0.1,
            merge_final_threshold: 0.4,
            peaks_per_bin: 5,
            bin_width: 100.0,
            fragment_tolerance: 0.5,
        }
    }
}

impl ConsensusConfig {
    pub fn with_small_cluster_size(mut self, size: usize) -> Self {
        self.small_cluster_size = size;
        self
    }

    pub fn with_medium_cluster_size(mut self, size: usize) -> Self {
        self.medium_cluster_size = size;
        self
    }

    pub fn with_flush_intervals(mut self, medium: usize, large: usize) -> Self {
        self.medium_flush_interval = medium.max(1);
        self.large_flush_interval = large.max(1);
        self
    }

    pub fn with_rounding(mut self, round_mz: bool) -> Self {
        self.round_mz = round_mz;
        self
    }

    pub fn with_merge_thresholds(mut self, step: f32, final_threshold: f32) -> Self {
        self.merge_step = step;
        self.merge_final_threshold = final_threshold;
        self
    }

    pub fn with_noise_filter(mut self, peaks_per_bin: usize, bin_width: f32) -> Self {
        self.peaks_per_bin = peaks_per_bin;
        self.bin_width = bin_width;
        self
    }

    pub fn with_fragment_tolerance(mut self, tolerance: f32) -> Self {
        self.fragment_tolerance = tolerance;
        self
    }

    /// Set the greedy merge tolerance to the half-width of `tolerance` at `reference_mz`.
    /// A [`Tolerance::Da`] value carries over unchanged.
    pub fn with_fragment_ion_tolerance(mut self, tolerance: Tolerance, reference_mz: f64) -> Self {
        let (lower, upper) = tolerance.bounds(reference_mz);
        self.fragment_tolerance = ((upper - lower) / 2.0) as f32;
        self
    }

    /// The rounding precision to apply to incoming peaks, if any
    pub fn rounding(&self) -> Option<u32> {
        if self.round_mz {
            Some(self.mz_precision)
        } else {
            None
        }
    }
}

/// The order in which a batch engine processes its pending clusters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ClusterOrdering {
    /// Ascending precursor m/z
    #[default]
    PrecursorMz,
    /// Largest clusters first, ties broken by ascending precursor m/z
    SizeDescending,
}

/// Parameters shared by the clustering engines
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusteringConfig {
    /// The minimum similarity for a cluster to be merged into another
    pub similarity_threshold: f64,
    /// Member spectra less similar than this to their cluster's consensus are evicted
    pub retain_threshold: f64,
    /// The precursor m/z distance beyond which clusters can no longer be merged
    pub window_size: f32,
    pub cluster_ordering: ClusterOrdering,
    /// The fraction of an incoming cluster's spectra already present in a live cluster
    /// at which the two are merged without scoring
    pub duplicate_overlap: f64,
    /// The minimum precision required by the first-significant admission policy
    pub min_precision: f64,
    /// Whether clusters created from bare spectra keep their member spectra
    pub retain_spectra: bool,
    /// The fragment ion tolerance to configure similarity checkers with.
    ///
    /// Consensus builders are configured separately through their factory, see
    /// [`ConsensusConfig::with_fragment_ion_tolerance`].
    pub fragment_tolerance: Tolerance,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.6,
            retain_threshold: 0.5,
            window_size: 2.0,
            cluster_ordering: ClusterOrdering::PrecursorMz,
            duplicate_overlap: 0.9,
            min_precision: 0.99,
            retain_spectra: true,
            fragment_tolerance: Tolerance::Da(0.5),
        }
    }
}

impl ClusteringConfig {
    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_retain_threshold(mut self, threshold: f64) -> Self {
        self.retain_threshold = threshold;
        self
    }

    pub fn with_window_size(mut self, window_size: f32) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_cluster_ordering(mut self, ordering: ClusterOrdering) -> Self {
        self.cluster_ordering = ordering;
        self
    }

    pub fn with_duplicate_overlap(mut self, overlap: f64) -> Self {
        self.duplicate_overlap = overlap;
        self
    }

    pub fn with_min_precision(mut self, min_precision: f64) -> Self {
        self.min_precision = min_precision;
        self
    }

    pub fn with_retain_spectra(mut self, retain_spectra: bool) -> Self {
        self.retain_spectra = retain_spectra;
        self
    }

    pub fn with_fragment_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.fragment_tolerance = tolerance;
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConsensusConfig::default();
        assert_eq!(config.small_cluster_size, 100);
        assert_eq!(config.medium_cluster_size, 1000);
        assert_eq!(config.medium_flush_interval, 100);
        assert_eq!(config.large_flush_interval, 400);
        assert_eq!(config.noise_gate_fraction, 0.4);
        assert_eq!(config.rounding(), Some(1000));
        assert_eq!((config.merge_step, config.merge_final_threshold), (0.1, 0.4));
        assert_eq!((config.peaks_per_bin, config.bin_width), (5, 100.0));

        let clustering = ClusteringConfig::default();
        assert_eq!(clustering.similarity_threshold, 0.6);
        assert_eq!(clustering.retain_threshold, 0.5);
        assert_eq!(clustering.window_size, 2.0);
        assert_eq!(clustering.cluster_ordering, ClusterOrdering::PrecursorMz);
    }

    #[test]
    fn test_fragment_ion_tolerance() {
        let config = ConsensusConfig::default().with_fragment_ion_tolerance(Tolerance::Da(0.02), 500.0);
        assert!((config.fragment_tolerance - 0.02).abs() < 1e-6);
        let config = ConsensusConfig::default().with_fragment_ion_tolerance(Tolerance::PPM(20.0), 1000.0);
        assert!((config.fragment_tolerance - 0.02).abs() < 1e-6);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_config_round_trip() -> Result<(), serde_json::Error> {
        let config = ClusteringConfig::default()
            .with_window_size(4.0)
            .with_cluster_ordering(ClusterOrdering::SizeDescending);
        let text = serde_json::to_string(&config)?;
        let dup: ClusteringConfig = serde_json::from_str(&text)?;
        assert_eq!(config, dup);

        let consensus = ConsensusConfig::default().with_noise_filter(10, 50.0);
        let text = serde_json::to_string(&consensus)?;
        let dup: ConsensusConfig = serde_json::from_str(&text)?;
        assert_eq!(consensus, dup);
        Ok(())
    }
}
