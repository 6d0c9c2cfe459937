//! Clustering engines grouping spectra by the similarity of their consensus spectra.
//!
//! [`ClusteringEngine`] clusters a whole collection at once, repeatedly merging and
//! splitting clusters until they are stable. [`IncrementalClusteringEngine`] consumes
//! clusters in ascending precursor m/z order in a single pass, releasing clusters once
//! they fall out of its m/z window.
use log::trace;
use thiserror::Error;

use crate::cluster::{ClusterError, SpectralCluster};
use crate::similarity::SimilarityChecker;
use crate::spectrum::Spectrum;

pub mod batch;
pub mod cdf;
pub mod incremental;

pub use crate::engine::batch::ClusteringEngine;
pub use crate::engine::cdf::{CdfError, CumulativeDistributionFunction};
pub use crate::engine::incremental::{AdmissionPolicy, IncrementalClusteringEngine};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("Precursor m/z {received} arrived after {current}, input must be sorted by ascending precursor m/z")]
    OutOfOrder { current: f32, received: f32 },
    #[error("An error occurred while updating a cluster: {0}")]
    ClusterError(
        #[from]
        #[source]
        ClusterError,
    ),
}

/// Find the cluster whose consensus spectrum is most similar to `query`, if that
/// similarity is at least `threshold`
pub(crate) fn best_match(
    clusters: &mut [SpectralCluster],
    similarity: &dyn SimilarityChecker,
    query: &Spectrum,
    threshold: f64,
) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, cluster) in clusters.iter_mut().enumerate() {
        let score = similarity.assess_similarity(query, cluster.consensus_spectrum());
        trace!("Similarity to {}: {score:0.4}", cluster.id());
        if score >= threshold && best.map_or(true, |(_, s)| score > s) {
            best = Some((i, score));
        }
    }
    best
}
