use log::{debug, trace};

use super::{best_match, CumulativeDistributionFunction, EngineError};
use crate::cluster::SpectralCluster;
use crate::config::ClusteringConfig;
use crate::consensus::ConsensusSpectrumFactory;
use crate::similarity::SimilarityChecker;
use crate::spectrum::Spectrum;

/// How an incoming cluster picks the live cluster it joins
#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionPolicy {
    /// Score every live cluster and join the most similar one at or above the
    /// similarity threshold
    BestMatch,
    /// Visit live clusters by precursor m/z distance and join the first one whose score
    /// is significant given the number of comparisons made so far
    FirstSignificant(CumulativeDistributionFunction),
}

/// Fixed point precursor m/z scale used to track input order
const WATERMARK_SCALE: f64 = 1000.0;
/// How far, in fixed point units, input may step back before it counts as out of order
const WATERMARK_TOLERANCE: i64 = 2;

/// The highest precursor m/z seen so far
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct MzWatermark(Option<i64>);

impl MzWatermark {
    fn to_fixed(mz: f32) -> i64 {
        (mz as f64 * WATERMARK_SCALE).round() as i64
    }

    fn check(&self, mz: f32) -> Result<i64, EngineError> {
        let received = Self::to_fixed(mz);
        match self.0 {
            Some(current) if received < current - WATERMARK_TOLERANCE => Err(EngineError::OutOfOrder {
                current: (current as f64 / WATERMARK_SCALE) as f32,
                received: mz,
            }),
            _ => Ok(received),
        }
    }

    fn advance(&mut self, fixed: i64) {
        self.0 = Some(self.0.map_or(fixed, |current| current.max(fixed)));
    }

    fn current(&self) -> Option<f32> {
        self.0.map(|v| (v as f64 / WATERMARK_SCALE) as f32)
    }
}

/// Clusters input arriving in ascending precursor m/z order in a single pass.
///
/// Only clusters within `window_size` of the most recent precursor m/z are kept live.
/// Each call to [`IncrementalClusteringEngine::add_cluster_incremental`] returns the
/// clusters that fell out of the window, which can never change again.
#[derive(Debug)]
pub struct IncrementalClusteringEngine {
    config: ClusteringConfig,
    similarity: Box<dyn SimilarityChecker>,
    factory: Box<dyn ConsensusSpectrumFactory>,
    policy: AdmissionPolicy,
    clusters: Vec<SpectralCluster>,
    watermark: MzWatermark,
}

impl IncrementalClusteringEngine {
    /// Create an engine admitting each cluster into its best match
    pub fn new(
        config: ClusteringConfig,
        similarity: Box<dyn SimilarityChecker>,
        factory: Box<dyn ConsensusSpectrumFactory>,
    ) -> Self {
        Self::with_policy(config, similarity, factory, AdmissionPolicy::BestMatch)
    }

    /// Create an engine admitting each cluster into the first live cluster it matches
    /// significantly according to `cdf`
    pub fn greedy(
        config: ClusteringConfig,
        similarity: Box<dyn SimilarityChecker>,
        factory: Box<dyn ConsensusSpectrumFactory>,
        cdf: CumulativeDistributionFunction,
    ) -> Self {
        Self::with_policy(config, similarity, factory, AdmissionPolicy::FirstSignificant(cdf))
    }

    /// Create an engine with an explicit admission policy. The similarity checker's
    /// fragment tolerance is taken from `config`.
    pub fn with_policy(
        config: ClusteringConfig,
        mut similarity: Box<dyn SimilarityChecker>,
        factory: Box<dyn ConsensusSpectrumFactory>,
        policy: AdmissionPolicy,
    ) -> Self {
        similarity.set_fragment_tolerance(config.fragment_tolerance);
        Self {
            config,
            similarity,
            factory,
            policy,
            clusters: Vec::new(),
            watermark: MzWatermark::default(),
        }
    }

    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    pub fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }

    /// The live clusters
    pub fn clusters(&self) -> &[SpectralCluster] {
        &self.clusters
    }

    /// The highest precursor m/z received so far
    pub fn current_mz(&self) -> Option<f32> {
        self.watermark.current()
    }

    /// Place `cluster`, returning the clusters evicted from the window by its arrival.
    ///
    /// Fails without changing the engine if `cluster`'s precursor m/z is below that of
    /// an earlier cluster. Empty clusters are ignored.
    pub fn add_cluster_incremental(
        &mut self,
        mut cluster: SpectralCluster,
    ) -> Result<Vec<SpectralCluster>, EngineError> {
        if cluster.is_empty() {
            return Ok(Vec::new());
        }
        let mz = cluster.precursor_mz();
        let fixed = self.watermark.check(mz)?;
        self.watermark.advance(fixed);

        let evicted = self.evict_below(mz - self.config.window_size);

        if let Some(i) = self.find_containing(&cluster) {
            debug!("{} duplicates {}, merging without scoring", cluster.id(), self.clusters[i].id());
            self.clusters[i].merge(cluster);
            return Ok(evicted);
        }

        let query = cluster.consensus_spectrum().clone();
        let target = match &self.policy {
            AdmissionPolicy::BestMatch => best_match(
                &mut self.clusters,
                self.similarity.as_ref(),
                &query,
                self.config.similarity_threshold,
            )
            .map(|(i, _)| i),
            AdmissionPolicy::FirstSignificant(cdf) => first_significant(
                &mut self.clusters,
                self.similarity.as_ref(),
                &query,
                cdf,
                self.config.min_precision,
            ),
        };
        match target {
            Some(i) => {
                debug!("Merging {} into {}", cluster.id(), self.clusters[i].id());
                self.clusters[i].merge(cluster);
            }
            None => {
                trace!("Creating new cluster {} at {mz:0.3}", cluster.id());
                self.clusters.push(cluster);
            }
        }
        Ok(evicted)
    }

    /// Wrap `spectrum` in a cluster of its own and place it
    pub fn add_spectrum_incremental(
        &mut self,
        spectrum: Spectrum,
    ) -> Result<Vec<SpectralCluster>, EngineError> {
        let cluster =
            SpectralCluster::from_spectrum(spectrum, self.factory.as_ref(), self.config.retain_spectra);
        self.add_cluster_incremental(cluster)
    }

    /// Release all live clusters in precursor m/z order once the input is exhausted.
    ///
    /// The engine can then be reused for a new input sequence.
    pub fn finish(&mut self) -> Vec<SpectralCluster> {
        self.watermark = MzWatermark::default();
        let mut clusters = std::mem::take(&mut self.clusters);
        clusters.sort_by(|a, b| a.precursor_mz().total_cmp(&b.precursor_mz()));
        clusters
    }

    fn evict_below(&mut self, lower_bound: f32) -> Vec<SpectralCluster> {
        let (mut evicted, live): (Vec<_>, Vec<_>) = std::mem::take(&mut self.clusters)
            .into_iter()
            .partition(|c| c.precursor_mz() < lower_bound);
        self.clusters = live;
        if !evicted.is_empty() {
            debug!("Evicted {} clusters below {lower_bound:0.3}", evicted.len());
            evicted.sort_by(|a, b| a.precursor_mz().total_cmp(&b.precursor_mz()));
        }
        evicted
    }

    /// A live cluster sharing enough members with `cluster` in either direction
    fn find_containing(&self, cluster: &SpectralCluster) -> Option<usize> {
        let overlap = self.config.duplicate_overlap;
        self.clusters
            .iter()
            .position(|c| c.shared_fraction(cluster) >= overlap || cluster.shared_fraction(c) >= overlap)
    }
}

fn first_significant(
    clusters: &mut [SpectralCluster],
    similarity: &dyn SimilarityChecker,
    query: &Spectrum,
    cdf: &CumulativeDistributionFunction,
    min_precision: f64,
) -> Option<usize> {
    let mut order: Vec<usize> = (0..clusters.len()).collect();
    order.sort_by(|a, b| {
        let da = (clusters[*a].precursor_mz() - query.precursor_mz).abs();
        let db = (clusters[*b].precursor_mz() - query.precursor_mz).abs();
        da.total_cmp(&db)
    });
    for (n, i) in order.into_iter().enumerate() {
        let score = similarity.assess_similarity(query, clusters[i].consensus_spectrum());
        if cdf.is_significant(score, n + 1, min_precision) {
            trace!("Similarity {score:0.4} to {} is significant after {} comparisons", clusters[i].id(), n + 1);
            return Some(i);
        }
    }
    None
}
