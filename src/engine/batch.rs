use log::{debug, trace};

use super::{best_match, EngineError};
use crate::cluster::SpectralCluster;
use crate::config::ClusteringConfig;
use crate::consensus::ConsensusSpectrumFactory;
use crate::similarity::SimilarityChecker;
use crate::spectrum::Spectrum;

/// Clusters a complete collection of clusters by consensus similarity.
///
/// New clusters are queued by [`ClusteringEngine::add_clusters`] and only placed when
/// [`ClusteringEngine::process_clusters`] runs. Processing places the queued clusters,
/// merges existing clusters that have become similar enough, and splits off member
/// spectra that no longer fit their cluster.
#[derive(Debug)]
pub struct ClusteringEngine {
    config: ClusteringConfig,
    similarity: Box<dyn SimilarityChecker>,
    factory: Box<dyn ConsensusSpectrumFactory>,
    clusters: Vec<SpectralCluster>,
    pending: Vec<SpectralCluster>,
    dirty: bool,
}

impl ClusteringEngine {
    /// Create an engine. The similarity checker's fragment tolerance is taken from `config`.
    pub fn new(
        config: ClusteringConfig,
        mut similarity: Box<dyn SimilarityChecker>,
        factory: Box<dyn ConsensusSpectrumFactory>,
    ) -> Self {
        similarity.set_fragment_tolerance(config.fragment_tolerance);
        Self {
            config,
            similarity,
            factory,
            clusters: Vec::new(),
            pending: Vec::new(),
            dirty: false,
        }
    }

    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    pub fn similarity(&self) -> &dyn SimilarityChecker {
        self.similarity.as_ref()
    }

    /// Whether there is queued work that [`ClusteringEngine::process_clusters`] has not done yet
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Queue clusters for placement
    pub fn add_clusters<I: IntoIterator<Item = SpectralCluster>>(&mut self, clusters: I) {
        let n = self.pending.len();
        self.pending.extend(clusters);
        if self.pending.len() > n {
            self.dirty = true;
        }
    }

    /// Queue each spectrum as a cluster of its own
    pub fn add_spectra<I: IntoIterator<Item = Spectrum>>(&mut self, spectra: I) {
        let retain = self.config.retain_spectra;
        let clusters: Vec<_> = spectra
            .into_iter()
            .map(|s| SpectralCluster::from_spectrum(s, self.factory.as_ref(), retain))
            .collect();
        self.add_clusters(clusters);
    }

    /// The placed clusters. Queued clusters are not included until processed.
    pub fn clusters(&self) -> &[SpectralCluster] {
        &self.clusters
    }

    pub fn into_clusters(self) -> Vec<SpectralCluster> {
        self.clusters
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Place all queued clusters, then merge similar clusters and split off poorly
    /// fitting members, placing those again.
    ///
    /// Returns whether any cluster changed. The engine is clean afterwards.
    pub fn process_clusters(&mut self) -> Result<bool, EngineError> {
        if !self.dirty {
            return Ok(false);
        }
        let mut changed = self.place_pending();
        changed |= self.merge_clusters();
        if self.demerge()? {
            changed = true;
            self.place_pending();
        }
        self.dirty = false;
        Ok(changed)
    }

    fn place_pending(&mut self) -> bool {
        let mut pending = std::mem::take(&mut self.pending);
        pending.retain(|c| !c.is_empty());
        let ordering = self.config.cluster_ordering;
        pending.sort_by(|a, b| ordering.compare(a, b));

        let changed = !pending.is_empty();
        for mut cluster in pending {
            let query = cluster.consensus_spectrum().clone();
            match best_match(
                &mut self.clusters,
                self.similarity.as_ref(),
                &query,
                self.config.similarity_threshold,
            ) {
                Some((i, score)) => {
                    debug!("Merging {} into {} ({score:0.3})", cluster.id(), self.clusters[i].id());
                    self.clusters[i].merge(cluster);
                }
                None => {
                    trace!("Creating new cluster {}", cluster.id());
                    self.clusters.push(cluster);
                }
            }
        }
        changed
    }

    /// Merge pairs of clusters at or above the similarity threshold until no pair remains
    fn merge_clusters(&mut self) -> bool {
        let threshold = self.config.similarity_threshold;
        let mut n_merges = 0usize;
        'scan: loop {
            for i in 0..self.clusters.len() {
                let query = self.clusters[i].consensus_spectrum().clone();
                for j in (i + 1)..self.clusters.len() {
                    let score = self
                        .similarity
                        .assess_similarity(&query, self.clusters[j].consensus_spectrum());
                    if score >= threshold {
                        let other = self.clusters.remove(j);
                        debug!("Merging {} into {} ({score:0.3})", other.id(), self.clusters[i].id());
                        self.clusters[i].merge(other);
                        n_merges += 1;
                        continue 'scan;
                    }
                }
            }
            break;
        }
        if n_merges > 0 {
            debug!("Merge pass combined {n_merges} cluster pairs");
        }
        n_merges > 0
    }

    /// Move member spectra scoring below the retain threshold against their own
    /// cluster's consensus into the queue as singleton clusters
    fn demerge(&mut self) -> Result<bool, EngineError> {
        let threshold = self.config.retain_threshold;
        let mut evicted = Vec::new();
        for cluster in self.clusters.iter_mut() {
            if cluster.len() < 2 || !cluster.supports_removal() {
                continue;
            }
            let consensus = cluster.consensus_spectrum().clone();
            let misfits: Vec<String> = cluster
                .spectra()
                .unwrap_or_default()
                .iter()
                .filter(|s| self.similarity.assess_similarity(s, &consensus) < threshold)
                .map(|s| s.id.clone())
                .collect();
            if misfits.is_empty() {
                continue;
            }
            debug!("Splitting {} spectra off {}", misfits.len(), cluster.id());
            let retain = cluster.retains_spectra();
            for spectrum in cluster.remove_spectra(&misfits)? {
                evicted.push(SpectralCluster::from_spectrum(spectrum, self.factory.as_ref(), retain));
            }
        }
        self.clusters.retain(|c| !c.is_empty());
        let changed = !evicted.is_empty();
        self.pending.extend(evicted);
        Ok(changed)
    }
}
