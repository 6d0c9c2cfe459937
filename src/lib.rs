//! `mzcluster` groups MS/MS spectra of the same analyte into clusters, summarizing each
//! cluster with a consensus spectrum.
//!
//! Spectra are compared by a pluggable [`SimilarityChecker`](crate::similarity::SimilarityChecker)
//! and accumulated by a [`ConsensusSpectrumBuilder`](crate::consensus::ConsensusSpectrumBuilder)
//! chosen through a [`ConsensusSpectrumFactory`](crate::consensus::ConsensusSpectrumFactory).
//! Two engines drive the clustering:
//!
//! - [`ClusteringEngine`] clusters a whole collection, merging and splitting clusters until
//!   they are stable.
//! - [`IncrementalClusteringEngine`] makes a single pass over input sorted by precursor m/z,
//!   keeping only a window of live clusters.
//!
//! ```
//! use mzcluster::prelude::*;
//! use mzcluster::{IncrementalClusteringEngine, Peak, Spectrum};
//! use mzcluster::consensus::ConsensusSpectrumBuilderFactory;
//! use mzcluster::similarity::NormalizedDotProduct;
//!
//! let mut engine = IncrementalClusteringEngine::new(
//!     ClusteringConfig::default(),
//!     Box::new(NormalizedDotProduct::default()),
//!     Box::new(ConsensusSpectrumBuilderFactory::default()),
//! );
//! let peaks = vec![Peak::new(110.0, 50.0, 1), Peak::new(220.0, 100.0, 1)];
//! let evicted = engine
//!     .add_spectrum_incremental(Spectrum::new("scan=1".into(), 500.0, 2, peaks))
//!     .unwrap();
//! assert!(evicted.is_empty());
//! assert_eq!(engine.finish().len(), 1);
//! ```
pub mod cluster;
pub mod config;
pub mod consensus;
pub mod engine;
pub mod peaks;
pub mod prelude;
pub mod similarity;
pub mod spectrum;

pub use crate::cluster::{ClusterError, ClusterState, SpectralCluster};
pub use crate::config::{ClusterOrdering, ClusteringConfig, ConsensusConfig};
pub use crate::engine::{
    AdmissionPolicy, ClusteringEngine, CumulativeDistributionFunction, EngineError,
    IncrementalClusteringEngine,
};
pub use crate::peaks::{Peak, PeakMatches};
pub use crate::spectrum::Spectrum;
