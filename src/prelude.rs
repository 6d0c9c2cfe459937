pub use crate::config::{ClusteringConfig, ConsensusConfig};
pub use crate::consensus::{ConsensusSpectrumBuilder, ConsensusSpectrumFactory, SpectrumHolderListener};
pub use crate::similarity::SimilarityChecker;
pub use mzpeaks::Tolerance;
