//! Consensus spectra summarize all the spectra of a cluster in a single, compact peak list.
//!
//! Two builders are provided:
//!
//! 1. [`ConsensusSpectrum`] keeps an exact running superposition of all member peaks, so
//!        spectra can be added and removed again.
//! 2. [`GreedyConsensusSpectrum`] merges peaks as they arrive and discards per-spectrum
//!        information, trading the ability to remove spectra for a smaller footprint.
//!
//! Builders are only ever created through a [`ConsensusSpectrumFactory`], so the clustering
//! engines stay independent of the concrete strategy.
pub mod algorithms;
pub mod greedy;
pub mod incremental;
pub mod traits;

pub use crate::consensus::greedy::{GreedyConsensusSpectrum, GreedyConsensusSpectrumFactory};
pub use crate::consensus::incremental::{ConsensusSpectrum, ConsensusSpectrumBuilderFactory};
pub use crate::consensus::traits::{
    ConsensusError, ConsensusSpectrumBuilder, ConsensusSpectrumFactory, ConsensusState,
    SpectrumHolderListener,
};
