//! A cluster of spectra and the consensus spectrum that summarizes them.
use std::cmp::Ordering;

use indexmap::IndexSet;
use log::debug;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::ClusterOrdering;
use crate::consensus::{
    ConsensusError, ConsensusSpectrumBuilder, ConsensusSpectrumFactory, ConsensusState,
    SpectrumHolderListener,
};
use crate::spectrum::Spectrum;

/// Errors that may arise when changing the membership of a cluster
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClusterError {
    #[error("The cluster does not retain its member spectra")]
    PeakListsNotRetained,
    #[error("Spectrum {0} is not a member of the cluster")]
    SpectrumNotPresent(String),
    #[error("An error occurred in the consensus spectrum builder: {0}")]
    ConsensusError(
        #[from]
        #[source]
        ConsensusError,
    ),
}

/// The serializable representation of a [`SpectralCluster`]
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusterState {
    pub id: String,
    pub precursor_mz: f32,
    pub precursor_charge: i32,
    pub retains_spectra: bool,
    pub consensus: ConsensusState,
    pub spectrum_ids: Vec<String>,
    /// The member spectra, empty unless `retains_spectra` is set
    pub spectra: Vec<Spectrum>,
}

/// A group of spectra sharing one consensus spectrum.
///
/// A cluster always knows the ids of its members. Whether it also keeps the member
/// spectra themselves is decided at creation: clusters that retain their spectra can
/// shed members again, the others only ever grow.
#[derive(Debug)]
pub struct SpectralCluster {
    id: String,
    consensus: Box<dyn ConsensusSpectrumBuilder>,
    spectrum_ids: IndexSet<String>,
    spectra: Option<Vec<Spectrum>>,
}

impl SpectralCluster {
    /// Create an empty cluster
    pub fn new(id: String, factory: &dyn ConsensusSpectrumFactory, retain_spectra: bool) -> Self {
        Self {
            id,
            consensus: factory.build(),
            spectrum_ids: IndexSet::new(),
            spectra: retain_spectra.then(Vec::new),
        }
    }

    /// Create a cluster holding a single spectrum, named after it
    pub fn from_spectrum(
        spectrum: Spectrum,
        factory: &dyn ConsensusSpectrumFactory,
        retain_spectra: bool,
    ) -> Self {
        let mut cluster = Self::new(spectrum.id.clone(), factory, retain_spectra);
        cluster.add_spectra(vec![spectrum]);
        cluster
    }

    /// Rebuild a cluster from its serialized representation
    pub fn from_state(state: ClusterState, factory: &dyn ConsensusSpectrumFactory) -> Self {
        Self {
            id: state.id,
            consensus: factory.restore(&state.consensus),
            spectrum_ids: state.spectrum_ids.into_iter().collect(),
            spectra: state.retains_spectra.then_some(state.spectra),
        }
    }

    pub fn to_state(&self) -> ClusterState {
        ClusterState {
            id: self.id.clone(),
            precursor_mz: self.precursor_mz(),
            precursor_charge: self.precursor_charge(),
            retains_spectra: self.retains_spectra(),
            consensus: self.consensus.state(),
            spectrum_ids: self.spectrum_ids.iter().cloned().collect(),
            spectra: self.spectra.clone().unwrap_or_default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: String) {
        self.id = id;
    }

    /// The number of member spectra
    pub fn len(&self) -> usize {
        self.spectrum_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectrum_ids.is_empty()
    }

    /// The mean precursor m/z of the members
    pub fn precursor_mz(&self) -> f32 {
        self.consensus.average_precursor_mz()
    }

    /// The mean precursor charge of the members, rounded
    pub fn precursor_charge(&self) -> i32 {
        self.consensus.average_charge().round() as i32
    }

    pub fn spectrum_ids(&self) -> impl Iterator<Item = &str> {
        self.spectrum_ids.iter().map(|s| s.as_str())
    }

    pub fn contains(&self, spectrum_id: &str) -> bool {
        self.spectrum_ids.contains(spectrum_id)
    }

    /// The fraction of `other`'s members that are also members of this cluster
    pub fn shared_fraction(&self, other: &SpectralCluster) -> f64 {
        if other.is_empty() {
            return 0.0;
        }
        let shared = other
            .spectrum_ids
            .iter()
            .filter(|id| self.spectrum_ids.contains(*id))
            .count();
        shared as f64 / other.len() as f64
    }

    pub fn retains_spectra(&self) -> bool {
        self.spectra.is_some()
    }

    /// Whether members can be removed from this cluster
    pub fn supports_removal(&self) -> bool {
        self.retains_spectra() && self.consensus.supports_removal()
    }

    /// The member spectra, if they are retained
    pub fn spectra(&self) -> Option<&[Spectrum]> {
        self.spectra.as_deref()
    }

    /// The consensus spectrum, recomputed first if the membership changed
    pub fn consensus_spectrum(&mut self) -> &Spectrum {
        self.consensus.consensus_spectrum()
    }

    pub fn consensus_state(&self) -> ConsensusState {
        self.consensus.state()
    }

    pub fn add_listener(&mut self, listener: Box<dyn SpectrumHolderListener>) {
        self.consensus.add_listener(listener);
    }

    /// Add spectra that are not already members. Returns the number actually added.
    pub fn add_spectra(&mut self, spectra: Vec<Spectrum>) -> usize {
        let mut added = Vec::with_capacity(spectra.len());
        for spectrum in spectra {
            if self.spectrum_ids.insert(spectrum.id.clone()) {
                added.push(spectrum);
            }
        }
        if added.is_empty() {
            return 0;
        }
        self.consensus.add_spectra(&added);
        let n = added.len();
        if let Some(members) = self.spectra.as_mut() {
            members.extend(added);
        }
        n
    }

    /// Remove the members with the given ids, returning them.
    ///
    /// Fails without changing the cluster if any id is not a member or the cluster
    /// cannot remove spectra.
    pub fn remove_spectra(&mut self, spectrum_ids: &[String]) -> Result<Vec<Spectrum>, ClusterError> {
        let Some(members) = self.spectra.as_mut() else {
            return Err(ClusterError::PeakListsNotRetained);
        };
        if let Some(missing) = spectrum_ids.iter().find(|id| !self.spectrum_ids.contains(*id)) {
            return Err(ClusterError::SpectrumNotPresent(missing.clone()));
        }
        if !self.consensus.supports_removal() {
            return Err(ConsensusError::RemovalNotSupported.into());
        }

        let (removed, kept): (Vec<Spectrum>, Vec<Spectrum>) = std::mem::take(members)
            .into_iter()
            .partition(|s| spectrum_ids.contains(&s.id));
        *members = kept;
        self.consensus.remove_spectra(&removed)?;
        for spectrum in removed.iter() {
            self.spectrum_ids.shift_remove(&spectrum.id);
        }
        Ok(removed)
    }

    /// Absorb all members of `other`.
    ///
    /// The merged cluster keeps this cluster's id unless `other` is larger. If `other`
    /// does not retain its spectra, its accumulated consensus state is merged instead
    /// and this cluster stops retaining spectra as well.
    ///
    /// A consensus state cannot be split by member, so when a non-retaining `other`
    /// shares some but not all of its members with this cluster, the shared members are
    /// counted twice by the consensus spectrum: afterwards
    /// `consensus_state().n_spectra` exceeds [`SpectralCluster::len`]. If every member
    /// of `other` is already present, the merge changes nothing.
    pub fn merge(&mut self, other: SpectralCluster) {
        if other.len() > self.len() {
            self.id = other.id.clone();
        }
        match other.spectra {
            Some(spectra) => {
                self.add_spectra(spectra);
            }
            None => {
                let novel = other
                    .spectrum_ids
                    .iter()
                    .filter(|id| !self.spectrum_ids.contains(*id))
                    .count();
                if novel == 0 {
                    return;
                }
                if novel < other.len() {
                    debug!(
                        "Merging {} into {} double counts {} shared spectra",
                        other.id,
                        self.id,
                        other.len() - novel
                    );
                }
                self.consensus.merge_state(&other.consensus.state());
                self.spectrum_ids.extend(other.spectrum_ids);
                if self.spectra.take().is_some() {
                    debug!("Cluster {} no longer retains its spectra", self.id);
                }
            }
        }
    }
}

impl ClusterOrdering {
    /// Compare two clusters according to this ordering
    pub fn compare(&self, a: &SpectralCluster, b: &SpectralCluster) -> Ordering {
        let by_mz = || a.precursor_mz().total_cmp(&b.precursor_mz());
        match self {
            Self::PrecursorMz => by_mz(),
            Self::SizeDescending => b.len().cmp(&a.len()).then_with(by_mz),
        }
    }
}
