use std::fmt;

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::peaks::Peak;
use crate::spectrum::Spectrum;

/// Errors raised when a consensus spectrum builder is asked to do something it cannot
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsensusError {
    #[error("This consensus spectrum builder does not support removing spectra")]
    RemovalNotSupported,
}

/// The accumulated state of a consensus spectrum builder, sufficient to rebuild it
/// or to merge it into another builder.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConsensusState {
    pub n_spectra: usize,
    pub sum_precursor_mz: f64,
    pub sum_precursor_intensity: f64,
    pub sum_charge: i64,
    /// The accumulated (not yet summarized) peak list, sorted by m/z
    pub peaks: Vec<Peak>,
}

impl ConsensusState {
    pub fn average_precursor_mz(&self) -> f32 {
        if self.n_spectra == 0 {
            0.0
        } else {
            (self.sum_precursor_mz / self.n_spectra as f64) as f32
        }
    }

    pub fn average_precursor_intensity(&self) -> f32 {
        if self.n_spectra == 0 {
            0.0
        } else {
            (self.sum_precursor_intensity / self.n_spectra as f64) as f32
        }
    }

    pub fn average_charge(&self) -> f32 {
        if self.n_spectra == 0 {
            0.0
        } else {
            self.sum_charge as f32 / self.n_spectra as f32
        }
    }

    pub(crate) fn add_spectrum(&mut self, spectrum: &Spectrum) {
        self.n_spectra += 1;
        self.sum_precursor_mz += spectrum.precursor_mz as f64;
        self.sum_precursor_intensity += spectrum.precursor_intensity as f64;
        self.sum_charge += spectrum.precursor_charge as i64;
    }

    pub(crate) fn remove_spectrum(&mut self, spectrum: &Spectrum) {
        self.n_spectra = self.n_spectra.saturating_sub(1);
        self.sum_precursor_mz -= spectrum.precursor_mz as f64;
        self.sum_precursor_intensity -= spectrum.precursor_intensity as f64;
        self.sum_charge -= spectrum.precursor_charge as i64;
        if self.n_spectra == 0 {
            self.sum_precursor_mz = 0.0;
            self.sum_precursor_intensity = 0.0;
            self.sum_charge = 0;
        }
    }

    pub(crate) fn add_aggregates(&mut self, other: &ConsensusState) {
        self.n_spectra += other.n_spectra;
        self.sum_precursor_mz += other.sum_precursor_mz;
        self.sum_precursor_intensity += other.sum_precursor_intensity;
        self.sum_charge += other.sum_charge;
    }

    /// Build the summary spectrum for a consensus peak list from these aggregates
    pub(crate) fn to_spectrum(&self, peaks: Vec<Peak>) -> Spectrum {
        Spectrum::new(
            String::new(),
            self.average_precursor_mz(),
            self.average_charge().round() as i32,
            peaks,
        )
        .with_precursor_intensity(self.average_precursor_intensity())
    }
}

/// Observes the spectra added to or removed from a consensus spectrum builder.
///
/// Listeners are notified synchronously after spectra have been added or removed.
/// [`ConsensusSpectrumBuilder::merge_state`] and [`ConsensusSpectrumBuilder::clear`]
/// change the builder without any individual spectra and do not notify listeners.
pub trait SpectrumHolderListener: Send + Sync {
    fn on_spectra_added(&self, holder: &dyn ConsensusSpectrumBuilder, spectra: &[Spectrum]);

    fn on_spectra_removed(&self, holder: &dyn ConsensusSpectrumBuilder, spectra: &[Spectrum]);
}

#[derive(Default)]
pub(crate) struct ListenerList(Vec<Box<dyn SpectrumHolderListener>>);

impl ListenerList {
    pub(crate) fn push(&mut self, listener: Box<dyn SpectrumHolderListener>) {
        self.0.push(listener);
    }

    pub(crate) fn notify_added(&self, holder: &dyn ConsensusSpectrumBuilder, spectra: &[Spectrum]) {
        for listener in self.0.iter() {
            listener.on_spectra_added(holder, spectra);
        }
    }

    pub(crate) fn notify_removed(&self, holder: &dyn ConsensusSpectrumBuilder, spectra: &[Spectrum]) {
        for listener in self.0.iter() {
            listener.on_spectra_removed(holder, spectra);
        }
    }
}

impl fmt::Debug for ListenerList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ListenerList({})", self.0.len())
    }
}

/// Accumulates the peaks of member spectra and summarizes them as a consensus spectrum.
///
/// The consensus spectrum is computed lazily: mutations only mark the builder as dirty,
/// and the summary is recomputed the next time it is read.
pub trait ConsensusSpectrumBuilder: Send + fmt::Debug {
    /// Add the peaks and precursor information of `spectra`
    fn add_spectra(&mut self, spectra: &[Spectrum]);

    /// Subtract previously added `spectra`. Builders that discard per-spectrum information
    /// fail with [`ConsensusError::RemovalNotSupported`] without changing their state.
    fn remove_spectra(&mut self, spectra: &[Spectrum]) -> Result<(), ConsensusError>;

    /// Whether [`ConsensusSpectrumBuilder::remove_spectra`] is supported
    fn supports_removal(&self) -> bool {
        true
    }

    /// Absorb the accumulated state of another builder. Listeners are not notified.
    fn merge_state(&mut self, state: &ConsensusState);

    /// A snapshot of the accumulated state
    fn state(&self) -> ConsensusState;

    /// Recompute the consensus spectrum if anything changed since the last computation
    fn update(&mut self);

    fn is_dirty(&self) -> bool;

    /// The current consensus spectrum, recomputing it first if needed
    fn consensus_spectrum(&mut self) -> &Spectrum;

    /// The number of spectra accumulated so far
    fn spectra_count(&self) -> usize;

    fn average_precursor_mz(&self) -> f32;

    fn average_precursor_intensity(&self) -> f32;

    fn average_charge(&self) -> f32;

    /// Discard everything accumulated so far. Listeners are kept but not notified.
    fn clear(&mut self);

    fn add_listener(&mut self, listener: Box<dyn SpectrumHolderListener>);
}

/// Creates consensus spectrum builders. This is the only way to obtain one.
pub trait ConsensusSpectrumFactory: Send + Sync + fmt::Debug {
    fn build(&self) -> Box<dyn ConsensusSpectrumBuilder>;

    /// Create a builder holding a previously captured [`ConsensusState`]
    fn restore(&self, state: &ConsensusState) -> Box<dyn ConsensusSpectrumBuilder> {
        let mut builder = self.build();
        builder.merge_state(state);
        builder
    }
}
