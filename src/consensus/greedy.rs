//! A memory-saving consensus spectrum builder for clusters that never shed members.
use super::algorithms::{
    adapt_peak_intensities, filter_noise, lowest_positive_intensity, merge_add,
    merge_identical_peaks, tolerance_thresholds,
};
use super::traits::{
    ConsensusError, ConsensusSpectrumBuilder, ConsensusSpectrumFactory, ConsensusState,
    ListenerList, SpectrumHolderListener,
};
use crate::config::ConsensusConfig;
use crate::peaks::Peak;
use crate::spectrum::Spectrum;

/// Folds each added spectrum straight into a single merged peak list.
///
/// After every addition, peaks closer than the fragment tolerance are merged, so the
/// list stays compact and no per-spectrum information is kept. As a consequence
/// spectra cannot be removed again.
#[derive(Debug)]
pub struct GreedyConsensusSpectrum {
    config: ConsensusConfig,
    state: ConsensusState,
    thresholds: Vec<f32>,
    consensus: Spectrum,
    lowest_consensus_peak: f32,
    dirty: bool,
    listeners: ListenerList,
}

impl GreedyConsensusSpectrum {
    pub(crate) fn new(config: ConsensusConfig) -> Self {
        Self {
            thresholds: tolerance_thresholds(config.fragment_tolerance),
            config,
            state: ConsensusState::default(),
            consensus: Spectrum::default(),
            lowest_consensus_peak: 0.0,
            dirty: true,
            listeners: ListenerList::default(),
        }
    }

    /// The merged peak list before intensity adaptation and noise filtering
    pub fn consensus_peaks(&self) -> &[Peak] {
        &self.state.peaks
    }

    pub fn lowest_consensus_peak(&self) -> f32 {
        self.lowest_consensus_peak
    }

    fn absorb_peaks(&mut self, peaks: &[Peak]) {
        let merged = merge_add(&self.state.peaks, peaks, self.config.rounding());
        self.state.peaks = merge_identical_peaks(&merged, &self.thresholds);
    }
}

impl ConsensusSpectrumBuilder for GreedyConsensusSpectrum {
    fn add_spectra(&mut self, spectra: &[Spectrum]) {
        if spectra.is_empty() {
            return;
        }
        for spectrum in spectra {
            self.absorb_peaks(&spectrum.peaks);
            self.state.add_spectrum(spectrum);
        }
        self.dirty = true;
        self.listeners.notify_added(&*self, spectra);
    }

    fn remove_spectra(&mut self, _spectra: &[Spectrum]) -> Result<(), ConsensusError> {
        Err(ConsensusError::RemovalNotSupported)
    }

    fn supports_removal(&self) -> bool {
        false
    }

    fn merge_state(&mut self, state: &ConsensusState) {
        self.absorb_peaks(&state.peaks);
        self.state.add_aggregates(state);
        self.dirty = true;
    }

    fn state(&self) -> ConsensusState {
        self.state.clone()
    }

    fn update(&mut self) {
        if !self.dirty {
            return;
        }
        let adapted = adapt_peak_intensities(&self.state.peaks, self.state.n_spectra);
        let peaks = filter_noise(&adapted, self.config.peaks_per_bin, self.config.bin_width);
        self.lowest_consensus_peak = lowest_positive_intensity(&peaks);
        self.consensus = self.state.to_spectrum(peaks);
        self.dirty = false;
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn consensus_spectrum(&mut self) -> &Spectrum {
        self.update();
        &self.consensus
    }

    fn spectra_count(&self) -> usize {
        self.state.n_spectra
    }

    fn average_precursor_mz(&self) -> f32 {
        self.state.average_precursor_mz()
    }

    fn average_precursor_intensity(&self) -> f32 {
        self.state.average_precursor_intensity()
    }

    fn average_charge(&self) -> f32 {
        self.state.average_charge()
    }

    fn clear(&mut self) {
        self.state = ConsensusState::default();
        self.consensus = Spectrum::default();
        self.lowest_consensus_peak = 0.0;
        self.dirty = true;
    }

    fn add_listener(&mut self, listener: Box<dyn SpectrumHolderListener>) {
        self.listeners.push(listener);
    }
}

/// Builds [`GreedyConsensusSpectrum`] instances sharing one [`ConsensusConfig`]
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyConsensusSpectrumFactory {
    pub config: ConsensusConfig,
}

impl GreedyConsensusSpectrumFactory {
    pub fn new(config: ConsensusConfig) -> Self {
        Self { config }
    }
}

impl ConsensusSpectrumFactory for GreedyConsensusSpectrumFactory {
    fn build(&self) -> Box<dyn ConsensusSpectrumBuilder> {
        Box::new(GreedyConsensusSpectrum::new(self.config))
    }
}
