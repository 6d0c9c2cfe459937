//! The standard consensus spectrum builder, which supports both adding and removing spectra.
use log::trace;

use super::algorithms::{find_consensus_peaks, lowest_positive_intensity, merge_add, merge_remove};
use super::traits::{
    ConsensusError, ConsensusSpectrumBuilder, ConsensusSpectrumFactory, ConsensusState,
    ListenerList, SpectrumHolderListener,
};
use crate::config::ConsensusConfig;
use crate::peaks::Peak;
use crate::spectrum::Spectrum;

/// Accumulates every peak of its member spectra into one crowded, m/z-unique peak list
/// and summarizes it on demand.
///
/// While the builder holds fewer than [`ConsensusConfig::small_cluster_size`] spectra,
/// incoming peaks are merged immediately. Beyond that, peaks weaker than a fraction of the
/// weakest consensus peak are dropped and the rest are held back and merged in bulk
/// periodically, so a large cluster does not pay for a full merge on every addition.
#[derive(Debug)]
pub struct ConsensusSpectrum {
    config: ConsensusConfig,
    state: ConsensusState,
    held_peaks: Vec<Peak>,
    consensus: Spectrum,
    lowest_consensus_peak: f32,
    dirty: bool,
    listeners: ListenerList,
}

impl ConsensusSpectrum {
    pub(crate) fn new(config: ConsensusConfig) -> Self {
        Self {
            config,
            state: ConsensusState::default(),
            held_peaks: Vec::new(),
            consensus: Spectrum::default(),
            lowest_consensus_peak: 0.0,
            dirty: true,
            listeners: ListenerList::default(),
        }
    }

    /// The accumulated peak list, excluding peaks still held back
    pub fn all_peaks(&self) -> &[Peak] {
        &self.state.peaks
    }

    /// The number of peaks waiting to be merged into [`ConsensusSpectrum::all_peaks`]
    pub fn held_peak_count(&self) -> usize {
        self.held_peaks.len()
    }

    /// The weakest positive intensity of the last computed consensus spectrum
    pub fn lowest_consensus_peak(&self) -> f32 {
        self.lowest_consensus_peak
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    fn flush_held_peaks(&mut self) {
        if self.held_peaks.is_empty() {
            return;
        }
        trace!(
            "Merging {} held peaks into {} accumulated peaks",
            self.held_peaks.len(),
            self.state.peaks.len()
        );
        self.state.peaks = merge_add(&self.state.peaks, &self.held_peaks, self.config.rounding());
        self.held_peaks.clear();
    }

    fn add_peaks(&mut self, peaks: &[Peak]) {
        let n_spectra = self.state.n_spectra;
        if n_spectra < self.config.small_cluster_size {
            self.state.peaks = merge_add(&self.state.peaks, peaks, self.config.rounding());
            return;
        }

        let gate = self.lowest_consensus_peak * self.config.noise_gate_fraction;
        self.held_peaks
            .extend(peaks.iter().filter(|p| p.intensity >= gate).copied());

        let interval = if n_spectra < self.config.medium_cluster_size {
            self.config.medium_flush_interval
        } else {
            self.config.large_flush_interval
        };
        if (n_spectra + 1) % interval.max(1) == 0 {
            self.flush_held_peaks();
        }
    }
}

impl ConsensusSpectrumBuilder for ConsensusSpectrum {
    fn add_spectra(&mut self, spectra: &[Spectrum]) {
        if spectra.is_empty() {
            return;
        }
        for spectrum in spectra {
            self.add_peaks(&spectrum.peaks);
            self.state.add_spectrum(spectrum);
        }
        self.dirty = true;
        self.listeners.notify_added(&*self, spectra);
    }

    fn remove_spectra(&mut self, spectra: &[Spectrum]) -> Result<(), ConsensusError> {
        if spectra.is_empty() {
            return Ok(());
        }
        self.flush_held_peaks();
        for spectrum in spectra {
            self.state.peaks =
                merge_remove(&self.state.peaks, &spectrum.peaks, self.config.rounding());
            self.state.remove_spectrum(spectrum);
        }
        self.dirty = true;
        self.listeners.notify_removed(&*self, spectra);
        Ok(())
    }

    fn merge_state(&mut self, state: &ConsensusState) {
        self.flush_held_peaks();
        self.state.peaks = merge_add(&self.state.peaks, &state.peaks, self.config.rounding());
        self.state.add_aggregates(state);
        self.dirty = true;
    }

    fn state(&self) -> ConsensusState {
        let mut state = self.state.clone();
        if !self.held_peaks.is_empty() {
            state.peaks = merge_add(&state.peaks, &self.held_peaks, self.config.rounding());
        }
        state
    }

    fn update(&mut self) {
        if !self.dirty {
            return;
        }
        self.flush_held_peaks();
        let peaks = find_consensus_peaks(&self.state.peaks, self.state.n_spectra, &self.config);
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
        self.held_peaks.clear();
        self.consensus = Spectrum::default();
        self.lowest_consensus_peak = 0.0;
        self.dirty = true;
    }

    fn add_listener(&mut self, listener: Box<dyn SpectrumHolderListener>) {
        self.listeners.push(listener);
    }
}

/// Builds [`ConsensusSpectrum`] instances sharing one [`ConsensusConfig`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsensusSpectrumBuilderFactory {
    pub config: ConsensusConfig,
}

impl ConsensusSpectrumBuilderFactory {
    pub fn new(config: ConsensusConfig) -> Self {
        Self { config }
    }
}

impl ConsensusSpectrumFactory for ConsensusSpectrumBuilderFactory {
    fn build(&self) -> Box<dyn ConsensusSpectrumBuilder> {
        Box::new(ConsensusSpectrum::new(self.config))
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    fn spectrum(id: &str, precursor_mz: f32, peaks: &[(f32, f32)]) -> Spectrum {
        Spectrum::new(
            id.to_string(),
            precursor_mz,
            2,
            peaks.iter().map(|(mz, i)| Peak::new(*mz, *i, 1)).collect(),
        )
    }

    fn build() -> ConsensusSpectrum {
        ConsensusSpectrum::new(ConsensusConfig::default())
    }

    fn assert_equivalent(a: &Spectrum, b: &Spectrum) {
        assert_eq!(a.peaks.len(), b.peaks.len(), "{:?} != {:?}", a.peaks, b.peaks);
        for (pa, pb) in a.peaks.iter().zip(b.peaks.iter()) {
            assert!((pa.mz - pb.mz).abs() < 0.002, "{pa} != {pb}");
            assert!((pa.intensity - pb.intensity).abs() < 0.1, "{pa} != {pb}");
            assert_eq!(pa.count, pb.count, "{pa} != {pb}");
        }
        assert!((a.precursor_mz - b.precursor_mz).abs() < 1e-3);
    }

    fn fixtures() -> Vec<Spectrum> {
        vec![
            spectrum("a", 500.0, &[(110.0, 20.0), (210.5, 50.0), (305.2, 10.0), (410.0, 80.0)]),
            spectrum("b", 500.5, &[(110.02, 25.0), (210.48, 40.0), (350.0, 5.0), (410.1, 60.0)]),
            spectrum("c", 501.0, &[(109.97, 30.0), (222.0, 15.0), (305.25, 12.0), (470.0, 2.0)]),
        ]
    }

    #[test_log::test]
    fn test_empty_builder() {
        let mut builder = build();
        assert!(builder.is_dirty());
        let consensus = builder.consensus_spectrum();
        assert!(consensus.peaks.is_empty());
        assert_eq!(consensus.precursor_mz, 0.0);
        assert_eq!(consensus.precursor_charge, 0);
        assert_eq!(consensus.precursor_intensity, 0.0);
        assert!(!builder.is_dirty());
    }

    #[test_log::test]
    fn test_idempotent_read() {
        let mut builder = build();
        builder.add_spectra(&fixtures());
        let first = builder.consensus_spectrum().clone();
        assert!(!builder.is_dirty());
        let second = builder.consensus_spectrum().clone();
        assert_eq!(first, second);
        assert_eq!(builder.spectra_count(), 3);
        assert!((builder.average_precursor_mz() - 500.5).abs() < 1e-4);
        assert_eq!(builder.average_charge(), 2.0);
    }

    #[test_log::test]
    fn test_order_invariance() {
        let spectra = fixtures();
        let mut forward = build();
        forward.add_spectra(&spectra);

        let mut shuffled = build();
        shuffled.add_spectra(&[spectra[2].clone(), spectra[0].clone(), spectra[1].clone()]);

        let mut one_by_one = build();
        for s in spectra.iter().rev() {
            one_by_one.add_spectra(std::slice::from_ref(s));
        }

        let reference = forward.consensus_spectrum().clone();
        assert_equivalent(&reference, shuffled.consensus_spectrum());
        assert_equivalent(&reference, one_by_one.consensus_spectrum());
    }

    #[test_log::test]
    fn test_add_remove_inverse() {
        let spectra = fixtures();
        let mut reference = build();
        reference.add_spectra(&spectra[..2]);

        let mut builder = build();
        builder.add_spectra(&spectra[..2]);
        builder.consensus_spectrum();
        builder.add_spectra(&spectra[2..]);
        assert!(builder.is_dirty());
        builder.remove_spectra(&spectra[2..]).unwrap();

        assert_eq!(builder.spectra_count(), 2);
        assert_eq!(builder.all_peaks().len(), reference.all_peaks().len());
        assert_equivalent(reference.consensus_spectrum(), builder.consensus_spectrum());
    }

    #[test_log::test]
    fn test_remove_everything() {
        let spectra = fixtures();
        let mut builder = build();
        builder.add_spectra(&spectra);
        builder.remove_spectra(&spectra).unwrap();
        assert_eq!(builder.spectra_count(), 0);
        assert!(builder.all_peaks().is_empty());
        let consensus = builder.consensus_spectrum();
        assert!(consensus.peaks.is_empty());
        assert_eq!(consensus.precursor_mz, 0.0);
    }

    #[test_log::test]
    fn test_held_peaks_in_large_clusters() {
        let config = ConsensusConfig::default()
            .with_small_cluster_size(2)
            .with_flush_intervals(3, 5);
        let mut builder = ConsensusSpectrum::new(config);
        let spectra = fixtures();
        builder.add_spectra(&spectra[..2]);
        // Prime the noise gate
        let lowest = {
            builder.consensus_spectrum();
            builder.lowest_consensus_peak()
        };
        assert!(lowest > 0.0);

        // The weak 470 m/z peak of "c" falls below the noise gate
        builder.add_spectra(&spectra[2..]);
        assert_eq!(builder.spectra_count(), 3);
        assert_eq!(builder.held_peak_count(), 0, "third spectrum triggers a flush");
        assert!(builder.all_peaks().iter().all(|p| p.mz != 470.0));

        builder.add_spectra(&spectra[..1]);
        assert_eq!(builder.held_peak_count(), 4);
        assert_eq!(builder.state().peaks.len(), builder.all_peaks().len());
        builder.update();
        assert_eq!(builder.held_peak_count(), 0);
    }

    #[test_log::test]
    fn test_large_clusters_flush_less_often() {
        let config = ConsensusConfig::default()
            .with_small_cluster_size(2)
            .with_medium_cluster_size(4)
            .with_flush_intervals(3, 5);
        let mut builder = ConsensusSpectrum::new(config);
        // The consensus is never read, so the noise gate stays open
        let s = spectrum("s", 500.0, &[(150.0, 10.0), (250.0, 20.0)]);
        let mut held = Vec::new();
        for _ in 0..10 {
            builder.add_spectra(std::slice::from_ref(&s));
            held.push(builder.held_peak_count());
        }
        // Held from the third spectrum on. Flushed on the third under the medium interval,
        // then only on the fifth and tenth once the cluster has reached four spectra.
        assert_eq!(held, [0, 0, 0, 2, 0, 2, 4, 6, 8, 0]);
        assert_eq!(builder.spectra_count(), 10);
        assert_eq!(builder.all_peaks().len(), 2);
        assert!(builder.all_peaks().iter().all(|p| p.count == 10));
    }

    #[test_log::test]
    fn test_merge_state_matches_adding() {
        let spectra = fixtures();
        let mut combined = build();
        combined.add_spectra(&spectra);

        let mut left = build();
        left.add_spectra(&spectra[..1]);
        let mut right = build();
        right.add_spectra(&spectra[1..]);
        left.merge_state(&right.state());

        assert_eq!(left.spectra_count(), 3);
        assert_equivalent(combined.consensus_spectrum(), left.consensus_spectrum());

        let restored = ConsensusSpectrumBuilderFactory::default().restore(&combined.state());
        assert_eq!(restored.spectra_count(), 3);
        assert_eq!(restored.state(), combined.state());
    }

    #[test_log::test]
    fn test_clear() {
        let mut builder = build();
        builder.add_spectra(&fixtures());
        builder.consensus_spectrum();
        builder.clear();
        assert!(builder.is_dirty());
        assert_eq!(builder.spectra_count(), 0);
        assert!(builder.consensus_spectrum().peaks.is_empty());
    }

    #[derive(Default)]
    struct Counter {
        added: AtomicUsize,
        removed: AtomicUsize,
    }

    struct CountingListener(Arc<Counter>);

    impl SpectrumHolderListener for CountingListener {
        fn on_spectra_added(&self, holder: &dyn ConsensusSpectrumBuilder, spectra: &[Spectrum]) {
            assert!(holder.is_dirty());
            self.0.added.fetch_add(spectra.len(), Ordering::SeqCst);
        }

        fn on_spectra_removed(&self, _holder: &dyn ConsensusSpectrumBuilder, spectra: &[Spectrum]) {
            self.0.removed.fetch_add(spectra.len(), Ordering::SeqCst);
        }
    }

    #[test_log::test]
    fn test_listeners() {
        let counter = Arc::new(Counter::default());
        let mut builder = build();
        builder.add_listener(Box::new(CountingListener(counter.clone())));
        let spectra = fixtures();
        builder.add_spectra(&spectra);
        builder.remove_spectra(&spectra[..1]).unwrap();
        builder.add_spectra(&[]);
        assert_eq!(counter.added.load(Ordering::SeqCst), 3);
        assert_eq!(counter.removed.load(Ordering::SeqCst), 1);
    }

    #[test_log::test]
    fn test_state_changes_without_spectra_are_silent() {
        let counter = Arc::new(Counter::default());
        let mut other = build();
        other.add_spectra(&fixtures());

        let mut builder = build();
        builder.add_listener(Box::new(CountingListener(counter.clone())));
        builder.merge_state(&other.state());
        assert_eq!(builder.spectra_count(), 3);
        builder.clear();
        assert_eq!(builder.spectra_count(), 0);
        assert_eq!(counter.added.load(Ordering::SeqCst), 0);
        assert_eq!(counter.removed.load(Ordering::SeqCst), 0);
    }
}
