//! The peak accumulation and summarization steps shared by the consensus spectrum builders.
//!
//! All functions are pure: they read sorted peak lists and return new ones.
use crate::config::ConsensusConfig;
use crate::peaks::{sort_by_mz, total_count, Peak};

/// Round (if requested) and sort an incoming peak list
fn prepare_peaks(peaks: &[Peak], rounding: Option<u32>) -> Vec<Peak> {
    let mut prepared: Vec<Peak> = match rounding {
        Some(precision) => peaks.iter().map(|p| p.rounded(precision)).collect(),
        None => peaks.to_vec(),
    };
    sort_by_mz(&mut prepared);
    prepared
}

#[inline]
fn push_or_accumulate(out: &mut Vec<Peak>, peak: Peak) {
    if let Some(last) = out.last_mut() {
        if last.mz == peak.mz {
            *last = last.accumulate(&peak);
            return;
        }
    }
    out.push(peak);
}

/// Merge `incoming` into the m/z-sorted, m/z-unique `existing` list.
///
/// Peaks at exactly the same (rounded) m/z have their intensities and counts summed.
/// Both lists are walked once, so the cost is linear in their combined length, and the
/// result is sorted and m/z-unique.
pub fn merge_add(existing: &[Peak], incoming: &[Peak], rounding: Option<u32>) -> Vec<Peak> {
    if incoming.is_empty() {
        return existing.to_vec();
    }
    let incoming = prepare_peaks(incoming, rounding);
    let mut merged = Vec::with_capacity(existing.len() + incoming.len());
    let mut existing = existing.iter().copied().peekable();

    for peak in incoming {
        while let Some(prior) = existing.next_if(|p| p.mz < peak.mz) {
            push_or_accumulate(&mut merged, prior);
        }
        push_or_accumulate(&mut merged, peak);
    }
    for prior in existing {
        push_or_accumulate(&mut merged, prior);
    }
    merged
}

/// Subtract `removing` from the m/z-sorted `existing` list.
///
/// Intensities and counts are subtracted at exactly matching (rounded) m/z. Peaks whose
/// count drops to zero or below are dropped and remaining intensities are floored at zero.
/// Peaks to remove that have no counterpart are ignored.
pub fn merge_remove(existing: &[Peak], removing: &[Peak], rounding: Option<u32>) -> Vec<Peak> {
    let removing = prepare_peaks(removing, rounding);
    let mut removing = removing.into_iter().peekable();
    let mut kept = Vec::with_capacity(existing.len());

    for peak in existing {
        let mut peak = *peak;
        while let Some(other) = removing.next_if(|r| r.mz <= peak.mz) {
            if other.mz == peak.mz {
                peak.intensity -= other.intensity;
                peak.count -= other.count;
            }
        }
        if peak.count > 0 {
            peak.intensity = peak.intensity.max(0.0);
            kept.push(peak);
        }
    }
    kept
}

/// The thresholds used by the gradual identical-peak merge: `step`, `2 * step`, ...
/// up to and including `final_threshold`.
pub fn gradual_thresholds(step: f32, final_threshold: f32) -> Vec<f32> {
    if step <= 0.0 || final_threshold < step {
        return vec![final_threshold];
    }
    let passes = (final_threshold / step).round().max(1.0) as usize;
    (1..=passes).map(|i| step * i as f32).collect()
}

/// The thresholds the greedy builder merges with: one fifth of the fragment tolerance,
/// repeated while the threshold stays below the tolerance.
pub fn tolerance_thresholds(tolerance: f32) -> Vec<f32> {
    if tolerance <= 0.0 {
        return Vec::new();
    }
    let step = tolerance / 5.0;
    (1..5).map(|i| step * i as f32).collect()
}

/// One pass of the identical-peak merge with a fixed m/z `threshold`
fn merge_pass(peaks: &[Peak], threshold: f32) -> Vec<Peak> {
    let mut merged = Vec::with_capacity(peaks.len());
    let mut iter = peaks.iter().copied();
    let Some(mut current) = iter.next() else {
        return merged;
    };
    for next in iter {
        if next.mz - current.mz <= threshold {
            current = current.merge_weighted(&next);
        } else {
            merged.push(current);
            current = next;
        }
    }
    merged.push(current);
    merged
}

/// Merge peaks closer than a gradually increasing m/z threshold.
///
/// Each pass walks the sorted list once and folds every peak within the current
/// threshold of the running peak into it at the intensity-weighted mean m/z. Raising
/// the threshold one step at a time limits how far apart chained peaks can drift.
/// The total `count` of the list is unchanged.
pub fn merge_identical_peaks(peaks: &[Peak], thresholds: &[f32]) -> Vec<Peak> {
    let mut merged = peaks.to_vec();
    sort_by_mz(&mut merged);
    let before = total_count(&merged);
    for threshold in thresholds {
        merged = merge_pass(&merged, *threshold);
    }
    debug_assert_eq!(
        before,
        total_count(&merged),
        "Merging peaks changed the total peak count"
    );
    merged
}

/// Boost each peak's intensity by how often it was observed among `n_spectra` spectra:
/// `intensity * (0.95 + 0.05 * (1 + count / n_spectra) ^ 5)`
pub fn adapt_peak_intensities(peaks: &[Peak], n_spectra: usize) -> Vec<Peak> {
    if n_spectra == 0 {
        return peaks.to_vec();
    }
    let n = n_spectra as f64;
    peaks
        .iter()
        .map(|p| {
            let observed = p.count as f64 / n;
            p.scaled(0.95 + 0.05 * (1.0 + observed).powi(5))
        })
        .collect()
}

#[inline]
fn bin_index(mz: f32, bin_width: f32) -> i64 {
    (mz as f64 / bin_width as f64).floor() as i64
}

/// Keep only the `peaks_per_bin` most intense peaks in every `bin_width` wide m/z bin.
///
/// Bins are aligned to multiples of `bin_width`. The result is sorted by m/z.
pub fn filter_noise(peaks: &[Peak], peaks_per_bin: usize, bin_width: f32) -> Vec<Peak> {
    let mut sorted = peaks.to_vec();
    sort_by_mz(&mut sorted);
    if bin_width <= 0.0 {
        return sorted;
    }
    let mut kept = Vec::with_capacity(sorted.len().min(peaks_per_bin * 16));
    for bin in sorted.chunk_by(|a, b| bin_index(a.mz, bin_width) == bin_index(b.mz, bin_width)) {
        if bin.len() <= peaks_per_bin {
            kept.extend_from_slice(bin);
            continue;
        }
        let mut bin = bin.to_vec();
        bin.sort_by(|a, b| b.intensity.total_cmp(&a.intensity));
        bin.truncate(peaks_per_bin);
        sort_by_mz(&mut bin);
        kept.extend(bin);
    }
    kept
}

/// The full summarization pipeline: merge identical peaks, adapt intensities to
/// observation frequency, then filter noise.
pub fn find_consensus_peaks(peaks: &[Peak], n_spectra: usize, config: &ConsensusConfig) -> Vec<Peak> {
    if peaks.is_empty() {
        return Vec::new();
    }
    let thresholds = gradual_thresholds(config.merge_step, config.merge_final_threshold);
    let merged = merge_identical_peaks(peaks, &thresholds);
    let adapted = adapt_peak_intensities(&merged, n_spectra);
    filter_noise(&adapted, config.peaks_per_bin, config.bin_width)
}

/// The smallest strictly positive intensity in `peaks`, or zero
pub fn lowest_positive_intensity(peaks: &[Peak]) -> f32 {
    peaks
        .iter()
        .map(|p| p.intensity)
        .filter(|i| *i > 0.0)
        .min_by(|a, b| a.total_cmp(b))
        .unwrap_or(0.0)
}

#[cfg(test)]
mod test {
    use super::*;

    fn p(mz: f32, intensity: f32, count: i32) -> Peak {
        Peak::new(mz, intensity, count)
    }

    #[test]
    fn test_merge_add() {
        let existing = vec![p(100.0, 10.0, 1), p(200.0, 20.0, 1)];
        let incoming = vec![p(300.0, 5.0, 1), p(100.0004, 5.0, 1), p(150.0, 1.0, 1)];
        let merged = merge_add(&existing, &incoming, Some(1000));
        assert_eq!(merged.len(), 4);
        assert_eq!(merged[0], p(100.0, 15.0, 2));
        assert_eq!(merged[1].mz, 150.0);
        assert_eq!(merged[3].mz, 300.0);
        assert!(merged.windows(2).all(|w| w[0].mz < w[1].mz));

        // Without rounding the near-identical peak stays separate
        let merged = merge_add(&existing, &incoming, None);
        assert_eq!(merged.len(), 5);
    }

    #[test]
    fn test_merge_add_duplicates_within_incoming() {
        let merged = merge_add(&[], &[p(50.0, 1.0, 1), p(50.0, 2.0, 1)], Some(1000));
        assert_eq!(merged, vec![p(50.0, 3.0, 2)]);
    }

    #[test]
    fn test_merge_remove() {
        let existing = vec![p(100.0, 15.0, 2), p(150.0, 1.0, 1), p(200.0, 20.0, 1)];
        let kept = merge_remove(&existing, &[p(100.0, 5.0, 1), p(150.0, 1.0, 1), p(175.0, 1.0, 1)], Some(1000));
        assert_eq!(kept, vec![p(100.0, 10.0, 1), p(200.0, 20.0, 1)]);
    }

    #[test]
    fn test_thresholds() {
        let steps = gradual_thresholds(0.1, 0.4);
        assert_eq!(steps.len(), 4);
        assert!((steps[3] - 0.4).abs() < 1e-6);

        let steps = tolerance_thresholds(0.5);
        assert_eq!(steps.len(), 4);
        assert!((steps[0] - 0.1).abs() < 1e-6);
        assert!(steps.iter().all(|s| *s < 0.5));
    }

    #[test]
    fn test_merge_identical_peaks_scenario() {
        let peaks = vec![p(100.0, 50.0, 1), p(100.05, 30.0, 1), p(200.0, 80.0, 1)];
        let merged = merge_identical_peaks(&peaks, &gradual_thresholds(0.1, 0.4));
        assert_eq!(merged.len(), 2);
        assert!((merged[0].mz - 100.01875).abs() < 1e-3);
        assert_eq!(merged[0].intensity, 80.0);
        assert_eq!(merged[0].count, 2);
        assert_eq!(merged[1], p(200.0, 80.0, 1));
    }

    #[test]
    fn test_count_conservation() {
        let peaks: Vec<Peak> = (0..200)
            .map(|i| p(100.0 + (i as f32) * 0.07, 1.0 + (i % 7) as f32, 1 + (i % 3)))
            .collect();
        let before = total_count(&peaks);
        let merged = merge_identical_peaks(&peaks, &gradual_thresholds(0.1, 0.4));
        assert!(merged.len() < peaks.len());
        assert_eq!(before, total_count(&merged));
        let adapted = adapt_peak_intensities(&merged, 4);
        assert_eq!(before, total_count(&adapted));
    }

    #[test]
    fn test_adapt_peak_intensities() {
        let adapted = adapt_peak_intensities(&[p(100.0, 100.0, 2), p(200.0, 100.0, 1)], 2);
        // p = 1: 0.95 + 0.05 * 32
        assert!((adapted[0].intensity - 255.0).abs() < 1e-3);
        // p = 0.5: 0.95 + 0.05 * 1.5^5
        assert!((adapted[1].intensity - 132.96875).abs() < 1e-3);
        assert_eq!(adapted[1].count, 1);
    }

    #[test]
    fn test_filter_noise_bin_cap() {
        let peaks: Vec<Peak> = (0..500)
            .map(|i| p(50.0 + i as f32 * 1.3, ((i * 37) % 101) as f32, 1))
            .collect();
        let kept = filter_noise(&peaks, 5, 100.0);
        assert!(kept.windows(2).all(|w| w[0].mz <= w[1].mz));
        for bin in kept.chunk_by(|a, b| bin_index(a.mz, 100.0) == bin_index(b.mz, 100.0)) {
            assert!(bin.len() <= 5);
        }
        // The most intense peak of the first bin survives
        let first_bin_max = peaks
            .iter()
            .filter(|p| p.mz < 100.0)
            .max_by(|a, b| a.intensity.total_cmp(&b.intensity))
            .unwrap();
        assert!(kept.contains(first_bin_max));
    }

    #[test]
    fn test_empty_inputs() {
        assert!(find_consensus_peaks(&[], 3, &ConsensusConfig::default()).is_empty());
        assert!(merge_identical_peaks(&[], &[0.1]).is_empty());
        assert_eq!(lowest_positive_intensity(&[]), 0.0);
        assert_eq!(lowest_positive_intensity(&[p(1.0, 0.0, 1), p(2.0, 3.0, 1)]), 3.0);
    }
}
