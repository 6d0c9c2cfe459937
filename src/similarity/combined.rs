use mzpeaks::Tolerance;

use super::{clamp_normalized, SimilarityChecker};
use crate::peaks::PeakMatches;

/// A weighted mean of several normalized metrics, all scored from one shared
/// [`PeakMatches`] so the peak matching is only computed once per comparison.
///
/// The tolerance and peak filtering settings of the combination apply to every member.
#[derive(Debug)]
pub struct CombinedSimilarity {
    tolerance: Tolerance,
    peak_filtering: bool,
    members: Vec<(Box<dyn SimilarityChecker>, f64)>,
}

impl CombinedSimilarity {
    pub fn new(tolerance: Tolerance, peak_filtering: bool) -> Self {
        Self {
            tolerance,
            peak_filtering,
            members: Vec::new(),
        }
    }

    /// Add a metric with a relative `weight`
    pub fn with_member(mut self, mut checker: Box<dyn SimilarityChecker>, weight: f64) -> Self {
        checker.set_fragment_tolerance(self.tolerance);
        checker.set_peak_filtering(self.peak_filtering);
        self.members.push((checker, weight.max(0.0)));
        self
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl SimilarityChecker for CombinedSimilarity {
    fn fragment_tolerance(&self) -> Tolerance {
        self.tolerance
    }

    fn set_fragment_tolerance(&mut self, tolerance: Tolerance) {
        self.tolerance = tolerance;
        for (checker, _) in self.members.iter_mut() {
            checker.set_fragment_tolerance(tolerance);
        }
    }

    fn peak_filtering(&self) -> bool {
        self.peak_filtering
    }

    fn set_peak_filtering(&mut self, enabled: bool) {
        self.peak_filtering = enabled;
        for (checker, _) in self.members.iter_mut() {
            checker.set_peak_filtering(enabled);
        }
    }

    fn assess_matches(&self, matches: &PeakMatches) -> f64 {
        let total_weight: f64 = self.members.iter().map(|(_, w)| *w).sum();
        if total_weight <= 0.0 {
            return 0.0;
        }
        let score: f64 = self
            .members
            .iter()
            .map(|(checker, weight)| checker.assess_matches(matches) * weight)
            .sum();
        clamp_normalized(score / total_weight)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::peaks::{match_peaks, Peak};
    use crate::similarity::{ExplainedIntensity, NormalizedDotProduct};
    use crate::spectrum::Spectrum;

    #[test]
    fn test_weighted_mean() {
        let a = Spectrum::new(
            "a".into(),
            500.0,
            2,
            vec![Peak::new(100.0, 10.0, 1), Peak::new(200.0, 40.0, 1), Peak::new(300.0, 5.0, 1)],
        );
        let b = Spectrum::new(
            "b".into(),
            500.0,
            2,
            vec![Peak::new(100.2, 12.0, 1), Peak::new(250.0, 40.0, 1), Peak::new(300.1, 9.0, 1)],
        );
        let combined = CombinedSimilarity::new(Tolerance::Da(0.5), false)
            .with_member(Box::new(NormalizedDotProduct::default()), 1.0)
            .with_member(Box::new(ExplainedIntensity::default()), 3.0);
        assert_eq!(combined.len(), 2);

        let matches = match_peaks(&a, &b, combined.fragment_tolerance());
        let dot = NormalizedDotProduct::default().assess_matches(&matches);
        let explained = ExplainedIntensity::default().assess_matches(&matches);
        let expected = (dot + 3.0 * explained) / 4.0;
        assert!((combined.assess_similarity(&a, &b) - expected).abs() < 1e-12);
        assert!((combined.assess_similarity(&a, &a) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_settings_propagate() {
        let mut combined = CombinedSimilarity::new(Tolerance::Da(0.5), false)
            .with_member(Box::new(NormalizedDotProduct::new(Tolerance::PPM(20.0), false)), 1.0);
        assert_eq!(combined.members[0].0.fragment_tolerance(), Tolerance::Da(0.5));
        combined.set_fragment_tolerance(Tolerance::Da(0.02));
        combined.set_peak_filtering(true);
        assert_eq!(combined.members[0].0.fragment_tolerance(), Tolerance::Da(0.02));
        assert!(combined.members[0].0.peak_filtering());
        assert!(CombinedSimilarity::new(Tolerance::Da(0.5), false).is_empty());
    }
}
