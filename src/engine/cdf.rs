use std::str::FromStr;

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CdfError {
    #[error("The cumulative distribution function has no bins")]
    Empty,
    #[error("Encountered a malformed line {line}: {text}")]
    MalformedLine { line: usize, text: String },
    #[error("Bin {index} is out of order, scores and probabilities must both increase")]
    NotMonotonic { index: usize },
}

/// The distribution of similarity scores between unrelated spectra, as a table of
/// `(max_score, P(score <= max_score))` bins with ascending scores.
///
/// Used to decide whether a score is unlikely to have arisen by chance given how many
/// comparisons were made to find it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CumulativeDistributionFunction {
    bins: Vec<(f64, f64)>,
}

impl CumulativeDistributionFunction {
    pub fn new(bins: Vec<(f64, f64)>) -> Result<Self, CdfError> {
        if bins.is_empty() {
            return Err(CdfError::Empty);
        }
        if let Some(index) = bins
            .windows(2)
            .position(|w| w[1].0 <= w[0].0 || w[1].1 < w[0].1)
        {
            return Err(CdfError::NotMonotonic { index: index + 1 });
        }
        Ok(Self { bins })
    }

    pub fn bins(&self) -> &[(f64, f64)] {
        &self.bins
    }

    /// The probability that a random pair scores at most `score`
    pub fn cumulative_probability(&self, score: f64) -> f64 {
        let i = self.bins.partition_point(|(max_score, _)| *max_score < score);
        self.bins.get(i).map(|(_, p)| *p).unwrap_or(1.0).clamp(0.0, 1.0)
    }

    /// The probability that the best of `n_comparisons` random pairs scores at least
    /// `score`, bounded above by `1.0`
    pub fn probability(&self, score: f64, n_comparisons: usize) -> f64 {
        let tail = 1.0 - self.cumulative_probability(score);
        (n_comparisons.max(1) as f64 * tail).min(1.0)
    }

    pub fn is_significant(&self, score: f64, n_comparisons: usize, min_precision: f64) -> bool {
        1.0 - self.probability(score, n_comparisons) >= min_precision
    }
}

impl FromStr for CumulativeDistributionFunction {
    type Err = CdfError;

    /// Parse a two column, tab separated table. A header line is skipped if it does not
    /// parse as numbers.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bins = Vec::new();
        for (i, line) in s.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut columns = line.split('\t').map(str::trim);
            let parsed = match (columns.next(), columns.next()) {
                (Some(score), Some(prob)) => score.parse::<f64>().ok().zip(prob.parse::<f64>().ok()),
                _ => None,
            };
            match parsed {
                Some(bin) => bins.push(bin),
                None if i == 0 => continue,
                None => {
                    return Err(CdfError::MalformedLine {
                        line: i + 1,
                        text: line.to_string(),
                    })
                }
            }
        }
        Self::new(bins)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const TABLE: &str = "max_score\tcumulative\n0.1\t0.5\n0.5\t0.9\n0.8\t0.999\n1.0\t1.0\n";

    #[test]
    fn test_parse() -> Result<(), CdfError> {
        let cdf: CumulativeDistributionFunction = TABLE.parse()?;
        assert_eq!(cdf.bins().len(), 4);
        assert_eq!(cdf.cumulative_probability(0.05), 0.5);
        assert_eq!(cdf.cumulative_probability(0.5), 0.9);
        assert_eq!(cdf.cumulative_probability(0.6), 0.999);
        assert_eq!(cdf.cumulative_probability(1.5), 1.0);
        Ok(())
    }

    #[test]
    fn test_malformed() {
        let err = "0.1\t0.5\n0.2 0.6\n".parse::<CumulativeDistributionFunction>().unwrap_err();
        assert_eq!(
            err,
            CdfError::MalformedLine {
                line: 2,
                text: "0.2 0.6".into()
            }
        );
        assert_eq!(
            "header\n".parse::<CumulativeDistributionFunction>().unwrap_err(),
            CdfError::Empty
        );
        assert_eq!(
            CumulativeDistributionFunction::new(vec![(0.5, 0.5), (0.4, 0.9)]).unwrap_err(),
            CdfError::NotMonotonic { index: 1 }
        );
    }

    #[test]
    fn test_significance_depends_on_comparisons() {
        let cdf: CumulativeDistributionFunction = TABLE.parse().unwrap();
        assert!(cdf.is_significant(0.6, 1, 0.99));
        assert!(!cdf.is_significant(0.6, 20, 0.99));
        assert!(cdf.is_significant(0.9, 1000, 0.99));
        assert!(!cdf.is_significant(0.3, 1, 0.99));
        assert_eq!(cdf.probability(0.05, 10), 1.0);
    }
}
