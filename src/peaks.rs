pub mod matching;
pub mod peak;

pub use crate::peaks::matching::{match_peak_lists, match_peaks, PeakMatches};
pub use crate::peaks::peak::{round_mz, sort_by_mz, total_count, Peak, DEFAULT_MZ_PRECISION};
