//! Represent a single MS/MS spectrum as it is fed to the clustering machinery: an
//! identifier, precursor ion information, a centroided peak list, and a free-form
//! ordered property map carried along for downstream writers.
//!
//! Peak lists are expected to have been filtered and normalized upstream; this type only
//! guarantees that they are sorted by m/z when built through [`Spectrum::new`].
use indexmap::IndexMap;
use mzpeaks::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::peaks::{sort_by_mz, Peak};

/// An ordered mapping of property names to values
pub type Properties = IndexMap<String, String>;

#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Spectrum {
    /// The spectrum's identifier. Synthesized consensus spectra have an empty id.
    pub id: String,
    pub precursor_mz: f32,
    pub precursor_charge: i32,
    pub precursor_intensity: f32,
    /// The peak list, sorted by m/z
    pub peaks: Vec<Peak>,
    pub properties: Properties,
}

impl Spectrum {
    pub fn new(id: String, precursor_mz: f32, precursor_charge: i32, mut peaks: Vec<Peak>) -> Self {
        sort_by_mz(&mut peaks);
        Self {
            id,
            precursor_mz,
            precursor_charge,
            precursor_intensity: 0.0,
            peaks,
            properties: Properties::new(),
        }
    }

    /// Build a spectrum from any `mzpeaks` centroid collection
    pub fn from_centroids<'a, C: CentroidLike + 'a, I: IntoIterator<Item = &'a C>>(
        id: String,
        precursor_mz: f32,
        precursor_charge: i32,
        centroids: I,
    ) -> Self {
        let peaks = centroids.into_iter().map(Peak::from_centroid).collect();
        Self::new(id, precursor_mz, precursor_charge, peaks)
    }

    pub fn with_precursor_intensity(mut self, intensity: f32) -> Self {
        self.precursor_intensity = intensity;
        self
    }

    pub fn with_property<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.set_property(key, value);
        self
    }

    pub fn set_property<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(|v| v.as_str())
    }

    /// The number of peaks
    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    /// The total ion current of the peak list
    pub fn tic(&self) -> f32 {
        self.peaks.iter().map(|p| p.intensity).sum()
    }

    pub fn base_peak(&self) -> Option<&Peak> {
        self.peaks
            .iter()
            .max_by(|a, b| a.intensity.total_cmp(&b.intensity))
    }

    /// A copy of this spectrum keeping only its `n` most intense peaks, still in m/z order.
    ///
    /// Ties in intensity keep the lower m/z peak.
    pub fn highest_peaks(&self, n: usize) -> Spectrum {
        if self.peaks.len() <= n {
            return self.clone();
        }
        let mut peaks = self.peaks.clone();
        peaks.sort_by(|a, b| b.intensity.total_cmp(&a.intensity));
        peaks.truncate(n);
        Spectrum {
            id: self.id.clone(),
            precursor_mz: self.precursor_mz,
            precursor_charge: self.precursor_charge,
            precursor_intensity: self.precursor_intensity,
            peaks: {
                sort_by_mz(&mut peaks);
                peaks
            },
            properties: self.properties.clone(),
        }
    }
}
