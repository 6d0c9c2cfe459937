use criterion::{black_box, criterion_group, criterion_main, Criterion};

use mzcluster::consensus::{ConsensusSpectrumBuilderFactory, GreedyConsensusSpectrumFactory};
use mzcluster::peaks::match_peaks;
use mzcluster::prelude::*;
use mzcluster::similarity::NormalizedDotProduct;
use mzcluster::{ClusteringEngine, Peak, Spectrum};

/// Deterministic pseudo-random spectra sharing a fragment pattern per family
fn make_spectra(n: usize, n_peaks: usize) -> Vec<Spectrum> {
    let mut state: u64 = 0x2545F4914F6CDD1D;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        (state % 10_000) as f32 / 10_000.0
    };
    (0..n)
        .map(|i| {
            let family = (i % 7) as f32;
            let peaks = (0..n_peaks)
                .map(|j| {
                    let mz = 100.0 + family * 3.0 + j as f32 * 17.5 + next() * 0.1;
                    Peak::new(mz, 10.0 + next() * 1000.0, 1)
                })
                .collect();
            Spectrum::new(format!("scan={i}"), 500.0 + family, 2, peaks)
        })
        .collect()
}

fn peak_matching(c: &mut Criterion) {
    let spectra = make_spectra(2, 200);
    c.bench_function("match_peaks", |b| {
        b.iter(|| match_peaks(black_box(&spectra[0]), black_box(&spectra[1]), Tolerance::Da(0.5)))
    });
    let checker = NormalizedDotProduct::default();
    c.bench_function("normalized_dot_product", |b| {
        b.iter(|| checker.assess_similarity(black_box(&spectra[0]), black_box(&spectra[1])))
    });
}

fn consensus_building(c: &mut Criterion) {
    let spectra = make_spectra(250, 100);
    c.bench_function("consensus_spectrum", |b| {
        b.iter(|| {
            let mut builder = ConsensusSpectrumBuilderFactory::default().build();
            for s in spectra.iter() {
                builder.add_spectra(std::slice::from_ref(s));
            }
            builder.consensus_spectrum().len()
        })
    });
    c.bench_function("greedy_consensus_spectrum", |b| {
        b.iter(|| {
            let mut builder = GreedyConsensusSpectrumFactory::default().build();
            for s in spectra.iter() {
                builder.add_spectra(std::slice::from_ref(s));
            }
            builder.consensus_spectrum().len()
        })
    });
}

fn batch_clustering(c: &mut Criterion) {
    let spectra = make_spectra(70, 50);
    c.bench_function("batch_clustering", |b| {
        b.iter(|| {
            let mut engine = ClusteringEngine::new(
                ClusteringConfig::default(),
                Box::new(NormalizedDotProduct::default()),
                Box::new(ConsensusSpectrumBuilderFactory::default()),
            );
            engine.add_spectra(black_box(spectra.clone()));
            engine.process_clusters().unwrap();
            engine.len()
        })
    });
}

criterion_group!(benches, peak_matching, consensus_building, batch_clustering);
criterion_main!(benches);
