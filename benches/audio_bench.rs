//! Benchmarks for audio analysis and feature track construction.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use particle_visualizer::audio::synth::{generate_sine, generate_test_beat};
use particle_visualizer::audio::{
    analyze_samples, detect_beats, resample, AnalysisConfig, FeatureTrack, SpectrumAnalyzer,
};

const SAMPLE_RATE: u32 = 44100;

fn bench_fft_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("FFT Analysis");
    let samples = generate_sine(1000.0, SAMPLE_RATE, 1.0, 1.0);

    for fft_size in [512, 1024, 2048, 4096] {
        group.throughput(Throughput::Elements(fft_size as u64));
        group.bench_with_input(BenchmarkId::new("analyze", fft_size), &fft_size, |b, &size| {
            let mut analyzer = SpectrumAnalyzer::new(size);
            b.iter(|| {
                black_box(analyzer.analyze(&samples));
            });
        });
    }

    group.finish();
}

fn bench_feature_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("Feature Extraction");
    let config = AnalysisConfig::default();

    for duration in [2.0, 5.0] {
        let samples = generate_test_beat(120.0, SAMPLE_RATE, duration);

        group.throughput(Throughput::Elements(samples.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("analyze_samples", format!("{}s", duration)),
            &samples,
            |b, samples| {
                b.iter(|| {
                    black_box(analyze_samples(samples, SAMPLE_RATE, &config));
                });
            },
        );
    }

    group.finish();
}

fn bench_beat_detection(c: &mut Criterion) {
    let samples = generate_test_beat(120.0, SAMPLE_RATE, 10.0);

    c.bench_function("detect_beats_10s", |b| {
        b.iter(|| {
            black_box(detect_beats(&samples, SAMPLE_RATE, 0.3));
        });
    });
}

fn bench_track(c: &mut Criterion) {
    let mut group = c.benchmark_group("Feature Track");

    // Three minutes of analysis frames at the default hop.
    let raw: Vec<f32> = (0..15_500).map(|i| ((i as f32) * 0.01).sin()).collect();
    group.bench_function("resample_3min_30fps", |b| {
        b.iter(|| {
            black_box(resample(&raw, 180.0, 5400));
        });
    });

    let features = analyze_samples(
        &generate_test_beat(120.0, SAMPLE_RATE, 5.0),
        SAMPLE_RATE,
        &AnalysisConfig::default(),
    );
    group.bench_function("from_features_5s", |b| {
        b.iter(|| {
            black_box(FeatureTrack::from_features(&features, 30));
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_fft_analysis,
    bench_feature_extraction,
    bench_beat_detection,
    bench_track,
);
criterion_main!(benches);
