//! Performance benchmarks for the DSP module
//!
//! Run with: cargo bench -p heron_dsp

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use heron_dsp::{
    AnalysisArea, ChainSettings, ChainUpdate, DualChannelProcessor, FftOrder, Slope, SpectralPathGenerator,
};

fn steep_settings() -> ChainSettings {
    ChainSettings {
        peak_freq: 1000.0,
        peak_gain_db: 6.0,
        low_cut_freq: 100.0,
        low_cut_slope: Slope::Db48,
        high_cut_freq: 10000.0,
        high_cut_slope: Slope::Db48,
        ..ChainSettings::default()
    }
}

fn benchmark_chain_processing(c: &mut Criterion) {
    let mut group = c.benchmark_group("dual_channel");

    // Common buffer sizes in audio applications
    let buffer_sizes = [64, 128, 256, 512, 1024, 2048];

    for size in buffer_sizes {
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("process_interleaved_{}_frames", size), |b| {
            let mut processor = DualChannelProcessor::new(48000.0).unwrap();
            processor.update(&steep_settings());
            let mut buffer: Vec<f32> = (0..size * 2).map(|i| (i as f32 * 0.001).sin()).collect();

            b.iter(|| {
                processor.process_interleaved(black_box(&mut buffer), 2);
            });
        });

        group.bench_function(format!("process_planar_{}_frames", size), |b| {
            let mut processor = DualChannelProcessor::new(48000.0).unwrap();
            processor.update(&steep_settings());
            let mut left: Vec<f32> = (0..size).map(|i| (i as f32 * 0.001).sin()).collect();
            let mut right: Vec<f32> = (0..size).map(|i| (i as f32 * 0.002).sin()).collect();

            b.iter(|| {
                processor.process_planar(black_box(&mut left), black_box(&mut right));
            });
        });
    }

    group.finish();
}

fn benchmark_coefficient_design(c: &mut Criterion) {
    c.bench_function("design_chain_update", |b| {
        let mut settings = steep_settings();

        b.iter(|| {
            // Simulate dragging the peak frequency knob
            settings.peak_freq = (settings.peak_freq * 1.01) % 20000.0 + 20.0;
            black_box(ChainUpdate::from_settings(black_box(&settings), 48000.0));
        });
    });
}

fn benchmark_spectral_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("spectral_path");
    let area = AnalysisArea::new(600, 240.0).unwrap();
    let block: Vec<f32> = (0..512).map(|i| (i as f32 * 0.05).sin()).collect();

    for order in [FftOrder::Order2048, FftOrder::Order4096, FftOrder::Order8192] {
        group.bench_function(format!("process_block_fft_{}", order.size()), |b| {
            let mut generator = SpectralPathGenerator::new(order, -48.0, 2).unwrap();

            b.iter(|| {
                generator.process_block(black_box(&block), &area, 48000.0);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_chain_processing,
    benchmark_coefficient_design,
    benchmark_spectral_path
);

criterion_main!(benches);
