use criterion::{black_box, criterion_group, criterion_main, Criterion};
use voiceguard_audio::fbank::{Config, Extractor};
use voiceguard_audio::resample::resample;
use voiceguard_audio::Mfcc;

fn make_sine(freq_hz: f32, n_samples: usize, sample_rate: usize) -> Vec<f32> {
    (0..n_samples)
        .map(|i| 0.5 * (freq_hz * 2.0 * std::f32::consts::PI * i as f32 / sample_rate as f32).sin())
        .collect()
}

fn bench_mfcc_3s(c: &mut Criterion) {
    let mfcc = Mfcc::default();
    let pcm = make_sine(220.0, 3 * 22050, 22050);

    c.bench_function("mfcc_mean_3s", |b| {
        b.iter(|| {
            let _ = black_box(mfcc.mean_coefficients(black_box(&pcm), 22050));
        });
    });
}

fn bench_log_mel_window(c: &mut Criterion) {
    let extractor = Extractor::new(Config::default());
    let pcm = make_sine(220.0, 3 * 16000, 16000);

    c.bench_function("log_mel_30s_window", |b| {
        b.iter(|| {
            let _ = black_box(extractor.extract(black_box(&pcm), 16000));
        });
    });
}

fn bench_resample(c: &mut Criterion) {
    let pcm = make_sine(220.0, 3 * 16000, 16000);

    c.bench_function("resample_16k_to_22k_3s", |b| {
        b.iter(|| {
            let _ = black_box(resample(black_box(&pcm), 16000, 22050));
        });
    });
}

criterion_group!(benches, bench_mfcc_3s, bench_log_mel_window, bench_resample);
criterion_main!(benches);
