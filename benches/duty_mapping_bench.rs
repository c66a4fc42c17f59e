use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use p1_vibrator::{
    control::duty::{duty_for_percent, DutyConfig},
    BoardVariant,
};

fn duty_mapping_bench(c: &mut Criterion) {
    let profile = BoardVariant::P1Cdma.profile();

    c.bench_function("duty_for_percent_sweep", |b| {
        b.iter(|| {
            let mut acc = 0u64;
            for pct in 0..=100u32 {
                acc += duty_for_percent(black_box(&profile), pct) as u64;
            }
            acc
        })
    });

    let duty = DutyConfig::new(profile);
    c.bench_function("duty_set_then_read", |b| {
        b.iter(|| {
            duty.set_percent(black_box(42));
            black_box(duty.duty_value())
        })
    });
}

criterion_group!(benches, duty_mapping_bench);
criterion_main!(benches);
