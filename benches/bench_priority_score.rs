// benches/bench_priority_score.rs
use criterion::{
    black_box, criterion_group, criterion_main, AxisScale, Criterion, PlotConfiguration,
};
use std::time::Duration;
use traffic_control::control_system::signal_control::priority_score;

fn bench_priority_score(c: &mut Criterion) {
    let mut group = c.benchmark_group("priority_score");

    group.sample_size(100);
    group.measurement_time(Duration::from_secs(5));
    group.warm_up_time(Duration::from_secs(2));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Linear));

    group.bench_function("single", |b| {
        b.iter(|| {
            let score = priority_score(black_box(62.5), black_box(14), black_box(23.0));
            black_box(score);
        });
    });

    // Full ranking pass: one score per approach of a 4-way network.
    group.bench_function("network_pass", |b| {
        let inputs: Vec<(f64, u32, f64)> = (0..20)
            .map(|i| (3.0 * i as f64, i as u32, 60.0 - 2.5 * i as f64))
            .collect();
        b.iter(|| {
            let mut total = 0.0;
            for &(wait, queue, speed) in &inputs {
                total += priority_score(black_box(wait), black_box(queue), black_box(speed));
            }
            black_box(total);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_priority_score);
criterion_main!(benches);
