use akaze_core::{AkazeConfig, GrayFloatImage};
use akaze_nld::{build_scale_space, fed_tau_by_process_time};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// Create benchmark image with blobs and edges at several scales
fn create_benchmark_image(width: usize, height: usize) -> GrayFloatImage {
    let mut img = GrayFloatImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let gradient = x as f32 / width as f32 * 0.3;
            img.put(x, y, 0.2 + gradient);
        }
    }
    // Blobs on a coarse grid
    let spacing = width / 8;
    for by in 1..8 {
        for bx in 1..8 {
            let cx = (bx * spacing) as i32;
            let cy = (by * height / 8) as i32;
            let radius = 2 + ((bx + by) % 4) as i32;
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    if dx * dx + dy * dy <= radius * radius {
                        let x = (cx + dx).clamp(0, width as i32 - 1) as usize;
                        let y = (cy + dy).clamp(0, height as i32 - 1) as usize;
                        img.put(x, y, 0.95);
                    }
                }
            }
        }
    }
    img
}

fn bench_scale_space_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("scale_space_construction");

    for &(width, height) in &[(128, 128), (256, 256), (512, 512)] {
        let mut config = AkazeConfig::new(width, height);
        config.n_threads = 1; // Single-threaded for consistent benchmarks
        let img = create_benchmark_image(width, height);

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", width, height)),
            &(config, img),
            |b, (config, img)| {
                b.iter(|| black_box(build_scale_space(black_box(img), config).unwrap()))
            },
        );
    }

    group.finish();
}

fn bench_fed_tau(c: &mut Criterion) {
    c.bench_function("fed_tau_schedule", |b| {
        b.iter(|| black_box(fed_tau_by_process_time(black_box(6.4), 1, 0.25, true)))
    });
}

criterion_group!(benches, bench_scale_space_construction, bench_fed_tau);
criterion_main!(benches);
