//! 粒子管线性能基准测试
//!
//! 测试剔除、画质缩放、分批以及完整一帧的开销

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::Vec2;
use particle_pipeline::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const TEXTURES: [&str; 4] = ["spark", "smoke", "ember", "glow"];

/// 固定种子的随机粒子云，半数左右落在视口之外
fn particles(count: u64) -> Vec<Particle> {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    (0..count)
        .map(|i| {
            Particle::new(i, rng.gen_range(-1600.0..1600.0), rng.gen_range(-900.0..900.0))
                .with_size(rng.gen_range(2.0..9.0))
                .with_velocity(Vec2::new(rng.gen_range(-80.0..80.0), rng.gen_range(-80.0..80.0)))
                .with_depth(rng.gen_range(0.0..10.0))
                .with_opacity(rng.gen_range(0.2..1.0))
                .with_texture(TEXTURES[rng.gen_range(0..TEXTURES.len())])
        })
        .collect()
}

/// 基准运行时间可能超过粒子寿命，关闭年龄剔除以保持每轮输入一致
fn culling_config() -> CullingConfig {
    CullingConfig {
        age_culling: false,
        ..CullingConfig::default()
    }
}

fn bench_culling(c: &mut Criterion) {
    let mut group = c.benchmark_group("culling");
    let camera = Camera::new(0.0, 0.0, 1280.0, 720.0);

    for count in [1_000u64, 10_000, 50_000].iter() {
        let input = particles(*count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &input, |b, input| {
            let mut culling = CullingSystem::new(culling_config());
            b.iter(|| black_box(culling.cull(black_box(input), Some(&camera))));
        });
    }

    group.finish();
}

fn bench_quality_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("quality_scaling");

    for count in [1_000u64, 10_000].iter() {
        let input = particles(*count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &input, |b, input| {
            let mut quality = QualityManager::new(QualityConfig::default());
            b.iter(|| black_box(quality.apply_quality_scaling(black_box(input))));
        });
    }

    group.finish();
}

fn bench_batching(c: &mut Criterion) {
    let mut group = c.benchmark_group("batching");

    for count in [1_000u64, 10_000].iter() {
        let input = particles(*count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &input, |b, input| {
            let mut renderer = BatchRenderer::new(BatchingConfig::default());
            let mut ctx = RecordingContext::new();
            b.iter(|| {
                let handles = renderer.create_render_batches(black_box(input));
                renderer.render_batches(&mut ctx, &handles);
                ctx.clear();
            });
        });
    }

    group.finish();
}

fn bench_full_frame(c: &mut Criterion) {
    let input = particles(20_000);
    let camera = Camera::new(0.0, 0.0, 1280.0, 720.0);

    c.bench_function("full_frame_20k", |b| {
        let config = PipelineConfig {
            culling: culling_config(),
            ..PipelineConfig::default()
        };
        let mut pipeline = match ParticlePipeline::new(config) {
            Ok(pipeline) => pipeline,
            Err(err) => panic!("default config rejected: {err}"),
        };
        let mut ctx = RecordingContext::new();
        b.iter(|| {
            let result = pipeline.run_frame(black_box(&input), Some(&camera), &mut ctx);
            ctx.clear();
            black_box(result)
        });
    });
}

criterion_group!(
    benches,
    bench_culling,
    bench_quality_scaling,
    bench_batching,
    bench_full_frame
);
criterion_main!(benches);
