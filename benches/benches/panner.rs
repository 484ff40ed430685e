use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use harmoniq_spatial::{
    JumpPosition, Layout, ObjectDivergence, ObjectMetadata, ObjectRenderer, PointSourcePanner,
    PolarPosition, RendererConfig,
};
use rand::Rng;

const BLOCK: usize = 512;

fn point_source(c: &mut Criterion) {
    let mut group = c.benchmark_group("panner");
    group.measurement_time(Duration::from_secs(10));

    let layout = Layout::from_name("0+7+0").expect("layout");
    let mut rng = rand::thread_rng();
    let input: Vec<f32> = (0..BLOCK).map(|_| rng.gen_range(-0.5..0.5)).collect();

    group.bench_function("static_7_0_block512", |b| {
        let mut panner = PointSourcePanner::for_layout(&layout).expect("panner");
        let mut direct = vec![vec![0.0f32; BLOCK]; layout.channel_count()];
        let mut diffuse = vec![vec![0.0f32; BLOCK]; layout.channel_count()];
        let metadata = ObjectMetadata::at(PolarPosition::new(20.0, 0.0, 1.0)).with_diffuse(0.2);
        b.iter(|| {
            panner.process_accumul(&metadata, &input, &mut direct, &mut diffuse, 0);
        });
    });

    group.bench_function("moving_diverged_7_0_block512", |b| {
        let mut panner = PointSourcePanner::for_layout(&layout).expect("panner");
        let mut direct = vec![vec![0.0f32; BLOCK]; layout.channel_count()];
        let mut diffuse = vec![vec![0.0f32; BLOCK]; layout.channel_count()];
        let mut azimuth = -180.0;
        b.iter(|| {
            azimuth = if azimuth >= 180.0 { -180.0 } else { azimuth + 1.0 };
            let metadata = ObjectMetadata::at(PolarPosition::new(azimuth, 0.0, 1.0))
                .with_divergence(ObjectDivergence::new(0.4, 60.0))
                .with_jump(JumpPosition::interpolate(BLOCK / 4));
            panner.process_accumul(&metadata, &input, &mut direct, &mut diffuse, 0);
        });
    });

    group.finish();
}

fn renderer(c: &mut Criterion) {
    let mut group = c.benchmark_group("renderer");
    group.measurement_time(Duration::from_secs(10));

    let mut rng = rand::thread_rng();
    let input: Vec<f32> = (0..BLOCK).map(|_| rng.gen_range(-0.5..0.5)).collect();
    let config = RendererConfig::named("0+7+0", BLOCK)
        .with_object_track(0)
        .with_object_track(1);

    group.bench_function("two_objects_decorrelated_7_0_block512", |b| {
        let mut renderer = ObjectRenderer::new(&config).expect("renderer");
        let mut output = vec![vec![0.0f32; BLOCK]; renderer.layout().channel_count()];
        let dry = ObjectMetadata::at(PolarPosition::new(-60.0, 0.0, 1.0)).with_track(0);
        let wet = ObjectMetadata::at(PolarPosition::new(100.0, 0.0, 1.0))
            .with_track(1)
            .with_diffuse(0.5);
        b.iter(|| {
            renderer.add_object(&input, &dry).expect("add");
            renderer.add_object(&input, &wet).expect("add");
            renderer.render(&mut output).expect("render");
        });
    });

    group.finish();
}

criterion_group!(benches, point_source, renderer);
criterion_main!(benches);
