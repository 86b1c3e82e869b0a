use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lumafx::{FxProcessor, ImageIOService, ModelRegistry, Operator, OutputFormat, PixelGrid, ServiceConfig};
use std::sync::Arc;

fn gradient(size: usize) -> PixelGrid {
    let raw = (0..size * size)
        .flat_map(|i| {
            let (y, x) = (i / size, i % size);
            [(x * 255 / size) as u8, (y * 255 / size) as u8, ((x + y) * 127 / size) as u8]
        })
        .collect();
    PixelGrid::from_raw(size, size, 3, raw).unwrap()
}

fn processor() -> FxProcessor {
    FxProcessor::new(ServiceConfig::default(), Arc::new(ModelRegistry::empty())).unwrap()
}

fn bench_operators(c: &mut Criterion) {
    let processor = processor();
    let grid = gradient(256);

    let mut group = c.benchmark_group("operators_256");
    group.sample_size(10);

    for op in Operator::ALL.into_iter().filter(|op| op.required_model().is_none()) {
        let params = op.resolve_params([("seed", "1")]).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(op.name()), &grid, |b, grid| {
            b.iter(|| black_box(processor.transform(op, grid.clone(), params.clone()).unwrap()));
        });
    }
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let processor = processor();
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);

    for size in [256usize, 512] {
        let input = ImageIOService::encode(&gradient(size), OutputFormat::Jpeg, 90).unwrap();
        group.bench_with_input(BenchmarkId::new("cartoon", format!("{size}x{size}")), &input, |b, input| {
            b.iter(|| black_box(processor.process(input, "cartoon", lumafx::NO_PARAMS).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_operators, bench_pipeline);
criterion_main!(benches);
