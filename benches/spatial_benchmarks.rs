use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use clustermark::render::pipeline::render_bitmap;
use clustermark::{
    BoundingBox2D, ClusterProjector, Config, Item, PointStore, RenderKind, RenderSettings,
    SpatialIndex,
};
use image::{Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;

/// Deterministic pseudo-random items spread over western Europe.
fn items(count: usize) -> Vec<Item> {
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        (state >> 11) as f64 / (1u64 << 53) as f64
    };

    (0..count)
        .map(|i| {
            let lat = 43.0 + next() * 12.0;
            let lng = -5.0 + next() * 20.0;
            Item::new(format!("item-{}", i), lat, lng, format!("thumb-{}.png", i % 64))
        })
        .collect()
}

fn benchmark_index_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_build");
    group.sample_size(20);
    let config = Config::default();

    for size in [1_000, 10_000, 50_000] {
        let store = PointStore::from_items(items(size)).unwrap();
        group.bench_with_input(BenchmarkId::new("build", size), &store, |b, store| {
            b.iter(|| SpatialIndex::build(black_box(store), &config))
        });
    }

    group.finish();
}

fn benchmark_viewport_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("viewport_queries");
    let config = Config::default();
    let store = Arc::new(PointStore::from_items(items(50_000)).unwrap());
    let index = Arc::new(SpatialIndex::build(&store, &config));
    let projector = ClusterProjector::new(store, index).unwrap();

    let france = BoundingBox2D::new(-5.0, 42.0, 8.0, 51.0);
    let paris = BoundingBox2D::new(2.2, 48.8, 2.5, 48.95);

    for zoom in [3, 8, 13, 18] {
        group.bench_with_input(BenchmarkId::new("country", zoom), &zoom, |b, &zoom| {
            b.iter(|| projector.query(black_box(&france), zoom))
        });
    }
    group.bench_function("city_z14", |b| {
        b.iter(|| projector.query(black_box(&paris), 14))
    });
    group.bench_function("world_z0", |b| {
        b.iter(|| projector.query(black_box(&BoundingBox2D::world()), 0))
    });

    group.finish();
}

fn benchmark_marker_bitmaps(c: &mut Criterion) {
    let mut group = c.benchmark_group("marker_bitmaps");

    let img = RgbaImage::from_fn(256, 192, |x, y| Rgba([x as u8, y as u8, 128, 255]));
    let mut raw = Cursor::new(Vec::new());
    img.write_to(&mut raw, image::ImageFormat::Png).unwrap();
    let raw = raw.into_inner();
    let settings = RenderSettings::default();

    group.bench_function("point_64", |b| {
        b.iter(|| {
            render_bitmap("bench.png", black_box(&raw), RenderKind::Point, 64, 64, settings).unwrap()
        })
    });
    group.bench_function("cluster_64", |b| {
        b.iter(|| {
            render_bitmap(
                "bench.png",
                black_box(&raw),
                RenderKind::Cluster { member_count: 1530 },
                64,
                64,
                settings,
            )
            .unwrap()
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_index_build,
    benchmark_viewport_queries,
    benchmark_marker_bitmaps
);
criterion_main!(benches);
