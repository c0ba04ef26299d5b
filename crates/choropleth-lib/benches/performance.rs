//! Performance benchmarks for choropleth-lib
//!
//! Run with: cargo bench --package choropleth-lib

use choropleth_lib::{
    Aggregator, Config, FeatureCollection, FeatureGeometry, GeoFeature, JoinSpec, MapSession,
    PointerEvent, Projection, Scalar, Table, TableRow, aggregate, compile_all,
};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use geo::{Coord, LineString, Polygon};
use std::hint::black_box;

/// A wobbly ring around a grid cell, `points` vertices long
fn generate_cell(row: usize, col: usize, points: usize) -> Polygon<f64> {
    let (lat, lon) = (-60.0 + row as f64 * 2.0, -170.0 + col as f64 * 2.0);
    let ring: Vec<Coord<f64>> = (0..points)
        .map(|i| {
            let a = i as f64 / points as f64 * std::f64::consts::TAU;
            let r = 0.8 + (a * 7.0).sin() * 0.1;
            Coord {
                x: lon + 1.0 + r * a.cos(),
                y: lat + 1.0 + r * a.sin(),
            }
        })
        .collect();
    Polygon::new(LineString::new(ring), vec![])
}

/// `count` features on a grid, each keyed by `region`
fn generate_features(count: usize, points: usize) -> FeatureCollection {
    let features = (0..count)
        .map(|i| {
            let mut properties = choropleth_lib::Properties::new();
            properties.insert("region".to_string(), Scalar::from(format!("R{i}")));
            GeoFeature::new(
                i.to_string(),
                FeatureGeometry::Polygon(generate_cell(i / 150, i % 150, points)),
                properties,
            )
        })
        .collect();
    FeatureCollection::new(features)
}

/// `count` rows spread over `keys` regions
fn generate_rows(count: usize, keys: usize) -> Vec<TableRow> {
    (0..count)
        .map(|i| {
            let mut row = TableRow::new();
            row.insert("region".to_string(), Scalar::from(format!("R{}", i % keys)));
            row.insert("value".to_string(), Scalar::Number((i * 37 % 1000) as f64));
            row
        })
        .collect()
}

// ============================================================================
// Core Benchmarks - Key performance indicators
// ============================================================================

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    group.sample_size(20);

    let projection = Projection::default();
    for points in [64, 512] {
        let collection = generate_features(1_000, points);
        group.throughput(Throughput::Elements((1_000 * points) as u64));
        group.bench_with_input(
            BenchmarkId::new("1k_features", points),
            &collection,
            |b, collection| b.iter(|| compile_all(collection, &projection)),
        );
    }

    group.finish();
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");

    let rows = generate_rows(100_000, 1_000);
    group.throughput(Throughput::Elements(rows.len() as u64));
    for aggregator in [Aggregator::Sum, Aggregator::Average, Aggregator::CountNonEmpty] {
        group.bench_with_input(
            BenchmarkId::new("100k_rows", aggregator),
            &aggregator,
            |b, &aggregator| b.iter(|| aggregate(&rows, "region", "value", aggregator)),
        );
    }

    group.finish();
}

fn bench_interaction(c: &mut Criterion) {
    let mut group = c.benchmark_group("interaction");

    let mut session = MapSession::new(Config::default());
    session.replace_features(generate_features(1_000, 64));
    session.set_table(Table::from_rows(generate_rows(10_000, 1_000)));
    session.set_join_spec(Some(JoinSpec::new("region", "value", Aggregator::Sum)));

    group.bench_function("hover_move", |b| {
        let mut x = 0.0;
        b.iter(|| {
            x = (x + 7.0) % 1000.0;
            session.handle_event(PointerEvent::Move {
                position: Coord { x, y: 300.0 },
            })
        });
    });

    group.bench_function("wheel_zoom", |b| {
        let mut delta = 1.0;
        b.iter(|| {
            delta = -delta;
            session.handle_event(PointerEvent::Wheel {
                position: Coord { x: 500.0, y: 300.0 },
                delta_y: delta,
            })
        });
    });

    group.bench_function("resolve_styles", |b| {
        b.iter(|| {
            for index in 0..session.features().len() {
                black_box(session.feature_style(index));
            }
        });
    });

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(benches, bench_compile, bench_aggregate, bench_interaction);

criterion_main!(benches);
