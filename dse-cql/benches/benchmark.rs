use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use dse_cql::date_range::encode_date_range;
use dse_cql::geo::{LineStringIterator, PolygonIterator};
use dse_cql::{
    parse_cql_type, parse_with_composite, DateRange, DateRangeBound, DateRangePrecision,
    KeyspaceMetadata, LineString, NativeTypes, Polygon, ProtocolVersion,
};

fn type_parsers_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("TypeParsers");
    let native_types = NativeTypes::new(ProtocolVersion::V4);

    let cql_names = [
        "int",
        "map<text, frozen<list<tuple<int, text, address>>>>",
        "frozen<map<\"Quoted\"\"Name\", set<frozen<list<bigint>>>>>",
    ];
    for name in cql_names {
        group.bench_with_input(
            BenchmarkId::new("parse_cql_type", name.len()),
            &name,
            |b, name| {
                b.iter(|| {
                    let mut keyspace = KeyspaceMetadata::new("ks");
                    let _ = black_box(parse_cql_type(name, &native_types, &mut keyspace));
                })
            },
        );
    }

    let class_names = [
        "org.apache.cassandra.db.marshal.Int32Type",
        "org.apache.cassandra.db.marshal.CompositeType(\
            org.apache.cassandra.db.marshal.UTF8Type,\
            org.apache.cassandra.db.marshal.ReversedType(org.apache.cassandra.db.marshal.TimestampType),\
            org.apache.cassandra.db.marshal.ColumnToCollectionType(\
                6162:org.apache.cassandra.db.marshal.MapType(\
                    org.apache.cassandra.db.marshal.UTF8Type,\
                    org.apache.cassandra.db.marshal.ListType(org.apache.cassandra.db.marshal.Int32Type))))",
    ];
    for name in class_names {
        group.bench_with_input(
            BenchmarkId::new("parse_with_composite", name.len()),
            &name,
            |b, name| {
                b.iter(|| {
                    let _ = black_box(parse_with_composite(name, &native_types));
                })
            },
        );
    }
}

fn geometry_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("Geometry");

    for num_points in [2u32, 100, 10_000] {
        let mut line_string = LineString::new();
        line_string.reserve(num_points);
        for i in 0..num_points {
            line_string.add_point(f64::from(i) * 0.5, -f64::from(i));
        }
        let _ = line_string.finish();
        let wkb = line_string.to_bytes();
        let wkt = line_string.to_wkt();

        group.bench_with_input(
            BenchmarkId::new("LineStringIterator::reset_binary", num_points),
            &wkb,
            |b, wkb| {
                b.iter(|| {
                    let mut iterator = LineStringIterator::new();
                    let _ = iterator.reset_binary(wkb);
                    black_box(iterator.fold(0.0, |acc, point| acc + point.x))
                })
            },
        );
        group.bench_with_input(
            BenchmarkId::new("LineStringIterator::reset_text", num_points),
            &wkt,
            |b, wkt| {
                b.iter(|| {
                    let mut iterator = LineStringIterator::new();
                    let _ = iterator.reset_text(wkt);
                    black_box(iterator.fold(0.0, |acc, point| acc + point.x))
                })
            },
        );
    }

    let mut polygon = Polygon::new();
    for ring in 0..10u32 {
        let _ = polygon.start_ring();
        for i in 0..100u32 {
            polygon.add_point(f64::from(ring), f64::from(i));
        }
    }
    let _ = polygon.finish();
    let wkt = polygon.to_wkt();
    group.bench_function("PolygonIterator::reset_text", |b| {
        b.iter(|| {
            let mut iterator = PolygonIterator::new();
            let _ = iterator.reset_text(&wkt);
            black_box(iterator.map(|ring| ring.len()).sum::<usize>())
        })
    });
}

fn date_range_bench(c: &mut Criterion) {
    let range = DateRange::range(
        DateRangeBound::new(DateRangePrecision::Day, 1485907200000),
        DateRangeBound::new(DateRangePrecision::Millisecond, 1519899330123),
    );
    c.bench_function("encode_date_range", |b| {
        b.iter(|| black_box(encode_date_range(black_box(&range))))
    });
    let bytes = range.encode();
    c.bench_function("decode_date_range", |b| {
        b.iter(|| black_box(DateRange::decode(black_box(&bytes))))
    });
}

criterion_group!(benches, type_parsers_bench, geometry_bench, date_range_bench);
criterion_main!(benches);
