//! starload benchmark suite.
//!
//! Benchmarks for key operations:
//! - CSV decoding and record typing
//! - Feature aggregation
//! - Star schema construction and Arrow conversion
//! - Parquet encoding of the fact table

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

mod bench_utils;

use starload::sink::parquet::{ParquetWriterConfig, encode_table};
use starload::source::CsvReader;
use starload::transform::{
    RecordOptions, TableName, build_star_schema, engineer_features, parse_records,
};

const SIZES: [usize; 3] = [1_000, 10_000, 100_000];

/// Decoding the raw bytes and typing every row.
fn load_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("load");
    let reader = CsvReader::default();
    let options = RecordOptions::default();

    for size in SIZES {
        let data = bench_utils::generate_sales_csv(size);
        group.throughput(Throughput::Bytes(data.len() as u64));

        group.bench_with_input(BenchmarkId::new("decode", size), &data, |b, data| {
            b.iter(|| reader.read(data, "bench.csv").unwrap());
        });

        let raw = reader.read(&data, "bench.csv").unwrap();
        group.bench_with_input(BenchmarkId::new("parse_records", size), &raw, |b, raw| {
            b.iter(|| parse_records(raw, &options).unwrap());
        });
    }

    group.finish();
}

/// Aggregation and star schema construction over typed records.
fn transform_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform");
    let reader = CsvReader::default();

    for size in SIZES {
        let raw = reader
            .read(&bench_utils::generate_sales_csv(size), "bench.csv")
            .unwrap();
        let records = parse_records(&raw, &RecordOptions::default()).unwrap();
        let features = engineer_features(&records);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(
            BenchmarkId::new("engineer_features", size),
            &records,
            |b, records| {
                b.iter(|| engineer_features(records));
            },
        );

        group.bench_with_input(
            BenchmarkId::new("build_star_schema", size),
            &records,
            |b, records| {
                b.iter(|| build_star_schema(records, &features));
            },
        );

        let schema = build_star_schema(&records, &features);
        group.bench_with_input(BenchmarkId::new("to_tables", size), &schema, |b, schema| {
            b.iter(|| schema.to_tables().unwrap());
        });
    }

    group.finish();
}

/// Parquet encoding of the largest table.
fn parquet_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("parquet_encoding");
    let reader = CsvReader::default();
    let config = ParquetWriterConfig::default();

    for size in SIZES {
        let raw = reader
            .read(&bench_utils::generate_sales_csv(size), "bench.csv")
            .unwrap();
        let records = parse_records(&raw, &RecordOptions::default()).unwrap();
        let schema = build_star_schema(&records, &engineer_features(&records));
        let fact = schema.to_record_batch(TableName::SalesFact).unwrap();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("sales_fact", size), &fact, |b, fact| {
            b.iter(|| encode_table(fact, &config, "bench.sales_fact").unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    load_benchmarks,
    transform_benchmarks,
    parquet_benchmarks
);
criterion_main!(benches);
