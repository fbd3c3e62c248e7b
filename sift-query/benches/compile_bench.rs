//! Benchmarks for request compilation.
//!
//! Compile cost should grow linearly with the number of predicate keys, and
//! oversized requests should be rejected in roughly constant time.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde_json::{Map, Value, json};
use std::hint::black_box;
use std::sync::Arc;

use sift_query::{
    DatabaseType, EntityType, QueryRequest, SiftConfig, StorageType, TableSchema,
};

fn entity() -> Arc<EntityType> {
    let mut schema = TableSchema::new("readings").unwrap();
    for i in 0..100 {
        schema = schema
            .nullable_column(&format!("metric_{}", i), StorageType::Numeric)
            .unwrap();
    }
    schema = schema.column("label", StorageType::String).unwrap();

    let mut builder = EntityType::builder("Reading", schema);
    for i in 0..100 {
        builder = builder
            .register_field(&format!("metric_{}", i), StorageType::Numeric)
            .unwrap();
    }
    builder
        .register_field("label", StorageType::String)
        .unwrap()
        .build()
}

fn predicates(n: usize) -> Map<String, Value> {
    (0..n)
        .map(|i| (format!("metric_{}_gte", i), json!(i)))
        .collect()
}

// ============================================================================
// Compilation
// ============================================================================

fn bench_compile_predicates(c: &mut Criterion) {
    let entity = entity();
    let config = SiftConfig::default();
    let mut group = c.benchmark_group("compile_predicates");

    for n in [1, 10, 50, 100] {
        let request = QueryRequest::new()
            .predicates(predicates(n))
            .sort("metric_0:desc_nulls_last");
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &request, |b, request| {
            b.iter(|| black_box(entity.compile(request, &config).unwrap()))
        });
    }

    group.finish();
}

fn bench_compile_or_groups(c: &mut Criterion) {
    let entity = entity();
    let config = SiftConfig::default();
    let mut group = c.benchmark_group("compile_or_groups");

    for n in [1, 10, 50] {
        let mut request = QueryRequest::new();
        for i in 0..n {
            request = request.or_group(json!({
                format!("metric_{}_lt", i): i,
                "label_i_contains": "warn",
            }));
        }
        group.bench_with_input(BenchmarkId::from_parameter(n), &request, |b, request| {
            b.iter(|| black_box(entity.compile(request, &config).unwrap()))
        });
    }

    group.finish();
}

fn bench_reject_oversized(c: &mut Criterion) {
    let entity = entity();
    let config = SiftConfig::default();
    let mut group = c.benchmark_group("reject_oversized");

    let request = QueryRequest::new().predicates(
        (0..10_000)
            .map(|i| (format!("unknown_{}_eq", i), json!(i)))
            .collect::<Map<String, Value>>(),
    );
    group.bench_function("10k_predicates", |b| {
        b.iter(|| black_box(entity.compile(&request, &config).unwrap_err()))
    });

    group.finish();
}

// ============================================================================
// Rendering
// ============================================================================

fn bench_render_sql(c: &mut Criterion) {
    let entity = entity();
    let config = SiftConfig::default();
    let plan = entity
        .compile(
            &QueryRequest::new()
                .predicates(predicates(20))
                .or_group(json!({"label_contains": "50%"}))
                .or_group(json!({"metric_99_null": true}))
                .sort("metric_0:desc_nulls_last")
                .sort("label:asc_case_insensitive"),
            &config,
        )
        .unwrap();

    let mut group = c.benchmark_group("render_sql");
    for db in [DatabaseType::PostgreSQL, DatabaseType::MySQL, DatabaseType::SQLite] {
        group.bench_function(format!("{:?}", db), |b| {
            b.iter(|| black_box(plan.to_select_sql(entity.table(), db)))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_compile_predicates,
    bench_compile_or_groups,
    bench_reject_oversized,
    bench_render_sql,
);
criterion_main!(benches);
