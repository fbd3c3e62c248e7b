//! Fuzz target for request compilation from raw JSON.
//!
//! Feeds arbitrary bytes through envelope parsing and compilation. Every
//! input must yield a plan or an error; a panic is a bug.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_compile_request
//! ```

#![no_main]

use std::sync::{Arc, LazyLock};

use libfuzzer_sys::fuzz_target;
use sift_query::{DatabaseType, EntityType, QueryRequest, SiftConfig, StorageType, TableSchema};

static ENTITY: LazyLock<Option<Arc<EntityType>>> = LazyLock::new(|| {
    let schema = TableSchema::new("articles")
        .and_then(|s| s.column("title", StorageType::String))
        .and_then(|s| s.nullable_column("body", StorageType::Text))
        .and_then(|s| s.nullable_column("view_count", StorageType::Numeric))
        .and_then(|s| s.column("featured", StorageType::Boolean))
        .and_then(|s| s.nullable_column("published_on", StorageType::Date))
        .and_then(|s| s.nullable_column("published_at", StorageType::DateTime))
        .ok()?;
    let entity = EntityType::builder("Article", schema)
        .register_field("title", StorageType::String)
        .and_then(|b| b.register_predicate("body", StorageType::Text))
        .and_then(|b| b.register_field("view_count", StorageType::Numeric))
        .and_then(|b| b.register_predicate("featured", StorageType::Boolean))
        .and_then(|b| b.register_field("published_on", StorageType::Date))
        .and_then(|b| b.register_field("published_at", StorageType::DateTime))
        .ok()?
        .build();
    Some(entity)
});

static CONFIGS: LazyLock<[SiftConfig; 2]> =
    LazyLock::new(|| [SiftConfig::default(), SiftConfig::default().with_strict_predicates(true)]);

fuzz_target!(|data: &[u8]| {
    let Some(entity) = ENTITY.as_ref() else {
        return;
    };
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    let Ok(request) = QueryRequest::from_envelope(value) else {
        return;
    };

    for config in CONFIGS.iter() {
        if let Ok(plan) = entity.compile(&request, config) {
            assert!(plan.limit >= 1);
            assert!(plan.limit <= config.pagination.max_per_page);
            assert!(plan.page <= config.pagination.max_page);

            for db in [DatabaseType::PostgreSQL, DatabaseType::MySQL, DatabaseType::SQLite] {
                let (_, params) = plan.to_select_sql(entity.table(), db);
                assert_eq!(params.len(), plan.param_count());
            }
        }
    }
});
