//! Structured fuzz target for request compilation.
//!
//! Builds requests from a mix of registered and arbitrary keys so the
//! compiler sees mostly well-formed input, then checks that every compiled
//! plan only names registered columns.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_compile_structured
//! ```

#![no_main]

use std::sync::{Arc, LazyLock};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use serde_json::{Map, Value};
use sift_query::{EntityType, QueryRequest, SiftConfig, StorageType, TableSchema};

const FIELDS: &[&str] = &["title", "view_count", "published_at", "featured"];
const SUFFIXES: &[&str] = &[
    "eq", "not_eq", "i_eq", "lt", "gte", "between", "in", "not_in", "contains",
    "i_starts_with", "ends_with", "present", "blank", "null", "not_null",
];
const SORTS: &[&str] = &["asc", "desc", "newest", "desc_nulls_last", "asc_case_insensitive"];

static ENTITY: LazyLock<Option<Arc<EntityType>>> = LazyLock::new(|| {
    let schema = TableSchema::new("articles")
        .and_then(|s| s.column("title", StorageType::String))
        .and_then(|s| s.nullable_column("view_count", StorageType::Numeric))
        .and_then(|s| s.nullable_column("published_at", StorageType::DateTime))
        .and_then(|s| s.column("featured", StorageType::Boolean))
        .ok()?;
    let entity = EntityType::builder("Article", schema)
        .register_field("title", StorageType::String)
        .and_then(|b| b.register_field("view_count", StorageType::Numeric))
        .and_then(|b| b.register_field("published_at", StorageType::DateTime))
        .and_then(|b| b.register_predicate("featured", StorageType::Boolean))
        .ok()?
        .build();
    Some(entity)
});

#[derive(Debug, Arbitrary)]
enum FuzzValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<i64>),
}

impl From<FuzzValue> for Value {
    fn from(value: FuzzValue) -> Self {
        match value {
            FuzzValue::Null => Value::Null,
            FuzzValue::Bool(b) => Value::Bool(b),
            FuzzValue::Int(i) => Value::from(i),
            FuzzValue::Float(f) => Value::from(f),
            FuzzValue::String(s) => Value::String(s),
            FuzzValue::List(items) => Value::from(items),
        }
    }
}

#[derive(Debug, Arbitrary)]
enum FuzzKey {
    Registered { field: u8, suffix: u8 },
    Raw(String),
}

impl FuzzKey {
    fn render(&self) -> String {
        match self {
            Self::Registered { field, suffix } => format!(
                "{}_{}",
                FIELDS[*field as usize % FIELDS.len()],
                SUFFIXES[*suffix as usize % SUFFIXES.len()]
            ),
            Self::Raw(key) => key.clone(),
        }
    }
}

#[derive(Debug, Arbitrary)]
struct FuzzRequest {
    predicates: Vec<(FuzzKey, FuzzValue)>,
    or_groups: Vec<Vec<(FuzzKey, FuzzValue)>>,
    sorts: Vec<(u8, u8)>,
    page: Option<i64>,
    per_page: Option<i64>,
    strict: bool,
}

fn to_map(entries: Vec<(FuzzKey, FuzzValue)>) -> Map<String, Value> {
    entries
        .into_iter()
        .map(|(key, value)| (key.render(), value.into()))
        .collect()
}

fuzz_target!(|input: FuzzRequest| {
    let Some(entity) = ENTITY.as_ref() else {
        return;
    };

    let mut request = QueryRequest::new().predicates(to_map(input.predicates));
    for group in input.or_groups {
        request = request.or_group(to_map(group));
    }
    for (field, variant) in input.sorts {
        request = request.sort(format!(
            "{}:{}",
            FIELDS[field as usize % FIELDS.len()],
            SORTS[variant as usize % SORTS.len()]
        ));
    }
    if let Some(page) = input.page {
        request = request.page(page);
    }
    if let Some(per_page) = input.per_page {
        request = request.per_page(per_page);
    }

    let config = SiftConfig::default().with_strict_predicates(input.strict);
    if let Ok(plan) = entity.compile(&request, &config) {
        let columns = plan
            .and_clauses
            .iter()
            .chain(plan.or_clauses.iter().flatten())
            .map(|condition| condition.field.as_str())
            .chain(plan.order_clauses.iter().map(|order| order.column.as_str()));
        for column in columns {
            assert!(FIELDS.contains(&column), "unregistered column {}", column);
        }
        if input.strict {
            assert!(plan.dropped.is_empty());
        }
    }
});
