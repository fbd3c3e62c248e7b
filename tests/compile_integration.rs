//! Integration tests for request compilation.
//!
//! These tests drive the compiler through the public facade only, the way a
//! web handler would: a parameter envelope in, a plan or an error out.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{Map, Value, json};
use sift::prelude::*;
use sift::query::{CompileLimits, ErrorCode, OperandShape, PaginationLimits};

fn article() -> Arc<EntityType> {
    let schema = TableSchema::new("articles")
        .and_then(|s| s.column("title", StorageType::String))
        .and_then(|s| s.nullable_column("body", StorageType::Text))
        .and_then(|s| s.nullable_column("view_count", StorageType::Numeric))
        .and_then(|s| s.column("featured", StorageType::Boolean))
        .and_then(|s| s.nullable_column("published_at", StorageType::DateTime))
        .and_then(|s| s.column("password_digest", StorageType::String))
        .expect("valid schema");

    EntityType::builder("Article", schema)
        .register_field("title", StorageType::String)
        .and_then(|b| b.register_predicate("body", StorageType::Text))
        .and_then(|b| b.register_field("view_count", StorageType::Numeric))
        .and_then(|b| b.register_predicate("featured", StorageType::Boolean))
        .and_then(|b| b.register_sort("published_at", StorageType::DateTime))
        .expect("valid registrations")
        .build()
}

fn strict() -> SiftConfig {
    SiftConfig::default().with_strict_predicates(true)
}

fn compile(request: &QueryRequest, config: &SiftConfig) -> QueryResult<CompiledPlan> {
    article().compile(request, config)
}

fn many_predicates(n: usize) -> Map<String, Value> {
    (0..n).map(|i| (format!("field_{}_eq", i), json!(i))).collect()
}

// ============================================================================
// Resource ceilings
// ============================================================================

#[test]
fn test_predicate_ceiling_is_inclusive() {
    let config = SiftConfig::default().with_limits(CompileLimits {
        max_total_predicates: 5,
        ..CompileLimits::default()
    });

    // Unknown keys at the ceiling are merely dropped.
    let plan = compile(&QueryRequest::new().predicates(many_predicates(5)), &config).unwrap();
    assert_eq!(plan.dropped.len(), 5);

    let err = compile(&QueryRequest::new().predicates(many_predicates(6)), &config).unwrap_err();
    assert_eq!(err.code, ErrorCode::TooManyPredicates);
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn test_or_group_keys_count_toward_predicate_ceiling() {
    let config = SiftConfig::default().with_limits(CompileLimits {
        max_total_predicates: 3,
        ..CompileLimits::default()
    });
    let request = QueryRequest::new()
        .filter("title_eq", "a")
        .or_group(json!({"view_count_gt": 1, "featured_eq": true}))
        .or_group(json!({"title_eq": "b"}));

    let err = compile(&request, &config).unwrap_err();
    assert_eq!(err.code, ErrorCode::TooManyPredicates);
}

#[test]
fn test_or_group_ceiling_is_inclusive() {
    let config = SiftConfig::default().with_limits(CompileLimits {
        max_or_groups: 2,
        ..CompileLimits::default()
    });

    let two = QueryRequest::new()
        .or_group(json!({"title_eq": "a"}))
        .or_group(json!({"title_eq": "b"}));
    assert_eq!(compile(&two, &config).unwrap().or_clauses.len(), 2);

    let three = two.or_group(json!({"title_eq": "c"}));
    let err = compile(&three, &config).unwrap_err();
    assert_eq!(err.code, ErrorCode::TooManyOrGroups);
}

#[test]
fn test_ceilings_hold_in_lenient_mode() {
    let config = SiftConfig::default();
    assert!(!config.is_strict());

    let request = QueryRequest::new().predicates(many_predicates(10_000));
    let err = compile(&request, &config).unwrap_err();
    assert_eq!(err.code, ErrorCode::TooManyPredicates);
}

// ============================================================================
// Pagination
// ============================================================================

#[test]
fn test_page_ceiling_ignores_page_size() {
    let config = SiftConfig::default().with_pagination(PaginationLimits {
        max_page: 100,
        ..PaginationLimits::default()
    });

    let plan = compile(&QueryRequest::new().page(100).per_page(1), &config).unwrap();
    assert_eq!(plan.offset, 99);

    for per_page in [1, 25, 100] {
        let err = compile(&QueryRequest::new().page(101).per_page(per_page), &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPagination);
    }
}

#[test]
fn test_oversized_page_numbers_are_out_of_range() {
    let pages = [
        json!(18446744073709551615u64),
        json!("99999999999999999999"),
        json!(1e20),
        json!("-99999999999999999999"),
    ];
    for page in pages {
        let request = QueryRequest::from_envelope(json!({"page": page})).unwrap();
        let err = compile(&request, &SiftConfig::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::PageOutOfRange, "{}", page);
        assert_eq!(err.kind(), ErrorKind::InvalidPagination);
    }

    let request = QueryRequest::from_envelope(json!({"per_page": "99999999999999999999"})).unwrap();
    let plan = compile(&request, &SiftConfig::default()).unwrap();
    assert_eq!(plan.limit, 100);
}

#[test]
fn test_page_ceiling_holds_in_lenient_mode() {
    let err = compile(&QueryRequest::new().page(10_001), &SiftConfig::default()).unwrap_err();
    assert_eq!(err.code, ErrorCode::PageOutOfRange);

    let err = compile(&QueryRequest::new().page(0), &SiftConfig::default()).unwrap_err();
    assert_eq!(err.code, ErrorCode::PageOutOfRange);
}

#[test]
fn test_page_size_is_clamped() {
    let plan = compile(&QueryRequest::new().per_page(5_000), &SiftConfig::default()).unwrap();
    assert_eq!(plan.limit, 100);

    let plan = compile(&QueryRequest::new().per_page(-3), &SiftConfig::default()).unwrap();
    assert_eq!(plan.limit, 1);
}

// ============================================================================
// Key validation
// ============================================================================

#[test]
fn test_strict_and_lenient_unknown_keys() {
    let request = QueryRequest::new()
        .filter("title_contains", "rust")
        .filter("title_destroy_all", true);

    let err = compile(&request, &strict()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPredicate);
    assert_eq!(err.context.key.as_deref(), Some("title_destroy_all"));

    let plan = compile(&request, &SiftConfig::default()).unwrap();
    assert_eq!(plan.and_clauses.len(), 1);
    assert_eq!(plan.dropped[0].key, "title_destroy_all");
}

#[test]
fn test_injection_shaped_keys_never_reach_sql() {
    let keys = [
        "title; DROP TABLE articles--_eq",
        "title\" OR 1=1 --_eq",
        "instance_eval",
        "send",
        "__proto___eq",
        "password_digest_eq",
        "title_eq ",
    ];

    for key in keys {
        let request = QueryRequest::new().filter(key, "x");
        assert!(compile(&request, &strict()).is_err(), "{} accepted", key);

        let plan = compile(&request, &SiftConfig::default()).unwrap();
        assert!(!plan.has_conditions(), "{} compiled", key);
    }
}

#[test]
fn test_values_are_always_bound() {
    let request = QueryRequest::new().filter("title_eq", "'; DROP TABLE articles; --");
    let plan = compile(&request, &strict()).unwrap();
    let (sql, params) = plan.to_select_sql("articles", DatabaseType::PostgreSQL);

    assert!(!sql.contains("DROP"));
    assert_eq!(params.len(), 1);
}

fn sample(storage_type: StorageType, n: i64) -> Value {
    match storage_type {
        StorageType::String | StorageType::Text => json!(format!("needle{}", n)),
        StorageType::Numeric => json!(4200 + n),
        StorageType::Date => json!(format!("2031-01-{:02}", n)),
        StorageType::DateTime => json!(format!("2031-01-{:02}T00:00:00Z", n)),
        StorageType::Boolean => json!(n % 2 == 0),
    }
}

fn placeholders(sql: &str) -> usize {
    sql.as_bytes()
        .windows(2)
        .filter(|w| w[0] == b'$' && w[1].is_ascii_digit())
        .count()
}

#[test]
fn test_every_registered_key_binds_its_values() {
    let entity = article();
    let keys = entity.predicate_keys();
    assert!(!keys.is_empty());

    for key in &keys {
        let (field, kind) = entity.predicates().parse_key(key).expect("registered key parses");
        let value = match kind.operand_shape() {
            OperandShape::Scalar | OperandShape::Pattern => sample(field.storage_type, 1),
            OperandShape::Range => json!([sample(field.storage_type, 1), sample(field.storage_type, 2)]),
            OperandShape::List => json!([
                sample(field.storage_type, 1),
                sample(field.storage_type, 2),
                sample(field.storage_type, 3),
            ]),
            OperandShape::Flag => json!(true),
        };

        let plan = compile(&QueryRequest::new().filter(key.as_str(), value.clone()), &strict())
            .unwrap_or_else(|e| panic!("{} rejected: {}", key, e));
        assert_eq!(plan.and_clauses.len(), 1, "{}", key);

        let (sql, params) = plan.to_select_sql("articles", DatabaseType::PostgreSQL);
        assert_eq!(placeholders(&sql), plan.param_count(), "{}: {}", key, sql);
        assert_eq!(params.len(), plan.param_count(), "{}", key);

        let (sql, params) = plan.to_select_sql("articles", DatabaseType::SQLite);
        assert_eq!(sql.matches('?').count(), params.len(), "{}: {}", key, sql);

        assert!(!sql.contains("needle"), "{} leaked a value: {}", key, sql);
        assert!(!sql.contains("420"), "{} leaked a value: {}", key, sql);
        assert!(!sql.contains("2031"), "{} leaked a value: {}", key, sql);
    }
}

#[test]
fn test_sensitive_fields_hidden_from_introspection() {
    let entity = EntityType::extend(&article(), "AdminArticle")
        .register_predicate("password_digest", StorageType::String)
        .unwrap()
        .build();

    let request = QueryRequest::new().filter("password_digest_eq", "x");
    assert!(entity.compile(&request, &strict()).is_ok());
    assert!(!entity.searchable_fields().contains(&"password_digest"));
    assert!(entity.predicate_keys().iter().all(|k| !k.starts_with("password")));

    // The parent type is unaffected.
    assert!(article().compile(&request, &strict()).is_err());
}

// ============================================================================
// Sorting
// ============================================================================

#[test]
fn test_sort_chaining_preserves_order() {
    let request = QueryRequest::new()
        .sort("published_at:newest")
        .sort("title:asc")
        .sort("view_count:desc_nulls_last");
    let plan = compile(&request, &strict()).unwrap();
    let (sql, _) = plan.to_select_sql("articles", DatabaseType::PostgreSQL);

    assert!(sql.contains(
        "ORDER BY \"published_at\" DESC, \"title\" ASC, \"view_count\" DESC NULLS LAST"
    ), "{}", sql);
}

#[test]
fn test_unregistered_sort_field_is_rejected() {
    let err = compile(&QueryRequest::new().sort("body:asc"), &strict()).unwrap_err();
    assert_eq!(err.code, ErrorCode::UnknownSort);
}

// ============================================================================
// Envelopes and idempotence
// ============================================================================

#[test]
fn test_unpermitted_params_refused() {
    let params = Params::new(json!({"filters": {"title_eq": "a"}}));
    let err = QueryRequest::from_envelope(&params).unwrap_err();
    assert_eq!(err.code, ErrorCode::UnpermittedInput);

    let request = QueryRequest::from_envelope(params.permit()).unwrap();
    assert_eq!(compile(&request, &strict()).unwrap().and_clauses.len(), 1);
}

#[test]
fn test_compile_is_idempotent() {
    let request = QueryRequest::from_envelope(json!({
        "filters": {"title_i_contains": "Rust", "view_count_between": [10, 20]},
        "or": [{"featured_eq": true}, {"body_present": true}],
        "sort": "published_at:oldest,title:desc",
        "page": "3",
        "per_page": 10,
    }))
    .unwrap();

    let entity = article();
    let first = entity.compile(&request, &strict()).unwrap();
    let second = entity.compile(&request, &strict()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.offset, 20);
    assert_eq!(first.order_clauses.len(), 2);
}
