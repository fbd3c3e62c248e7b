//! Integration tests for configuration files driving compilation.

use std::io::Write;

use serde_json::json;
use sift::prelude::*;
use sift::query::{ConfigError, ErrorCode};

fn article() -> std::sync::Arc<EntityType> {
    let schema = TableSchema::new("articles")
        .and_then(|s| s.column("title", StorageType::String))
        .expect("valid schema");
    EntityType::builder("Article", schema)
        .register_field("title", StorageType::String)
        .expect("valid registration")
        .build()
}

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

/// Test that limits from a file reach the compiler
#[test]
fn test_file_limits_apply() {
    let file = write_config(
        r#"
        strict_predicates = true

        [pagination]
        default_per_page = 5
        max_per_page = 10
        max_page = 3

        [limits]
        max_or_groups = 1
        "#,
    );
    let config = SiftConfig::from_file(file.path()).unwrap();
    let entity = article();

    let plan = entity.compile(&QueryRequest::new(), &config).unwrap();
    assert_eq!(plan.limit, 5);

    let err = entity.compile(&QueryRequest::new().page(4), &config).unwrap_err();
    assert_eq!(err.code, ErrorCode::PageOutOfRange);

    let request = QueryRequest::new()
        .or_group(json!({"title_eq": "a"}))
        .or_group(json!({"title_eq": "b"}));
    let err = entity.compile(&request, &config).unwrap_err();
    assert_eq!(err.code, ErrorCode::TooManyOrGroups);

    let err = entity
        .compile(&QueryRequest::new().filter("title_like", "a"), &config)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::UnknownPredicate);
}

/// Test that a minimal file keeps the lenient defaults
#[test]
fn test_minimal_file_is_lenient() {
    let file = write_config("# nothing configured\n");
    let config = SiftConfig::from_file(file.path()).unwrap();
    assert_eq!(config, SiftConfig::default());

    let plan = article()
        .compile(&QueryRequest::new().filter("title_like", "a"), &config)
        .unwrap();
    assert_eq!(plan.dropped.len(), 1);
}

/// Test that broken files surface as configuration errors
#[test]
fn test_invalid_files_rejected() {
    let file = write_config("[limits]\nmax_total_predicates = 0\n");
    let err = SiftConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));

    let file = write_config("[limits\n");
    let err = SiftConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_)));

    let query_err: QueryError = err.into();
    assert_eq!(query_err.kind(), ErrorKind::Configuration);
}
