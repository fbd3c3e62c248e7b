//! # sift-query
//!
//! Registry-driven query compiler for untrusted input.
//!
//! Callers send flat maps of predicate keys (`title_contains`,
//! `view_count_gte`), sort keys (`published_at:newest`) and page numbers.
//! This crate turns them into a bounded, parameterized [`CompiledPlan`]:
//!
//! - only keys present in a frozen, per-entity-type registry are accepted,
//!   so a key can never name an arbitrary method or column
//! - every caller value is bound as a parameter; pattern predicates escape
//!   LIKE wildcards before adding their own
//! - predicate counts, OR-groups, sort keys and page numbers are capped
//!   before any key is validated
//!
//! ## Defining an entity type
//!
//! ```rust
//! use sift_query::{EntityType, StorageType, TableSchema};
//!
//! let schema = TableSchema::new("articles")
//!     .unwrap()
//!     .column("title", StorageType::String)
//!     .unwrap()
//!     .nullable_column("view_count", StorageType::Numeric)
//!     .unwrap()
//!     .nullable_column("published_at", StorageType::DateTime)
//!     .unwrap();
//!
//! let article = EntityType::builder("Article", schema)
//!     .register_field("title", StorageType::String)
//!     .unwrap()
//!     .register_field("view_count", StorageType::Numeric)
//!     .unwrap()
//!     .register_sort("published_at", StorageType::DateTime)
//!     .unwrap()
//!     .build();
//!
//! assert!(article.sorts().is_registered_scope("published_at:newest"));
//! ```
//!
//! ## Compiling a request
//!
//! ```rust
//! # use sift_query::{EntityType, StorageType, TableSchema};
//! # let schema = TableSchema::new("articles").unwrap()
//! #     .column("title", StorageType::String).unwrap()
//! #     .nullable_column("view_count", StorageType::Numeric).unwrap();
//! # let article = EntityType::builder("Article", schema)
//! #     .register_field("title", StorageType::String).unwrap()
//! #     .register_field("view_count", StorageType::Numeric).unwrap()
//! #     .build();
//! use serde_json::json;
//! use sift_query::{DatabaseType, QueryRequest, SiftConfig};
//!
//! let request = QueryRequest::from_envelope(json!({
//!     "filters": { "title_contains": "Ab", "view_count_gte": 50 },
//!     "sort": ["view_count:desc_nulls_last"],
//!     "per_page": 10,
//! }))
//! .unwrap();
//!
//! let plan = article.compile(&request, &SiftConfig::default()).unwrap();
//! let (sql, params) = plan.to_select_sql(article.table(), DatabaseType::PostgreSQL);
//!
//! assert_eq!(
//!     sql,
//!     "SELECT * FROM \"articles\" WHERE \"title\" LIKE $1 ESCAPE '\\' AND \"view_count\" >= $2 \
//!      ORDER BY \"view_count\" DESC NULLS LAST LIMIT 10"
//! );
//! assert_eq!(params.len(), 2);
//! ```
//!
//! ## Errors
//!
//! Compilation fails with one of three kinds, see [`ErrorKind`]:
//! configuration (malformed or oversized requests), invalid predicate
//! (unknown keys, in strict mode) and invalid pagination (page beyond the
//! ceiling).

pub mod coerce;
pub mod compiler;
pub mod config;
pub mod entity;
pub mod error;
pub mod executor;
pub mod filter;
pub mod logging;
pub mod pagination;
pub mod plan;
pub mod predicate;
pub mod request;
pub mod sanitize;
pub mod schema;
pub mod sort;
pub mod sql;

pub use compiler::QueryCompiler;
pub use config::{CompileLimits, ConfigError, SiftConfig};
pub use entity::{EntityBuilder, EntityType};
pub use error::{ErrorCode, ErrorContext, ErrorKind, QueryError, QueryResult};
pub use executor::{QueryExecutor, Record, Records};
pub use filter::{Condition, FilterValue, Operand};
pub use pagination::{PageWindow, PaginatedResult, PaginationLimits};
pub use plan::{CompiledPlan, DroppedKey};
pub use predicate::{
    OperandShape, PredicateKind, PredicateRegistration, PredicateRegistry,
    PredicateRegistryBuilder, PredicateSet,
};
pub use request::{InputSource, Params, Permission, QueryRequest};
pub use sanitize::{BoundParam, PatternPosition};
pub use schema::{ColumnDef, FieldSpec, StorageType, TableSchema};
pub use sort::{
    NullsOrder, OrderByField, SortOrder, SortRegistry, SortRegistryBuilder, SortScope,
    SortVariant,
};
pub use sql::{DatabaseType, SqlBuilder};

// Re-export logging utilities
pub use logging::{get_log_format, get_log_level, init as init_logging, init_debug, init_with_level, is_debug_enabled};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::SiftConfig;
    pub use crate::entity::EntityType;
    pub use crate::error::{ErrorKind, QueryError, QueryResult};
    pub use crate::executor::{QueryExecutor, Records};
    pub use crate::plan::CompiledPlan;
    pub use crate::request::{Params, QueryRequest};
    pub use crate::schema::{StorageType, TableSchema};
    pub use crate::sql::DatabaseType;
}
