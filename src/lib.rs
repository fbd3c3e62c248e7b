//! # Sift
//!
//! Registry-driven query compilation for untrusted filter, sort and
//! pagination input.
//!
//! Sift lets an application expose searching over its records to callers it
//! does not trust. Each entity type registers which fields may be filtered
//! and sorted; anything else a caller sends is rejected or dropped, and every
//! value reaches the database as a bound parameter.
//!
//! - [`query`] compiles requests into [`CompiledPlan`]s
//! - [`sqlite`] runs plans against SQLite (feature `sqlite`, on by default)
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_json::json;
//! use sift::prelude::*;
//!
//! let schema = TableSchema::new("articles")?
//!     .column("title", StorageType::String)?
//!     .nullable_column("published_at", StorageType::DateTime)?;
//!
//! let article = EntityType::builder("Article", schema)
//!     .register_field("title", StorageType::String)?
//!     .register_sort("published_at", StorageType::DateTime)?
//!     .build();
//!
//! // Parameters arrive from an HTTP boundary and must be permitted first.
//! let params = Params::new(json!({
//!     "filters": { "title_starts_with": "Rust" },
//!     "sort": "published_at:newest",
//!     "page": 2,
//! }))
//! .permit();
//!
//! let request = QueryRequest::from_envelope(&params)?;
//! let plan = article.compile(&request, &SiftConfig::default())?;
//!
//! assert_eq!(plan.offset, 25);
//! # Ok::<(), sift::QueryError>(())
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// The query compiler.
pub mod query {
    pub use sift_query::*;
}

/// SQLite executor.
#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod sqlite {
    pub use sift_sqlite::*;
}

pub use sift_query::{
    CompiledPlan, EntityType, ErrorKind, QueryError, QueryExecutor, QueryRequest, QueryResult,
    Records, SiftConfig,
};

#[cfg(feature = "sqlite")]
pub use sift_sqlite::SqliteExecutor;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use sift_query::prelude::*;

    #[cfg(feature = "sqlite")]
    pub use sift_sqlite::{SqliteConfig, SqliteExecutor};
}
