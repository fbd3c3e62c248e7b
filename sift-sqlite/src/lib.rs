//! SQLite executor for sift.
//!
//! Runs [`CompiledPlan`](sift_query::CompiledPlan)s against SQLite through
//! `tokio-rusqlite`, which keeps the blocking driver on its own thread.
//!
//! `LIKE` is made case-sensitive on every connection so that `contains`,
//! `starts_with` and `ends_with` differ from their `i_` variants the same way
//! they do on PostgreSQL.
//!
//! # Example
//!
//! ```rust,no_run
//! use sift_query::{EntityType, QueryRequest, SiftConfig, StorageType, TableSchema};
//! use sift_sqlite::SqliteExecutor;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = SqliteExecutor::connect("sqlite://./app.db").await?;
//!
//! let schema = TableSchema::new("articles")?.column("title", StorageType::String)?;
//! let article = EntityType::builder("Article", schema)
//!     .register_field("title", StorageType::String)?
//!     .build();
//!
//! let request = QueryRequest::new().filter("title_contains", "sqlite");
//! let rows = article
//!     .search(&executor, &request, &SiftConfig::default())?
//!     .load()
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod types;

pub use config::{DatabasePath, JournalMode, SqliteConfig};
pub use engine::SqliteExecutor;
pub use error::{SqliteError, SqliteResult};
