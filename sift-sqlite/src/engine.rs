//! SQLite executor for compiled plans.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::InterruptHandle;
use rusqlite::types::Value;
use tokio_rusqlite::Connection;
use tracing::{debug, instrument, warn};

use sift_query::{CompiledPlan, DatabaseType, FilterValue, QueryExecutor, QueryResult, Record};

use crate::config::{DatabasePath, SqliteConfig};
use crate::error::{SqliteError, SqliteResult};
use crate::types::{filter_value_to_sqlite, get_value_at_index};

/// Runs [`CompiledPlan`]s against a SQLite database.
///
/// Cloning is cheap: clones share the same background connection.
///
/// When a `query_timeout` is configured, a statement that overruns it is
/// interrupted on the connection thread, so later calls are not queued
/// behind it.
#[derive(Clone)]
pub struct SqliteExecutor {
    conn: Connection,
    interrupt: Arc<InterruptHandle>,
    config: SqliteConfig,
}

impl SqliteExecutor {
    /// Open a database and apply the configured pragmas.
    #[instrument(skip(config), fields(memory = config.path.is_memory()))]
    pub async fn open(config: SqliteConfig) -> SqliteResult<Self> {
        let conn = match &config.path {
            DatabasePath::Memory => Connection::open_in_memory().await?,
            DatabasePath::File(path) => Connection::open(path).await?,
        };

        let init_sql = config.init_sql();
        let interrupt = conn
            .call(move |conn| {
                conn.execute_batch(&init_sql)?;
                Ok(conn.get_interrupt_handle())
            })
            .await?;

        debug!("SQLite executor opened");
        Ok(Self {
            conn,
            interrupt: Arc::new(interrupt),
            config,
        })
    }

    /// Open a fresh in-memory database.
    pub async fn memory() -> SqliteResult<Self> {
        Self::open(SqliteConfig::memory()).await
    }

    /// Open a database from a URL, see [`SqliteConfig::from_url`].
    pub async fn connect(url: &str) -> SqliteResult<Self> {
        Self::open(SqliteConfig::from_url(url)?).await
    }

    /// The configuration this executor was opened with.
    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    /// Run trusted SQL, such as schema setup or fixtures.
    pub async fn execute_batch(&self, sql: impl Into<String>) -> SqliteResult<()> {
        let sql = sql.into();
        self.with_timeout(self.conn.call(move |conn| {
            conn.execute_batch(&sql)?;
            Ok(())
        }))
        .await
    }

    /// Run a parameterized query and collect every row.
    #[instrument(skip(self, params), fields(params = params.len()))]
    pub async fn query_rows(&self, sql: String, params: Vec<FilterValue>) -> SqliteResult<Vec<Record>> {
        debug!(sql = %sql, "Executing query");
        let params: Vec<Value> = params.iter().map(filter_value_to_sqlite).collect();

        self.with_timeout(self.conn.call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

            let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
                let mut record = Record::new();
                for (i, col) in columns.iter().enumerate() {
                    record.insert(col.clone(), get_value_at_index(row, i)?);
                }
                Ok(record)
            })?;

            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        }))
        .await
    }

    /// Run a parameterized query returning a single integer.
    #[instrument(skip(self, params), fields(params = params.len()))]
    pub async fn query_count(&self, sql: String, params: Vec<FilterValue>) -> SqliteResult<u64> {
        debug!(sql = %sql, "Executing count");
        let params: Vec<Value> = params.iter().map(filter_value_to_sqlite).collect();

        let count: i64 = self
            .with_timeout(self.conn.call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                Ok(stmt.query_row(rusqlite::params_from_iter(params), |row| row.get(0))?)
            }))
            .await?;

        u64::try_from(count)
            .map_err(|_| SqliteError::type_conversion(format!("negative row count {}", count)))
    }

    async fn with_timeout<T>(
        &self,
        fut: impl Future<Output = Result<T, tokio_rusqlite::Error>>,
    ) -> SqliteResult<T> {
        match self.config.query_timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result.map_err(SqliteError::from),
                Err(_) => {
                    warn!(timeout_ms = limit.as_millis() as u64, "Interrupting statement past timeout");
                    self.interrupt.interrupt();
                    Err(SqliteError::Timeout(limit))
                }
            },
            None => fut.await.map_err(SqliteError::from),
        }
    }
}

#[async_trait]
impl QueryExecutor for SqliteExecutor {
    fn dialect(&self) -> DatabaseType {
        DatabaseType::SQLite
    }

    #[instrument(skip(self, plan), fields(table = %table))]
    async fn fetch(&self, table: &str, plan: &CompiledPlan) -> QueryResult<Vec<Record>> {
        let (sql, params) = plan.to_select_sql(table, DatabaseType::SQLite);
        Ok(self.query_rows(sql, params).await?)
    }

    #[instrument(skip(self, plan), fields(table = %table))]
    async fn count(&self, table: &str, plan: &CompiledPlan) -> QueryResult<u64> {
        let (sql, params) = plan.to_count_sql(table, DatabaseType::SQLite);
        Ok(self.query_count(sql, params).await?)
    }
}

impl std::fmt::Debug for SqliteExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteExecutor")
            .field("path", &self.config.path)
            .finish_non_exhaustive()
    }
}
