//! The seam between compiled plans and a store.
//!
//! An executor adapter runs a [`CompiledPlan`] and returns records. It owns
//! every I/O concern: connections, timeouts and cancellation.
//!
//! [`Records`] is the lazy handle callers get back from a search: it holds a
//! plan and an executor, runs nothing until asked, and re-runs the plan on
//! every call.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{Map, Value};
use smol_str::SmolStr;

use crate::error::QueryResult;
use crate::pagination::{PageWindow, PaginatedResult};
use crate::plan::CompiledPlan;
use crate::sql::DatabaseType;

/// One result row, keyed by column name.
pub type Record = Map<String, Value>;

/// Runs compiled plans against a store.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// The SQL dialect plans are rendered in.
    fn dialect(&self) -> DatabaseType;

    /// Fetch the rows selected by `plan`, honoring its limit and offset.
    async fn fetch(&self, table: &str, plan: &CompiledPlan) -> QueryResult<Vec<Record>>;

    /// Count every row matching `plan`, ignoring pagination.
    async fn count(&self, table: &str, plan: &CompiledPlan) -> QueryResult<u64>;
}

/// A lazy, restartable result sequence.
#[derive(Clone)]
pub struct Records<'e> {
    executor: &'e dyn QueryExecutor,
    table: SmolStr,
    plan: CompiledPlan,
}

impl<'e> Records<'e> {
    /// Bind a plan to an executor. Nothing runs yet.
    pub fn new(executor: &'e dyn QueryExecutor, table: impl Into<SmolStr>, plan: CompiledPlan) -> Self {
        Self {
            executor,
            table: table.into(),
            plan,
        }
    }

    /// The plan that will run.
    pub fn plan(&self) -> &CompiledPlan {
        &self.plan
    }

    /// The table the plan runs against.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Run the plan and collect the current page.
    pub async fn load(&self) -> QueryResult<Vec<Record>> {
        self.executor.fetch(&self.table, &self.plan).await
    }

    /// Run the plan for its first row only.
    pub async fn first(&self) -> QueryResult<Option<Record>> {
        let rows = self.executor.fetch(&self.table, &self.plan.first_row()).await?;
        Ok(rows.into_iter().next())
    }

    /// Count every matching row.
    pub async fn count(&self) -> QueryResult<u64> {
        self.executor.count(&self.table, &self.plan).await
    }

    /// Load the current page together with the total count.
    pub async fn paginate(&self) -> QueryResult<PaginatedResult<Record>> {
        let data = self.load().await?;
        let total = self.count().await?;
        let window = PageWindow {
            page: self.plan.page,
            per_page: self.plan.per_page,
            limit: self.plan.limit,
            offset: self.plan.offset,
        };
        Ok(PaginatedResult::new(data, &window, total))
    }

    /// Stream the current page row by row.
    pub fn stream(&self) -> BoxStream<'_, QueryResult<Record>> {
        stream::once(self.load())
            .flat_map(|result| match result {
                Ok(rows) => stream::iter(rows.into_iter().map(Ok)).left_stream(),
                Err(err) => stream::iter(std::iter::once(Err(err))).right_stream(),
            })
            .boxed()
    }
}

impl std::fmt::Debug for Records<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Records")
            .field("table", &self.table)
            .field("plan", &self.plan)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use futures::TryStreamExt;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves a fixed row set and counts how often it is asked.
    struct FixedExecutor {
        rows: Vec<Record>,
        calls: AtomicUsize,
        fail: bool,
    }

    impl FixedExecutor {
        fn new(n: usize) -> Self {
            let rows = (0..n)
                .map(|i| {
                    let mut row = Record::new();
                    row.insert("id".into(), json!(i));
                    row
                })
                .collect();
            Self {
                rows,
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl QueryExecutor for FixedExecutor {
        fn dialect(&self) -> DatabaseType {
            DatabaseType::SQLite
        }

        async fn fetch(&self, _table: &str, plan: &CompiledPlan) -> QueryResult<Vec<Record>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(QueryError::database("unavailable"));
            }
            Ok(self
                .rows
                .iter()
                .skip(plan.offset as usize)
                .take(plan.limit as usize)
                .cloned()
                .collect())
        }

        async fn count(&self, _table: &str, _plan: &CompiledPlan) -> QueryResult<u64> {
            Ok(self.rows.len() as u64)
        }
    }

    fn plan(page: u64, per_page: u64) -> CompiledPlan {
        CompiledPlan {
            and_clauses: Vec::new(),
            or_clauses: Vec::new(),
            order_clauses: Vec::new(),
            limit: per_page,
            offset: (page - 1) * per_page,
            page,
            per_page,
            dropped: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_records_are_lazy_and_restartable() {
        let executor = FixedExecutor::new(5);
        let records = Records::new(&executor, "items", plan(1, 2));
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);

        assert_eq!(records.load().await.unwrap().len(), 2);
        assert_eq!(records.load().await.unwrap().len(), 2);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_first_and_paginate() {
        let executor = FixedExecutor::new(5);
        let records = Records::new(&executor, "items", plan(2, 2));

        let first = records.first().await.unwrap().unwrap();
        assert_eq!(first["id"], json!(2));

        let page = records.paginate().await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page.total_count, 5);
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_next());
        assert!(page.has_previous());
    }

    #[tokio::test]
    async fn test_stream() {
        let executor = FixedExecutor::new(3);
        let records = Records::new(&executor, "items", plan(1, 10));
        let rows: Vec<Record> = records.stream().try_collect().await.unwrap();
        assert_eq!(rows.len(), 3);

        let failing = FixedExecutor {
            fail: true,
            ..FixedExecutor::new(1)
        };
        let records = Records::new(&failing, "items", plan(1, 10));
        let result: QueryResult<Vec<Record>> = records.stream().try_collect().await;
        assert!(result.is_err());
    }
}
