//! Compiled query plans.
//!
//! A [`CompiledPlan`] is the validated, sanitized form of a request. It holds
//! registered columns, predicate kinds and bound parameters only, and is
//! independent of any store until rendered with [`CompiledPlan::to_select_sql`].
//!
//! Rendering shape:
//!
//! ```text
//! SELECT * FROM "articles"
//!  WHERE <and_1> AND <and_2> AND ((<g1_1> AND <g1_2>) OR (<g2_1>))
//!  ORDER BY <order_1>, <order_2>
//!  LIMIT n OFFSET m
//! ```

use smol_str::SmolStr;

use crate::error::ErrorCode;
use crate::filter::{Condition, FilterValue};
use crate::sort::OrderByField;
use crate::sql::{DatabaseType, SqlBuilder};

/// A key dropped during non-strict compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedKey {
    /// The key as supplied.
    pub key: SmolStr,
    /// Why it was dropped.
    pub code: ErrorCode,
    /// The OR-group it appeared in, if any.
    pub group: Option<usize>,
}

/// The validated, sanitized, executable form of a request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPlan {
    /// Conditions AND-ed at the top level.
    pub and_clauses: Vec<Condition>,
    /// OR-groups; each inner list is AND-ed, the groups are OR-ed.
    pub or_clauses: Vec<Vec<Condition>>,
    /// Orderings, primary first.
    pub order_clauses: Vec<OrderByField>,
    /// Rows to take.
    pub limit: u64,
    /// Rows to skip.
    pub offset: u64,
    /// Page number the window was computed from.
    pub page: u64,
    /// Page size the window was computed from.
    pub per_page: u64,
    /// Keys dropped in non-strict mode.
    pub dropped: Vec<DroppedKey>,
}

impl CompiledPlan {
    /// Check if the plan filters anything.
    pub fn has_conditions(&self) -> bool {
        !self.and_clauses.is_empty() || !self.or_clauses.is_empty()
    }

    /// Number of conditions across all clauses.
    pub fn condition_count(&self) -> usize {
        self.and_clauses.len() + self.or_clauses.iter().map(Vec::len).sum::<usize>()
    }

    /// Number of bound parameters the plan will carry.
    pub fn param_count(&self) -> usize {
        self.and_clauses
            .iter()
            .chain(self.or_clauses.iter().flatten())
            .map(|c| c.operand.param_count())
            .sum()
    }

    /// The same plan restricted to its first row.
    pub fn first_row(&self) -> Self {
        Self {
            limit: 1,
            ..self.clone()
        }
    }

    /// Write the `WHERE` clause, if any, including the leading keyword.
    pub fn write_where(&self, sql: &mut SqlBuilder) {
        if !self.has_conditions() {
            return;
        }
        sql.push(" WHERE ");

        let mut first = true;
        for condition in &self.and_clauses {
            if !first {
                sql.push(" AND ");
            }
            first = false;
            condition.write_sql(sql);
        }

        if self.or_clauses.is_empty() {
            return;
        }
        if !first {
            sql.push(" AND ");
        }
        sql.push("(");
        for (i, group) in self.or_clauses.iter().enumerate() {
            if i > 0 {
                sql.push(" OR ");
            }
            sql.push("(");
            for (j, condition) in group.iter().enumerate() {
                if j > 0 {
                    sql.push(" AND ");
                }
                condition.write_sql(sql);
            }
            sql.push(")");
        }
        sql.push(")");
    }

    /// Write the `ORDER BY` clause, if any, including the leading keyword.
    pub fn write_order_by(&self, sql: &mut SqlBuilder) {
        if self.order_clauses.is_empty() {
            return;
        }
        sql.push(" ORDER BY ");
        for (i, order) in self.order_clauses.iter().enumerate() {
            if i > 0 {
                sql.push(", ");
            }
            order.write_sql(sql);
        }
    }

    /// Render a paginated `SELECT *` for `table`.
    pub fn to_select_sql(&self, table: &str, db_type: DatabaseType) -> (String, Vec<FilterValue>) {
        let mut sql = SqlBuilder::new(db_type);
        sql.push("SELECT * FROM ").push_identifier(table);
        self.write_where(&mut sql);
        self.write_order_by(&mut sql);
        sql.push(" LIMIT ").push(&self.limit.to_string());
        if self.offset > 0 {
            sql.push(" OFFSET ").push(&self.offset.to_string());
        }
        sql.build()
    }

    /// Render a `SELECT COUNT(*)` over every matching row, ignoring pagination.
    pub fn to_count_sql(&self, table: &str, db_type: DatabaseType) -> (String, Vec<FilterValue>) {
        let mut sql = SqlBuilder::new(db_type);
        sql.push("SELECT COUNT(*) FROM ").push_identifier(table);
        self.write_where(&mut sql);
        sql.build()
    }
}
