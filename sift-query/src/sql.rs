//! SQL generation utilities.

use crate::filter::FilterValue;
use crate::sanitize::BoundParam;

/// Escape an identifier with double quotes.
pub fn escape_identifier(name: &str) -> String {
    let escaped = name.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

/// The SQL dialect a plan is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DatabaseType {
    /// PostgreSQL uses $1, $2, etc.
    #[default]
    PostgreSQL,
    /// MySQL uses ?, ?, etc.
    MySQL,
    /// SQLite uses ?, ?, etc.
    SQLite,
}

impl DatabaseType {
    /// Get the parameter placeholder for this database type.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Self::PostgreSQL => format!("${}", index),
            Self::MySQL | Self::SQLite => "?".to_string(),
        }
    }

    /// Quote an identifier for this dialect.
    pub fn quote_identifier(&self, name: &str) -> String {
        match self {
            Self::MySQL => format!("`{}`", name.replace('`', "``")),
            Self::PostgreSQL | Self::SQLite => escape_identifier(name),
        }
    }

    /// The `ESCAPE` clause matching [`crate::sanitize::LIKE_ESCAPE`].
    pub fn like_escape_clause(&self) -> &'static str {
        match self {
            // Backslash is an escape inside MySQL string literals.
            Self::MySQL => " ESCAPE '\\\\'",
            Self::PostgreSQL | Self::SQLite => " ESCAPE '\\'",
        }
    }

    /// Whether `NULLS FIRST` / `NULLS LAST` is understood.
    pub fn supports_nulls_ordering(&self) -> bool {
        !matches!(self, Self::MySQL)
    }
}

/// A SQL builder that keeps text and bound parameters apart.
#[derive(Debug, Clone)]
pub struct SqlBuilder {
    db_type: DatabaseType,
    sql: String,
    params: Vec<FilterValue>,
}

impl SqlBuilder {
    /// Create a new SQL builder.
    pub fn new(db_type: DatabaseType) -> Self {
        Self {
            db_type,
            sql: String::with_capacity(128),
            params: Vec::new(),
        }
    }

    /// The dialect being written.
    pub fn db_type(&self) -> DatabaseType {
        self.db_type
    }

    /// Push trusted SQL text.
    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Push a placeholder and record the bound value.
    pub fn push_param(&mut self, param: &BoundParam) -> &mut Self {
        self.params.push(param.value().clone());
        let placeholder = self.db_type.placeholder(self.params.len());
        self.sql.push_str(&placeholder);
        self
    }

    /// Push a quoted identifier.
    pub fn push_identifier(&mut self, name: &str) -> &mut Self {
        let quoted = self.db_type.quote_identifier(name);
        self.sql.push_str(&quoted);
        self
    }

    /// Build the final SQL string and parameters.
    pub fn build(self) -> (String, Vec<FilterValue>) {
        (self.sql, self.params)
    }

    /// Get the current SQL string.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Get the current parameters.
    pub fn params(&self) -> &[FilterValue] {
        &self.params
    }
}

impl Default for SqlBuilder {
    fn default() -> Self {
        Self::new(DatabaseType::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::literal;

    #[test]
    fn test_escape_identifier() {
        assert_eq!(escape_identifier("user"), "\"user\"");
        assert_eq!(escape_identifier("has\"quote"), "\"has\"\"quote\"");
    }

    #[test]
    fn test_quote_identifier_per_dialect() {
        assert_eq!(DatabaseType::PostgreSQL.quote_identifier("order"), "\"order\"");
        assert_eq!(DatabaseType::MySQL.quote_identifier("order"), "`order`");
        assert_eq!(DatabaseType::SQLite.quote_identifier("order"), "\"order\"");
    }

    #[test]
    fn test_database_placeholder() {
        assert_eq!(DatabaseType::PostgreSQL.placeholder(1), "$1");
        assert_eq!(DatabaseType::PostgreSQL.placeholder(5), "$5");
        assert_eq!(DatabaseType::MySQL.placeholder(1), "?");
        assert_eq!(DatabaseType::SQLite.placeholder(1), "?");
    }

    #[test]
    fn test_sql_builder() {
        let mut builder = SqlBuilder::new(DatabaseType::PostgreSQL);
        builder
            .push("SELECT * FROM ")
            .push_identifier("user")
            .push(" WHERE ")
            .push_identifier("id")
            .push(" = ")
            .push_param(&literal(42i32))
            .push(" OR ")
            .push_identifier("id")
            .push(" = ")
            .push_param(&literal(43i32));

        let (sql, params) = builder.build();
        assert_eq!(sql, "SELECT * FROM \"user\" WHERE \"id\" = $1 OR \"id\" = $2");
        assert_eq!(params.len(), 2);
    }
}
