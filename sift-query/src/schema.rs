//! Physical table schemas and the field specs derived from them.
//!
//! A [`TableSchema`] describes the columns an entity type is stored in. Every
//! registration is checked against it, so a typo in a field name fails while
//! the entity type is being defined rather than on the first request.
//!
//! ```rust
//! use sift_query::{StorageType, TableSchema};
//!
//! let schema = TableSchema::new("articles")
//!     .unwrap()
//!     .column("title", StorageType::String)
//!     .unwrap()
//!     .nullable_column("view_count", StorageType::Numeric)
//!     .unwrap();
//!
//! let spec = schema.field_spec("view_count").unwrap();
//! assert!(spec.nullable);
//! assert!(!spec.sensitive);
//! ```

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::{QueryError, QueryResult};

/// Name fragments that mark a column as credential-like.
const SENSITIVE_FRAGMENTS: &[&str] = &[
    "password",
    "secret",
    "token",
    "api_key",
    "digest",
    "salt",
    "otp",
    "private_key",
    "credential",
    "encrypted",
];

/// How a column is stored, which decides the predicates and orderings it gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    /// Short string (`VARCHAR`).
    String,
    /// Long text.
    Text,
    /// Integer or decimal.
    Numeric,
    /// Calendar date.
    Date,
    /// Timestamp.
    DateTime,
    /// Boolean.
    Boolean,
}

impl StorageType {
    /// String or text.
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::String | Self::Text)
    }

    /// Date or timestamp.
    pub fn is_temporal(&self) -> bool {
        matches!(self, Self::Date | Self::DateTime)
    }

    /// Types with a meaningful `<`/`>`.
    pub fn is_ordered(&self) -> bool {
        matches!(self, Self::Numeric | Self::Date | Self::DateTime)
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Text => "text",
            Self::Numeric => "numeric",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Boolean => "boolean",
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single column definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    /// Storage type.
    pub storage_type: StorageType,
    /// Whether the column admits NULL.
    pub nullable: bool,
}

/// Everything the registries need to know about one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Column name.
    pub field_name: SmolStr,
    /// Storage type.
    pub storage_type: StorageType,
    /// Whether the column admits NULL.
    pub nullable: bool,
    /// Credential-like column, hidden from introspection.
    pub sensitive: bool,
}

/// Physical schema of the table an entity type lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    table: SmolStr,
    columns: IndexMap<SmolStr, ColumnDef>,
}

impl TableSchema {
    /// Create an empty schema for `table`.
    pub fn new(table: &str) -> QueryResult<Self> {
        check_identifier(table)?;
        Ok(Self {
            table: SmolStr::new(table),
            columns: IndexMap::new(),
        })
    }

    /// Add a NOT NULL column.
    pub fn column(self, name: &str, storage_type: StorageType) -> QueryResult<Self> {
        self.add(name, storage_type, false)
    }

    /// Add a nullable column.
    pub fn nullable_column(self, name: &str, storage_type: StorageType) -> QueryResult<Self> {
        self.add(name, storage_type, true)
    }

    fn add(mut self, name: &str, storage_type: StorageType, nullable: bool) -> QueryResult<Self> {
        check_identifier(name)?;
        self.columns.insert(
            SmolStr::new(name),
            ColumnDef {
                storage_type,
                nullable,
            },
        );
        Ok(self)
    }

    /// Table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Look up a column definition.
    pub fn column_def(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.get(name)
    }

    /// Check if the column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(SmolStr::as_str)
    }

    /// Resolve a registration against the schema.
    ///
    /// Fails if the column is missing or stored as a different type.
    pub fn resolve(&self, name: &str, storage_type: StorageType) -> QueryResult<FieldSpec> {
        let spec = self
            .field_spec(name)
            .ok_or_else(|| QueryError::unknown_column(self.table.as_str(), name))?;
        if spec.storage_type != storage_type {
            return Err(QueryError::storage_type_mismatch(
                self.table.as_str(),
                name,
                storage_type,
                spec.storage_type,
            ));
        }
        Ok(spec)
    }

    /// Derive the field spec for a column.
    pub fn field_spec(&self, name: &str) -> Option<FieldSpec> {
        self.columns.get_key_value(name).map(|(field_name, def)| FieldSpec {
            field_name: field_name.clone(),
            storage_type: def.storage_type,
            nullable: def.nullable,
            sensitive: is_sensitive(field_name),
        })
    }
}

/// Check whether a column name looks like it holds a credential or secret.
pub fn is_sensitive(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SENSITIVE_FRAGMENTS.iter().any(|fragment| lower.contains(fragment))
}

/// Check if a name is a plain SQL identifier (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_identifier(name: &str) -> QueryResult<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(QueryError::invalid_configuration(format!(
            "`{}` is not a valid table or column name",
            name
        )))
    }
}
