//! Sort orders and the per-entity sort registry.
//!
//! Registering a field generates a fixed family of ordering keys named
//! `"<field>:<variant>"`, chosen by storage type:
//!
//! | Storage type   | Variants |
//! |----------------|----------|
//! | string, text   | `asc`, `desc`, `asc_case_insensitive`, `desc_case_insensitive` |
//! | numeric        | `asc`, `desc`, `asc_nulls_first`, `asc_nulls_last`, `desc_nulls_first`, `desc_nulls_last` |
//! | date, datetime | `asc`, `desc`, `newest`, `oldest` |
//! | boolean        | `asc`, `desc` |
//!
//! ```rust
//! use sift_query::{SortRegistry, StorageType, TableSchema};
//!
//! let schema = TableSchema::new("articles")
//!     .unwrap()
//!     .nullable_column("view_count", StorageType::Numeric)
//!     .unwrap();
//!
//! let mut builder = SortRegistry::builder();
//! builder.register(&schema, "view_count", StorageType::Numeric).unwrap();
//! let registry = builder.freeze();
//!
//! assert!(registry.is_registered_scope("view_count:desc_nulls_last"));
//! assert!(!registry.is_registered_scope("view_count:newest"));
//! ```

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::debug;

use crate::error::QueryResult;
use crate::schema::{StorageType, TableSchema};
use crate::sql::SqlBuilder;

/// Separator between field and variant in a sort key.
pub const SORT_KEY_SEPARATOR: char = ':';

/// Sort order for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SortOrder {
    /// Ascending order (A-Z, 0-9, oldest first).
    #[default]
    Asc,
    /// Descending order (Z-A, 9-0, newest first).
    Desc,
}

impl SortOrder {
    /// Get the SQL keyword for this sort order.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

/// Null handling in sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NullsOrder {
    /// Nulls appear first in the results.
    First,
    /// Nulls appear last in the results.
    Last,
}

impl NullsOrder {
    /// Get the SQL clause for this null order.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::First => "NULLS FIRST",
            Self::Last => "NULLS LAST",
        }
    }
}

/// A named ordering variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortVariant {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
    /// Ascending, ignoring case.
    AscCaseInsensitive,
    /// Descending, ignoring case.
    DescCaseInsensitive,
    /// Ascending with nulls first.
    AscNullsFirst,
    /// Ascending with nulls last.
    AscNullsLast,
    /// Descending with nulls first.
    DescNullsFirst,
    /// Descending with nulls last.
    DescNullsLast,
    /// Most recent first (descending).
    Newest,
    /// Least recent first (ascending).
    Oldest,
}

impl SortVariant {
    /// The variant part of a sort key.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
            Self::AscCaseInsensitive => "asc_case_insensitive",
            Self::DescCaseInsensitive => "desc_case_insensitive",
            Self::AscNullsFirst => "asc_nulls_first",
            Self::AscNullsLast => "asc_nulls_last",
            Self::DescNullsFirst => "desc_nulls_first",
            Self::DescNullsLast => "desc_nulls_last",
            Self::Newest => "newest",
            Self::Oldest => "oldest",
        }
    }

    /// Variants generated for a storage type.
    pub fn for_storage_type(storage_type: StorageType) -> &'static [SortVariant] {
        match storage_type {
            StorageType::String | StorageType::Text => &[
                Self::Asc,
                Self::Desc,
                Self::AscCaseInsensitive,
                Self::DescCaseInsensitive,
            ],
            StorageType::Numeric => &[
                Self::Asc,
                Self::Desc,
                Self::AscNullsFirst,
                Self::AscNullsLast,
                Self::DescNullsFirst,
                Self::DescNullsLast,
            ],
            StorageType::Date | StorageType::DateTime => {
                &[Self::Asc, Self::Desc, Self::Newest, Self::Oldest]
            }
            StorageType::Boolean => &[Self::Asc, Self::Desc],
        }
    }

    /// The concrete ordering for a column.
    pub fn order_by(&self, column: SmolStr) -> OrderByField {
        let field = match self {
            Self::Asc | Self::AscCaseInsensitive | Self::AscNullsFirst | Self::AscNullsLast
            | Self::Oldest => OrderByField::asc(column),
            Self::Desc | Self::DescCaseInsensitive | Self::DescNullsFirst | Self::DescNullsLast
            | Self::Newest => OrderByField::desc(column),
        };
        match self {
            Self::AscCaseInsensitive | Self::DescCaseInsensitive => field.case_insensitive(),
            Self::AscNullsFirst | Self::DescNullsFirst => field.nulls(NullsOrder::First),
            Self::AscNullsLast | Self::DescNullsLast => field.nulls(NullsOrder::Last),
            _ => field,
        }
    }
}

/// One ordering fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderByField {
    /// The column name to order by.
    pub column: SmolStr,
    /// The sort order.
    pub order: SortOrder,
    /// Explicit null placement, when requested.
    pub nulls: Option<NullsOrder>,
    /// Compare lowercased values.
    pub case_insensitive: bool,
}

impl OrderByField {
    /// Create a new order by field.
    pub fn new(column: impl Into<SmolStr>, order: SortOrder) -> Self {
        Self {
            column: column.into(),
            order,
            nulls: None,
            case_insensitive: false,
        }
    }

    /// Create an ascending order.
    pub fn asc(column: impl Into<SmolStr>) -> Self {
        Self::new(column, SortOrder::Asc)
    }

    /// Create a descending order.
    pub fn desc(column: impl Into<SmolStr>) -> Self {
        Self::new(column, SortOrder::Desc)
    }

    /// Set null handling.
    pub fn nulls(mut self, nulls: NullsOrder) -> Self {
        self.nulls = Some(nulls);
        self
    }

    /// Compare case-insensitively.
    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    /// Write the SQL for this ordering.
    ///
    /// Null placement is always spelled out; MySQL has no `NULLS FIRST`, so
    /// it gets a leading `col IS NULL` sort key instead.
    pub fn write_sql(&self, sql: &mut SqlBuilder) {
        if let Some(nulls) = self.nulls {
            if !sql.db_type().supports_nulls_ordering() {
                sql.push_identifier(&self.column).push(" IS NULL ");
                sql.push(match nulls {
                    NullsOrder::First => "DESC, ",
                    NullsOrder::Last => "ASC, ",
                });
            }
        }

        if self.case_insensitive {
            sql.push("LOWER(").push_identifier(&self.column).push(")");
        } else {
            sql.push_identifier(&self.column);
        }
        sql.push(" ").push(self.order.as_sql());

        if let Some(nulls) = self.nulls {
            if sql.db_type().supports_nulls_ordering() {
                sql.push(" ").push(nulls.as_sql());
            }
        }
    }
}

/// A registered ordering key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortScope {
    /// The full key, e.g. `published_at:newest`.
    pub key: SmolStr,
    /// The field it orders by.
    pub field: SmolStr,
    /// The variant.
    pub variant: SortVariant,
    /// The ordering it compiles to.
    pub order: OrderByField,
}

/// Append-only builder used while an entity type is being defined.
#[derive(Debug, Clone, Default)]
pub struct SortRegistryBuilder {
    fields: IndexMap<SmolStr, StorageType>,
    scopes: IndexMap<SmolStr, SortScope>,
}

impl SortRegistryBuilder {
    /// Register a field, generating its ordering keys.
    ///
    /// Registering the same field again is a no-op.
    pub fn register(
        &mut self,
        schema: &TableSchema,
        field: &str,
        storage_type: StorageType,
    ) -> QueryResult<()> {
        let spec = schema.resolve(field, storage_type)?;
        if self.fields.contains_key(field) {
            return Ok(());
        }
        for variant in SortVariant::for_storage_type(spec.storage_type) {
            let key = SmolStr::new(format!(
                "{}{}{}",
                spec.field_name,
                SORT_KEY_SEPARATOR,
                variant.name()
            ));
            let scope = SortScope {
                key: key.clone(),
                field: spec.field_name.clone(),
                variant: *variant,
                order: variant.order_by(spec.field_name.clone()),
            };
            self.scopes.insert(key, scope);
        }
        self.fields.insert(spec.field_name, spec.storage_type);
        Ok(())
    }

    /// Freeze into a read-only registry.
    pub fn freeze(self) -> SortRegistry {
        debug!(fields = self.fields.len(), scopes = self.scopes.len(), "Sort registry frozen");
        SortRegistry {
            fields: self.fields,
            scopes: self.scopes,
        }
    }
}

/// Frozen table of ordering keys for one entity type.
#[derive(Debug, Clone, Default)]
pub struct SortRegistry {
    fields: IndexMap<SmolStr, StorageType>,
    scopes: IndexMap<SmolStr, SortScope>,
}

impl SortRegistry {
    /// Start a new registry.
    pub fn builder() -> SortRegistryBuilder {
        SortRegistryBuilder::default()
    }

    /// Reopen as a builder seeded with these registrations.
    pub fn to_builder(&self) -> SortRegistryBuilder {
        SortRegistryBuilder {
            fields: self.fields.clone(),
            scopes: self.scopes.clone(),
        }
    }

    /// Check a fully-qualified ordering key.
    pub fn is_registered_scope(&self, key: &str) -> bool {
        self.scopes.contains_key(key)
    }

    /// Look up an ordering key.
    pub fn resolve(&self, key: &str) -> Option<&SortScope> {
        self.scopes.get(key)
    }

    /// Check if a field has orderings.
    pub fn is_registered(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Every ordering key, in registration order.
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scopes.keys().map(SmolStr::as_str)
    }

    /// Registered fields, in registration order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(SmolStr::as_str)
    }

    /// Number of ordering keys.
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Check if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}
