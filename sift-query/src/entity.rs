//! Entity types: a table schema plus its frozen predicate and sort registries.
//!
//! Entity types are defined once, at startup, with an [`EntityBuilder`].
//! [`EntityBuilder::build`] freezes the registries; from then on an
//! [`EntityType`] is read-only and can be shared across threads behind an
//! `Arc` without locking.
//!
//! ```rust
//! use serde_json::json;
//! use sift_query::{EntityType, QueryRequest, SiftConfig, StorageType, TableSchema};
//!
//! let schema = TableSchema::new("articles")
//!     .unwrap()
//!     .column("title", StorageType::String)
//!     .unwrap()
//!     .nullable_column("view_count", StorageType::Numeric)
//!     .unwrap()
//!     .column("api_token", StorageType::String)
//!     .unwrap();
//!
//! let article = EntityType::builder("Article", schema)
//!     .register_field("title", StorageType::String)
//!     .unwrap()
//!     .register_field("view_count", StorageType::Numeric)
//!     .unwrap()
//!     .register_predicate("api_token", StorageType::String)
//!     .unwrap()
//!     .build();
//!
//! // Credential-like columns never show up in introspection.
//! assert_eq!(article.searchable_fields(), ["title", "view_count"]);
//!
//! let plan = article
//!     .compile(
//!         &QueryRequest::new().filter("view_count_gte", 50).sort("view_count:desc_nulls_last"),
//!         &SiftConfig::default(),
//!     )
//!     .unwrap();
//! assert_eq!(plan.and_clauses.len(), 1);
//! assert_eq!(plan.order_clauses.len(), 1);
//! ```

use std::sync::Arc;

use smol_str::SmolStr;
use tracing::debug;

use crate::compiler::QueryCompiler;
use crate::config::SiftConfig;
use crate::error::{QueryError, QueryResult};
use crate::executor::{QueryExecutor, Records};
use crate::plan::CompiledPlan;
use crate::predicate::{PredicateRegistry, PredicateRegistryBuilder};
use crate::request::QueryRequest;
use crate::schema::{StorageType, TableSchema, is_sensitive};
use crate::sort::{SortRegistry, SortRegistryBuilder};

/// A queryable entity type.
#[derive(Debug, Clone)]
pub struct EntityType {
    name: SmolStr,
    parent: Option<SmolStr>,
    schema: TableSchema,
    predicates: PredicateRegistry,
    sorts: SortRegistry,
}

impl EntityType {
    /// Start defining an entity type stored in `schema`'s table.
    pub fn builder(name: impl Into<SmolStr>, schema: TableSchema) -> EntityBuilder {
        EntityBuilder {
            name: name.into(),
            parent: None,
            schema,
            predicates: PredicateRegistry::builder(),
            sorts: SortRegistry::builder(),
        }
    }

    /// Start defining a subtype of `parent`.
    ///
    /// The subtype inherits every registration and the schema. Whatever it
    /// adds stays with the subtype; `parent` is never modified.
    pub fn extend(parent: &EntityType, name: impl Into<SmolStr>) -> EntityBuilder {
        EntityBuilder {
            name: name.into(),
            parent: Some(parent.name.clone()),
            schema: parent.schema.clone(),
            predicates: parent.predicates.to_builder(),
            sorts: parent.sorts.to_builder(),
        }
    }

    /// The entity type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The supertype's name, for subtypes.
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// The table records live in.
    pub fn table(&self) -> &str {
        self.schema.table()
    }

    /// The physical schema.
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// The frozen predicate registry.
    pub fn predicates(&self) -> &PredicateRegistry {
        &self.predicates
    }

    /// The frozen sort registry.
    pub fn sorts(&self) -> &SortRegistry {
        &self.sorts
    }

    /// A compiler over this type's registries.
    pub fn compiler<'a>(&'a self, config: &'a SiftConfig) -> QueryCompiler<'a> {
        QueryCompiler::new(&self.predicates, &self.sorts, config).with_entity(&self.name)
    }

    /// Compile a request into a plan.
    pub fn compile(&self, request: &QueryRequest, config: &SiftConfig) -> QueryResult<CompiledPlan> {
        self.compiler(config).compile(request)
    }

    /// Compile a request and bind it to an executor.
    ///
    /// Compilation errors surface here; nothing touches the store until the
    /// returned [`Records`] is consumed.
    pub fn search<'e>(
        &self,
        executor: &'e dyn QueryExecutor,
        request: &QueryRequest,
        config: &SiftConfig,
    ) -> QueryResult<Records<'e>> {
        let plan = self.compile(request, config)?;
        Ok(Records::new(executor, self.schema.table(), plan))
    }

    /// Fields with registered predicates, sensitive ones excluded.
    pub fn searchable_fields(&self) -> Vec<&str> {
        self.predicates
            .iter()
            .filter(|entry| !entry.field.sensitive)
            .map(|entry| entry.field.field_name.as_str())
            .collect()
    }

    /// Fields with registered orderings, sensitive ones excluded.
    pub fn sortable_fields(&self) -> Vec<&str> {
        self.sorts.fields().filter(|f| !is_sensitive(f)).collect()
    }

    /// Every ordering key, sensitive fields excluded.
    pub fn sort_scopes(&self) -> Vec<&str> {
        self.sorts
            .scopes()
            .filter(|key| {
                self.sorts
                    .resolve(key)
                    .is_some_and(|scope| !is_sensitive(&scope.field))
            })
            .collect()
    }

    /// Every accepted predicate key, sensitive fields excluded.
    pub fn predicate_keys(&self) -> Vec<String> {
        self.predicates
            .iter()
            .filter(|entry| !entry.field.sensitive)
            .flat_map(|entry| {
                entry
                    .kinds
                    .iter()
                    .map(move |kind| format!("{}_{}", entry.field.field_name, kind.suffix()))
            })
            .collect()
    }
}

/// Defines an entity type. Registrations are append-only.
#[derive(Debug, Clone)]
pub struct EntityBuilder {
    name: SmolStr,
    parent: Option<SmolStr>,
    schema: TableSchema,
    predicates: PredicateRegistryBuilder,
    sorts: SortRegistryBuilder,
}

impl EntityBuilder {
    /// Add a NOT NULL column the subtype stores.
    pub fn with_column(self, name: &str, storage_type: StorageType) -> QueryResult<Self> {
        self.add_column(name, storage_type, false)
    }

    /// Add a nullable column the subtype stores.
    pub fn with_nullable_column(self, name: &str, storage_type: StorageType) -> QueryResult<Self> {
        self.add_column(name, storage_type, true)
    }

    fn add_column(mut self, name: &str, storage_type: StorageType, nullable: bool) -> QueryResult<Self> {
        if self.schema.has_column(name) {
            return Err(QueryError::invalid_configuration(format!(
                "Column `{}` already exists on {}",
                name,
                self.schema.table()
            ))
            .with_entity(self.name.as_str()));
        }
        self.schema = if nullable {
            self.schema.nullable_column(name, storage_type)?
        } else {
            self.schema.column(name, storage_type)?
        };
        Ok(self)
    }

    /// Allow filtering on `field`.
    pub fn register_predicate(mut self, field: &str, storage_type: StorageType) -> QueryResult<Self> {
        self.predicates
            .register(&self.schema, field, storage_type)
            .map_err(|e| e.with_entity(self.name.as_str()))?;
        Ok(self)
    }

    /// Allow ordering by `field`.
    pub fn register_sort(mut self, field: &str, storage_type: StorageType) -> QueryResult<Self> {
        self.sorts
            .register(&self.schema, field, storage_type)
            .map_err(|e| e.with_entity(self.name.as_str()))?;
        Ok(self)
    }

    /// Allow both filtering and ordering on `field`.
    pub fn register_field(self, field: &str, storage_type: StorageType) -> QueryResult<Self> {
        self.register_predicate(field, storage_type)?
            .register_sort(field, storage_type)
    }

    /// Freeze the registries.
    pub fn build(self) -> Arc<EntityType> {
        let predicates = self.predicates.freeze();
        let sorts = self.sorts.freeze();
        debug!(
            entity = %self.name,
            parent = ?self.parent,
            predicates = predicates.len(),
            sort_scopes = sorts.len(),
            "Entity type defined"
        );
        Arc::new(EntityType {
            name: self.name,
            parent: self.parent,
            schema: self.schema,
            predicates,
            sorts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use pretty_assertions::assert_eq;

    fn article() -> Arc<EntityType> {
        let schema = TableSchema::new("articles")
            .unwrap()
            .column("title", StorageType::String)
            .unwrap()
            .nullable_column("view_count", StorageType::Numeric)
            .unwrap()
            .column("password_digest", StorageType::String)
            .unwrap();
        EntityType::builder("Article", schema)
            .register_field("title", StorageType::String)
            .unwrap()
            .register_field("view_count", StorageType::Numeric)
            .unwrap()
            .register_field("password_digest", StorageType::String)
            .unwrap()
            .build()
    }

    #[test]
    fn test_registration_fails_fast() {
        let schema = TableSchema::new("articles")
            .unwrap()
            .column("title", StorageType::String)
            .unwrap();

        let err = EntityType::builder("Article", schema.clone())
            .register_predicate("subtitle", StorageType::String)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownColumn);
        assert_eq!(err.context.entity.as_deref(), Some("Article"));
        assert!(err.is_configuration());

        let err = EntityType::builder("Article", schema)
            .register_sort("title", StorageType::Numeric)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::StorageTypeMismatch);
    }

    #[test]
    fn test_registration_is_idempotent() {
        let schema = TableSchema::new("t").unwrap().column("a", StorageType::Numeric).unwrap();
        let entity = EntityType::builder("T", schema)
            .register_field("a", StorageType::Numeric)
            .unwrap()
            .register_field("a", StorageType::Numeric)
            .unwrap()
            .build();
        assert_eq!(entity.predicates().len(), 1);
        assert_eq!(entity.sorts().len(), 6);
    }

    #[test]
    fn test_introspection_hides_sensitive_fields() {
        let article = article();
        assert_eq!(article.searchable_fields(), vec!["title", "view_count"]);
        assert_eq!(article.sortable_fields(), vec!["title", "view_count"]);
        assert!(article.sort_scopes().iter().all(|s| !s.starts_with("password")));
        assert!(article.sort_scopes().contains(&"view_count:desc_nulls_last"));
        assert!(article.predicate_keys().contains(&"title_i_contains".to_string()));
        assert!(!article.predicate_keys().iter().any(|k| k.starts_with("password")));

        // Still registered, so still queryable.
        assert!(article.predicates().is_registered("password_digest"));
    }

    #[test]
    fn test_subtype_does_not_leak_into_parent() {
        let article = article();
        let video = EntityType::extend(&article, "Video")
            .with_nullable_column("duration", StorageType::Numeric)
            .unwrap()
            .register_field("duration", StorageType::Numeric)
            .unwrap()
            .build();

        assert_eq!(video.parent(), Some("Article"));
        assert_eq!(video.table(), "articles");
        assert!(video.predicates().is_registered("title"));
        assert!(video.sorts().is_registered_scope("duration:asc_nulls_first"));

        assert!(!article.predicates().is_registered("duration"));
        assert!(!article.sorts().is_registered_scope("duration:asc"));
        assert!(!article.schema().has_column("duration"));
    }

    #[test]
    fn test_with_column_refuses_duplicates() {
        let err = EntityType::extend(&article(), "Video")
            .with_column("title", StorageType::Text)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfiguration);
    }

    #[test]
    fn test_concurrent_compilation() {
        let article = article();
        let config = Arc::new(SiftConfig::default());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let article = Arc::clone(&article);
                let config = Arc::clone(&config);
                std::thread::spawn(move || {
                    let request = QueryRequest::new()
                        .filter("view_count_gt", i)
                        .sort("title:asc_case_insensitive");
                    article.compile(&request, &config).unwrap()
                })
            })
            .collect();
        for handle in handles {
            let plan = handle.join().unwrap();
            assert_eq!(plan.and_clauses.len(), 1);
            assert_eq!(plan.order_clauses.len(), 1);
        }
    }
}
