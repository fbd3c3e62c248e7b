//! Predicate kinds and the per-entity predicate registry.
//!
//! A predicate key is a registered field name joined to a predicate suffix by
//! an underscore: `title_contains`, `view_count_gte`, `published_at_null`.
//! Field names may contain underscores themselves, so keys are never split on
//! `_`. [`PredicateRegistry::parse_key`] instead tries every known suffix and
//! accepts the first one whose remaining prefix is a registered field that
//! allows that predicate.
//!
//! ```rust
//! use sift_query::{PredicateKind, PredicateRegistry, StorageType, TableSchema};
//!
//! let schema = TableSchema::new("articles")
//!     .unwrap()
//!     .column("title", StorageType::String)
//!     .unwrap();
//!
//! let mut builder = PredicateRegistry::builder();
//! builder.register(&schema, "title", StorageType::String).unwrap();
//! let registry = builder.freeze();
//!
//! let (field, kind) = registry.parse_key("title_i_contains").unwrap();
//! assert_eq!(field.field_name, "title");
//! assert_eq!(kind, PredicateKind::IContains);
//! assert!(registry.parse_key("title_matches").is_none());
//! ```

use std::fmt;

use indexmap::IndexMap;
use smol_str::SmolStr;
use tracing::debug;

use crate::error::QueryResult;
use crate::sanitize::PatternPosition;
use crate::schema::{FieldSpec, StorageType, TableSchema};

/// The operator identity of a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PredicateKind {
    /// `= value`
    Eq,
    /// `<> value`
    NotEq,
    /// Case-insensitive equality.
    IEq,
    /// `< value`
    Lt,
    /// `<= value`
    Lte,
    /// `> value`
    Gt,
    /// `>= value`
    Gte,
    /// `BETWEEN low AND high`
    Between,
    /// `NOT BETWEEN low AND high`
    NotBetween,
    /// `IN (...)`
    In,
    /// `NOT IN (...)`
    NotIn,
    /// Substring match.
    Contains,
    /// Prefix match.
    StartsWith,
    /// Suffix match.
    EndsWith,
    /// Case-insensitive substring match.
    IContains,
    /// Case-insensitive prefix match.
    IStartsWith,
    /// Case-insensitive suffix match.
    IEndsWith,
    /// Not null and not only whitespace.
    Present,
    /// Null or only whitespace.
    Blank,
    /// `IS NULL`
    Null,
    /// `IS NOT NULL`
    NotNull,
}

/// The shape of value a predicate kind expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandShape {
    /// One value of the field's type.
    Scalar,
    /// One string, turned into a LIKE pattern.
    Pattern,
    /// Exactly two values of the field's type.
    Range,
    /// A non-empty list of values of the field's type.
    List,
    /// A boolean switching the predicate on (`true`) or to its negation.
    Flag,
}

impl PredicateKind {
    /// Every kind, in declaration order.
    pub const ALL: [PredicateKind; 21] = [
        Self::Eq,
        Self::NotEq,
        Self::IEq,
        Self::Lt,
        Self::Lte,
        Self::Gt,
        Self::Gte,
        Self::Between,
        Self::NotBetween,
        Self::In,
        Self::NotIn,
        Self::Contains,
        Self::StartsWith,
        Self::EndsWith,
        Self::IContains,
        Self::IStartsWith,
        Self::IEndsWith,
        Self::Present,
        Self::Blank,
        Self::Null,
        Self::NotNull,
    ];

    /// The key suffix naming this predicate.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::NotEq => "not_eq",
            Self::IEq => "i_eq",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Between => "between",
            Self::NotBetween => "not_between",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::Contains => "contains",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::IContains => "i_contains",
            Self::IStartsWith => "i_starts_with",
            Self::IEndsWith => "i_ends_with",
            Self::Present => "present",
            Self::Blank => "blank",
            Self::Null => "null",
            Self::NotNull => "not_null",
        }
    }

    /// Look up a kind by its suffix.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.suffix() == suffix)
    }

    /// What value this kind expects.
    pub fn operand_shape(&self) -> OperandShape {
        match self {
            Self::Between | Self::NotBetween => OperandShape::Range,
            Self::In | Self::NotIn => OperandShape::List,
            Self::Contains
            | Self::StartsWith
            | Self::EndsWith
            | Self::IContains
            | Self::IStartsWith
            | Self::IEndsWith => OperandShape::Pattern,
            Self::Present | Self::Blank | Self::Null | Self::NotNull => OperandShape::Flag,
            _ => OperandShape::Scalar,
        }
    }

    /// Wildcard placement for pattern kinds.
    pub fn pattern_position(&self) -> Option<PatternPosition> {
        match self {
            Self::Contains | Self::IContains => Some(PatternPosition::Contains),
            Self::StartsWith | Self::IStartsWith => Some(PatternPosition::StartsWith),
            Self::EndsWith | Self::IEndsWith => Some(PatternPosition::EndsWith),
            _ => None,
        }
    }

    /// The kind selected by a `false` flag.
    pub fn negated(&self) -> Option<Self> {
        match self {
            Self::Present => Some(Self::Blank),
            Self::Blank => Some(Self::Present),
            Self::Null => Some(Self::NotNull),
            Self::NotNull => Some(Self::Null),
            _ => None,
        }
    }

    /// Whether this kind is legal on a field.
    pub fn applies_to(&self, field: &FieldSpec) -> bool {
        let ty = field.storage_type;
        match self {
            Self::Eq | Self::NotEq => true,
            Self::Lt | Self::Lte | Self::Gt | Self::Gte | Self::Between | Self::NotBetween => {
                ty.is_ordered()
            }
            Self::In | Self::NotIn => ty != StorageType::Boolean,
            Self::IEq
            | Self::Contains
            | Self::StartsWith
            | Self::EndsWith
            | Self::IContains
            | Self::IStartsWith
            | Self::IEndsWith
            | Self::Present
            | Self::Blank => ty.is_textual(),
            Self::Null | Self::NotNull => field.nullable,
        }
    }
}

impl fmt::Display for PredicateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// A set of predicate kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PredicateSet(u32);

impl PredicateSet {
    /// The empty set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Every kind legal on `field`.
    pub fn for_field(field: &FieldSpec) -> Self {
        PredicateKind::ALL
            .into_iter()
            .filter(|kind| kind.applies_to(field))
            .collect()
    }

    /// Check membership.
    pub fn contains(&self, kind: PredicateKind) -> bool {
        self.0 & Self::bit(kind) != 0
    }

    /// Add a kind.
    pub fn insert(&mut self, kind: PredicateKind) {
        self.0 |= Self::bit(kind);
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Number of kinds in the set.
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterate in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = PredicateKind> + '_ {
        PredicateKind::ALL.into_iter().filter(|kind| self.contains(*kind))
    }

    fn bit(kind: PredicateKind) -> u32 {
        1 << kind as u32
    }
}

impl FromIterator<PredicateKind> for PredicateSet {
    fn from_iter<I: IntoIterator<Item = PredicateKind>>(iter: I) -> Self {
        let mut set = Self::empty();
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

/// A registered field and the predicates it allows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateRegistration {
    /// The field.
    pub field: FieldSpec,
    /// Allowed predicate kinds.
    pub kinds: PredicateSet,
}

/// Append-only builder used while an entity type is being defined.
#[derive(Debug, Clone, Default)]
pub struct PredicateRegistryBuilder {
    entries: IndexMap<SmolStr, PredicateRegistration>,
}

impl PredicateRegistryBuilder {
    /// Register a field, deriving its predicates from the storage type.
    ///
    /// Registering the same field again is a no-op.
    pub fn register(
        &mut self,
        schema: &TableSchema,
        field: &str,
        storage_type: StorageType,
    ) -> QueryResult<()> {
        let spec = schema.resolve(field, storage_type)?;
        if self.entries.contains_key(field) {
            return Ok(());
        }
        let kinds = PredicateSet::for_field(&spec);
        self.entries.insert(
            spec.field_name.clone(),
            PredicateRegistration { field: spec, kinds },
        );
        Ok(())
    }

    /// Freeze into a read-only registry.
    pub fn freeze(self) -> PredicateRegistry {
        let mut suffixes: Vec<PredicateKind> = PredicateKind::ALL.to_vec();
        // Longest suffix first, so `not_null` is tried before `null`.
        suffixes.sort_by_key(|kind| std::cmp::Reverse(kind.suffix().len()));
        debug!(fields = self.entries.len(), "Predicate registry frozen");
        PredicateRegistry {
            entries: self.entries,
            suffixes,
        }
    }
}

/// Frozen table of `(field, predicate kind)` pairs for one entity type.
#[derive(Debug, Clone)]
pub struct PredicateRegistry {
    entries: IndexMap<SmolStr, PredicateRegistration>,
    suffixes: Vec<PredicateKind>,
}

impl PredicateRegistry {
    /// Start a new registry.
    pub fn builder() -> PredicateRegistryBuilder {
        PredicateRegistryBuilder::default()
    }

    /// Reopen as a builder seeded with these registrations. The registry
    /// itself is left untouched.
    pub fn to_builder(&self) -> PredicateRegistryBuilder {
        PredicateRegistryBuilder {
            entries: self.entries.clone(),
        }
    }

    /// Allowed predicates for a field; empty when the field is not registered.
    pub fn allowed(&self, field: &str) -> PredicateSet {
        self.entries
            .get(field)
            .map(|entry| entry.kinds)
            .unwrap_or_default()
    }

    /// Check if a field is registered at all.
    pub fn is_registered(&self, field: &str) -> bool {
        self.entries.contains_key(field)
    }

    /// Check a `(field, kind)` pair.
    pub fn is_registered_predicate(&self, field: &str, kind: PredicateKind) -> bool {
        self.allowed(field).contains(kind)
    }

    /// Look up a registration.
    pub fn get(&self, field: &str) -> Option<&PredicateRegistration> {
        self.entries.get(field)
    }

    /// Registrations in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &PredicateRegistration> {
        self.entries.values()
    }

    /// Number of registered fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every accepted predicate key, in registration order.
    pub fn keys(&self) -> Vec<String> {
        self.entries
            .values()
            .flat_map(|entry| {
                entry
                    .kinds
                    .iter()
                    .map(move |kind| format!("{}_{}", entry.field.field_name, kind.suffix()))
            })
            .collect()
    }

    /// Parse a predicate key into a registered field and predicate kind.
    ///
    /// Returns `None` unless the key names a registered pair exactly. When
    /// two splits both name registered pairs the longest suffix wins.
    pub fn parse_key(&self, key: &str) -> Option<(&FieldSpec, PredicateKind)> {
        self.suffixes.iter().find_map(|kind| {
            let field = key
                .strip_suffix(kind.suffix())?
                .strip_suffix('_')
                .filter(|field| !field.is_empty())?;
            let entry = self.entries.get(field)?;
            entry.kinds.contains(*kind).then_some((&entry.field, *kind))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn schema() -> TableSchema {
        TableSchema::new("articles")
            .unwrap()
            .column("title", StorageType::String)
            .unwrap()
            .nullable_column("view_count", StorageType::Numeric)
            .unwrap()
            .nullable_column("published_at", StorageType::DateTime)
            .unwrap()
            .column("featured", StorageType::Boolean)
            .unwrap()
            .nullable_column("is_not", StorageType::String)
            .unwrap()
            .column("is", StorageType::Numeric)
            .unwrap()
    }

    fn registry() -> PredicateRegistry {
        let schema = schema();
        let mut builder = PredicateRegistry::builder();
        builder.register(&schema, "title", StorageType::String).unwrap();
        builder.register(&schema, "view_count", StorageType::Numeric).unwrap();
        builder.register(&schema, "published_at", StorageType::DateTime).unwrap();
        builder.register(&schema, "featured", StorageType::Boolean).unwrap();
        builder.freeze()
    }

    #[test]
    fn test_kinds_follow_storage_type() {
        let registry = registry();

        let title = registry.allowed("title");
        assert!(title.contains(PredicateKind::Contains));
        assert!(title.contains(PredicateKind::IEndsWith));
        assert!(!title.contains(PredicateKind::Gt));
        assert!(!title.contains(PredicateKind::Null));

        let views = registry.allowed("view_count");
        assert!(views.contains(PredicateKind::Gte));
        assert!(views.contains(PredicateKind::Between));
        assert!(views.contains(PredicateKind::Null));
        assert!(!views.contains(PredicateKind::Contains));

        let featured = registry.allowed("featured");
        assert!(featured.contains(PredicateKind::Eq));
        assert!(!featured.contains(PredicateKind::In));
        assert_eq!(featured.len(), 2);
    }

    #[test]
    fn test_unknown_field_is_empty_not_error() {
        let registry = registry();
        assert!(registry.allowed("body").is_empty());
        assert!(!registry.is_registered("body"));
        assert!(!registry.is_registered_predicate("body", PredicateKind::Eq));
    }

    #[test]
    fn test_register_unknown_column_fails_fast() {
        let mut builder = PredicateRegistry::builder();
        let err = builder.register(&schema(), "body", StorageType::Text).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownColumn);
        assert!(err.is_configuration());
    }

    #[test]
    fn test_register_is_idempotent() {
        let schema = schema();
        let mut builder = PredicateRegistry::builder();
        builder.register(&schema, "title", StorageType::String).unwrap();
        builder.register(&schema, "title", StorageType::String).unwrap();
        assert_eq!(builder.freeze().len(), 1);
    }

    #[test]
    fn test_parse_key() {
        let registry = registry();
        let (field, kind) = registry.parse_key("view_count_not_null").unwrap();
        assert_eq!(field.field_name, "view_count");
        assert_eq!(kind, PredicateKind::NotNull);

        let (field, kind) = registry.parse_key("published_at_gte").unwrap();
        assert_eq!(field.field_name, "published_at");
        assert_eq!(kind, PredicateKind::Gte);

        assert!(registry.parse_key("title_gt").is_none());
        assert!(registry.parse_key("title").is_none());
        assert!(registry.parse_key("_eq").is_none());
        assert!(registry.parse_key("delete_all").is_none());
        assert!(registry.parse_key("title_eq; DROP TABLE articles").is_none());
    }

    #[test]
    fn test_parse_key_with_underscored_fields() {
        let schema = schema();
        let mut builder = PredicateRegistry::builder();
        builder.register(&schema, "is_not", StorageType::String).unwrap();
        builder.register(&schema, "is", StorageType::Numeric).unwrap();
        let registry = builder.freeze();

        // `is` + `not_null` is tried first but `is` is NOT NULL, so the key
        // resolves to `is_not` + `null`.
        let (field, kind) = registry.parse_key("is_not_null").unwrap();
        assert_eq!(field.field_name, "is_not");
        assert_eq!(kind, PredicateKind::Null);

        // Both splits are registered pairs; the longest suffix wins.
        let (field, kind) = registry.parse_key("is_not_eq").unwrap();
        assert_eq!(field.field_name, "is");
        assert_eq!(kind, PredicateKind::NotEq);

        let (field, kind) = registry.parse_key("is_not_contains").unwrap();
        assert_eq!(field.field_name, "is_not");
        assert_eq!(kind, PredicateKind::Contains);
    }

    #[test]
    fn test_to_builder_leaves_original() {
        let registry = registry();
        let schema = schema().column("slug", StorageType::String).unwrap();
        let mut builder = registry.to_builder();
        builder.register(&schema, "slug", StorageType::String).unwrap();
        let extended = builder.freeze();

        assert!(extended.is_registered("slug"));
        assert!(extended.is_registered("title"));
        assert!(!registry.is_registered("slug"));
    }

    #[test]
    fn test_keys_listing() {
        let keys = registry().keys();
        assert!(keys.contains(&"title_contains".to_string()));
        assert!(!keys.contains(&"view_count_desc".to_string()));
        assert!(keys.contains(&"published_at_null".to_string()));
    }

    #[test]
    fn test_suffix_round_trip() {
        for kind in PredicateKind::ALL {
            assert_eq!(PredicateKind::from_suffix(kind.suffix()), Some(kind));
        }
    }
}
