//! Error types for registration, compilation and execution.
//!
//! Every caller-facing failure carries an [`ErrorCode`], and every code belongs
//! to exactly one [`ErrorKind`]. Compilation only ever produces the first
//! three kinds, so callers can tell "malformed or oversized" apart from
//! "unsupported predicate" and "page out of range".
//!
//! # Error Codes
//!
//! Error codes follow a pattern: S{category}{number}
//! - 1xxx: Invalid predicate or sort keys
//! - 2xxx: Pagination limits
//! - 7xxx: Configuration errors and malformed or oversized requests
//! - 9xxx: Execution and internal errors
//!
//! ```rust
//! use sift_query::{ErrorCode, ErrorKind, QueryError};
//!
//! let err = QueryError::unknown_predicate("title_matches_regex");
//! assert_eq!(err.code, ErrorCode::UnknownPredicate);
//! assert_eq!(err.kind(), ErrorKind::InvalidPredicate);
//! assert!(err.to_string().contains("title_matches_regex"));
//! ```

use std::fmt;
use thiserror::Error;

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Predicate errors (1xxx)
    /// Predicate key does not name a registered field/predicate pair (S1001).
    UnknownPredicate = 1001,
    /// Sort key does not name a registered ordering (S1002).
    UnknownSort = 1002,

    // Pagination errors (2xxx)
    /// Page number is zero, negative or above the configured ceiling (S2001).
    PageOutOfRange = 2001,
    /// The computed offset does not fit the offset type (S2002).
    OffsetOverflow = 2002,

    // Configuration errors (7xxx)
    /// Input is not a mapping or the envelope has an unexpected shape (S7001).
    InvalidRequestShape = 7001,
    /// Input came from a parameter boundary and was never permitted (S7002).
    UnpermittedInput = 7002,
    /// Too many predicate keys across the request (S7003).
    TooManyPredicates = 7003,
    /// Too many OR-groups (S7004).
    TooManyOrGroups = 7004,
    /// Too many sort keys (S7005).
    TooManySortKeys = 7005,
    /// Operand does not fit the predicate or the field type (S7006).
    InvalidValue = 7006,
    /// Registration names a column absent from the schema (S7007).
    UnknownColumn = 7007,
    /// Registration storage type disagrees with the schema (S7008).
    StorageTypeMismatch = 7008,
    /// Invalid configuration values or file (S7009).
    InvalidConfiguration = 7009,

    // Execution errors (9xxx)
    /// The underlying store reported an error (S9001).
    DatabaseError = 9001,
    /// Internal error (S9002).
    Internal = 9002,
}

/// The coarse category an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or oversized request, or a bad definition. Always terminal.
    Configuration,
    /// Unknown field, predicate kind or sort key.
    InvalidPredicate,
    /// Page number beyond the safety ceiling. Always terminal.
    InvalidPagination,
    /// Failure inside an executor adapter.
    Execution,
}

impl ErrorCode {
    /// Get the error code string (e.g., "S1001").
    pub fn code(&self) -> String {
        format!("S{}", *self as u16)
    }

    /// Get the kind this code belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownPredicate | Self::UnknownSort => ErrorKind::InvalidPredicate,
            Self::PageOutOfRange | Self::OffsetOverflow => ErrorKind::InvalidPagination,
            Self::DatabaseError | Self::Internal => ErrorKind::Execution,
            _ => ErrorKind::Configuration,
        }
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::UnknownPredicate => "Unknown predicate",
            Self::UnknownSort => "Unknown sort key",
            Self::PageOutOfRange => "Page out of range",
            Self::OffsetOverflow => "Offset overflow",
            Self::InvalidRequestShape => "Invalid request shape",
            Self::UnpermittedInput => "Unpermitted input",
            Self::TooManyPredicates => "Too many predicates",
            Self::TooManyOrGroups => "Too many OR-groups",
            Self::TooManySortKeys => "Too many sort keys",
            Self::InvalidValue => "Invalid predicate value",
            Self::UnknownColumn => "Unknown column",
            Self::StorageTypeMismatch => "Storage type mismatch",
            Self::InvalidConfiguration => "Invalid configuration",
            Self::DatabaseError => "Database error",
            Self::Internal => "Internal error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Additional context for an error.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The entity type involved.
    pub entity: Option<String>,
    /// The offending key (predicate key, sort key or envelope key).
    pub key: Option<String>,
    /// Suggestions for fixing the error.
    pub suggestions: Vec<String>,
    /// Help text.
    pub help: Option<String>,
}

/// Errors that can occur while defining entity types, compiling or executing queries.
#[derive(Error, Debug)]
pub struct QueryError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// Additional context.
    pub context: ErrorContext,
    /// The source error (if any).
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl QueryError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Set the entity type name.
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.context.entity = Some(entity.into());
        self
    }

    /// Set the offending key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.context.key = Some(key.into());
        self
    }

    /// Add a suggestion for fixing the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context.suggestions.push(suggestion.into());
        self
    }

    /// Add help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.context.help = Some(help.into());
        self
    }

    /// Set the source error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // ============== Constructor Functions ==============

    /// A predicate key that matches no registered field/predicate pair.
    pub fn unknown_predicate(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(
            ErrorCode::UnknownPredicate,
            format!("Invalid predicate `{}`: no registered field/predicate pair matches", key),
        )
        .with_key(&key)
        .with_suggestion("Use one of the predicate keys registered for this entity type")
    }

    /// A sort key that matches no registered ordering.
    pub fn unknown_sort(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(
            ErrorCode::UnknownSort,
            format!("Invalid sort key `{}`: no registered ordering matches", key),
        )
        .with_key(&key)
        .with_suggestion("Sort keys have the form `<field>:<variant>`, e.g. `title:asc`")
    }

    /// A page number outside `1..=ceiling`.
    pub fn page_out_of_range(page: i64, ceiling: u64) -> Self {
        Self::new(
            ErrorCode::PageOutOfRange,
            format!("Invalid page {}: pages must be between 1 and {}", page, ceiling),
        )
        .with_key("page")
        .with_help("Deep offset pagination is capped; narrow the result set with filters instead")
    }

    /// The offset computed from page and page size overflowed.
    pub fn offset_overflow(page: u64, per_page: u64) -> Self {
        Self::new(
            ErrorCode::OffsetOverflow,
            format!("Invalid pagination: page {} with {} per page overflows the offset", page, per_page),
        )
        .with_key("page")
    }

    /// The request, or part of it, has the wrong shape.
    pub fn invalid_shape(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequestShape, message.into())
    }

    /// Input from a parameter boundary that was never permitted.
    pub fn unpermitted(what: impl Into<String>) -> Self {
        let what = what.into();
        Self::new(
            ErrorCode::UnpermittedInput,
            format!("Refusing to compile unpermitted {}", what),
        )
        .with_suggestion("Call `permit()` on the parameters once they have been filtered")
    }

    /// More predicate keys than the configured ceiling.
    pub fn too_many_predicates(count: usize, max: usize) -> Self {
        Self::new(
            ErrorCode::TooManyPredicates,
            format!("Query has {} predicates, the maximum is {}", count, max),
        )
    }

    /// More OR-groups than the configured ceiling.
    pub fn too_many_or_groups(count: usize, max: usize) -> Self {
        Self::new(
            ErrorCode::TooManyOrGroups,
            format!("Query has {} OR-groups, the maximum is {}", count, max),
        )
    }

    /// More sort keys than the configured ceiling.
    pub fn too_many_sort_keys(count: usize, max: usize) -> Self {
        Self::new(
            ErrorCode::TooManySortKeys,
            format!("Query has {} sort keys, the maximum is {}", count, max),
        )
    }

    /// An operand that does not fit its predicate.
    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(
            ErrorCode::InvalidValue,
            format!("Invalid value for `{}`: {}", key, message.into()),
        )
        .with_key(&key)
    }

    /// A registration naming a column the schema does not have.
    pub fn unknown_column(entity: impl Into<String>, field: impl Into<String>) -> Self {
        let entity = entity.into();
        let field = field.into();
        Self::new(
            ErrorCode::UnknownColumn,
            format!("Cannot register `{}` on {}: no such column", field, entity),
        )
        .with_entity(&entity)
        .with_key(&field)
    }

    /// A registration whose storage type contradicts the schema.
    pub fn storage_type_mismatch(
        entity: impl Into<String>,
        field: impl Into<String>,
        declared: impl fmt::Display,
        actual: impl fmt::Display,
    ) -> Self {
        let entity = entity.into();
        let field = field.into();
        Self::new(
            ErrorCode::StorageTypeMismatch,
            format!(
                "Cannot register `{}` on {} as {}: the column is {}",
                field, entity, declared, actual
            ),
        )
        .with_entity(&entity)
        .with_key(&field)
    }

    /// Invalid configuration values.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfiguration, message.into())
    }

    /// A failure reported by the store.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, format!("Internal error: {}", message.into()))
    }

    // ============== Error Checks ==============

    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    /// Check if this is a configuration error.
    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }

    /// Check if this is an invalid predicate (or sort key) error.
    pub fn is_invalid_predicate(&self) -> bool {
        self.kind() == ErrorKind::InvalidPredicate
    }

    /// Check if this is an invalid pagination error.
    pub fn is_invalid_pagination(&self) -> bool {
        self.kind() == ErrorKind::InvalidPagination
    }

    /// Display the full error with context and suggestions.
    pub fn display_full(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Error [{}]: {}\n", self.code.code(), self.message));

        if let Some(ref entity) = self.context.entity {
            output.push_str(&format!("  → Entity: {}\n", entity));
        }
        if let Some(ref key) = self.context.key {
            output.push_str(&format!("  → Key: {}\n", key));
        }

        if !self.context.suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for (i, suggestion) in self.context.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }

        if let Some(ref help) = self.context.help {
            output.push_str(&format!("\nHelp: {}\n", help));
        }

        output
    }
}
