//! Configuration for `sift.toml`.
//!
//! ```rust
//! use sift_query::SiftConfig;
//!
//! let config = SiftConfig::from_str(r#"
//!     strict_predicates = true
//!
//!     [pagination]
//!     max_per_page = 50
//!
//!     [limits]
//!     max_or_groups = 10
//! "#).unwrap();
//!
//! assert!(config.is_strict());
//! assert_eq!(config.pagination.max_per_page, 50);
//! assert_eq!(config.pagination.default_per_page, 25);
//! assert_eq!(config.limits.max_or_groups, 10);
//! assert_eq!(config.limits.max_total_predicates, 100);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::QueryError;
use crate::pagination::PaginationLimits;

/// Default ceiling on predicate keys across a request.
pub const DEFAULT_MAX_TOTAL_PREDICATES: usize = 100;
/// Default ceiling on OR-groups.
pub const DEFAULT_MAX_OR_GROUPS: usize = 50;
/// Default ceiling on sort keys.
pub const DEFAULT_MAX_SORT_KEYS: usize = 10;
/// Default ceiling on `in` / `not_in` list members.
pub const DEFAULT_MAX_LIST_VALUES: usize = 500;

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Error reading a file.
    #[error("failed to read config file `{path}`")]
    Io {
        /// The file path.
        path: String,
        /// The I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Invalid TOML.
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    /// Values that parse but make no sense together.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<ConfigError> for QueryError {
    fn from(err: ConfigError) -> Self {
        QueryError::invalid_configuration(err.to_string()).with_source(err)
    }
}

/// Resource ceilings enforced before any key is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompileLimits {
    /// Predicate keys across the top level and all OR-groups.
    #[serde(default = "default_max_total_predicates")]
    pub max_total_predicates: usize,
    /// OR-groups per request.
    #[serde(default = "default_max_or_groups")]
    pub max_or_groups: usize,
    /// Sort keys per request.
    #[serde(default = "default_max_sort_keys")]
    pub max_sort_keys: usize,
    /// Members of a single `in` / `not_in` list.
    #[serde(default = "default_max_list_values")]
    pub max_list_values: usize,
}

fn default_max_total_predicates() -> usize {
    DEFAULT_MAX_TOTAL_PREDICATES
}

fn default_max_or_groups() -> usize {
    DEFAULT_MAX_OR_GROUPS
}

fn default_max_sort_keys() -> usize {
    DEFAULT_MAX_SORT_KEYS
}

fn default_max_list_values() -> usize {
    DEFAULT_MAX_LIST_VALUES
}

impl Default for CompileLimits {
    fn default() -> Self {
        Self {
            max_total_predicates: DEFAULT_MAX_TOTAL_PREDICATES,
            max_or_groups: DEFAULT_MAX_OR_GROUPS,
            max_sort_keys: DEFAULT_MAX_SORT_KEYS,
            max_list_values: DEFAULT_MAX_LIST_VALUES,
        }
    }
}

/// Process-wide settings consumed by the compiler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiftConfig {
    /// Fail on unknown predicate and sort keys instead of dropping them.
    #[serde(default)]
    pub strict_predicates: bool,

    /// Global strict mode: every recoverable condition becomes a failure.
    #[serde(default)]
    pub strict_mode: bool,

    /// Page size and page-number limits.
    #[serde(default)]
    pub pagination: PaginationLimits,

    /// Request-size ceilings.
    #[serde(default)]
    pub limits: CompileLimits,
}

impl SiftConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string, expanding `${ENV_VAR}`s first.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(content);
        let config: Self = toml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Strict behavior applies when either flag is set.
    pub fn is_strict(&self) -> bool {
        self.strict_mode || self.strict_predicates
    }

    /// Turn strict predicate handling on or off.
    pub fn with_strict_predicates(mut self, strict: bool) -> Self {
        self.strict_predicates = strict;
        self
    }

    /// Replace the request-size ceilings.
    pub fn with_limits(mut self, limits: CompileLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Replace the pagination limits.
    pub fn with_pagination(mut self, pagination: PaginationLimits) -> Self {
        self.pagination = pagination;
        self
    }

    /// Check that the limits are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.pagination;
        if p.max_per_page == 0 || p.default_per_page == 0 {
            return Err(ConfigError::Invalid("page sizes must be at least 1".into()));
        }
        if p.default_per_page > p.max_per_page {
            return Err(ConfigError::Invalid(format!(
                "default_per_page ({}) exceeds max_per_page ({})",
                p.default_per_page, p.max_per_page
            )));
        }
        if p.max_page == 0 || p.max_page > i64::MAX as u64 {
            return Err(ConfigError::Invalid(format!(
                "max_page must be between 1 and {}",
                i64::MAX
            )));
        }
        if self.limits.max_total_predicates == 0 || self.limits.max_list_values == 0 {
            return Err(ConfigError::Invalid(
                "max_total_predicates and max_list_values must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Expand environment variables in the format `${VAR_NAME}`.
fn expand_env_vars(content: &str) -> String {
    let mut result = content.to_string();
    let Ok(re) = regex_lite::Regex::new(r"\$\{([^}]+)\}") else {
        return result;
    };

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        let full_match = &cap[0];

        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(full_match, &value);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SiftConfig::default();
        assert!(!config.is_strict());
        assert_eq!(config.pagination.default_per_page, 25);
        assert_eq!(config.pagination.max_per_page, 100);
        assert_eq!(config.pagination.max_page, 10_000);
        assert_eq!(config.limits.max_total_predicates, 100);
        assert_eq!(config.limits.max_or_groups, 50);
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(SiftConfig::from_str("").unwrap(), SiftConfig::default());
    }

    #[test]
    fn test_strict_mode_implies_strict() {
        let config = SiftConfig::from_str("strict_mode = true").unwrap();
        assert!(config.is_strict());
        assert!(!config.strict_predicates);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(matches!(
            SiftConfig::from_str("max_predicates = 3"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_inconsistent_limits_rejected() {
        let err = SiftConfig::from_str(
            r#"
            [pagination]
            default_per_page = 200
            max_per_page = 100
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let query_err: QueryError = err.into();
        assert!(query_err.is_configuration());
    }

    #[test]
    fn test_env_var_expansion() {
        // SAFETY: the variable name is unique to this test.
        unsafe {
            std::env::set_var("SIFT_TEST_MAX_OR_GROUPS", "7");
        }
        let config = SiftConfig::from_str(
            r#"
            [limits]
            max_or_groups = ${SIFT_TEST_MAX_OR_GROUPS}
            "#,
        )
        .unwrap();
        assert_eq!(config.limits.max_or_groups, 7);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[limits]\nmax_sort_keys = 3").unwrap();
        let config = SiftConfig::from_file(file.path()).unwrap();
        assert_eq!(config.limits.max_sort_keys, 3);

        assert!(matches!(
            SiftConfig::from_file("/nonexistent/sift.toml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
