//! Untrusted query requests.
//!
//! A [`QueryRequest`] carries caller input exactly as it arrived: predicate
//! maps, OR-group maps, sort keys and page numbers. Nothing here is
//! validated against a registry; that is the compiler's job. What the
//! request does keep is where each map came from, so that input from a
//! parameter boundary that was never permitted can be refused.
//!
//! ```rust
//! use serde_json::json;
//! use sift_query::{Params, QueryRequest};
//!
//! let params = Params::new(json!({
//!     "filters": { "title_contains": "rust" },
//!     "or": [{ "view_count_gte": 100 }, { "featured_eq": true }],
//!     "sort": "view_count:desc, title:asc",
//!     "page": "2",
//! }));
//!
//! // Parameters must be permitted before they can be turned into a request.
//! assert!(QueryRequest::from_envelope(&params).is_err());
//!
//! let request = QueryRequest::from_envelope(&params.permit()).unwrap();
//! assert_eq!(request.or_group_count(), 2);
//! assert_eq!(request.sort_keys(), ["view_count:desc", "title:asc"]);
//! assert_eq!(request.page_number(), Some(2));
//! ```

use std::borrow::Cow;

use serde_json::{Map, Value};

use crate::error::{QueryError, QueryResult};

/// Envelope key holding the top-level predicate map.
pub const FILTERS_KEY: &str = "filters";
/// Envelope key holding the OR-group list.
pub const OR_KEY: &str = "or";
/// Envelope key holding sort keys.
pub const SORT_KEY: &str = "sort";
/// Envelope key holding the page number.
pub const PAGE_KEY: &str = "page";
/// Envelope key holding the page size.
pub const PER_PAGE_KEY: &str = "per_page";

/// Whether an input may be compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// Input with no permitted/unpermitted distinction (plain maps).
    Inherent,
    /// Boundary input that has been explicitly permitted.
    Permitted,
    /// Boundary input that has not been permitted.
    Unpermitted,
}

impl Permission {
    /// Whether the input may be used.
    pub fn allows_use(&self) -> bool {
        !matches!(self, Self::Unpermitted)
    }
}

/// Something a request can be built from.
pub trait InputSource {
    /// The permission status of this input.
    fn permission(&self) -> Permission;

    /// The raw value.
    fn as_value(&self) -> Cow<'_, Value>;
}

impl InputSource for Value {
    fn permission(&self) -> Permission {
        Permission::Inherent
    }

    fn as_value(&self) -> Cow<'_, Value> {
        Cow::Borrowed(self)
    }
}

impl InputSource for Map<String, Value> {
    fn permission(&self) -> Permission {
        Permission::Inherent
    }

    fn as_value(&self) -> Cow<'_, Value> {
        Cow::Owned(Value::Object(self.clone()))
    }
}

impl<T: InputSource + ?Sized> InputSource for &T {
    fn permission(&self) -> Permission {
        (**self).permission()
    }

    fn as_value(&self) -> Cow<'_, Value> {
        (**self).as_value()
    }
}

/// Request parameters from an untrusted boundary.
///
/// Parameters start out unpermitted. A request built from them is refused
/// until [`Params::permit`] has been called.
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    value: Value,
    permitted: bool,
}

impl Params {
    /// Wrap boundary input. The result is unpermitted.
    pub fn new(value: Value) -> Self {
        Self {
            value,
            permitted: false,
        }
    }

    /// Mark these parameters as permitted.
    pub fn permit(mut self) -> Self {
        self.permitted = true;
        self
    }

    /// Check if these parameters are permitted.
    pub fn is_permitted(&self) -> bool {
        self.permitted
    }

    /// A nested value, carrying this value's permission.
    pub fn get(&self, key: &str) -> Option<Params> {
        self.value.get(key).map(|value| Params {
            value: value.clone(),
            permitted: self.permitted,
        })
    }
}

impl InputSource for Params {
    fn permission(&self) -> Permission {
        if self.permitted {
            Permission::Permitted
        } else {
            Permission::Unpermitted
        }
    }

    fn as_value(&self) -> Cow<'_, Value> {
        Cow::Borrowed(&self.value)
    }
}

/// One caller-supplied map, not yet admitted.
#[derive(Debug, Clone, PartialEq)]
pub struct RawInput {
    /// The value as supplied.
    pub value: Value,
    /// Where it came from.
    pub permission: Permission,
}

impl RawInput {
    fn from_source(source: &impl InputSource) -> Self {
        Self {
            value: source.as_value().into_owned(),
            permission: source.permission(),
        }
    }

    fn inherent(value: Value) -> Self {
        Self {
            value,
            permission: Permission::Inherent,
        }
    }
}

/// An untrusted query request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRequest {
    predicates: Vec<RawInput>,
    or_groups: Vec<RawInput>,
    sort: Vec<String>,
    page: Option<i64>,
    per_page: Option<i64>,
}

impl QueryRequest {
    /// Create an empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a map of predicates, AND-ed with everything else at the top level.
    pub fn predicates(mut self, source: impl InputSource) -> Self {
        self.predicates.push(RawInput::from_source(&source));
        self
    }

    /// Add a single top-level predicate.
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut map = Map::new();
        map.insert(key.into(), value.into());
        self.predicates.push(RawInput::inherent(Value::Object(map)));
        self
    }

    /// Add an OR-group: a map of predicates AND-ed together, OR-ed with the
    /// other groups.
    pub fn or_group(mut self, source: impl InputSource) -> Self {
        self.or_groups.push(RawInput::from_source(&source));
        self
    }

    /// Append a sort key. Earlier keys take precedence.
    pub fn sort(mut self, key: impl Into<String>) -> Self {
        self.sort.push(key.into());
        self
    }

    /// Set the page number.
    pub fn page(mut self, page: i64) -> Self {
        self.page = Some(page);
        self
    }

    /// Set the page size.
    pub fn per_page(mut self, per_page: i64) -> Self {
        self.per_page = Some(per_page);
        self
    }

    /// Parse a request envelope:
    ///
    /// ```json
    /// { "filters": {...}, "or": [{...}], "sort": ["a:asc"] | "a:asc,b:desc",
    ///   "page": 1, "per_page": 25 }
    /// ```
    ///
    /// Every key is optional; any other key is refused. An unpermitted
    /// envelope is refused as a whole, and a permitted one permits the maps
    /// it contains.
    pub fn from_envelope(source: impl InputSource) -> QueryResult<Self> {
        let permission = source.permission();
        if !permission.allows_use() {
            return Err(QueryError::unpermitted("request parameters"));
        }

        let value = source.as_value();
        let Value::Object(envelope) = &*value else {
            return Err(QueryError::invalid_shape(format!(
                "Request must be a map, got {}",
                type_name(&value)
            )));
        };

        let mut request = Self::new();
        for (key, value) in envelope {
            match key.as_str() {
                FILTERS_KEY => request.predicates.push(RawInput {
                    value: value.clone(),
                    permission,
                }),
                OR_KEY => {
                    let Value::Array(groups) = value else {
                        return Err(QueryError::invalid_shape(format!(
                            "`{}` must be a list of maps, got {}",
                            OR_KEY,
                            type_name(value)
                        ))
                        .with_key(OR_KEY));
                    };
                    request.or_groups.extend(groups.iter().map(|group| RawInput {
                        value: group.clone(),
                        permission,
                    }));
                }
                SORT_KEY => request.sort = parse_sort_keys(value)?,
                PAGE_KEY => request.page = parse_integer(PAGE_KEY, value)?,
                PER_PAGE_KEY => request.per_page = parse_integer(PER_PAGE_KEY, value)?,
                other => {
                    return Err(QueryError::invalid_shape(format!(
                        "Unexpected request key `{}`",
                        other
                    ))
                    .with_key(other)
                    .with_suggestion(format!(
                        "Expected one of `{}`, `{}`, `{}`, `{}`, `{}`",
                        FILTERS_KEY, OR_KEY, SORT_KEY, PAGE_KEY, PER_PAGE_KEY
                    )));
                }
            }
        }
        Ok(request)
    }

    /// Top-level predicate inputs, in the order they were added.
    pub fn predicate_inputs(&self) -> &[RawInput] {
        &self.predicates
    }

    /// OR-group inputs, in the order they were added.
    pub fn or_group_inputs(&self) -> &[RawInput] {
        &self.or_groups
    }

    /// Number of OR-groups.
    pub fn or_group_count(&self) -> usize {
        self.or_groups.len()
    }

    /// Sort keys, most significant first.
    pub fn sort_keys(&self) -> &[String] {
        &self.sort
    }

    /// Requested page number.
    pub fn page_number(&self) -> Option<i64> {
        self.page
    }

    /// Requested page size.
    pub fn page_size(&self) -> Option<i64> {
        self.per_page
    }
}

fn parse_sort_keys(value: &Value) -> QueryResult<Vec<String>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => Ok(s
            .split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(String::from)
            .collect()),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.trim().to_string()),
                other => Err(QueryError::invalid_shape(format!(
                    "Sort keys must be strings, got {}",
                    type_name(other)
                ))
                .with_key(SORT_KEY)),
            })
            .collect(),
        other => Err(QueryError::invalid_shape(format!(
            "`{}` must be a string or a list of strings, got {}",
            SORT_KEY,
            type_name(other)
        ))
        .with_key(SORT_KEY)),
    }
}

/// Integral values outside the `i64` range saturate so pagination
/// validation sees them as out of range (page) or clamps them (per_page).
fn parse_integer(key: &str, value: &Value) -> QueryResult<Option<i64>> {
    let parsed = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|_| i64::MAX))
            .or_else(|| n.as_f64().and_then(saturating_whole)),
        Value::String(s) => parse_integer_str(s.trim()),
        _ => None,
    };
    parsed.map(Some).ok_or_else(|| {
        QueryError::invalid_shape(format!("`{}` must be an integer, got {}", key, value))
            .with_key(key)
    })
}

fn parse_integer_str(s: &str) -> Option<i64> {
    if let Ok(n) = s.parse::<i64>() {
        return Some(n);
    }
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        return Some(if negative { i64::MIN } else { i64::MAX });
    }
    s.parse::<f64>().ok().and_then(saturating_whole)
}

fn saturating_whole(f: f64) -> Option<i64> {
    // `as` saturates at the i64 bounds.
    (f.is_finite() && f.fract() == 0.0).then_some(f as i64)
}

/// Short JSON type name for messages.
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a map",
    }
}
