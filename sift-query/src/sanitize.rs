//! Value sanitization.
//!
//! Caller-supplied values reach the store only as [`BoundParam`]s. A bound
//! parameter can be rendered as a placeholder and handed to a driver, but it
//! has no `Display` and there is no way to splice it into SQL text.
//!
//! Pattern predicates escape the LIKE metacharacters (`%`, `_` and the escape
//! character itself) before adding the wildcards their position requires, so
//! a `%` typed by a caller matches a literal percent sign.
//!
//! ```rust
//! use sift_query::sanitize::{PatternPosition, escape_like, pattern};
//! use sift_query::FilterValue;
//!
//! assert_eq!(escape_like("100%_off"), "100\\%\\_off");
//!
//! let param = pattern("a_b", PatternPosition::StartsWith);
//! assert_eq!(param.value(), &FilterValue::String("a\\_b%".into()));
//! ```

use crate::filter::FilterValue;

/// Escape character used in every `LIKE ... ESCAPE` clause.
pub const LIKE_ESCAPE: char = '\\';

/// A caller value that may only ever be bound as a query parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParam(FilterValue);

impl BoundParam {
    /// The value to hand to the driver.
    pub fn value(&self) -> &FilterValue {
        &self.0
    }

    /// Take the value.
    pub fn into_value(self) -> FilterValue {
        self.0
    }
}

/// Where the wildcards go around a pattern value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternPosition {
    /// `%value%`
    Contains,
    /// `value%`
    StartsWith,
    /// `%value`
    EndsWith,
}

/// Bind a literal for equality, range or inclusion predicates.
pub fn literal(value: impl Into<FilterValue>) -> BoundParam {
    BoundParam(value.into())
}

/// Bind a LIKE pattern built from an untrusted string.
pub fn pattern(value: &str, position: PatternPosition) -> BoundParam {
    let escaped = escape_like(value);
    let wrapped = match position {
        PatternPosition::Contains => format!("%{}%", escaped),
        PatternPosition::StartsWith => format!("{}%", escaped),
        PatternPosition::EndsWith => format!("%{}", escaped),
    };
    BoundParam(FilterValue::String(wrapped))
}

/// Escape LIKE metacharacters so they match literally.
pub fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 4);
    for c in value.chars() {
        if c == '%' || c == '_' || c == LIKE_ESCAPE {
            out.push(LIKE_ESCAPE);
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(param: &BoundParam) -> &str {
        param.value().as_str().unwrap()
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(escape_like("%"), "\\%");
        assert_eq!(escape_like("_"), "\\_");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
        assert_eq!(escape_like("%_\\"), "\\%\\_\\\\");
    }

    #[test]
    fn test_pattern_positions() {
        assert_eq!(text(&pattern("ab", PatternPosition::Contains)), "%ab%");
        assert_eq!(text(&pattern("ab", PatternPosition::StartsWith)), "ab%");
        assert_eq!(text(&pattern("ab", PatternPosition::EndsWith)), "%ab");
    }

    #[test]
    fn test_pattern_escapes_before_wrapping() {
        assert_eq!(text(&pattern("50%", PatternPosition::Contains)), "%50\\%%");
        assert_eq!(text(&pattern("_x", PatternPosition::EndsWith)), "%\\_x");
    }

    #[test]
    fn test_literal_is_untouched() {
        let param = literal("100%");
        assert_eq!(param.value(), &FilterValue::String("100%".into()));
        assert_eq!(literal(7i64).into_value(), FilterValue::Int(7));
    }
}
