//! Filter values and the store-independent conditions a plan is made of.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::error;

use crate::predicate::{OperandShape, PredicateKind};
use crate::sanitize::BoundParam;
use crate::sql::SqlBuilder;

/// A typed value that can be bound as a query parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// String value (also carries normalized dates and timestamps).
    String(String),
}

impl FilterValue {
    /// The string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for FilterValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

/// The bound operand(s) of a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Operator takes no value (`IS NULL`, blank checks).
    None,
    /// A single bound value.
    One(BoundParam),
    /// Lower and upper bound of a range.
    Range(BoundParam, BoundParam),
    /// Members of an inclusion list.
    List(Vec<BoundParam>),
}

impl Operand {
    /// Number of parameters this operand binds.
    pub fn param_count(&self) -> usize {
        match self {
            Self::None => 0,
            Self::One(_) => 1,
            Self::Range(..) => 2,
            Self::List(values) => values.len(),
        }
    }
}

/// One sanitized predicate fragment: a registered field, a registered
/// predicate kind, and bound operands. Contains no SQL text.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Column the condition applies to.
    pub field: SmolStr,
    /// The predicate kind.
    pub kind: PredicateKind,
    /// Bound operands.
    pub operand: Operand,
}

impl Condition {
    /// Create a new condition.
    pub fn new(field: impl Into<SmolStr>, kind: PredicateKind, operand: Operand) -> Self {
        Self {
            field: field.into(),
            kind,
            operand,
        }
    }

    /// Whether the operand has the shape the predicate kind expects.
    pub fn is_well_formed(&self) -> bool {
        matches!(
            (self.kind.operand_shape(), &self.operand),
            (OperandShape::Scalar | OperandShape::Pattern, Operand::One(_))
                | (OperandShape::Range, Operand::Range(..))
                | (OperandShape::List, Operand::List(_))
                | (OperandShape::Flag, Operand::None)
        )
    }

    /// Write this condition as SQL, binding every operand as a parameter.
    ///
    /// A malformed condition renders as a false literal and binds nothing.
    pub fn write_sql(&self, sql: &mut SqlBuilder) {
        use PredicateKind::*;

        debug_assert!(
            self.is_well_formed(),
            "`{}` cannot take {:?}",
            self.kind,
            self.operand
        );
        let escape = sql.db_type().like_escape_clause();
        match (self.kind, &self.operand) {
            (Eq, Operand::One(v)) => self.binary(sql, "=", v),
            (NotEq, Operand::One(v)) => self.binary(sql, "<>", v),
            (Lt, Operand::One(v)) => self.binary(sql, "<", v),
            (Lte, Operand::One(v)) => self.binary(sql, "<=", v),
            (Gt, Operand::One(v)) => self.binary(sql, ">", v),
            (Gte, Operand::One(v)) => self.binary(sql, ">=", v),
            (IEq, Operand::One(v)) => {
                self.lowered(sql);
                sql.push(" = LOWER(").push_param(v).push(")");
            }
            (Contains | StartsWith | EndsWith, Operand::One(v)) => {
                sql.push_identifier(&self.field).push(" LIKE ").push_param(v).push(escape);
            }
            (IContains | IStartsWith | IEndsWith, Operand::One(v)) => {
                self.lowered(sql);
                sql.push(" LIKE LOWER(").push_param(v).push(")").push(escape);
            }
            (Between | NotBetween, Operand::Range(low, high)) => {
                sql.push_identifier(&self.field);
                sql.push(if self.kind == Between { " BETWEEN " } else { " NOT BETWEEN " });
                sql.push_param(low).push(" AND ").push_param(high);
            }
            (In | NotIn, Operand::List(values)) => {
                sql.push_identifier(&self.field);
                sql.push(if self.kind == In { " IN (" } else { " NOT IN (" });
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        sql.push(", ");
                    }
                    sql.push_param(v);
                }
                sql.push(")");
            }
            (Null, Operand::None) => {
                sql.push_identifier(&self.field).push(" IS NULL");
            }
            (NotNull, Operand::None) => {
                sql.push_identifier(&self.field).push(" IS NOT NULL");
            }
            (Present, Operand::None) => {
                sql.push("(").push_identifier(&self.field).push(" IS NOT NULL AND TRIM(");
                sql.push_identifier(&self.field).push(") <> '')");
            }
            (Blank, Operand::None) => {
                sql.push("(").push_identifier(&self.field).push(" IS NULL OR TRIM(");
                sql.push_identifier(&self.field).push(") = '')");
            }
            (kind, operand) => {
                error!(
                    field = %self.field,
                    kind = %kind,
                    params = operand.param_count(),
                    "malformed condition rendered as false"
                );
                sql.push("1 = 0");
            }
        }
    }

    fn binary(&self, sql: &mut SqlBuilder, op: &str, value: &BoundParam) {
        sql.push_identifier(&self.field)
            .push(" ")
            .push(op)
            .push(" ")
            .push_param(value);
    }

    fn lowered(&self, sql: &mut SqlBuilder) {
        sql.push("LOWER(").push_identifier(&self.field).push(")");
    }
}
