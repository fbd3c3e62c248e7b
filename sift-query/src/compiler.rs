//! The query compiler.
//!
//! Compilation runs in four stages. Each either advances the request or
//! fails the whole call; no partial plan is ever returned.
//!
//! 1. **Admission**: every predicate map must be a map, and must not come
//!    from an unpermitted parameter boundary. Empty OR-groups are refused.
//! 2. **Cardinality**: predicate keys (top level plus all OR-groups), OR-groups
//!    and sort keys are counted against the configured ceilings before any
//!    key is looked at.
//! 3. **Key validation**: every predicate key is parsed against the
//!    [`PredicateRegistry`] and every sort key looked up in the
//!    [`SortRegistry`]. Unknown keys fail in strict mode and are dropped with
//!    a warning otherwise.
//! 4. **Compilation**: operands are coerced and bound, OR-groups assembled,
//!    orderings resolved and the page window validated.
//!
//! The compiler holds no mutable state and performs no I/O.
//!
//! ```rust
//! use serde_json::json;
//! use sift_query::{
//!     PredicateRegistry, QueryCompiler, QueryRequest, SiftConfig, SortRegistry, StorageType,
//!     TableSchema,
//! };
//!
//! let schema = TableSchema::new("articles")
//!     .unwrap()
//!     .column("title", StorageType::String)
//!     .unwrap();
//! let mut predicates = PredicateRegistry::builder();
//! predicates.register(&schema, "title", StorageType::String).unwrap();
//! let predicates = predicates.freeze();
//! let mut sorts = SortRegistry::builder();
//! sorts.register(&schema, "title", StorageType::String).unwrap();
//! let sorts = sorts.freeze();
//!
//! let config = SiftConfig::default();
//! let compiler = QueryCompiler::new(&predicates, &sorts, &config);
//!
//! let request = QueryRequest::new()
//!     .predicates(json!({ "title_contains": "50%", "title_delete_all": true }))
//!     .sort("title:asc");
//! let plan = compiler.compile(&request).unwrap();
//!
//! assert_eq!(plan.and_clauses.len(), 1);
//! assert_eq!(plan.dropped[0].key, "title_delete_all");
//! ```

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::coerce;
use crate::config::SiftConfig;
use crate::error::{QueryError, QueryResult};
use crate::filter::{Condition, Operand};
use crate::pagination;
use crate::plan::{CompiledPlan, DroppedKey};
use crate::predicate::{OperandShape, PredicateKind, PredicateRegistry};
use crate::request::{QueryRequest, RawInput, type_name};
use crate::sanitize::{BoundParam, literal, pattern};
use crate::schema::FieldSpec;
use crate::sort::{OrderByField, SortRegistry};

/// A request that passed admission.
struct Admitted<'r> {
    predicates: Vec<&'r Map<String, Value>>,
    or_groups: Vec<&'r Map<String, Value>>,
    sort: &'r [String],
}

/// A predicate key that names a registered pair.
struct ValidatedKey<'a, 'r> {
    key: &'r str,
    field: &'a FieldSpec,
    kind: PredicateKind,
    value: &'r Value,
}

/// Compiles untrusted requests against one entity type's registries.
#[derive(Debug, Clone, Copy)]
pub struct QueryCompiler<'a> {
    predicates: &'a PredicateRegistry,
    sorts: &'a SortRegistry,
    config: &'a SiftConfig,
    entity: Option<&'a str>,
}

impl<'a> QueryCompiler<'a> {
    /// Create a compiler over frozen registries.
    pub fn new(
        predicates: &'a PredicateRegistry,
        sorts: &'a SortRegistry,
        config: &'a SiftConfig,
    ) -> Self {
        Self {
            predicates,
            sorts,
            config,
            entity: None,
        }
    }

    /// Name the entity type in errors and log lines.
    pub fn with_entity(mut self, entity: &'a str) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Compile a request into a plan.
    pub fn compile(&self, request: &QueryRequest) -> QueryResult<CompiledPlan> {
        self.compile_inner(request).map_err(|err| self.tag(err))
    }

    fn compile_inner(&self, request: &QueryRequest) -> QueryResult<CompiledPlan> {
        let admitted = admit(request)?;
        self.check_cardinality(&admitted)?;

        let mut dropped = Vec::new();
        let top_level = self.validate_keys(merge(&admitted.predicates), None, &mut dropped)?;
        let mut groups = Vec::with_capacity(admitted.or_groups.len());
        for (i, group) in admitted.or_groups.iter().copied().enumerate() {
            let entries = group.iter().map(|(k, v)| (k.as_str(), v));
            groups.push(self.validate_keys(entries, Some(i), &mut dropped)?);
        }
        let order_scopes = self.validate_sort(admitted.sort, &mut dropped)?;

        let and_clauses = top_level
            .iter()
            .map(|entry| self.condition(entry))
            .collect::<QueryResult<Vec<_>>>()?;
        let mut or_clauses = Vec::with_capacity(groups.len());
        for group in &groups {
            // A group whose every key was dropped would match everything.
            if group.is_empty() {
                continue;
            }
            or_clauses.push(
                group
                    .iter()
                    .map(|entry| self.condition(entry))
                    .collect::<QueryResult<Vec<_>>>()?,
            );
        }

        let window = pagination::validate(
            request.page_number(),
            request.page_size(),
            &self.config.pagination,
        )?;

        let plan = CompiledPlan {
            and_clauses,
            or_clauses,
            order_clauses: order_scopes,
            limit: window.limit,
            offset: window.offset,
            page: window.page,
            per_page: window.per_page,
            dropped,
        };

        debug!(
            entity = self.entity.unwrap_or_default(),
            conditions = plan.condition_count(),
            or_groups = plan.or_clauses.len(),
            orderings = plan.order_clauses.len(),
            dropped = plan.dropped.len(),
            limit = plan.limit,
            offset = plan.offset,
            "Compiled query plan"
        );
        Ok(plan)
    }

    fn check_cardinality(&self, admitted: &Admitted<'_>) -> QueryResult<()> {
        let limits = &self.config.limits;

        let total: usize = admitted
            .predicates
            .iter()
            .chain(admitted.or_groups.iter())
            .map(|map| map.len())
            .sum();
        if total > limits.max_total_predicates {
            return Err(QueryError::too_many_predicates(total, limits.max_total_predicates));
        }

        if admitted.or_groups.len() > limits.max_or_groups {
            return Err(QueryError::too_many_or_groups(
                admitted.or_groups.len(),
                limits.max_or_groups,
            ));
        }

        if admitted.sort.len() > limits.max_sort_keys {
            return Err(QueryError::too_many_sort_keys(
                admitted.sort.len(),
                limits.max_sort_keys,
            ));
        }
        Ok(())
    }

    fn validate_keys<'r>(
        &self,
        entries: impl IntoIterator<Item = (&'r str, &'r Value)>,
        group: Option<usize>,
        dropped: &mut Vec<DroppedKey>,
    ) -> QueryResult<Vec<ValidatedKey<'a, 'r>>> {
        let mut validated = Vec::new();
        for (key, value) in entries {
            match self.predicates.parse_key(key) {
                Some((field, kind)) => validated.push(ValidatedKey {
                    key,
                    field,
                    kind,
                    value,
                }),
                None => {
                    let err = self.unknown_predicate(key);
                    self.reject_or_drop(err, key, group, dropped)?;
                }
            }
        }
        Ok(validated)
    }

    fn validate_sort(
        &self,
        keys: &[String],
        dropped: &mut Vec<DroppedKey>,
    ) -> QueryResult<Vec<OrderByField>> {
        let mut seen = HashSet::with_capacity(keys.len());
        let mut orders = Vec::with_capacity(keys.len());
        for key in keys {
            match self.sorts.resolve(key) {
                Some(scope) => {
                    if seen.insert(key.as_str()) {
                        orders.push(scope.order.clone());
                    }
                }
                None => {
                    let err = QueryError::unknown_sort(key.as_str());
                    self.reject_or_drop(err, key, None, dropped)?;
                }
            }
        }
        Ok(orders)
    }

    /// Fail in strict mode; otherwise log and record the dropped key.
    fn reject_or_drop(
        &self,
        err: QueryError,
        key: &str,
        group: Option<usize>,
        dropped: &mut Vec<DroppedKey>,
    ) -> QueryResult<()> {
        if self.config.is_strict() {
            return Err(err);
        }
        warn!(
            entity = self.entity.unwrap_or_default(),
            key = %key,
            group = ?group,
            code = %err.code,
            "Dropping unrecognized query key"
        );
        dropped.push(DroppedKey {
            key: key.into(),
            code: err.code,
            group,
        });
        Ok(())
    }

    fn unknown_predicate(&self, key: &str) -> QueryError {
        let err = QueryError::unknown_predicate(key);
        // Name the allowed predicates when the key starts with a known field.
        let field = self.predicates.iter().find(|entry| {
            key.strip_prefix(entry.field.field_name.as_str())
                .is_some_and(|rest| rest.starts_with('_'))
        });
        match field {
            Some(entry) => {
                let allowed: Vec<&str> = entry.kinds.iter().map(|k| k.suffix()).collect();
                err.with_help(format!(
                    "`{}` accepts: {}",
                    entry.field.field_name,
                    allowed.join(", ")
                ))
            }
            None => err,
        }
    }

    fn condition(&self, entry: &ValidatedKey<'_, '_>) -> QueryResult<Condition> {
        let ValidatedKey {
            key,
            field,
            kind,
            value,
        } = *entry;

        let (kind, operand) = match kind.operand_shape() {
            OperandShape::Scalar => (kind, Operand::One(bind(key, field, value)?)),
            OperandShape::Pattern => {
                let position = kind.pattern_position().ok_or_else(|| {
                    QueryError::internal(format!("`{}` has no pattern position", kind))
                })?;
                let text = coerce::text(key, value)?;
                (kind, Operand::One(pattern(&text, position)))
            }
            OperandShape::Range => {
                let bounds = self.array(key, value)?;
                let [low, high] = bounds else {
                    return Err(QueryError::invalid_value(
                        key,
                        format!("expected exactly two values, got {}", bounds.len()),
                    ));
                };
                (kind, Operand::Range(bind(key, field, low)?, bind(key, field, high)?))
            }
            OperandShape::List => {
                let items = self.array(key, value)?;
                let max = self.config.limits.max_list_values;
                if items.is_empty() {
                    return Err(QueryError::invalid_value(key, "expected a non-empty list"));
                }
                if items.len() > max {
                    return Err(QueryError::invalid_value(
                        key,
                        format!("list has {} values, the maximum is {}", items.len(), max),
                    ));
                }
                let params = items
                    .iter()
                    .map(|item| bind(key, field, item))
                    .collect::<QueryResult<Vec<_>>>()?;
                (kind, Operand::List(params))
            }
            OperandShape::Flag => {
                let kind = if coerce::flag(key, value)? {
                    kind
                } else {
                    kind.negated().ok_or_else(|| {
                        QueryError::internal(format!("`{}` has no negation", kind))
                    })?
                };
                (kind, Operand::None)
            }
        };

        Ok(Condition::new(field.field_name.clone(), kind, operand))
    }

    fn array<'v>(&self, key: &str, value: &'v Value) -> QueryResult<&'v [Value]> {
        match value {
            Value::Array(items) => Ok(items),
            other => Err(QueryError::invalid_value(
                key,
                format!("expected a list, got {}", type_name(other)),
            )),
        }
    }

    fn tag(&self, err: QueryError) -> QueryError {
        match self.entity {
            Some(entity) if err.context.entity.is_none() => err.with_entity(entity),
            _ => err,
        }
    }
}

fn bind(key: &str, field: &FieldSpec, value: &Value) -> QueryResult<BoundParam> {
    coerce::scalar(key, field, value).map(literal)
}

/// Stage 1: shape and permission checks.
fn admit(request: &QueryRequest) -> QueryResult<Admitted<'_>> {
    let mut predicates = Vec::with_capacity(request.predicate_inputs().len());
    for input in request.predicate_inputs() {
        // A null predicate map means "no predicates".
        if input.value.is_null() && input.permission.allows_use() {
            continue;
        }
        predicates.push(admit_map(input, "predicates")?);
    }

    let mut or_groups = Vec::with_capacity(request.or_group_count());
    for (i, input) in request.or_group_inputs().iter().enumerate() {
        let map = admit_map(input, "OR-group")?;
        if map.is_empty() {
            return Err(QueryError::invalid_shape(format!("OR-group {} is empty", i))
                .with_help("Omit the group instead of sending an empty map"));
        }
        or_groups.push(map);
    }

    Ok(Admitted {
        predicates,
        or_groups,
        sort: request.sort_keys(),
    })
}

fn admit_map<'r>(input: &'r RawInput, what: &str) -> QueryResult<&'r Map<String, Value>> {
    if !input.permission.allows_use() {
        return Err(QueryError::unpermitted(what));
    }
    match &input.value {
        Value::Object(map) => Ok(map),
        other => Err(QueryError::invalid_shape(format!(
            "{} must be a map, got {}",
            what,
            type_name(other)
        ))),
    }
}

/// Merge top-level maps; a later map overrides an earlier one key by key.
fn merge<'r>(maps: &[&'r Map<String, Value>]) -> IndexMap<&'r str, &'r Value> {
    let mut merged = IndexMap::new();
    for map in maps {
        for (key, value) in map.iter() {
            merged.insert(key.as_str(), value);
        }
    }
    merged
}
