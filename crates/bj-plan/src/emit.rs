//! # Condition Emitter
//!
//! Turns a finished [`Plan`] into ClickHouse SQL.
//!
//! Filters are emitted depth-first: the terminal comparison is built first,
//! then each array hop wraps it in an `arrayExists` over the element alias of
//! that hop. A hop with both an object-array and a dynamic-array branch emits
//! both quantified forms and ORs them.
//!
//! Group-by extraction instead walks top-down and produces one
//! `ARRAY JOIN` per hop plus a field expression for the terminal.

use bj_core::{ObservedType, Operator};
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::plan::{NodeId, Plan, PlanNode, TerminalConfig};
use crate::sql::SqlBuilder;

/// Lambda variable for array elements at a terminal.
const ELEM: &str = "x";

/// Unnesting clauses and the field expression for a group-by key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupBy {
    pub array_joins: Vec<String>,
    pub field_expr: String,
}

/// Emit the boolean condition for one plan.
pub fn emit(plan: &Plan, sb: &mut dyn SqlBuilder) -> Result<String> {
    let first = plan.first().ok_or(Error::EmptyPath)?;
    let expr = emit_node(plan, first, sb)?;
    tracing::trace!("emitted condition on {}: {}", plan.column(), expr);
    Ok(expr)
}

/// Emit every plan and OR the results.
pub fn emit_all(plans: &[Plan], sb: &mut dyn SqlBuilder) -> Result<String> {
    let conds = plans
        .iter()
        .map(|p| emit(p, &mut *sb))
        .collect::<Result<Vec<_>>>()?;
    if conds.is_empty() {
        return Err(Error::EmptyPath);
    }
    Ok(or_all(conds))
}

fn emit_node(plan: &Plan, id: NodeId, sb: &mut dyn SqlBuilder) -> Result<String> {
    let node = plan.node(id);
    if node.terminal {
        return emit_terminal(plan, id, sb);
    }

    let mut branches = Vec::with_capacity(2);
    if let Some(child) = node.json {
        let inner = emit_node(plan, child, sb)?;
        branches.push(format!(
            "arrayExists({} -> {}, {})",
            node.alias(),
            inner,
            json_array(plan, id)
        ));
    }
    if let Some(child) = node.dynamic {
        let inner = emit_node(plan, child, sb)?;
        branches.push(format!(
            "arrayExists({} -> {}, {})",
            node.alias(),
            inner,
            dynamic_json_array(plan, id, false)
        ));
    }

    if branches.is_empty() {
        // never an array here: no element can match
        apply_operator_check(plan.op())?;
        let constant = if plan.op() == Operator::NotExists { "true" } else { "false" };
        return Ok(constant.to_string());
    }
    Ok(or_all(branches))
}

fn emit_terminal(plan: &Plan, id: NodeId, sb: &mut dyn SqlBuilder) -> Result<String> {
    let node = plan.node(id);
    let cfg = terminal_config(node)?;
    let field_path = plan.field_path(id);

    if cfg.prefer_array {
        if let Some(expr) = array_membership(node, &field_path, cfg, sb)? {
            return Ok(expr);
        }
    }

    let field = if uses_string_index(cfg) {
        format!("assumeNotNull({})", typed_field(&field_path, ObservedType::String))
    } else {
        typed_field(&field_path, cfg.element_type)
    };
    apply_operator(sb, &field, cfg.element_type, cfg.op, &cfg.value)
}

/// Text matching on an indexed String sub-column goes through the exact
/// expression the index was built over.
fn uses_string_index(cfg: &TerminalConfig) -> bool {
    cfg.string_indexed
        && cfg.element_type == ObservedType::String
        && (cfg.op.is_pattern() || cfg.op.is_membership())
}

/// `arrayExists` over the typed array, the tag-filtered dynamic array, or
/// both ORed. Negated operators wrap the positive form in `NOT`.
fn array_membership(
    node: &PlanNode,
    field_path: &str,
    cfg: &TerminalConfig,
    sb: &mut dyn SqlBuilder,
) -> Result<Option<String>> {
    let elem = cfg.element_type;
    let mut arrays = Vec::with_capacity(2);
    if let Some(arr) = elem.array_of().filter(|a| node.has(*a)) {
        arrays.push(typed_field(field_path, arr));
    }
    if elem.is_scalar() && node.has(ObservedType::ArrayDynamic) {
        arrays.push(format!(
            "arrayMap({e}->dynamicElement({e}, '{t}'), arrayFilter({e}->(dynamicType({e}) = '{t}'), dynamicElement({fp}, 'Array(Dynamic)')))",
            e = ELEM,
            t = elem,
            fp = field_path
        ));
    }
    if arrays.is_empty() {
        return Ok(None);
    }

    let positive = cfg.op.positive();
    let mut checks = Vec::with_capacity(arrays.len());
    for arr in arrays {
        let pred = match positive {
            Operator::Contains => format!("{} = {}", ELEM, sb.var(cfg.value.clone())),
            op => apply_operator(sb, ELEM, elem, op, &cfg.value)?,
        };
        checks.push(format!("arrayExists({} -> {}, {})", ELEM, pred, arr));
    }

    let expr = or_all(checks);
    if cfg.op.is_negated() {
        Ok(Some(format!("NOT {}", expr)))
    } else {
        Ok(Some(expr))
    }
}

// =============================================================================
// Group-by
// =============================================================================

/// Unnesting clauses and field expression for grouping by a path.
///
/// Clauses come from the first (body) plan, preferring the object-array
/// branch at every hop. When a promoted plan is present and the path has no
/// hops, the field expression coalesces the promoted column over the body.
pub fn emit_group_by(plans: &[Plan]) -> Result<GroupBy> {
    let body = plans.first().ok_or(Error::EmptyPath)?;
    let mut array_joins = Vec::new();
    let terminal = unnest(body, &mut array_joins)?;
    let body_expr = field_expr(body, terminal)?;

    let field_expr = match plans.get(1) {
        Some(promoted) if array_joins.is_empty() => {
            let mut none = Vec::new();
            let promoted_terminal = unnest(promoted, &mut none)?;
            format!("coalesce({}, {})", field_expr(promoted, promoted_terminal)?, body_expr)
        }
        _ => body_expr,
    };

    Ok(GroupBy {
        array_joins,
        field_expr,
    })
}

fn unnest(plan: &Plan, clauses: &mut Vec<String>) -> Result<NodeId> {
    let mut id = plan.first().ok_or(Error::EmptyPath)?;
    loop {
        let node = plan.node(id);
        if node.terminal {
            return Ok(id);
        }
        let (next, array) = match (node.json, node.dynamic) {
            (Some(child), _) => (child, json_array(plan, id)),
            (None, Some(child)) => (child, dynamic_json_array(plan, id, true)),
            (None, None) => return Err(Error::NoValidTypes(node.lookup_path.clone())),
        };
        clauses.push(format!("ARRAY JOIN {} AS {}", array, node.alias()));
        id = next;
    }
}

fn field_expr(plan: &Plan, id: NodeId) -> Result<String> {
    let node = plan.node(id);
    let cfg = terminal_config(node)?;
    if node.observed.is_empty() && cfg.declared.is_none() {
        return Err(Error::NoValidTypes(node.lookup_path.clone()));
    }
    Ok(typed_field(&plan.field_path(id), cfg.value_type))
}

// =============================================================================
// Expressions
// =============================================================================

fn terminal_config(node: &PlanNode) -> Result<&TerminalConfig> {
    node.terminal_config
        .as_ref()
        .ok_or_else(|| Error::NoValidTypes(node.lookup_path.clone()))
}

fn typed_field(field_path: &str, t: ObservedType) -> String {
    format!("dynamicElement({}, '{}')", field_path, t)
}

/// Object array at hop `id`, annotated with the hop's budget.
fn json_array(plan: &Plan, id: NodeId) -> String {
    format!(
        "dynamicElement({}, 'Array(JSON({}))')",
        plan.field_path(id),
        plan.node(id).budget
    )
}

/// Dynamic array at hop `id`, filtered to its JSON elements.
fn dynamic_json_array(plan: &Plan, id: NodeId, not_null: bool) -> String {
    let elem = if not_null {
        "assumeNotNull(dynamicElement(x, 'JSON'))"
    } else {
        "dynamicElement(x, 'JSON')"
    };
    format!(
        "arrayMap(x->{}, arrayFilter(x->(dynamicType(x) = 'JSON'), dynamicElement({}, 'Array(Dynamic)')))",
        elem,
        plan.field_path(id)
    )
}

fn apply_operator_check(op: Operator) -> Result<()> {
    match op {
        Operator::Between | Operator::NotBetween => Err(Error::UnsupportedOperator(op)),
        _ => Ok(()),
    }
}

/// Render `expr <op> value`. `field_type` is the type `expr` yields; text
/// operators stringify anything that is not already a String.
pub fn apply_operator(
    sb: &mut dyn SqlBuilder,
    expr: &str,
    field_type: ObservedType,
    op: Operator,
    value: &Value,
) -> Result<String> {
    apply_operator_check(op)?;

    let textual = op.is_pattern() || op.is_membership() || op.is_regexp();
    let expr = if textual && field_type != ObservedType::String {
        format!("toString({})", expr)
    } else {
        expr.to_string()
    };

    let sql = match op {
        Operator::Equal => format!("{} = {}", expr, sb.var(value.clone())),
        Operator::NotEqual => format!("{} <> {}", expr, sb.var(value.clone())),
        Operator::GreaterThan => format!("{} > {}", expr, sb.var(value.clone())),
        Operator::GreaterThanOrEq => format!("{} >= {}", expr, sb.var(value.clone())),
        Operator::LessThan => format!("{} < {}", expr, sb.var(value.clone())),
        Operator::LessThanOrEq => format!("{} <= {}", expr, sb.var(value.clone())),
        Operator::Like => format!("{} LIKE {}", expr, sb.var(value.clone())),
        Operator::NotLike => format!("{} NOT LIKE {}", expr, sb.var(value.clone())),
        Operator::ILike => format!("LOWER({}) LIKE LOWER({})", expr, sb.var(value.clone())),
        Operator::NotILike => format!("LOWER({}) NOT LIKE LOWER({})", expr, sb.var(value.clone())),
        Operator::Regexp => format!("match({}, {})", expr, sb.var(value.clone())),
        Operator::NotRegexp => format!("NOT match({}, {})", expr, sb.var(value.clone())),
        Operator::Contains => format!(
            "LOWER({}) LIKE LOWER({})",
            expr,
            sb.var(contains_pattern(value))
        ),
        Operator::NotContains => format!(
            "LOWER({}) NOT LIKE LOWER({})",
            expr,
            sb.var(contains_pattern(value))
        ),
        Operator::In | Operator::NotIn => {
            let items = match value {
                Value::Array(items) => items.clone(),
                other => vec![other.clone()],
            };
            let negated = op == Operator::NotIn;
            if items.is_empty() {
                return Ok(if negated { "true" } else { "false" }.to_string());
            }
            let parts = items
                .into_iter()
                .map(|v| {
                    let cmp = if negated { "<>" } else { "=" };
                    format!("{} {} {}", expr, cmp, sb.var(v))
                })
                .collect();
            if negated {
                and_all(parts)
            } else {
                or_all(parts)
            }
        }
        Operator::Exists => format!("{} IS NOT NULL", expr),
        Operator::NotExists => format!("{} IS NULL", expr),
        Operator::Between | Operator::NotBetween => return Err(Error::UnsupportedOperator(op)),
    };
    Ok(sql)
}

fn contains_pattern(value: &Value) -> Value {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    Value::String(format!("%{}%", text))
}

/// OR the parts; a single part is returned as is.
pub(crate) fn or_all(parts: Vec<String>) -> String {
    join(parts, " OR ")
}

fn and_all(parts: Vec<String>) -> String {
    join(parts, " AND ")
}

fn join(mut parts: Vec<String>, sep: &str) -> String {
    if parts.len() == 1 {
        return parts.remove(0);
    }
    format!("({})", parts.join(sep))
}
