use tracing::{debug, trace};

use crate::config::{MembershipTable, PreviewConfig};
use crate::render::render;
use crate::types::{
    AttributeType, BoolOp, CompareOp, CompiledQuery, Condition, ConditionGroup, Dataset,
    MembershipLookup, MembershipMode, Node, Operator, Predicate, QueryPlan, RowCap,
    SegmentDefinition, SegmentRef, SqlValue, TableRef,
};

/// Compile and render in one step using the dialect and membership table
/// from `config`.
///
/// This is the query a [`PreviewSession`](crate::PreviewSession) dispatches.
///
/// ```
/// use segquery::{compile_query, field, Dataset, PreviewConfig, RowCap, SegmentDefinition};
///
/// let mut def = SegmentDefinition::new("Hanoi");
/// def.add_condition(field("city").equals("Hanoi"));
///
/// let q = compile_query(&Dataset::new("customers"), &def, &PreviewConfig::default(), RowCap::Preview);
/// assert_eq!(q.sql, "SELECT * FROM customers WHERE city = $1 LIMIT 100");
/// assert_eq!(q.inline_predicate(), "city = 'Hanoi'");
/// ```
#[must_use]
pub fn compile_query(
    dataset: &Dataset,
    definition: &SegmentDefinition,
    config: &PreviewConfig,
    cap: RowCap,
) -> CompiledQuery {
    let plan = compile(dataset, definition, &config.membership, cap);
    render(&plan, config.dialect)
}

/// Compile a segment definition into a dialect-independent [`QueryPlan`].
///
/// Pure: the same inputs always produce the same plan. Inactive conditions and
/// groups without active descendants are skipped. Inclusions and exclusions are
/// AND-ed onto the filter regardless of the root operator, and so are
/// membership nodes found inside groups. A definition with no
/// active clauses and no memberships compiles to [`Predicate::True`].
#[must_use]
pub fn compile(
    dataset: &Dataset,
    definition: &SegmentDefinition,
    membership: &MembershipTable,
    cap: RowCap,
) -> QueryPlan {
    let mut clauses: Vec<Predicate> = definition
        .conditions
        .iter()
        .filter(|c| c.is_active())
        .map(|c| condition_predicate(c, dataset))
        .collect();

    for group in &definition.condition_groups {
        if group.has_active() {
            clauses.push(group_predicate(group, dataset, 1));
        }
    }

    // Under AND the clauses sit beside the membership gates; under OR they
    // form a single gate.
    let mut gates = match definition.root_operator {
        BoolOp::And => clauses,
        BoolOp::Or => vec![Predicate::any(clauses)],
    };
    let mut memberships = definition.memberships.clone();
    for group in &definition.condition_groups {
        for (segment, mode) in group.memberships() {
            let _ = memberships.add(segment.clone(), mode);
        }
    }
    gates.extend(
        memberships
            .iter()
            .map(|(segment, mode)| membership_predicate(segment, mode, dataset, membership)),
    );
    let predicate = Predicate::all(gates);

    let plan = QueryPlan {
        table: table_ref(dataset),
        predicate,
        limit: cap.rows(),
    };
    trace!(
        dataset = %dataset.name,
        conditions = definition.conditions.len(),
        groups = definition.condition_groups.len(),
        memberships = definition.inclusions().len() + definition.exclusions().len(),
        limit = plan.limit,
        "compiled segment definition"
    );
    plan
}

fn table_ref(dataset: &Dataset) -> TableRef {
    TableRef {
        schema: dataset.qualifying_schema().map(str::to_owned),
        name: dataset.name.to_lowercase(),
    }
}

fn join(op: BoolOp, parts: Vec<Predicate>) -> Predicate {
    match op {
        BoolOp::And => Predicate::all(parts),
        BoolOp::Or => Predicate::any(parts),
    }
}

fn group_predicate(group: &ConditionGroup, dataset: &Dataset, depth: usize) -> Predicate {
    let parts = group
        .children
        .iter()
        .filter_map(|node| match node {
            Node::Attribute(c) if c.is_active() => Some(condition_predicate(c, dataset)),
            Node::Group(g) if g.has_active() => Some(group_predicate(g, dataset, depth + 1)),
            _ => None,
        })
        .collect();
    trace!(depth, operator = %group.operator, "compiled condition group");
    join(group.operator, parts)
}

fn membership_predicate(
    segment: &SegmentRef,
    mode: MembershipMode,
    dataset: &Dataset,
    membership: &MembershipTable,
) -> Predicate {
    Predicate::Member {
        key: dataset.key_column.clone(),
        lookup: MembershipLookup {
            table: membership.table.clone(),
            segment_column: membership.segment_column.clone(),
            key_column: membership.key_column.clone(),
            segment_id: segment.id.clone(),
        },
        negated: mode == MembershipMode::Exclude,
    }
}

/// Translate one active condition. Callers must filter with
/// [`Condition::is_active`] first.
fn condition_predicate(condition: &Condition, dataset: &Dataset) -> Predicate {
    let column = condition.field.clone();
    let ty = dataset.type_of(&condition.field);
    let value = condition.value().unwrap_or_default();

    match condition.operator {
        Operator::Equals => compare(column, CompareOp::Eq, typed(value, ty)),
        Operator::NotEquals => compare(column, CompareOp::Neq, typed(value, ty)),
        Operator::GreaterThan => compare(column, CompareOp::Gt, typed(value, ty)),
        Operator::LessThan => compare(column, CompareOp::Lt, typed(value, ty)),
        Operator::Contains => like(column, format!("%{}%", escape_like(value)), false),
        Operator::NotContains => like(column, format!("%{}%", escape_like(value)), true),
        Operator::StartsWith => like(column, format!("{}%", escape_like(value)), false),
        Operator::EndsWith => like(column, format!("%{}", escape_like(value)), false),
        Operator::IsNull => Predicate::IsNull {
            column,
            negated: false,
        },
        Operator::IsNotNull => Predicate::IsNull {
            column,
            negated: true,
        },
        Operator::Between => Predicate::Between {
            column,
            low: typed(value, ty),
            high: typed(condition.value2().unwrap_or_default(), ty),
        },
    }
}

fn compare(column: String, op: CompareOp, value: SqlValue) -> Predicate {
    Predicate::Compare { column, op, value }
}

fn like(column: String, pattern: String, negated: bool) -> Predicate {
    Predicate::Like {
        column,
        pattern,
        negated,
    }
}

/// Bind `raw` according to the attribute type. Numbers that fail to parse
/// degrade to text.
fn typed(raw: &str, ty: AttributeType) -> SqlValue {
    if !ty.is_numeric() {
        return SqlValue::Text(raw.to_owned());
    }
    let value = SqlValue::number(raw);
    if !value.is_numeric() {
        debug!(value = raw, "non-numeric value for number attribute; binding as text");
    }
    value
}

/// Escape LIKE wildcards so user input matches literally. Pairs with
/// `ESCAPE '\'` in the rendered clause.
pub(crate) fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
