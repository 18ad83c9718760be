//! Query evaluation over an in-memory item collection.
//!
//! The tree is walked once; each leaf scans the whole collection and the
//! per-group result sets are combined by intersection (AND) or union (OR).
//! Malformed parts of a tree never fail the evaluation. They contribute an
//! empty result and leave a [`Diagnostic`] behind.

use crate::errors::{QueryError, Result};
use crate::model::{Item, ItemId, PropertyBag, PropertyValue};
use crate::query::{Condition, DiagnosticKind, LogicOp, OperatorKind, QueryNode};
use crate::util::parse_leading_float;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use tracing::{debug, warn};

pub const SUCCESS_MESSAGE: &str = "Query executed successfully";

/// Looks up `category.field` in a property bag. `None` means the bag, the
/// category or the field is missing; a stored null comes back as `Some(Null)`.
pub fn find_property<'a>(
    properties: Option<&'a PropertyBag>,
    category: &str,
    field: &str,
) -> Option<&'a PropertyValue> {
    properties?.get(category)?.get(field)
}

/// Compares one stored value against a condition operand.
///
/// Absent and null values fail every operator. Numeric comparison applies
/// when both sides carry a leading number; string operators work on the
/// lowercased text of both sides.
pub fn evaluate_predicate(
    value: Option<&PropertyValue>,
    operator: OperatorKind,
    operand: &str,
) -> bool {
    let value = match value {
        None | Some(PropertyValue::Null) => return false,
        Some(v) => v,
    };

    let numbers = match (value.as_number(), parse_leading_float(operand)) {
        (Some(lhs), Some(rhs)) => Some((lhs, rhs)),
        _ => None,
    };
    let text = value.as_text().to_lowercase();
    let operand = operand.to_lowercase();

    match operator {
        OperatorKind::Contains => text.contains(&operand),
        OperatorKind::DoesNotContain => !text.contains(&operand),
        OperatorKind::StartsWith => text.starts_with(&operand),
        OperatorKind::Equals => text == operand || numbers.is_some_and(|(l, r)| l == r),
        OperatorKind::GreaterThan => numbers.is_some_and(|(l, r)| l > r),
        OperatorKind::LessThan => numbers.is_some_and(|(l, r)| l < r),
        OperatorKind::GreaterThanOrEqual => numbers.is_some_and(|(l, r)| l >= r),
        OperatorKind::LessThanOrEqual => numbers.is_some_and(|(l, r)| l <= r),
    }
}

/// A part of the query tree that was skipped as "matches nothing".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub path: String,
    pub kind: DiagnosticKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalStats {
    pub conditions_scanned: usize,
    pub items_visited: usize,
    pub groups_short_circuited: usize,
}

/// Recursive AND/OR evaluator bound to one item collection.
pub struct Evaluator<'a> {
    items: &'a [Item],
    diagnostics: Vec<Diagnostic>,
    stats: EvalStats,
}

impl<'a> Evaluator<'a> {
    pub fn new(items: &'a [Item]) -> Self {
        Self {
            items,
            diagnostics: Vec::new(),
            stats: EvalStats::default(),
        }
    }

    pub fn evaluate(&mut self, node: &QueryNode) -> Vec<&'a str> {
        self.eval_node(node, "$")
    }

    /// Identifiers of every item satisfying `condition`, in collection order.
    pub fn scan(&mut self, condition: &Condition) -> Vec<&'a str> {
        self.scan_at(condition, "$")
    }

    pub fn finish(self) -> (Vec<Diagnostic>, EvalStats) {
        (self.diagnostics, self.stats)
    }

    fn eval_node(&mut self, node: &QueryNode, path: &str) -> Vec<&'a str> {
        match node {
            QueryNode::Leaf(condition) => self.scan_at(condition, path),
            QueryNode::Group { logic, children } if children.is_empty() => {
                self.degrade(
                    path,
                    DiagnosticKind::EmptyGroup,
                    format!("{logic} group has no conditions"),
                );
                Vec::new()
            }
            QueryNode::Group {
                logic: LogicOp::And,
                children,
            } => self.eval_and(children, path),
            QueryNode::Group {
                logic: LogicOp::Or,
                children,
            } => self.eval_or(children, path),
            QueryNode::Invalid { kind, reason } => {
                self.degrade(path, *kind, reason.clone());
                Vec::new()
            }
        }
    }

    fn eval_and(&mut self, children: &[QueryNode], path: &str) -> Vec<&'a str> {
        let mut candidates: Vec<&'a str> =
            self.items.iter().map(|i| i.external_id.as_str()).collect();
        for (idx, child) in children.iter().enumerate() {
            if candidates.is_empty() {
                self.stats.groups_short_circuited += 1;
                debug!(
                    path,
                    skipped = children.len() - idx,
                    "AND group short-circuited"
                );
                break;
            }
            let matched: HashSet<&'a str> = self
                .eval_node(child, &child_path(path, idx))
                .into_iter()
                .collect();
            candidates.retain(|id| matched.contains(id));
        }
        candidates
    }

    fn eval_or(&mut self, children: &[QueryNode], path: &str) -> Vec<&'a str> {
        let mut seen: HashSet<&'a str> = HashSet::new();
        let mut out = Vec::new();
        for (idx, child) in children.iter().enumerate() {
            for id in self.eval_node(child, &child_path(path, idx)) {
                if seen.insert(id) {
                    out.push(id);
                }
            }
        }
        out
    }

    fn scan_at(&mut self, condition: &Condition, path: &str) -> Vec<&'a str> {
        if !condition.is_complete() {
            self.degrade(
                path,
                DiagnosticKind::MalformedCondition,
                "condition needs a category and a field".to_string(),
            );
            return Vec::new();
        }
        self.stats.conditions_scanned += 1;
        self.stats.items_visited += self.items.len();

        let matched: Vec<&'a str> = self
            .items
            .iter()
            .filter(|item| {
                let value = find_property(
                    item.properties.as_ref(),
                    &condition.category,
                    &condition.field,
                );
                evaluate_predicate(value, condition.operator, &condition.value)
            })
            .map(|item| item.external_id.as_str())
            .collect();
        debug!(
            path,
            category = %condition.category,
            field = %condition.field,
            operator = %condition.operator,
            value = %condition.value,
            matched = matched.len(),
            "condition scanned"
        );
        matched
    }

    fn degrade(&mut self, path: &str, kind: DiagnosticKind, message: String) {
        warn!(path, kind = kind.as_str(), %message, "query node skipped");
        self.diagnostics.push(Diagnostic {
            path: path.to_string(),
            kind,
            message,
        });
    }
}

fn child_path(parent: &str, idx: usize) -> String {
    format!("{parent}.conditions[{idx}]")
}

/// Result of one successful query evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutcome {
    pub db_ids: Vec<ItemId>,
    pub count: usize,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: EvalStats,
}

/// Evaluates a parsed tree against `items`.
pub fn run_query(items: &[Item], node: &QueryNode) -> Result<QueryOutcome> {
    if items.is_empty() {
        return Err(QueryError::DataNotReady);
    }
    let mut evaluator = Evaluator::new(items);
    let db_ids: Vec<ItemId> = evaluator
        .evaluate(node)
        .into_iter()
        .map(str::to_string)
        .collect();
    let (diagnostics, stats) = evaluator.finish();
    debug!(
        matched = db_ids.len(),
        conditions = stats.conditions_scanned,
        degraded = diagnostics.len(),
        "query evaluated"
    );
    Ok(QueryOutcome {
        count: db_ids.len(),
        db_ids,
        diagnostics,
        stats,
    })
}

/// Entry point for raw request payloads: rejects a missing body, parses the
/// tree once and evaluates it.
pub fn execute_query(items: &[Item], payload: &JsonValue) -> Result<QueryOutcome> {
    if payload.is_null() {
        return Err(QueryError::MissingBody);
    }
    run_query(items, &QueryNode::from_json(payload))
}

/// Wire shape returned to callers for both success and failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub success: bool,
    pub db_ids: Vec<ItemId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl QueryResponse {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            db_ids: Vec::new(),
            count: None,
            message: None,
            error: Some(error.into()),
            diagnostics: Vec::new(),
        }
    }
}

impl From<QueryOutcome> for QueryResponse {
    fn from(outcome: QueryOutcome) -> Self {
        Self {
            success: true,
            count: Some(outcome.count),
            db_ids: outcome.db_ids,
            message: Some(SUCCESS_MESSAGE.to_string()),
            error: None,
            diagnostics: outcome.diagnostics,
        }
    }
}

impl From<Result<QueryOutcome>> for QueryResponse {
    fn from(result: Result<QueryOutcome>) -> Self {
        match result {
            Ok(outcome) => outcome.into(),
            Err(e) => QueryResponse::failure(e.to_string()),
        }
    }
}
