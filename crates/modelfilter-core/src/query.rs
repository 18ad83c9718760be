use crate::errors::QueryError;
use crate::util::format_number;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Nesting limit for parsed query trees.
pub const MAX_DEPTH: usize = 64;

const CONDITION_KEYS: [&str; 4] = ["category", "field", "operator", "value"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorKind {
    Equals,
    Contains,
    DoesNotContain,
    StartsWith,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
}

impl OperatorKind {
    pub const ALL: [OperatorKind; 8] = [
        OperatorKind::Equals,
        OperatorKind::Contains,
        OperatorKind::DoesNotContain,
        OperatorKind::StartsWith,
        OperatorKind::GreaterThan,
        OperatorKind::LessThan,
        OperatorKind::GreaterThanOrEqual,
        OperatorKind::LessThanOrEqual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperatorKind::Equals => "equals",
            OperatorKind::Contains => "contains",
            OperatorKind::DoesNotContain => "does_not_contain",
            OperatorKind::StartsWith => "starts_with",
            OperatorKind::GreaterThan => "greater_than",
            OperatorKind::LessThan => "less_than",
            OperatorKind::GreaterThanOrEqual => "greater_than_or_equal",
            OperatorKind::LessThanOrEqual => "less_than_or_equal",
        }
    }
}

impl FromStr for OperatorKind {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperatorKind::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| QueryError::Invalid(format!("unsupported operator `{s}`")))
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicOp {
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

impl LogicOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicOp::And => "AND",
            LogicOp::Or => "OR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "AND" => Some(LogicOp::And),
            "OR" => Some(LogicOp::Or),
            _ => None,
        }
    }
}

impl fmt::Display for LogicOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Leaf comparison: `category.field <operator> value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub category: String,
    pub field: String,
    pub operator: OperatorKind,
    pub value: String,
}

impl Condition {
    pub fn new(
        category: impl Into<String>,
        field: impl Into<String>,
        operator: OperatorKind,
        value: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Category and field must both name something for the condition to be scannable.
    pub fn is_complete(&self) -> bool {
        !self.category.is_empty() && !self.field.is_empty()
    }

    fn to_json(&self) -> JsonValue {
        json!({
            "category": self.category,
            "field": self.field,
            "operator": self.operator.as_str(),
            "value": self.value,
        })
    }
}

/// Why part of a query tree was skipped as "matches nothing".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A condition with a missing or unsupported part.
    MalformedCondition,
    /// A node that is neither a condition nor a group.
    MalformedNode,
    EmptyGroup,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::MalformedCondition => "malformed_condition",
            DiagnosticKind::MalformedNode => "malformed_node",
            DiagnosticKind::EmptyGroup => "empty_group",
        }
    }
}

/// A parsed query tree. The external JSON is interpreted once, here, and
/// anything that does not fit a leaf or a group becomes `Invalid`.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryNode {
    Leaf(Condition),
    Group {
        logic: LogicOp,
        children: Vec<QueryNode>,
    },
    Invalid {
        kind: DiagnosticKind,
        reason: String,
    },
}

impl QueryNode {
    pub fn and(children: Vec<QueryNode>) -> Self {
        QueryNode::Group {
            logic: LogicOp::And,
            children,
        }
    }

    pub fn or(children: Vec<QueryNode>) -> Self {
        QueryNode::Group {
            logic: LogicOp::Or,
            children,
        }
    }

    pub fn malformed_node(reason: impl Into<String>) -> Self {
        QueryNode::Invalid {
            kind: DiagnosticKind::MalformedNode,
            reason: reason.into(),
        }
    }

    pub fn malformed_condition(reason: impl Into<String>) -> Self {
        QueryNode::Invalid {
            kind: DiagnosticKind::MalformedCondition,
            reason: reason.into(),
        }
    }

    /// Parses a request payload.
    ///
    /// At the top level an object is dispatched on `logic` and `conditions`;
    /// a bare array reads like `{ "conditions": [...] }`. The single-condition
    /// shortcut only ever unwraps to a condition. Inside a group, a child is a
    /// nested group when it carries both `logic` and `conditions`, and a
    /// condition otherwise.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Object(map) => parse_group(map, 0),
            JsonValue::Array(children) => parse_condition_list(children, 0),
            other => QueryNode::malformed_node(format!(
                "expected an object, found {}",
                json_kind(other)
            )),
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, QueryNode::Invalid { .. })
    }

    /// Canonical request payload: a top-level leaf is wrapped in the
    /// `{ "conditions": ... }` shortcut, groups are emitted as-is.
    pub fn to_payload(&self) -> JsonValue {
        match self {
            QueryNode::Leaf(c) => json!({ "conditions": c.to_json() }),
            other => other.to_json(),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            QueryNode::Leaf(c) => c.to_json(),
            QueryNode::Group { logic, children } => json!({
                "logic": logic.as_str(),
                "conditions": children.iter().map(QueryNode::to_json).collect::<Vec<_>>(),
            }),
            QueryNode::Invalid { .. } => JsonValue::Null,
        }
    }
}

fn parse_group(map: &Map<String, JsonValue>, depth: usize) -> QueryNode {
    match (logic_of(map), present(map, "conditions")) {
        (None, Some(JsonValue::Array(children))) => parse_condition_list(children, depth),
        (None, Some(single)) => parse_condition(single),
        (Some(logic), Some(JsonValue::Array(children))) => {
            let op = logic.as_str().and_then(LogicOp::parse).unwrap_or_else(|| {
                debug!(%logic, "unrecognized logic, evaluating as AND");
                LogicOp::And
            });
            QueryNode::Group {
                logic: op,
                children: parse_children(children, depth),
            }
        }
        (Some(logic), Some(other)) => QueryNode::malformed_node(format!(
            "{logic} group expects an array of conditions, found {}",
            json_kind(other)
        )),
        (Some(logic), None) => QueryNode::malformed_node(format!("{logic} group has no conditions")),
        (None, None) => QueryNode::malformed_node(
            "unrecognized node: expected `logic` with `conditions`, or `conditions`",
        ),
    }
}

// `{conditions: [...]}` without logic: one element is the single-condition
// shortcut, anything else is an AND group.
fn parse_condition_list(children: &[JsonValue], depth: usize) -> QueryNode {
    match children {
        [only] => parse_condition(only),
        _ => QueryNode::and(parse_children(children, depth)),
    }
}

fn parse_children(children: &[JsonValue], depth: usize) -> Vec<QueryNode> {
    children.iter().map(|c| parse_child(c, depth + 1)).collect()
}

fn parse_child(value: &JsonValue, depth: usize) -> QueryNode {
    if depth > MAX_DEPTH {
        return QueryNode::malformed_node(format!("nesting deeper than {MAX_DEPTH} levels"));
    }
    match value {
        JsonValue::Object(map) if logic_of(map).is_some() && present(map, "conditions").is_some() => {
            parse_group(map, depth)
        }
        other => parse_condition(other),
    }
}

fn parse_condition(value: &JsonValue) -> QueryNode {
    let JsonValue::Object(map) = value else {
        return QueryNode::malformed_node(format!(
            "expected a condition object, found {}",
            json_kind(value)
        ));
    };
    let Some(category) = text_field(map, "category") else {
        return QueryNode::malformed_condition("condition is missing `category`");
    };
    let Some(field) = text_field(map, "field") else {
        return QueryNode::malformed_condition("condition is missing `field`");
    };
    let operator = match text_field(map, "operator").map(|op| op.parse::<OperatorKind>()) {
        Some(Ok(op)) => op,
        Some(Err(e)) => return QueryNode::malformed_condition(e.to_string()),
        None => return QueryNode::malformed_condition("condition is missing `operator`"),
    };
    let value = match map.get("value") {
        Some(JsonValue::String(s)) => s.clone(),
        Some(JsonValue::Number(n)) => match n.as_f64() {
            Some(f) => format_number(f),
            None => n.to_string(),
        },
        Some(JsonValue::Bool(b)) => b.to_string(),
        None | Some(JsonValue::Null) => {
            return QueryNode::malformed_condition("condition is missing `value`")
        }
        Some(other) => {
            return QueryNode::malformed_condition(format!(
                "condition `value` must be a scalar, found {}",
                json_kind(other)
            ))
        }
    };
    QueryNode::Leaf(Condition {
        category,
        field,
        operator,
        value,
    })
}

// `logic` of "" counts as absent.
fn logic_of(map: &Map<String, JsonValue>) -> Option<&JsonValue> {
    present(map, "logic").filter(|v| v.as_str() != Some(""))
}

fn present<'a>(map: &'a Map<String, JsonValue>, key: &str) -> Option<&'a JsonValue> {
    map.get(key).filter(|v| !v.is_null())
}

fn text_field(map: &Map<String, JsonValue>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(JsonValue::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn json_kind(v: &JsonValue) -> &'static str {
    match v {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
