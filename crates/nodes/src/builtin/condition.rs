//! Condition evaluation shared by the `if` and `filter` nodes.

use serde_json::Value;

use crate::NodeError;

/// Comparison applied between a field and the condition's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    IsEmpty,
    IsNotEmpty,
}

impl Operator {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "equals" => Some(Self::Equals),
            "not_equals" => Some(Self::NotEquals),
            "contains" => Some(Self::Contains),
            "greater_than" => Some(Self::GreaterThan),
            "less_than" => Some(Self::LessThan),
            "is_empty" => Some(Self::IsEmpty),
            "is_not_empty" => Some(Self::IsNotEmpty),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
}

#[derive(Debug, Clone)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

impl Condition {
    pub fn matches(&self, data: &Value) -> bool {
        let actual = lookup(data, &self.field);
        match self.operator {
            Operator::Equals => actual.is_some_and(|a| loosely_equal(a, &self.value)),
            Operator::NotEquals => !actual.is_some_and(|a| loosely_equal(a, &self.value)),
            Operator::Contains => actual.is_some_and(|a| contains(a, &self.value)),
            Operator::GreaterThan => compare(actual, &self.value).is_some_and(|o| o.is_gt()),
            Operator::LessThan => compare(actual, &self.value).is_some_and(|o| o.is_lt()),
            Operator::IsEmpty => actual.map_or(true, is_empty),
            Operator::IsNotEmpty => !actual.map_or(true, is_empty),
        }
    }
}

/// Parsed `conditions` + `combinator` pair from a node configuration.
#[derive(Debug, Clone)]
pub struct ConditionSet {
    pub conditions: Vec<Condition>,
    pub combinator: Combinator,
}

impl ConditionSet {
    pub fn from_config(config: &Value) -> Result<Self, NodeError> {
        let raw = config
            .get("conditions")
            .and_then(Value::as_array)
            .ok_or_else(|| NodeError::failed("'conditions' must be an array"))?;

        let conditions = raw
            .iter()
            .map(|item| {
                let field = item.get("field").and_then(Value::as_str);
                let operator = item
                    .get("operator")
                    .and_then(Value::as_str)
                    .and_then(Operator::parse);
                match (field, operator) {
                    (Some(field), Some(operator)) => Ok(Condition {
                        field: field.to_owned(),
                        operator,
                        value: item.get("value").cloned().unwrap_or(Value::Null),
                    }),
                    _ => Err(NodeError::failed(format!("malformed condition: {item}"))),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let combinator = match config.get("combinator").and_then(Value::as_str) {
            Some("or") => Combinator::Or,
            _ => Combinator::And,
        };

        Ok(Self {
            conditions,
            combinator,
        })
    }

    pub fn matches(&self, data: &Value) -> bool {
        match self.combinator {
            Combinator::And => self.conditions.iter().all(|c| c.matches(data)),
            Combinator::Or => self.conditions.iter().any(|c| c.matches(data)),
        }
    }
}

/// Resolve a dotted path (`a.b.0.c`) inside a JSON value. An empty path
/// returns the value itself.
pub fn lookup<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(data);
    }
    path.split('.').try_fold(data, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn loosely_equal(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match (actual, expected) {
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            matches!((as_number(actual), as_number(expected)), (Some(a), Some(b)) if a == b)
        }
        (Value::String(a), Value::Bool(b)) | (Value::Bool(b), Value::String(a)) => {
            a == if *b { "true" } else { "false" }
        }
        _ => false,
    }
}

fn contains(actual: &Value, needle: &Value) -> bool {
    match (actual, needle) {
        (Value::String(hay), Value::String(n)) => hay.contains(n.as_str()),
        (Value::Array(items), _) => items.iter().any(|item| loosely_equal(item, needle)),
        (Value::Object(map), Value::String(key)) => map.contains_key(key),
        _ => false,
    }
}

fn compare(actual: Option<&Value>, expected: &Value) -> Option<std::cmp::Ordering> {
    let a = as_number(actual?)?;
    let b = as_number(expected)?;
    a.partial_cmp(&b)
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
