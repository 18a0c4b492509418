//! Declarative configuration rules, one rule set per node subtype.
//!
//! Validation never stops at the first problem: every rule in the set is
//! checked and all violations are returned together, so a node either runs
//! with a fully valid configuration or not at all.

use std::str::FromStr;

use serde_json::{Map, Value};
use url::Url;

use crate::builtin::condition::Operator;
use crate::NodeKind;

/// A single configuration check.
#[derive(Debug, Clone, Copy)]
pub enum Rule {
    /// The field must be present, non-null and not an empty string.
    Required(&'static str),
    /// When present, the field must be one of the listed strings.
    OneOf {
        field: &'static str,
        allowed: &'static [&'static str],
    },
    /// When present, the field must satisfy `check`.
    Format {
        field: &'static str,
        expected: &'static str,
        check: fn(&Value) -> bool,
    },
    /// A check spanning several fields; returns the violation, if any.
    CrossField(fn(&Map<String, Value>) -> Option<String>),
}

impl Rule {
    fn check(&self, config: &Map<String, Value>) -> Option<String> {
        match self {
            Rule::Required(field) => match config.get(*field) {
                None | Some(Value::Null) => Some(format!("'{field}' is required")),
                Some(Value::String(s)) if s.trim().is_empty() => {
                    Some(format!("'{field}' is required"))
                }
                Some(_) => None,
            },
            Rule::OneOf { field, allowed } => {
                let value = present(config, field)?;
                match value.as_str() {
                    Some(s) if allowed.contains(&s) => None,
                    _ => Some(format!("'{field}' must be one of: {}", allowed.join(", "))),
                }
            }
            Rule::Format {
                field,
                expected,
                check,
            } => {
                let value = present(config, field)?;
                if check(value) {
                    None
                } else {
                    Some(format!("'{field}' must be {expected}"))
                }
            }
            Rule::CrossField(check) => check(config),
        }
    }
}

fn present<'a>(config: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    config.get(field).filter(|v| !v.is_null())
}

/// Check `config` against the rule set for `kind`.
///
/// A `null` configuration is treated as an empty object. Returns an empty
/// vector when the configuration is valid.
pub fn validate_config(kind: NodeKind, config: &Value) -> Vec<String> {
    let empty = Map::new();
    let map = match config {
        Value::Null => &empty,
        Value::Object(map) => map,
        _ => return vec!["configuration must be a JSON object".to_owned()],
    };

    rules_for(kind)
        .iter()
        .filter_map(|rule| rule.check(map))
        .collect()
}

/// The rule set for a node kind.
pub fn rules_for(kind: NodeKind) -> &'static [Rule] {
    match kind {
        NodeKind::ManualTrigger => MANUAL_TRIGGER,
        NodeKind::WebhookTrigger => WEBHOOK_TRIGGER,
        NodeKind::ScheduleTrigger => SCHEDULE_TRIGGER,
        NodeKind::EmailTrigger => EMAIL_TRIGGER,
        NodeKind::Http => HTTP,
        NodeKind::Email => EMAIL,
        NodeKind::Database => DATABASE,
        NodeKind::Transform => TRANSFORM,
        NodeKind::Delay => DELAY,
        NodeKind::If => IF,
        NodeKind::Switch => SWITCH,
        NodeKind::Loop => LOOP,
        NodeKind::Filter => FILTER,
    }
}

// ---------------------------------------------------------------------------
// Rule sets
// ---------------------------------------------------------------------------

const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];
const COMBINATORS: &[&str] = &["and", "or"];

const PAYLOAD_OBJECT: Rule = Rule::Format {
    field: "payload",
    expected: "an object",
    check: Value::is_object,
};

static MANUAL_TRIGGER: &[Rule] = &[PAYLOAD_OBJECT];

static WEBHOOK_TRIGGER: &[Rule] = &[
    Rule::Required("path"),
    Rule::Format {
        field: "path",
        expected: "a path starting with '/'",
        check: is_url_path,
    },
    Rule::OneOf {
        field: "method",
        allowed: HTTP_METHODS,
    },
    PAYLOAD_OBJECT,
];

static SCHEDULE_TRIGGER: &[Rule] = &[
    Rule::Required("cron"),
    Rule::Format {
        field: "cron",
        expected: "a valid cron expression",
        check: is_cron_expression,
    },
    PAYLOAD_OBJECT,
];

static EMAIL_TRIGGER: &[Rule] = &[
    Rule::Required("mailbox"),
    Rule::Format {
        field: "mailbox",
        expected: "an e-mail address",
        check: is_email_address,
    },
    Rule::Format {
        field: "poll_interval_secs",
        expected: "a non-negative integer",
        check: is_non_negative_integer,
    },
    PAYLOAD_OBJECT,
];

static HTTP: &[Rule] = &[
    Rule::Required("url"),
    Rule::Format {
        field: "url",
        expected: "an http:// or https:// URL",
        check: is_http_url,
    },
    Rule::OneOf {
        field: "method",
        allowed: HTTP_METHODS,
    },
    Rule::Format {
        field: "headers",
        expected: "an object of header names to string values",
        check: is_string_map,
    },
    Rule::CrossField(http_body_requires_method),
];

static EMAIL: &[Rule] = &[
    Rule::Required("to"),
    Rule::Required("subject"),
    Rule::Format {
        field: "to",
        expected: "a comma-separated list of e-mail addresses",
        check: is_email_list,
    },
    Rule::CrossField(email_needs_body),
];

static DATABASE: &[Rule] = &[
    Rule::Required("operation"),
    Rule::OneOf {
        field: "operation",
        allowed: &["select", "insert", "update", "delete", "query"],
    },
    Rule::CrossField(database_operation_fields),
];

static TRANSFORM: &[Rule] = &[
    Rule::Format {
        field: "set",
        expected: "an object",
        check: Value::is_object,
    },
    Rule::Format {
        field: "mappings",
        expected: "an array of {from, to} string pairs",
        check: is_mapping_list,
    },
    Rule::CrossField(transform_has_work),
];

static DELAY: &[Rule] = &[
    Rule::Required("duration_ms"),
    Rule::Format {
        field: "duration_ms",
        expected: "a non-negative integer",
        check: is_non_negative_integer,
    },
];

static IF: &[Rule] = &[
    Rule::Required("conditions"),
    Rule::Format {
        field: "conditions",
        expected: "a non-empty array of {field, operator, value} conditions",
        check: is_condition_list,
    },
    Rule::OneOf {
        field: "combinator",
        allowed: COMBINATORS,
    },
];

static SWITCH: &[Rule] = &[
    Rule::Required("field"),
    Rule::Format {
        field: "field",
        expected: "a string",
        check: Value::is_string,
    },
    Rule::Required("cases"),
    Rule::Format {
        field: "cases",
        expected: "a non-empty array of {label, value} cases",
        check: is_case_list,
    },
];

static LOOP: &[Rule] = &[
    Rule::Required("field"),
    Rule::Format {
        field: "field",
        expected: "a string",
        check: Value::is_string,
    },
];

static FILTER: &[Rule] = &[
    Rule::Required("conditions"),
    Rule::Format {
        field: "conditions",
        expected: "a non-empty array of {field, operator, value} conditions",
        check: is_condition_list,
    },
    Rule::OneOf {
        field: "combinator",
        allowed: COMBINATORS,
    },
    Rule::Format {
        field: "field",
        expected: "a string",
        check: Value::is_string,
    },
];

// ---------------------------------------------------------------------------
// Format checks
// ---------------------------------------------------------------------------

fn is_url_path(value: &Value) -> bool {
    value
        .as_str()
        .is_some_and(|s| s.starts_with('/') && !s.chars().any(char::is_whitespace))
}

fn is_http_url(value: &Value) -> bool {
    let Some(url) = value.as_str().and_then(|s| Url::parse(s).ok()) else {
        return false;
    };
    matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty())
}

fn is_email(s: &str) -> bool {
    let s = s.trim();
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
                && !s.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

fn is_email_address(value: &Value) -> bool {
    value.as_str().is_some_and(is_email)
}

fn is_email_list(value: &Value) -> bool {
    value
        .as_str()
        .is_some_and(|s| s.split(',').all(is_email))
}

/// Accepts standard 5-field expressions as well as the 6/7-field form with
/// a leading seconds column.
fn is_cron_expression(value: &Value) -> bool {
    let Some(expr) = value.as_str() else {
        return false;
    };
    let expr = expr.trim();
    let normalized = if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_owned()
    };
    cron::Schedule::from_str(&normalized).is_ok()
}

fn is_non_negative_integer(value: &Value) -> bool {
    value.as_u64().is_some()
}

fn is_string_map(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|map| map.values().all(Value::is_string))
}

fn is_mapping_list(value: &Value) -> bool {
    value.as_array().is_some_and(|items| {
        items.iter().all(|item| {
            item.get("from").is_some_and(Value::is_string)
                && item.get("to").is_some_and(Value::is_string)
        })
    })
}

fn is_condition_list(value: &Value) -> bool {
    value.as_array().is_some_and(|items| {
        !items.is_empty()
            && items.iter().all(|item| {
                item.get("field").is_some_and(Value::is_string)
                    && item
                        .get("operator")
                        .and_then(Value::as_str)
                        .is_some_and(|op| Operator::parse(op).is_some())
            })
    })
}

fn is_case_list(value: &Value) -> bool {
    value.as_array().is_some_and(|items| {
        !items.is_empty()
            && items.iter().all(|item| {
                item.get("label").is_some_and(Value::is_string) && item.get("value").is_some()
            })
    })
}

// ---------------------------------------------------------------------------
// Cross-field checks
// ---------------------------------------------------------------------------

fn http_body_requires_method(config: &Map<String, Value>) -> Option<String> {
    present(config, "body")?;
    let method = config.get("method").and_then(Value::as_str).unwrap_or("GET");
    if matches!(method, "POST" | "PUT" | "PATCH") {
        None
    } else {
        Some(format!("'body' is only allowed with POST, PUT or PATCH (method is {method})"))
    }
}

fn email_needs_body(config: &Map<String, Value>) -> Option<String> {
    if present(config, "body").is_some() || present(config, "html").is_some() {
        None
    } else {
        Some("either 'body' or 'html' is required".to_owned())
    }
}

fn database_operation_fields(config: &Map<String, Value>) -> Option<String> {
    let operation = config.get("operation").and_then(Value::as_str)?;
    let needed = match operation {
        "insert" | "update" => "table",
        "select" | "delete" | "query" => "query",
        _ => return None,
    };
    match present(config, needed) {
        Some(Value::String(s)) if !s.trim().is_empty() => None,
        _ => Some(format!("'{needed}' is required for the '{operation}' operation")),
    }
}

fn transform_has_work(config: &Map<String, Value>) -> Option<String> {
    if present(config, "set").is_some() || present(config, "mappings").is_some() {
        None
    } else {
        Some("at least one of 'set' or 'mappings' is required".to_owned())
    }
}
