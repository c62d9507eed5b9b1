//! Type-specific parameter rules.
//!
//! Each rule inspects the parameters of one node type. Rules are looked up
//! by canonical registry id; node types without an entry get no extra
//! checks.

use crate::node::Node;
use crate::validation::ValidationResult;
use boa_engine::ast::scope::Scope;
use boa_engine::interner::Interner;
use boa_engine::parser::{Parser, Source};
use serde_json::Value as JsonValue;
use url::Url;

/// A parameter check for one node type.
pub type ParameterRule = fn(&Node, &mut ValidationResult);

/// Rules keyed by canonical node type id.
const RULES: &[(&str, ParameterRule)] = &[
    ("httpRequest", check_http_request),
    ("scheduleTrigger", check_schedule_trigger),
    ("cron", check_cron),
    ("code", check_code),
    ("function", check_function),
    ("webhook", check_webhook),
];

/// Returns the rule for a canonical node type id, if one exists.
#[must_use]
pub fn rule_for(type_id: &str) -> Option<ParameterRule> {
    RULES
        .iter()
        .find(|(id, _)| *id == type_id)
        .map(|(_, rule)| *rule)
}

/// Engine expressions start with `=` and are only resolved at run time.
fn is_expression(value: &str) -> bool {
    value.starts_with('=')
}

/// True for null, empty strings, empty arrays, and objects or arrays whose
/// members are all blank.
fn is_blank(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::String(s) => s.trim().is_empty(),
        JsonValue::Array(items) => items.iter().all(is_blank),
        JsonValue::Object(map) => map.values().all(is_blank),
        JsonValue::Bool(_) | JsonValue::Number(_) => false,
    }
}

fn check_http_request(node: &Node, result: &mut ValidationResult) {
    let label = node.label();
    let Some(raw) = node.str_param("url").map(str::trim).filter(|u| !u.is_empty()) else {
        result.error(format!("Node '{label}': HTTP request requires a URL"));
        return;
    };

    if is_expression(raw) {
        return;
    }

    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => result.error(format!(
            "Node '{label}': URL '{raw}' must use http or https, not '{}'",
            url.scheme()
        )),
        Err(e) => result.error(format!("Node '{label}': invalid URL '{raw}': {e}")),
    }
}

fn check_schedule(node: &Node, key: &str, result: &mut ValidationResult) {
    if node.parameters.get(key).is_none_or(is_blank) {
        result.error(format!(
            "Node '{}': schedule trigger requires a schedule rule",
            node.label()
        ));
    }
}

fn check_schedule_trigger(node: &Node, result: &mut ValidationResult) {
    check_schedule(node, "rule", result);
}

fn check_cron(node: &Node, result: &mut ValidationResult) {
    check_schedule(node, "triggerTimes", result);
}

fn check_source(node: &Node, key: &str, result: &mut ValidationResult) {
    let label = node.label();
    let Some(source) = node.str_param(key).filter(|s| !s.trim().is_empty()) else {
        result.error(format!("Node '{label}': code node has no code"));
        return;
    };

    if let Err(message) = parse_function_body(source) {
        result.error(format!("Node '{label}': code does not parse: {message}"));
    }
}

fn check_code(node: &Node, result: &mut ValidationResult) {
    if node.str_param("language") == Some("python") {
        if node.str_param("pythonCode").is_none_or(|s| s.trim().is_empty()) {
            result.error(format!("Node '{}': code node has no code", node.label()));
        }
        return;
    }
    check_source(node, "jsCode", result);
}

fn check_function(node: &Node, result: &mut ValidationResult) {
    check_source(node, "functionCode", result);
}

fn check_webhook(node: &Node, result: &mut ValidationResult) {
    if node.str_param("path").is_none_or(|p| p.trim().is_empty()) {
        result.suggestion(format!(
            "Node '{}': set a webhook path so the webhook URL stays stable",
            node.label()
        ));
    }
}

/// Parses `source` as the body of an async function without running it.
///
/// Code nodes may `return` and `await` at their top level, so the source is
/// wrapped in a function declaration before parsing. The wrapped script must
/// hold exactly that one declaration: source that closes the wrapper early
/// leaves extra top-level statements behind and is rejected.
pub fn parse_function_body(source: &str) -> Result<(), String> {
    let wrapped = format!("async function body() {{\n{source}\n}}");
    let mut interner = Interner::default();
    let mut parser = Parser::new(Source::from_bytes(wrapped.as_bytes()));
    let script = parser
        .parse_script(&Scope::new_global(), &mut interner)
        .map_err(|e| e.to_string())?;

    if script.statements().statements().len() != 1 {
        return Err("code closes its enclosing function body".to_string());
    }
    Ok(())
}
