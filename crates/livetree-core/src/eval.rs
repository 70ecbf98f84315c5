//! Expression Evaluator: resolves a compiled [`Path`] against a [`Scope`]
//! chain, producing text, booleans, or sequences.
//!
//! Per the REDESIGN note on reflection-driven field access, the source
//! system's runtime struct reflection is replaced here by generic traversal
//! over `serde_json::Value` behind a small [`DataContext`] trait — callers
//! that want a typed host representation implement the trait by converting
//! to `serde_json::Value` once at the root.

use crate::error::EvaluationError;
use crate::path::{Path, PathRoot, Scope};
use serde_json::Value;

/// A data-access abstraction a caller can implement instead of handing the
/// engine a bare `serde_json::Value`.
pub trait DataContext {
    fn to_root(&self) -> Value;
}

impl DataContext for Value {
    fn to_root(&self) -> Value {
        self.clone()
    }
}

/// Resolve `path` against `scope`, returning `None` on `PathNotFound`.
pub fn lookup(scope: &Scope, path: &Path) -> Option<Value> {
    let mut current = match &path.root {
        PathRoot::Dot => scope.dot.clone(),
        PathRoot::Var(name) => scope.vars.get(name)?.clone(),
    };
    for segment in &path.segments {
        current = step(&current, segment)?;
    }
    Some(current)
}

pub fn lookup_strict(scope: &Scope, path: &Path) -> Result<Value, EvaluationError> {
    lookup(scope, path).ok_or_else(|| EvaluationError::PathNotFound {
        path: path.to_string(),
    })
}

fn step(value: &Value, segment: &str) -> Option<Value> {
    match value {
        Value::Object(map) => map.get(segment).cloned(),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i).cloned()),
        _ => None,
    }
}

/// Go-template-style truthiness: nil, zero-value, and empty collections are
/// false; everything else is true.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Render a value as the string used at a text position (pre-escape).
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string(value).unwrap_or_default()
        }
    }
}

/// Escape the five HTML-unsafe characters for a text position.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn looks_up_nested_field() {
        let scope = Scope::root(json!({"a": {"b": {"c": 5}}}));
        let path = Path::parse(".a.b.c", 1, 1).unwrap();
        assert_eq!(lookup(&scope, &path), Some(json!(5)));
    }

    #[test]
    fn missing_path_is_none() {
        let scope = Scope::root(json!({"a": 1}));
        let path = Path::parse(".missing", 1, 1).unwrap();
        assert_eq!(lookup(&scope, &path), None);
    }

    #[test]
    fn truthiness_matches_go_template_semantics() {
        assert!(!truthy(&Value::Null));
        assert!(!truthy(&json!(false)));
        assert!(!truthy(&json!("")));
        assert!(!truthy(&json!([])));
        assert!(!truthy(&json!({})));
        assert!(truthy(&json!("x")));
        assert!(truthy(&json!(1)));
    }

    #[test]
    fn escapes_html_unsafe_characters() {
        assert_eq!(
            escape_html("<a href=\"x\">'&'</a>"),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
    }
}
