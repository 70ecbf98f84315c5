//! Tree Renderer: evaluates a [`CompiledTemplate`] against a [`Scope`] to
//! produce a [`RenderedTree`], and the pure statics/dynamics interleave
//! shared by direct (SSR-style) rendering and the Client Reconstructor.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::config::{EngineConfig, EvalMode};
use crate::construct::{CompiledTemplate, Construct, KeySource};
use crate::error::{EngineError, EvaluationError};
use crate::eval;
use crate::keys;
use crate::path::Scope;
use crate::registry::Registry;
use crate::rendered::{RenderedTree, RenderedValue};
use crate::tree::{DynValue, UpdateTree};

/// Render `tpl` against `scope` into a [`RenderedTree`] (§4.3): the
/// session-internal representation that carries per-iteration-item keys
/// alongside the rendered values.
///
/// This is a pure function of `(tpl, scope, registry)`: identical inputs
/// produce byte-identical trees (P6).
pub fn render(
    tpl: &CompiledTemplate,
    scope: &Scope,
    registry: &Registry,
    config: &EngineConfig,
) -> Result<RenderedTree, EngineError> {
    render_inner(tpl, scope, registry, config, 0)
}

/// Render `tpl` against `scope` directly into the wire [`UpdateTree`] shape,
/// skipping key bookkeeping. Used for one-shot (non-diffed) rendering — SSR,
/// tests — where there is no session to track keys for.
pub fn render_tree(
    tpl: &CompiledTemplate,
    scope: &Scope,
    registry: &Registry,
    config: &EngineConfig,
) -> Result<UpdateTree, EngineError> {
    Ok(render(tpl, scope, registry, config)?.to_wire())
}

fn render_inner(
    tpl: &CompiledTemplate,
    scope: &Scope,
    registry: &Registry,
    config: &EngineConfig,
    depth: usize,
) -> Result<RenderedTree, EngineError> {
    let dynamics = fill_dynamics(tpl, scope, registry, config, depth)?;
    Ok(RenderedTree {
        statics: tpl.statics.clone(),
        dynamics,
    })
}

fn fill_dynamics(
    tpl: &CompiledTemplate,
    scope: &Scope,
    registry: &Registry,
    config: &EngineConfig,
    depth: usize,
) -> Result<BTreeMap<usize, RenderedValue>, EngineError> {
    let mut out = BTreeMap::new();
    for (slot, construct) in tpl.dynamics.iter().enumerate() {
        let value = render_construct(construct, scope, registry, config, depth)?;
        out.insert(slot, value);
    }
    Ok(out)
}

fn render_construct(
    construct: &Construct,
    scope: &Scope,
    registry: &Registry,
    config: &EngineConfig,
    depth: usize,
) -> Result<RenderedValue, EngineError> {
    match construct {
        Construct::Field { path, escape } => {
            let value = resolve(scope, path, config)?;
            let text = eval::stringify(&value);
            let text = if *escape { eval::escape_html(&text) } else { text };
            Ok(RenderedValue::Text(text))
        }
        Construct::Conditional {
            predicate,
            bind_dot,
            then_branch,
            else_branch,
        } => {
            let pred_value = resolve(scope, predicate, config)?;
            let branch_tree = if eval::truthy(&pred_value) {
                let child = if *bind_dot {
                    scope.with_dot(pred_value)
                } else {
                    scope.clone()
                };
                render_inner(then_branch, &child, registry, config, depth)?
            } else if let Some(else_branch) = else_branch {
                render_inner(else_branch, scope, registry, config, depth)?
            } else {
                RenderedTree {
                    statics: vec![String::new()],
                    dynamics: BTreeMap::new(),
                }
            };
            Ok(RenderedValue::Tree(Box::new(branch_tree)))
        }
        Construct::Iteration {
            collection,
            binding,
            key,
            body,
        } => {
            let elements = resolve_collection(scope, collection, config)?;
            let mut items = Vec::with_capacity(elements.len());
            let mut warned = false;
            for (idx, element) in elements.into_iter().enumerate() {
                let mut child = scope.with_dot(element.clone());
                if let Some((i_name, v_name)) = binding {
                    child.vars.insert(i_name.clone(), json!(idx));
                    child.vars.insert(v_name.clone(), element.clone());
                }
                let item = render_inner(body, &child, registry, config, depth)?;
                let item_key = match key {
                    KeySource::Explicit { static_index, attr: _ } => {
                        keys::explicit_key_text(&item.dynamics, *static_index, &element)
                    }
                    KeySource::Derived => keys::derive_fallback_key(&element, &mut warned),
                };
                items.push((item_key, item));
            }
            Ok(RenderedValue::Iteration {
                statics: body.statics.clone(),
                items,
            })
        }
        Construct::Invocation { name, arg } => {
            if depth + 1 > config.max_recursion_depth {
                return Err(EvaluationError::RecursionLimit {
                    path: arg.to_string(),
                }
                .into());
            }
            let Some(sub) = registry.get(name) else {
                return Err(EvaluationError::UnknownTemplate { name: name.clone() }.into());
            };
            let arg_value = resolve(scope, arg, config)?;
            let child = Scope::root(arg_value);
            let tree = render_inner(&sub, &child, registry, config, depth + 1)?;
            Ok(RenderedValue::Tree(Box::new(tree)))
        }
    }
}

fn resolve(scope: &Scope, path: &crate::path::Path, config: &EngineConfig) -> Result<Value, EngineError> {
    match eval::lookup(scope, path) {
        Some(v) => Ok(v),
        None => match config.eval_mode {
            EvalMode::Lenient => {
                tracing::debug!(path = %path, "path not found, rendering empty");
                Ok(Value::Null)
            }
            EvalMode::Strict => Err(EvaluationError::PathNotFound {
                path: path.to_string(),
            }
            .into()),
        },
    }
}

/// Resolve `path` as the collection an `Iteration` construct ranges over
/// (§4.1), going through the same strict/lenient policy `resolve` applies to
/// `Field`/`Conditional`: a missing path is an empty list in lenient mode and
/// a `PathNotFound` in strict mode; a path that resolves but isn't an array,
/// object, or null is a `TypeMismatch` in strict mode and an empty list
/// (logged) in lenient mode.
fn resolve_collection(
    scope: &Scope,
    path: &crate::path::Path,
    config: &EngineConfig,
) -> Result<Vec<Value>, EngineError> {
    let value = match eval::lookup(scope, path) {
        Some(v) => v,
        None => {
            return match config.eval_mode {
                EvalMode::Lenient => {
                    tracing::debug!(path = %path, "range path not found, rendering empty list");
                    Ok(Vec::new())
                }
                EvalMode::Strict => Err(EvaluationError::PathNotFound {
                    path: path.to_string(),
                }
                .into()),
            }
        }
    };
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(map) => Ok(map.into_iter().map(|(_, v)| v).collect()),
        Value::Null => Ok(Vec::new()),
        _ => match config.eval_mode {
            EvalMode::Lenient => {
                tracing::debug!(path = %path, "range path did not resolve to a collection, rendering empty list");
                Ok(Vec::new())
            }
            EvalMode::Strict => Err(EvaluationError::TypeMismatch {
                path: path.to_string(),
                expected: "array, object, or null",
            }
            .into()),
        },
    }
}

/// Interleave a full update tree's statics and rendered dynamics into HTML
/// (§4.6). Shared by direct (non-diffed) rendering and by
/// `livetree-client`'s post-merge emission step.
pub fn interleave(tree: &UpdateTree) -> String {
    match &tree.statics {
        Some(statics) => interleave_with_statics(statics, &tree.dynamics),
        None => {
            tracing::error!("interleave called on a tree with no statics (invariant violation)");
            String::new()
        }
    }
}

pub fn interleave_with_statics(statics: &[String], dynamics: &BTreeMap<usize, DynValue>) -> String {
    let mut out = String::new();
    for (i, chunk) in statics.iter().enumerate() {
        out.push_str(chunk);
        if i + 1 < statics.len() {
            if let Some(value) = dynamics.get(&i) {
                out.push_str(&render_dyn_value(value));
            }
            // A missing slot renders as empty text (invariant T1).
        }
    }
    out
}

fn render_dyn_value(value: &DynValue) -> String {
    match value {
        DynValue::Text(s) => s.clone(),
        DynValue::Tree(tree) => interleave(tree),
        DynValue::Iteration { statics, items } => match statics {
            Some(statics) => items
                .iter()
                .map(|(_, item)| interleave_with_statics(statics, &item.dynamics))
                .collect(),
            None => {
                tracing::error!("iteration node missing statics during interleave");
                String::new()
            }
        },
        DynValue::Ops(_) => {
            tracing::error!("cannot interleave an operation list; apply it to a cached tree first");
            String::new()
        }
    }
}

/// Compile-and-render convenience used by SSR-style direct render and by
/// property tests checking P1 (statics/dynamics interleave equals a direct
/// render of the same template against the same data).
///
/// `data` can be a bare `serde_json::Value` or any caller-supplied
/// [`eval::DataContext`] implementation; either way it's converted to the
/// root `dot` exactly once, in [`Scope::root`].
pub fn render_html<D: eval::DataContext>(
    tpl: &CompiledTemplate,
    data: D,
    registry: &Registry,
    config: &EngineConfig,
) -> Result<String, EngineError> {
    let scope = Scope::root(data);
    let tree = render_tree(tpl, &scope, registry, config)?;
    Ok(interleave(&tree))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use serde_json::json;

    fn ctx() -> (Registry, EngineConfig) {
        (Registry::new(), EngineConfig::default())
    }

    #[test]
    fn renders_simple_field_update() {
        let tpl = compile("<p>Hello {{.Name}}!</p>").unwrap();
        let (reg, cfg) = ctx();
        let tree = render_tree(&tpl, &Scope::root(json!({"Name": "World"})), &reg, &cfg).unwrap();
        assert_eq!(
            tree.to_value(),
            json!({"s": ["<p>Hello ", "!</p>"], "0": "World"})
        );
        assert_eq!(interleave(&tree), "<p>Hello World!</p>");
    }

    #[test]
    fn renders_conditional_branch() {
        let tpl = compile("<div>{{if .Show}}Welcome {{.Name}}!{{else}}Please log in{{end}}</div>").unwrap();
        let (reg, cfg) = ctx();
        let tree = render_tree(&tpl, &Scope::root(json!({"Show": true, "Name": "John"})), &reg, &cfg).unwrap();
        assert_eq!(interleave(&tree), "<div>Welcome John!</div>");

        let tree2 = render_tree(&tpl, &Scope::root(json!({"Show": false, "Name": "John"})), &reg, &cfg).unwrap();
        assert_eq!(interleave(&tree2), "<div>Please log in</div>");
    }

    #[test]
    fn renders_iteration_over_collection() {
        let tpl = compile("<ul>{{range .Items}}<li>{{.}}</li>{{end}}</ul>").unwrap();
        let (reg, cfg) = ctx();
        let tree = render_tree(&tpl, &Scope::root(json!({"Items": ["A", "B"]})), &reg, &cfg).unwrap();
        assert_eq!(interleave(&tree), "<ul><li>A</li><li>B</li></ul>");
    }

    #[test]
    fn escapes_html_by_default_and_safe_opts_out() {
        let tpl = compile("{{.Raw}}|{{safe .Raw}}").unwrap();
        let (reg, cfg) = ctx();
        let tree = render_tree(&tpl, &Scope::root(json!({"Raw": "<b>x</b>"})), &reg, &cfg).unwrap();
        assert_eq!(interleave(&tree), "&lt;b&gt;x&lt;/b&gt;|<b>x</b>");
    }

    #[test]
    fn invocation_renders_named_template_with_sub_context() {
        let mut reg = Registry::new();
        reg.register("greeting", "Hi, {{.}}!").unwrap();
        let tpl = compile(r#"{{template "greeting" .Name}}"#).unwrap();
        let cfg = EngineConfig::default();
        let tree = render_tree(&tpl, &Scope::root(json!({"Name": "Ada"})), &reg, &cfg).unwrap();
        assert_eq!(interleave(&tree), "Hi, Ada!");
    }

    #[test]
    fn with_rebinds_dot_for_then_branch() {
        let tpl = compile("{{with .User}}{{.Name}}{{end}}").unwrap();
        let (reg, cfg) = ctx();
        let tree = render_tree(&tpl, &Scope::root(json!({"User": {"Name": "Grace"}})), &reg, &cfg).unwrap();
        assert_eq!(interleave(&tree), "Grace");
    }

    #[test]
    fn strict_mode_propagates_missing_path() {
        let tpl = compile("{{.Missing}}").unwrap();
        let reg = Registry::new();
        let cfg = EngineConfig {
            eval_mode: EvalMode::Strict,
            ..EngineConfig::default()
        };
        let err = render_tree(&tpl, &Scope::root(json!({})), &reg, &cfg).unwrap_err();
        assert!(matches!(err, EngineError::Evaluation(EvaluationError::PathNotFound { .. })));
    }

    #[test]
    fn strict_mode_propagates_missing_range_path() {
        let tpl = compile("<ul>{{range .Missing}}<li>{{.}}</li>{{end}}</ul>").unwrap();
        let reg = Registry::new();
        let cfg = EngineConfig {
            eval_mode: EvalMode::Strict,
            ..EngineConfig::default()
        };
        let err = render_tree(&tpl, &Scope::root(json!({})), &reg, &cfg).unwrap_err();
        assert!(matches!(err, EngineError::Evaluation(EvaluationError::PathNotFound { .. })));
    }

    #[test]
    fn strict_mode_rejects_a_range_over_a_scalar() {
        let tpl = compile("<ul>{{range .Items}}<li>{{.}}</li>{{end}}</ul>").unwrap();
        let reg = Registry::new();
        let cfg = EngineConfig {
            eval_mode: EvalMode::Strict,
            ..EngineConfig::default()
        };
        let err = render_tree(&tpl, &Scope::root(json!({"Items": "not a list"})), &reg, &cfg).unwrap_err();
        assert!(matches!(err, EngineError::Evaluation(EvaluationError::TypeMismatch { .. })));
    }

    #[test]
    fn lenient_mode_renders_an_empty_list_for_a_bad_range_path() {
        let tpl = compile("<ul>{{range .Items}}<li>{{.}}</li>{{end}}</ul>").unwrap();
        let (reg, cfg) = ctx();
        let tree = render_tree(&tpl, &Scope::root(json!({"Items": "not a list"})), &reg, &cfg).unwrap();
        assert_eq!(interleave(&tree), "<ul></ul>");
    }

    #[test]
    fn iteration_items_carry_explicit_keys() {
        let tpl = compile(r#"<ul>{{range .Items}}<li id="{{.Id}}">{{.Text}}</li>{{end}}</ul>"#).unwrap();
        let (reg, cfg) = ctx();
        let data = json!({"Items": [{"Id": "a", "Text": "A"}, {"Id": "b", "Text": "B"}]});
        let rendered = render(&tpl, &Scope::root(data), &reg, &cfg).unwrap();
        let RenderedValue::Iteration { items, .. } = rendered.dynamics.get(&0).unwrap() else {
            panic!("expected iteration");
        };
        let keys: Vec<&str> = items.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn iteration_items_fall_back_to_identity_field_without_explicit_attribute() {
        let tpl = compile("<ul>{{range .Items}}<li>{{.Text}}</li>{{end}}</ul>").unwrap();
        let (reg, cfg) = ctx();
        let data = json!({"Items": [{"Id": 1, "Text": "A"}, {"Id": 2, "Text": "B"}]});
        let rendered = render(&tpl, &Scope::root(data), &reg, &cfg).unwrap();
        let RenderedValue::Iteration { items, .. } = rendered.dynamics.get(&0).unwrap() else {
            panic!("expected iteration");
        };
        assert_ne!(items[0].0, items[1].0);
    }
}
