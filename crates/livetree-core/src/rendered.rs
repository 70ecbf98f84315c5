//! The session-internal "rendered tree" — the same shape as the wire
//! [`UpdateTree`], except iteration items carry their derived key alongside
//! the rendered sub-tree.
//!
//! Keys are never part of the wire format (§3 Session State keeps them
//! separately from the transmitted tree); they only ever surface as op
//! arguments (`["r", "k2"]`) once the Iteration Differ has used them. This
//! type is what the Tree Renderer produces and what the Update Session
//! diffs; [`to_wire`] strips keys to produce the public full-tree shape.

use std::collections::BTreeMap;

use crate::tree::{DynValue, UpdateTree};

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTree {
    pub statics: Vec<String>,
    pub dynamics: BTreeMap<usize, RenderedValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderedValue {
    Text(String),
    Tree(Box<RenderedTree>),
    Iteration {
        statics: Vec<String>,
        items: Vec<(String, RenderedTree)>,
    },
}

impl RenderedTree {
    pub fn to_wire(&self) -> UpdateTree {
        let mut tree = UpdateTree::full(self.statics.clone());
        for (slot, value) in &self.dynamics {
            tree.dynamics.insert(*slot, value.to_wire());
        }
        tree
    }
}

impl RenderedValue {
    pub fn to_wire(&self) -> DynValue {
        match self {
            RenderedValue::Text(s) => DynValue::Text(s.clone()),
            RenderedValue::Tree(t) => DynValue::Tree(Box::new(t.to_wire())),
            RenderedValue::Iteration { statics, items } => DynValue::Iteration {
                statics: Some(statics.clone()),
                items: items
                    .iter()
                    .map(|(key, item)| {
                        let mut t = item.to_wire();
                        // per-item trees never carry `s` (T2).
                        t.statics = None;
                        (key.clone(), t)
                    })
                    .collect(),
            },
        }
    }
}
