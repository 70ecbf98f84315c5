//! The Update Tree / Delta Tree wire shape (§3, §6).
//!
//! A single type serves both full trees and delta trees: a full tree is a
//! delta tree whose `statics` is always present and whose dynamic slots are
//! never omitted. The wire format is not a plain serde-derivable shape (a
//! dynamic slot is a string, a nested tree, an iteration node, *or* a bare
//! operation-list array, distinguished only by JSON value kind) so
//! conversion to/from `serde_json::Value` is implemented by hand.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::EngineError;

/// One JSON-shaped update/delta tree node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateTree {
    /// `s`. `None` means "unchanged since last transmission, retain the
    /// client's cached statics" (only valid inside a delta tree).
    pub statics: Option<Vec<String>>,
    /// Numeric-string-keyed dynamic slots, sparse in a delta tree, dense
    /// (`0..dynamics.len()`) in a full tree.
    pub dynamics: BTreeMap<usize, DynValue>,
    /// `f`, optional structural fingerprint. Diagnostic only; never read
    /// back by the Client Reconstructor.
    pub fingerprint: Option<String>,
}

impl UpdateTree {
    pub fn full(statics: Vec<String>) -> Self {
        UpdateTree {
            statics: Some(statics),
            dynamics: BTreeMap::new(),
            fingerprint: None,
        }
    }

    pub fn set(&mut self, slot: usize, value: DynValue) {
        self.dynamics.insert(slot, value);
    }

    /// True if this tree carries no information at all — per P5, a delta
    /// that is empty is never sent as a frame.
    pub fn is_empty(&self) -> bool {
        self.statics.is_none() && self.dynamics.is_empty() && self.fingerprint.is_none()
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(statics) = &self.statics {
            map.insert(
                "s".to_string(),
                Value::Array(statics.iter().cloned().map(Value::String).collect()),
            );
        }
        if let Some(fp) = &self.fingerprint {
            map.insert("f".to_string(), Value::String(fp.clone()));
        }
        for (slot, value) in &self.dynamics {
            map.insert(slot.to_string(), value.to_value());
        }
        Value::Object(map)
    }

    pub fn from_value(value: &Value) -> Result<Self, EngineError> {
        let Value::Object(map) = value else {
            return Err(EngineError::Protocol("update tree must be a JSON object".into()));
        };
        let statics = match map.get("s") {
            None => None,
            Some(Value::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(s) => out.push(s.clone()),
                        _ => return Err(EngineError::Protocol("`s` must be an array of strings".into())),
                    }
                }
                Some(out)
            }
            Some(_) => return Err(EngineError::Protocol("`s` must be an array".into())),
        };
        let fingerprint = match map.get("f") {
            None => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => return Err(EngineError::Protocol("`f` must be a string".into())),
        };
        let mut dynamics = BTreeMap::new();
        for (key, val) in map {
            if key == "s" || key == "f" {
                continue;
            }
            let slot: usize = key
                .parse()
                .map_err(|_| EngineError::Protocol(format!("unexpected key `{key}` in update tree")))?;
            dynamics.insert(slot, DynValue::from_value(val)?);
        }
        Ok(UpdateTree {
            statics,
            dynamics,
            fingerprint,
        })
    }
}

/// The value held at one dynamic slot.
#[derive(Debug, Clone, PartialEq)]
pub enum DynValue {
    /// Escaped (or marked-safe) text.
    Text(String),
    /// A nested update tree, produced by `Conditional`/`Invocation`.
    Tree(Box<UpdateTree>),
    /// A full iteration node: `{ s: [...], d: [[key, item], ...] }`. Items
    /// carry their key here because this is the only place a freshly
    /// introduced item's key reaches the wire — later `Operation`s address
    /// it by that same string.
    Iteration {
        statics: Option<Vec<String>>,
        items: Vec<(String, UpdateTree)>,
    },
    /// A delta-only iteration node carrying an operation list in place of
    /// `d` (§4.4, §6).
    Ops(Vec<Operation>),
}

impl DynValue {
    pub fn to_value(&self) -> Value {
        match self {
            DynValue::Text(s) => Value::String(s.clone()),
            DynValue::Tree(tree) => tree.to_value(),
            DynValue::Iteration { statics, items } => {
                let mut map = Map::new();
                if let Some(statics) = statics {
                    map.insert(
                        "s".to_string(),
                        Value::Array(statics.iter().cloned().map(Value::String).collect()),
                    );
                }
                map.insert(
                    "d".to_string(),
                    Value::Array(
                        items
                            .iter()
                            .map(|(key, item)| Value::Array(vec![Value::String(key.clone()), item.to_value()]))
                            .collect(),
                    ),
                );
                Value::Object(map)
            }
            DynValue::Ops(ops) => Value::Array(ops.iter().map(Operation::to_value).collect()),
        }
    }

    pub fn from_value(value: &Value) -> Result<Self, EngineError> {
        match value {
            Value::String(s) => Ok(DynValue::Text(s.clone())),
            Value::Array(items) => {
                let ops = items
                    .iter()
                    .map(Operation::from_value)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(DynValue::Ops(ops))
            }
            Value::Object(map) if map.contains_key("d") => {
                let statics = match map.get("s") {
                    None => None,
                    Some(Value::Array(arr)) => Some(
                        arr.iter()
                            .map(|v| match v {
                                Value::String(s) => Ok(s.clone()),
                                _ => Err(EngineError::Protocol("`s` must be strings".into())),
                            })
                            .collect::<Result<Vec<_>, _>>()?,
                    ),
                    Some(_) => return Err(EngineError::Protocol("`s` must be an array".into())),
                };
                let Some(Value::Array(d)) = map.get("d") else {
                    return Err(EngineError::Protocol("`d` must be an array".into()));
                };
                let items = d
                    .iter()
                    .map(|entry| {
                        let Value::Array(pair) = entry else {
                            return Err(EngineError::Protocol("iteration item must be a [key, item] pair".into()));
                        };
                        let key = str_arg(pair, 0)?;
                        let item = UpdateTree::from_value(pair.get(1).ok_or_else(missing)?)?;
                        Ok((key, item))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(DynValue::Iteration { statics, items })
            }
            Value::Object(_) => Ok(DynValue::Tree(Box::new(UpdateTree::from_value(value)?))),
            _ => Err(EngineError::Protocol("unexpected dynamic slot shape".into())),
        }
    }
}

/// Where a keyed insert lands when there is no `after_key` to anchor to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    Start,
    End,
}

/// One keyed iteration operation (§4.4).
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Remove { key: String },
    Update { key: String, changes: UpdateTree },
    Insert {
        after_key: Option<String>,
        position: InsertPosition,
        key: String,
        item: UpdateTree,
    },
    /// Fast path for "all new items are at the tail".
    Append { items: Vec<(String, UpdateTree)> },
    Reorder { order: Vec<String> },
}

impl Operation {
    fn opcode(&self) -> &'static str {
        match self {
            Operation::Remove { .. } => "r",
            Operation::Update { .. } => "u",
            Operation::Insert { .. } => "i",
            Operation::Append { .. } => "a",
            Operation::Reorder { .. } => "o",
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Operation::Remove { key } => Value::Array(vec![
                Value::String(self.opcode().into()),
                Value::String(key.clone()),
            ]),
            Operation::Update { key, changes } => Value::Array(vec![
                Value::String(self.opcode().into()),
                Value::String(key.clone()),
                changes.to_value(),
            ]),
            Operation::Insert {
                after_key,
                position,
                key,
                item,
            } => Value::Array(vec![
                Value::String(self.opcode().into()),
                after_key.clone().map(Value::String).unwrap_or(Value::Null),
                Value::String(
                    match position {
                        InsertPosition::Start => "start",
                        InsertPosition::End => "end",
                    }
                    .into(),
                ),
                Value::String(key.clone()),
                item.to_value(),
            ]),
            Operation::Append { items } => Value::Array(vec![
                Value::String(self.opcode().into()),
                Value::Array(
                    items
                        .iter()
                        .map(|(key, item)| Value::Array(vec![Value::String(key.clone()), item.to_value()]))
                        .collect(),
                ),
            ]),
            Operation::Reorder { order } => Value::Array(vec![
                Value::String(self.opcode().into()),
                Value::Array(order.iter().cloned().map(Value::String).collect()),
            ]),
        }
    }

    pub fn from_value(value: &Value) -> Result<Self, EngineError> {
        let Value::Array(items) = value else {
            return Err(EngineError::Protocol("operation must be a JSON array".into()));
        };
        let Some(Value::String(opcode)) = items.first() else {
            return Err(EngineError::Protocol("operation missing opcode".into()));
        };
        match opcode.as_str() {
            "r" => {
                let key = str_arg(items, 1)?;
                Ok(Operation::Remove { key })
            }
            "u" => {
                let key = str_arg(items, 1)?;
                let changes = UpdateTree::from_value(items.get(2).ok_or_else(missing)?)?;
                Ok(Operation::Update { key, changes })
            }
            "i" => {
                let after_key = match items.get(1) {
                    Some(Value::String(s)) => Some(s.clone()),
                    Some(Value::Null) | None => None,
                    _ => return Err(EngineError::Protocol("`afterKey` must be a string or null".into())),
                };
                let position = match items.get(2) {
                    Some(Value::String(s)) if s == "start" => InsertPosition::Start,
                    Some(Value::String(s)) if s == "end" => InsertPosition::End,
                    _ => return Err(EngineError::Protocol("insert position must be start|end".into())),
                };
                let key = str_arg(items, 3)?;
                let item = UpdateTree::from_value(items.get(4).ok_or_else(missing)?)?;
                Ok(Operation::Insert {
                    after_key,
                    position,
                    key,
                    item,
                })
            }
            "a" => {
                let Some(Value::Array(raw)) = items.get(1) else {
                    return Err(EngineError::Protocol("`a` payload must be an array of items".into()));
                };
                let items = raw
                    .iter()
                    .map(|entry| {
                        let Value::Array(pair) = entry else {
                            return Err(EngineError::Protocol("append item must be a [key, item] pair".into()));
                        };
                        let key = str_arg(pair, 0)?;
                        let item = UpdateTree::from_value(pair.get(1).ok_or_else(missing)?)?;
                        Ok((key, item))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Operation::Append { items })
            }
            "o" => {
                let Some(Value::Array(raw)) = items.get(1) else {
                    return Err(EngineError::Protocol("`o` payload must be an array of keys".into()));
                };
                let order = raw
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => Ok(s.clone()),
                        _ => Err(EngineError::Protocol("reorder keys must be strings".into())),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Operation::Reorder { order })
            }
            other => Err(EngineError::Protocol(format!("unknown opcode `{other}`"))),
        }
    }
}

fn missing() -> EngineError {
    EngineError::Protocol("operation missing argument".into())
}

fn str_arg(items: &[Value], idx: usize) -> Result<String, EngineError> {
    match items.get(idx) {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(EngineError::Protocol("expected string argument".into())),
    }
}
