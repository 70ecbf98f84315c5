//! Tree differ: turns a pair of [`RenderedTree`]s into a delta [`UpdateTree`],
//! and a pair of keyed iteration item lists into a minimal [`Operation`]
//! list (§4.4, §4.5).
//!
//! The non-iteration half of this is a plain parallel walk: a slot is
//! omitted from the delta when its rendered value didn't change, `statics`
//! is omitted unless the template body at that position actually changed
//! (it never does for a given [`crate::construct::Construct`], but nested
//! conditionals can swap between branches with different statics).
//!
//! The iteration half follows Phoenix LiveView's and dioxus's keyed-list
//! approach: find the longest run of items that kept their relative order
//! (the longest increasing subsequence of old positions) and leave those
//! alone, then express everything else as inserts anchored to a
//! neighboring stable key, plus a tail-only append fast path and a
//! pure-permutation reorder fast path.

use std::collections::{BTreeMap, HashMap, HashSet};

use longest_increasing_subsequence::lis;

use crate::config::EngineConfig;
use crate::rendered::{RenderedTree, RenderedValue};
use crate::tree::{DynValue, InsertPosition, Operation, UpdateTree};

/// Diff two full trees of the same template, producing the delta a client
/// already holding `old` would need to reach `new`.
pub fn diff_tree(old: &RenderedTree, new: &RenderedTree, config: &EngineConfig) -> UpdateTree {
    let statics = if old.statics == new.statics { None } else { Some(new.statics.clone()) };
    let mut dynamics = BTreeMap::new();
    for (slot, new_value) in &new.dynamics {
        match old.dynamics.get(slot) {
            Some(old_value) if old_value == new_value => {}
            Some(old_value) => {
                if let Some(delta) = diff_value(old_value, new_value, config) {
                    dynamics.insert(*slot, delta);
                }
            }
            None => dynamics.insert(*slot, new_value.to_wire()),
        }
    }
    UpdateTree {
        statics,
        dynamics,
        fingerprint: None,
    }
}

/// Diff a single slot's value. Returns `None` only when the two values are
/// equal (the caller already checked that as a fast path via `==`, this
/// handles the case where a nested tree has equal top level but changed
/// children represented structurally the same — kept for symmetry and
/// used directly by nested `Tree` diffing).
fn diff_value(old: &RenderedValue, new: &RenderedValue, config: &EngineConfig) -> Option<DynValue> {
    match (old, new) {
        (RenderedValue::Text(a), RenderedValue::Text(b)) => {
            if a == b {
                None
            } else {
                Some(DynValue::Text(b.clone()))
            }
        }
        (RenderedValue::Tree(a), RenderedValue::Tree(b)) => {
            let delta = diff_tree(a, b, config);
            if delta.is_empty() {
                None
            } else {
                Some(DynValue::Tree(Box::new(delta)))
            }
        }
        (
            RenderedValue::Iteration { statics: old_s, items: old_items },
            RenderedValue::Iteration { statics: new_s, items: new_items },
        ) => {
            // Non-empty -> empty is a full reset (§4.4 "Empty-list special
            // case"): the iteration node survives with `d: []`, statics stay
            // cached, rather than one `Remove` op per departing item.
            if new_items.is_empty() && !old_items.is_empty() {
                return Some(DynValue::Iteration {
                    statics: None,
                    items: Vec::new(),
                });
            }
            let ops = diff_iteration(old_items, new_items, config);
            if ops.is_empty() && old_s == new_s {
                None
            } else if ops_exceed_threshold(&ops, config) {
                // The granular op list outgrew the size a client would save
                // by receiving it instead of a full replacement (§9
                // "size-based policy"). Send the whole iteration node again
                // rather than a huge op list.
                Some(RenderedValue::Iteration {
                    statics: new_s.clone(),
                    items: new_items.to_vec(),
                }
                .to_wire())
            } else {
                Some(DynValue::Ops(ops))
            }
        }
        // A construct's shape never changes between renders of the same
        // template, but a defensive fallback keeps this total rather than
        // panicking on a mismatched pair.
        _ => Some(new.to_wire()),
    }
}

/// Whether an iteration's op list is large enough that a full replacement
/// is cheaper to transmit and apply than the granular ops (§9).
fn ops_exceed_threshold(ops: &[Operation], config: &EngineConfig) -> bool {
    if ops.is_empty() {
        return false;
    }
    let size: usize = ops.iter().map(|op| op.to_value().to_string().len()).sum();
    size > config.full_replacement_threshold_bytes
}

/// Diff two keyed item lists into an operation list (§4.4).
pub fn diff_iteration(
    old: &[(String, RenderedTree)],
    new: &[(String, RenderedTree)],
    config: &EngineConfig,
) -> Vec<Operation> {
    let old_keys: Vec<&str> = old.iter().map(|(k, _)| k.as_str()).collect();
    let new_keys: Vec<&str> = new.iter().map(|(k, _)| k.as_str()).collect();

    if old_keys == new_keys {
        return updates_for_unchanged_order(old, new, config);
    }

    let old_set: HashSet<&str> = old_keys.iter().copied().collect();
    let new_set: HashSet<&str> = new_keys.iter().copied().collect();
    let removed: Vec<&str> = old_keys.iter().copied().filter(|k| !new_set.contains(k)).collect();
    let added_count = new_keys.iter().filter(|k| !old_set.contains(*k)).count();

    // Pure permutation: same key set, different order.
    if removed.is_empty() && added_count == 0 {
        let mut ops = updates_for_unchanged_order_by_key(old, new, config);
        ops.push(Operation::Reorder {
            order: new_keys.iter().map(|k| k.to_string()).collect(),
        });
        return ops;
    }

    // Append fast path: every old key survives, in order, as a prefix of
    // the new key list, and everything added lands at the tail.
    if removed.is_empty() && new_keys.len() >= old_keys.len() && new_keys[..old_keys.len()] == old_keys[..] {
        let mut ops = updates_for_unchanged_order_by_key(old, &new[..old_keys.len()], config);
        let tail: Vec<(String, UpdateTree)> = new[old_keys.len()..]
            .iter()
            .map(|(key, item)| (key.clone(), item.to_wire()))
            .collect();
        if !tail.is_empty() {
            ops.push(Operation::Append { items: tail });
        }
        return ops;
    }

    general_case(old, new, &removed, &old_keys, config)
}

fn general_case(
    old: &[(String, RenderedTree)],
    new: &[(String, RenderedTree)],
    removed: &[&str],
    old_keys: &[&str],
    config: &EngineConfig,
) -> Vec<Operation> {
    let old_index: HashMap<&str, usize> = old_keys.iter().enumerate().map(|(i, k)| (*k, i)).collect();
    let old_items: HashMap<&str, &RenderedTree> = old.iter().map(|(k, t)| (k.as_str(), t)).collect();

    // Positions (into `old`) of the keys that survive, in new order.
    let common_new_order: Vec<(usize, &str)> = new
        .iter()
        .filter_map(|(k, _)| old_index.get(k.as_str()).map(|&old_pos| (old_pos, k.as_str())))
        .collect();
    let old_positions: Vec<usize> = common_new_order.iter().map(|(pos, _)| *pos).collect();
    let anchor_positions: HashSet<usize> = lis(&old_positions).into_iter().collect();
    let anchor_keys: HashSet<&str> = anchor_positions
        .iter()
        .map(|&i| common_new_order[i].1)
        .collect();

    let mut ops = Vec::new();
    for key in removed {
        ops.push(Operation::Remove { key: key.to_string() });
    }

    for (key, item) in new.iter() {
        if anchor_keys.contains(key.as_str()) {
            if let Some(old_item) = old_items.get(key.as_str()) {
                let delta = diff_tree(old_item, item, config);
                if !delta.is_empty() {
                    ops.push(Operation::Update {
                        key: key.clone(),
                        changes: delta,
                    });
                }
            }
        }
    }

    let mut last_stable: Option<String> = None;
    for (key, item) in new.iter() {
        if anchor_keys.contains(key.as_str()) {
            last_stable = Some(key.clone());
            continue;
        }
        let after_key = last_stable.clone();
        let position = if after_key.is_none() { InsertPosition::Start } else { InsertPosition::End };
        ops.push(Operation::Insert {
            after_key,
            position,
            key: key.clone(),
            item: item.to_wire(),
        });
        last_stable = Some(key.clone());
    }

    ops
}

fn updates_for_unchanged_order(
    old: &[(String, RenderedTree)],
    new: &[(String, RenderedTree)],
    config: &EngineConfig,
) -> Vec<Operation> {
    let mut ops = Vec::new();
    for ((old_key, old_item), (new_key, new_item)) in old.iter().zip(new.iter()) {
        debug_assert_eq!(old_key, new_key);
        let delta = diff_tree(old_item, new_item, config);
        if !delta.is_empty() {
            ops.push(Operation::Update {
                key: new_key.clone(),
                changes: delta,
            });
        }
    }
    ops
}

fn updates_for_unchanged_order_by_key(
    old: &[(String, RenderedTree)],
    new: &[(String, RenderedTree)],
    config: &EngineConfig,
) -> Vec<Operation> {
    let old_by_key: HashMap<&str, &RenderedTree> = old.iter().map(|(k, t)| (k.as_str(), t)).collect();
    let mut ops = Vec::new();
    for (key, new_item) in new.iter() {
        if let Some(old_item) = old_by_key.get(key.as_str()) {
            let delta = diff_tree(old_item, new_item, config);
            if !delta.is_empty() {
                ops.push(Operation::Update {
                    key: key.clone(),
                    changes: delta,
                });
            }
        }
    }
    ops
}
