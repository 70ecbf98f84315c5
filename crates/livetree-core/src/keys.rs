//! Key derivation for iteration elements (§4.4).
//!
//! Priority order: (1) an explicit key attribute, resolved at compile time
//! by [`crate::construct::KeySource::Explicit`] and handled in
//! [`crate::render`] directly since it only needs the already-rendered
//! slot; (2)-(4) are the per-element fallback chain implemented here.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::eval;
use crate::fingerprint::fnv1a_hex;
use crate::rendered::RenderedValue;

/// §4.4 priority 2: identity-field names, checked in this order.
const IDENTITY_FIELDS: [&str; 7] = ["ID", "Id", "Name", "Text", "Title", "Key", "Identifier"];

/// §4.4 priority 3: substrings that mark a field as "mutable", excluded
/// from the structural hash.
const MUTABLE_FIELD_PATTERNS: [&str; 6] = ["completed", "status", "count", "updated", "time", "active"];

/// Derive a key for an element that has no explicit key attribute, logging
/// a warning the first time the fallback chain is used for a given
/// compiled template (tracked by the caller via `warned`).
pub fn derive_fallback_key(element: &Value, warned: &mut bool) -> String {
    if let Some(key) = identity_field_key(element) {
        return key;
    }
    if !*warned {
        tracing::warn!(
            "iteration has no explicit key attribute and no identity field; \
             falling back to a structural/content hash, which can collide. \
             Consider adding a `data-lvt-key`, `data-key`, `key`, or `id` attribute."
        );
        *warned = true;
    }
    if let Some(key) = structural_hash_key(element) {
        return key;
    }
    content_hash_key(element)
}

fn identity_field_key(element: &Value) -> Option<String> {
    let Value::Object(map) = element else {
        return None;
    };
    let mut parts = Vec::new();
    for name in IDENTITY_FIELDS {
        if let Some(value) = map.get(name) {
            parts.push(eval::stringify(value));
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(format!("id:{}", parts.join("\u{1}")))
    }
}

fn structural_hash_key(element: &Value) -> Option<String> {
    let Value::Object(map) = element else {
        return None;
    };
    let filtered: serde_json::Map<String, Value> = map
        .iter()
        .filter(|(name, _)| !is_mutable_field(name))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Some(format!("h:{}", fnv1a_hex(&Value::Object(filtered))))
}

fn content_hash_key(element: &Value) -> String {
    format!("c:{}", fnv1a_hex(element))
}

fn is_mutable_field(name: &str) -> bool {
    let lower = name.to_lowercase();
    MUTABLE_FIELD_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Resolve the explicit-key slot's rendered value back into a string, used
/// when `KeySource::Explicit` points at a slot that should already be text.
pub fn explicit_key_text(dynamics: &BTreeMap<usize, RenderedValue>, static_index: usize, element: &Value) -> String {
    match dynamics.get(&static_index) {
        Some(RenderedValue::Text(s)) => s.clone(),
        _ => {
            tracing::warn!(
                static_index,
                "explicit key attribute's dynamic slot did not render to text; falling back to content hash"
            );
            content_hash_key(element)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identity_field_key_is_stable_regardless_of_position() {
        let mut warned = false;
        let a = derive_fallback_key(&json!({"Id": 1, "t": "x"}), &mut warned);
        let b = derive_fallback_key(&json!({"Id": 1, "t": "y"}), &mut warned);
        assert_eq!(a, b);
    }

    #[test]
    fn structural_hash_ignores_mutable_fields() {
        let mut warned = false;
        let a = derive_fallback_key(&json!({"title": "x", "completed": false}), &mut warned);
        let b = derive_fallback_key(&json!({"title": "x", "completed": true}), &mut warned);
        assert_eq!(a, b);
    }

    #[test]
    fn structural_hash_changes_with_immutable_fields() {
        let mut warned = false;
        let a = derive_fallback_key(&json!({"title": "x"}), &mut warned);
        let b = derive_fallback_key(&json!({"title": "y"}), &mut warned);
        assert_ne!(a, b);
    }
}
