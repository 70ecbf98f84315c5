//! FNV-1a hashing used both for the diagnostic `f` structural fingerprint
//! (§6, §9) and for the Iteration Differ's structural/content-hash key
//! fallbacks (§4.4 priorities 3 and 4).

use serde_json::Value;

/// Hash the canonical JSON encoding of `value` to a 16-hex-char digest.
/// `serde_json::Map` is `BTreeMap`-backed by default (no `preserve_order`
/// feature enabled), so object keys are already emitted in a stable sorted
/// order and this hash is independent of field insertion order.
pub fn fnv1a_hex(value: &Value) -> String {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    format!("{:016x}", fnv1a(&bytes))
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}
