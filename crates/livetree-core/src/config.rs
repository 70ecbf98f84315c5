//! Engine configuration, passed explicitly into render/session entry points
//! rather than read from a global — see REDESIGN FLAG "Global singletons".

/// How an unresolved path or type mismatch is handled during evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    /// `PathNotFound`/type errors render the construct as empty and keep
    /// going (§4.1, §7).
    Lenient,
    /// `PathNotFound`/type errors fail the whole render.
    Strict,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub eval_mode: EvalMode,
    /// Bounds `{{ template }}` recursion (§9 "Cyclic references in data").
    pub max_recursion_depth: usize,
    /// Whether to attach the diagnostic `f` fingerprint to full trees.
    pub emit_fingerprint: bool,
    /// Upper bound on an iteration's outbound operation list (bytes,
    /// approximated by serialized JSON length) beyond which the Iteration
    /// Differ prefers a full-replacement `Append`/reset instead of granular
    /// ops — the size-based policy decision recorded in §9.
    pub full_replacement_threshold_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            eval_mode: EvalMode::Lenient,
            max_recursion_depth: 64,
            emit_fingerprint: false,
            full_replacement_threshold_bytes: 64 * 1024,
        }
    }
}
