//! The compiled-template data model: [`Construct`] variants plus the
//! statics/dynamics partition required by invariant C1.

use crate::path::Path;

/// How a stable per-element key is derived for an [`Construct::Iteration`].
///
/// `Explicit` is resolved once at compile time by scanning the body's
/// statics for a literal key attribute (§4.4 priority 1). Everything else
/// is resolved per-element at diff time by the Iteration Differ, since it
/// depends on rendered values the compiler cannot see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// The body's `statics[static_index]` ends with `{attr}="`, and the key
    /// value is whatever the following dynamic slot renders to.
    Explicit { static_index: usize, attr: &'static str },
    /// No explicit attribute found; the differ falls back to the
    /// identity-field / structural-hash / content-hash chain per element.
    Derived,
}

/// One dynamic position in a compiled template.
#[derive(Debug, Clone, PartialEq)]
pub enum Construct {
    /// Dotted-path field reference, HTML-escaped unless `escape` is false
    /// (set only by the `{{ safe . }}` marker directive).
    Field { path: Path, escape: bool },
    /// `{{ if pred }}then{{ else }}else{{ end }}`, or `{{ with pred }}…{{ end }}`
    /// when `bind_dot` is set. `else_branch` is `None` when no `{{ else }}`
    /// was present (falsy predicate renders nothing).
    Conditional {
        predicate: Path,
        /// `with` rebinds `.` to the predicate's value inside `then_branch`;
        /// plain `if` leaves the outer `.` untouched.
        bind_dot: bool,
        then_branch: CompiledTemplate,
        else_branch: Option<CompiledTemplate>,
    },
    /// `{{ range [$i, $v :=] coll }}body{{ end }}`.
    Iteration {
        collection: Path,
        binding: Option<(String, String)>,
        key: KeySource,
        body: CompiledTemplate,
    },
    /// `{{ template "name" arg }}`.
    Invocation { name: String, arg: Path },
}

/// An ordered sequence of [`Construct`]s plus the derived `statics` array.
///
/// Invariant C1: `statics.len() == dynamics.len() + 1`. Rendering
/// concatenates `statics[0] + render(dynamics[0]) + statics[1] + … +
/// render(dynamics[N-1]) + statics[N]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTemplate {
    pub statics: Vec<String>,
    pub dynamics: Vec<Construct>,
}

impl CompiledTemplate {
    /// Build from a statics/dynamics pair, checking invariant C1.
    pub fn new(statics: Vec<String>, dynamics: Vec<Construct>) -> Self {
        debug_assert_eq!(
            statics.len(),
            dynamics.len() + 1,
            "statics/dynamics partition violates invariant C1"
        );
        CompiledTemplate { statics, dynamics }
    }
}
