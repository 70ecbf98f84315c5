//! Dotted-path parsing and the scope chain used to resolve them.

use crate::error::CompileError;
use crate::eval::DataContext;

/// Where a [`Path`] begins resolving from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathRoot {
    /// `.`, `.Field` — the current context ("dot").
    Dot,
    /// `$i`, `$v.Name` — a bound iteration variable.
    Var(String),
}

/// A compiled dotted path, e.g. `.User.Name` or `$v.Id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    pub root: PathRoot,
    pub segments: Vec<String>,
}

impl Path {
    pub fn dot() -> Self {
        Path {
            root: PathRoot::Dot,
            segments: Vec::new(),
        }
    }

    /// Parse source text such as `.a.b.c` or `$i` or `$v.Name`.
    pub fn parse(src: &str, line: usize, col: usize) -> Result<Path, CompileError> {
        let src = src.trim();
        if src.is_empty() {
            return Err(CompileError::MalformedPath {
                path: src.to_string(),
                line,
                col,
            });
        }

        let (root, rest) = if let Some(stripped) = src.strip_prefix('$') {
            let mut parts = stripped.splitn(2, '.');
            let name = parts.next().unwrap_or_default().to_string();
            if name.is_empty() {
                return Err(CompileError::MalformedPath {
                    path: src.to_string(),
                    line,
                    col,
                });
            }
            (PathRoot::Var(name), parts.next().unwrap_or(""))
        } else if let Some(stripped) = src.strip_prefix('.') {
            (PathRoot::Dot, stripped)
        } else {
            return Err(CompileError::MalformedPath {
                path: src.to_string(),
                line,
                col,
            });
        };

        let segments = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split('.')
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
        };
        if segments.iter().any(|s| s.is_empty()) {
            return Err(CompileError::MalformedPath {
                path: src.to_string(),
                line,
                col,
            });
        }

        Ok(Path { root, segments })
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.root {
            PathRoot::Dot => write!(f, ".")?,
            PathRoot::Var(name) => write!(f, "${name}")?,
        }
        for seg in &self.segments {
            write!(f, ".{seg}")?;
        }
        Ok(())
    }
}

/// A scope level introduced by `range`, `with`, or an invocation.
///
/// Scopes chain: a child scope's `dot` replaces the parent's for path
/// resolution, but variable bindings accumulate so `$i`/`$v` bound by an
/// outer `range` remain visible (Go templates do not re-expose outer `.`,
/// but do keep `$`-prefixed bindings visible to nested constructs).
#[derive(Debug, Clone)]
pub struct Scope {
    pub dot: serde_json::Value,
    pub vars: rustc_hash::FxHashMap<String, serde_json::Value>,
}

impl Scope {
    /// Build a root scope from anything implementing [`DataContext`], not
    /// just a bare `serde_json::Value` — the engine's entry points accept a
    /// caller-supplied host representation and convert it to the root `dot`
    /// exactly once here.
    pub fn root<D: DataContext>(data: D) -> Self {
        Scope {
            dot: data.to_root(),
            vars: rustc_hash::FxHashMap::default(),
        }
    }

    /// Derive a child scope with a new `dot`, inheriting variable bindings.
    pub fn with_dot(&self, dot: serde_json::Value) -> Self {
        Scope {
            dot,
            vars: self.vars.clone(),
        }
    }

    pub fn with_binding(&self, name: &str, value: serde_json::Value) -> Self {
        let mut vars = self.vars.clone();
        vars.insert(name.to_string(), value);
        Scope {
            dot: self.dot.clone(),
            vars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dot_path() {
        let p = Path::parse(".a.b.c", 1, 1).unwrap();
        assert_eq!(p.root, PathRoot::Dot);
        assert_eq!(p.segments, vec!["a", "b", "c"]);
    }

    #[test]
    fn parses_bare_dot() {
        let p = Path::parse(".", 1, 1).unwrap();
        assert_eq!(p.root, PathRoot::Dot);
        assert!(p.segments.is_empty());
    }

    #[test]
    fn parses_var_path() {
        let p = Path::parse("$v.Name", 1, 1).unwrap();
        assert_eq!(p.root, PathRoot::Var("v".into()));
        assert_eq!(p.segments, vec!["Name"]);
    }

    #[test]
    fn rejects_empty_segment() {
        assert!(Path::parse(".a..b", 1, 1).is_err());
        assert!(Path::parse("", 1, 1).is_err());
        assert!(Path::parse("nodot", 1, 1).is_err());
    }
}
