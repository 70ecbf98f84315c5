//! Template Compiler: tokenizes source text and builds a [`CompiledTemplate`]
//! tree, partitioning the token stream into the `statics` array and an
//! ordered [`Construct`] list (invariant C1).

use crate::construct::{CompiledTemplate, Construct, KeySource};
use crate::error::CompileError;
use crate::path::Path;

type Span = (usize, usize);

#[derive(Debug, Clone)]
enum RawTok {
    Literal(String),
    Field { path: Path, escape: bool },
    If(Path, Span),
    With(Path, Span),
    Else(Span),
    Range {
        collection: Path,
        binding: Option<(String, String)>,
        span: Span,
    },
    Template { name: String, arg: Path },
    End(Span),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminator {
    Eof,
    End(usize, usize),
    Else(usize, usize),
}

/// Compile source text into a [`CompiledTemplate`].
pub fn compile(src: &str) -> Result<CompiledTemplate, CompileError> {
    let toks = tokenize(src)?;
    let mut pos = 0usize;
    let (tpl, term) = parse_block(&toks, &mut pos)?;
    match term {
        Terminator::Eof => Ok(tpl),
        Terminator::End(line, col) => Err(CompileError::UnmatchedEnd { line, col }),
        Terminator::Else(line, col) => Err(CompileError::UnmatchedEnd { line, col }),
    }
}

fn parse_block(toks: &[RawTok], pos: &mut usize) -> Result<(CompiledTemplate, Terminator), CompileError> {
    let mut statics = vec![String::new()];
    let mut dynamics = Vec::new();

    loop {
        let Some(tok) = toks.get(*pos) else {
            return Ok((CompiledTemplate::new(statics, dynamics), Terminator::Eof));
        };
        match tok {
            RawTok::Literal(text) => {
                statics.last_mut().unwrap().push_str(text);
                *pos += 1;
            }
            RawTok::End((line, col)) => {
                let term = Terminator::End(*line, *col);
                *pos += 1;
                return Ok((CompiledTemplate::new(statics, dynamics), term));
            }
            RawTok::Else((line, col)) => {
                let term = Terminator::Else(*line, *col);
                *pos += 1;
                return Ok((CompiledTemplate::new(statics, dynamics), term));
            }
            RawTok::Field { path, escape } => {
                dynamics.push(Construct::Field {
                    path: path.clone(),
                    escape: *escape,
                });
                statics.push(String::new());
                *pos += 1;
            }
            RawTok::Template { name, arg } => {
                dynamics.push(Construct::Invocation {
                    name: name.clone(),
                    arg: arg.clone(),
                });
                statics.push(String::new());
                *pos += 1;
            }
            RawTok::If(pred, (line, col)) => {
                let predicate = pred.clone();
                let (line, col) = (*line, *col);
                *pos += 1;
                let (then_branch, term) = parse_block(toks, pos)?;
                let else_branch = match term {
                    Terminator::End(..) => None,
                    Terminator::Else(..) => {
                        let (eb, term2) = parse_block(toks, pos)?;
                        match term2 {
                            Terminator::End(..) => Some(eb),
                            Terminator::Eof => {
                                return Err(CompileError::UnclosedDirective {
                                    directive: "if",
                                    line,
                                    col,
                                })
                            }
                            Terminator::Else(l2, c2) => {
                                return Err(CompileError::UnmatchedEnd { line: l2, col: c2 })
                            }
                        }
                    }
                    Terminator::Eof => {
                        return Err(CompileError::UnclosedDirective {
                            directive: "if",
                            line,
                            col,
                        })
                    }
                };
                dynamics.push(Construct::Conditional {
                    predicate,
                    bind_dot: false,
                    then_branch,
                    else_branch,
                });
                statics.push(String::new());
            }
            RawTok::With(pred, (line, col)) => {
                let predicate = pred.clone();
                let (line, col) = (*line, *col);
                *pos += 1;
                let (then_branch, term) = parse_block(toks, pos)?;
                let else_branch = match term {
                    Terminator::End(..) => None,
                    Terminator::Else(..) => {
                        let (eb, term2) = parse_block(toks, pos)?;
                        match term2 {
                            Terminator::End(..) => Some(eb),
                            Terminator::Eof => {
                                return Err(CompileError::UnclosedDirective {
                                    directive: "with",
                                    line,
                                    col,
                                })
                            }
                            Terminator::Else(l2, c2) => {
                                return Err(CompileError::UnmatchedEnd { line: l2, col: c2 })
                            }
                        }
                    }
                    Terminator::Eof => {
                        return Err(CompileError::UnclosedDirective {
                            directive: "with",
                            line,
                            col,
                        })
                    }
                };
                dynamics.push(Construct::Conditional {
                    predicate,
                    bind_dot: true,
                    then_branch,
                    else_branch,
                });
                statics.push(String::new());
            }
            RawTok::Range {
                collection,
                binding,
                span: (line, col),
            } => {
                let collection = collection.clone();
                let binding = binding.clone();
                let (line, col) = (*line, *col);
                *pos += 1;
                let (body, term) = parse_block(toks, pos)?;
                match term {
                    Terminator::End(..) => {}
                    Terminator::Eof => {
                        return Err(CompileError::UnclosedDirective {
                            directive: "range",
                            line,
                            col,
                        })
                    }
                    Terminator::Else(l2, c2) => {
                        return Err(CompileError::UnmatchedEnd { line: l2, col: c2 })
                    }
                }
                let key = detect_key_source(&body);
                dynamics.push(Construct::Iteration {
                    collection,
                    binding,
                    key,
                    body,
                });
                statics.push(String::new());
            }
        }
    }
}

/// Locate the explicit key attribute per §4.4 priority 1: scan the body's
/// top-level statics for the first literal `attr="` match, in priority
/// order, and record the dynamic slot immediately following it.
fn detect_key_source(body: &CompiledTemplate) -> KeySource {
    const PRIORITY: [(&str, &str); 4] = [
        ("data-lvt-key=\"", "data-lvt-key"),
        ("data-key=\"", "data-key"),
        ("key=\"", "key"),
        ("id=\"", "id"),
    ];
    for (pattern, attr) in PRIORITY {
        for (i, s) in body.statics.iter().enumerate() {
            if i + 1 < body.statics.len() && s.ends_with(pattern) {
                return KeySource::Explicit {
                    static_index: i,
                    attr,
                };
            }
        }
    }
    KeySource::Derived
}

fn tokenize(src: &str) -> Result<Vec<RawTok>, CompileError> {
    let mut toks = Vec::new();
    let mut rest = src;
    let mut consumed = 0usize;

    loop {
        match rest.find("{{") {
            None => {
                if !rest.is_empty() {
                    toks.push(RawTok::Literal(rest.to_string()));
                }
                break;
            }
            Some(idx) => {
                if idx > 0 {
                    toks.push(RawTok::Literal(rest[..idx].to_string()));
                }
                let directive_start = consumed + idx;
                let after = &rest[idx + 2..];
                let Some(end) = after.find("}}") else {
                    let (line, col) = locate(src, directive_start);
                    return Err(CompileError::UnclosedDirective {
                        directive: "{{",
                        line,
                        col,
                    });
                };
                let body = after[..end].trim();
                let (line, col) = locate(src, directive_start);
                toks.push(classify(body, line, col)?);
                consumed = directive_start + 4 + end;
                rest = &after[end + 2..];
            }
        }
    }
    Ok(toks)
}

fn locate(src: &str, byte_pos: usize) -> (usize, usize) {
    let mut line = 1usize;
    let mut col = 1usize;
    for c in src[..byte_pos.min(src.len())].chars() {
        if c == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

fn classify(body: &str, line: usize, col: usize) -> Result<RawTok, CompileError> {
    if let Some(rest) = body.strip_prefix("if ") {
        return Ok(RawTok::If(Path::parse(rest, line, col)?, (line, col)));
    }
    if body == "else" {
        return Ok(RawTok::Else((line, col)));
    }
    if let Some(rest) = body.strip_prefix("with ") {
        return Ok(RawTok::With(Path::parse(rest, line, col)?, (line, col)));
    }
    if body == "end" {
        return Ok(RawTok::End((line, col)));
    }
    if let Some(rest) = body.strip_prefix("range ") {
        return classify_range(rest, line, col);
    }
    if let Some(rest) = body.strip_prefix("template ") {
        return classify_template(rest.trim(), line, col);
    }
    if let Some(rest) = body.strip_prefix("safe ") {
        let path = Path::parse(rest.trim(), line, col)?;
        return Ok(RawTok::Field { path, escape: false });
    }
    match Path::parse(body, line, col) {
        Ok(path) => Ok(RawTok::Field { path, escape: true }),
        Err(_) => Err(CompileError::UnknownDirective {
            name: body.to_string(),
            line,
            col,
        }),
    }
}

fn classify_range(rest: &str, line: usize, col: usize) -> Result<RawTok, CompileError> {
    if let Some(eq_idx) = rest.find(":=") {
        let vars_part = rest[..eq_idx].trim();
        let coll_part = rest[eq_idx + 2..].trim();
        let mut vars = vars_part.split(',').map(|s| s.trim().trim_start_matches('$'));
        let i_name = vars
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CompileError::MalformedPath {
                path: rest.to_string(),
                line,
                col,
            })?
            .to_string();
        let v_name = vars
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CompileError::MalformedPath {
                path: rest.to_string(),
                line,
                col,
            })?
            .to_string();
        let collection = Path::parse(coll_part, line, col)?;
        Ok(RawTok::Range {
            collection,
            binding: Some((i_name, v_name)),
            span: (line, col),
        })
    } else {
        let collection = Path::parse(rest.trim(), line, col)?;
        Ok(RawTok::Range {
            collection,
            binding: None,
            span: (line, col),
        })
    }
}

fn classify_template(rest: &str, line: usize, col: usize) -> Result<RawTok, CompileError> {
    if !rest.starts_with('"') {
        return Err(CompileError::EmptyTemplateName { line, col });
    }
    let after_quote = &rest[1..];
    let Some(end_quote) = after_quote.find('"') else {
        return Err(CompileError::EmptyTemplateName { line, col });
    };
    let name = after_quote[..end_quote].to_string();
    if name.is_empty() {
        return Err(CompileError::EmptyTemplateName { line, col });
    }
    let arg_src = after_quote[end_quote + 1..].trim();
    let arg = if arg_src.is_empty() {
        Path::dot()
    } else {
        Path::parse(arg_src, line, col)?
    };
    Ok(RawTok::Template { name, arg })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_simple_field_template() {
        let tpl = compile("<p>Hello {{.Name}}!</p>").unwrap();
        assert_eq!(tpl.statics, vec!["<p>Hello ", "!</p>"]);
        assert_eq!(tpl.dynamics.len(), 1);
    }

    #[test]
    fn retains_empty_static_slots() {
        // Two adjacent dynamics with nothing between them: the middle
        // static slot must be retained as "" so C1 holds.
        let tpl = compile("{{.A}}{{.B}}").unwrap();
        assert_eq!(tpl.statics, vec!["", "", ""]);
        assert_eq!(tpl.dynamics.len(), 2);
    }

    #[test]
    fn compiles_conditional_with_else() {
        let tpl = compile("<div>{{if .Show}}Welcome{{else}}Please log in{{end}}</div>").unwrap();
        assert_eq!(tpl.dynamics.len(), 1);
        match &tpl.dynamics[0] {
            Construct::Conditional {
                then_branch,
                else_branch,
                bind_dot,
                ..
            } => {
                assert!(!bind_dot);
                assert_eq!(then_branch.statics, vec!["Welcome"]);
                assert_eq!(else_branch.as_ref().unwrap().statics, vec!["Please log in"]);
            }
            other => panic!("expected Conditional, got {other:?}"),
        }
    }

    #[test]
    fn compiles_range_with_binding() {
        let tpl = compile("{{range $i, $v := .Items}}{{$v}}{{end}}").unwrap();
        match &tpl.dynamics[0] {
            Construct::Iteration { binding, .. } => {
                assert_eq!(binding, &Some(("i".to_string(), "v".to_string())));
            }
            other => panic!("expected Iteration, got {other:?}"),
        }
    }

    #[test]
    fn detects_explicit_key_attribute() {
        let tpl = compile(r#"<ul>{{range .Items}}<li id="{{.Id}}">{{.Text}}</li>{{end}}</ul>"#).unwrap();
        match &tpl.dynamics[0] {
            Construct::Iteration { key, .. } => {
                assert_eq!(
                    key,
                    &KeySource::Explicit {
                        static_index: 0,
                        attr: "id"
                    }
                );
            }
            other => panic!("expected Iteration, got {other:?}"),
        }
    }

    #[test]
    fn falls_back_to_derived_key_without_explicit_attribute() {
        let tpl = compile("{{range .Items}}<li>{{.}}</li>{{end}}").unwrap();
        match &tpl.dynamics[0] {
            Construct::Iteration { key, .. } => assert_eq!(key, &KeySource::Derived),
            other => panic!("expected Iteration, got {other:?}"),
        }
    }

    #[test]
    fn unmatched_end_is_a_compile_error() {
        let err = compile("{{end}}").unwrap_err();
        assert!(matches!(err, CompileError::UnmatchedEnd { .. }));
    }

    #[test]
    fn unclosed_if_is_a_compile_error() {
        let err = compile("{{if .X}}no end").unwrap_err();
        assert!(matches!(
            err,
            CompileError::UnclosedDirective { directive: "if", .. }
        ));
    }

    #[test]
    fn unknown_directive_is_a_compile_error() {
        let err = compile("{{frobnicate .X}}").unwrap_err();
        assert!(matches!(err, CompileError::UnknownDirective { .. }));
    }
}
