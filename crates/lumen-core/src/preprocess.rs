//! Conditional compilation directives.
//!
//! Runs before lexing. Supports `#define`, `#undef`, `#if [!]SYMBOL`,
//! `#else`, `#endif` (nestable) and ignores `#region`/`#endregion`. Directive
//! lines and lines in inactive branches are blanked byte-for-byte, so every
//! span and line number in the output still points into the original text.

use std::collections::HashSet;

use crate::error::ParseError;
use crate::span::Span;

#[derive(Debug, Clone, Copy)]
struct Branch {
    /// Whether the enclosing region is active.
    parent_active: bool,
    /// Whether the current arm of this `#if` is taken.
    taken: bool,
    seen_else: bool,
    span: Span,
}

/// Applies conditional-compilation directives to `source`.
///
/// `defines` seeds the symbol table (compiler-flag defines). Returns text of
/// identical byte length with directive and inactive lines blanked.
pub fn preprocess(source: &str, defines: &[String]) -> Result<String, ParseError> {
    let mut symbols: HashSet<String> = defines.iter().cloned().collect();
    let mut branches: Vec<Branch> = Vec::new();
    let mut out = String::with_capacity(source.len());
    let mut offset = 0usize;

    for line in source.split_inclusive('\n') {
        let span = Span::new(offset, offset + line.trim_end_matches(['\r', '\n']).len());
        offset += line.len();

        let active = branches.last().map_or(true, |b| b.parent_active && b.taken);
        let trimmed = line.trim_start();

        if let Some(directive) = trimmed.strip_prefix('#') {
            let directive = directive.trim_end();
            let (keyword, argument) = match directive.split_once(char::is_whitespace) {
                Some((k, a)) => (k, a.trim()),
                None => (directive, ""),
            };

            match keyword {
                "if" => {
                    let taken = active && evaluate_condition(argument, &symbols, span)?;
                    branches.push(Branch {
                        parent_active: active,
                        taken,
                        seen_else: false,
                        span,
                    });
                }
                "else" => {
                    let branch = branches.last_mut().ok_or_else(|| ParseError::InvalidDirective {
                        reason: "#else without #if".into(),
                        span,
                    })?;
                    if branch.seen_else {
                        return Err(ParseError::InvalidDirective {
                            reason: "duplicate #else".into(),
                            span,
                        });
                    }
                    branch.seen_else = true;
                    branch.taken = !branch.taken;
                }
                "endif" => {
                    branches.pop().ok_or_else(|| ParseError::InvalidDirective {
                        reason: "#endif without #if".into(),
                        span,
                    })?;
                }
                "define" if active => {
                    symbols.insert(require_symbol(argument, span)?.to_string());
                }
                "undef" if active => {
                    symbols.remove(require_symbol(argument, span)?);
                }
                "define" | "undef" | "region" | "endregion" => {}
                other => {
                    return Err(ParseError::InvalidDirective {
                        reason: format!("unknown directive #{other}"),
                        span,
                    });
                }
            }
            blank_line(line, &mut out);
        } else if active {
            out.push_str(line);
        } else {
            blank_line(line, &mut out);
        }
    }

    if let Some(open) = branches.last() {
        return Err(ParseError::InvalidDirective {
            reason: "#if without #endif".into(),
            span: open.span,
        });
    }

    Ok(out)
}

fn evaluate_condition(
    argument: &str,
    symbols: &HashSet<String>,
    span: Span,
) -> Result<bool, ParseError> {
    let (negated, symbol) = match argument.strip_prefix('!') {
        Some(rest) => (true, rest.trim()),
        None => (false, argument),
    };
    let value = match require_symbol(symbol, span)? {
        "true" => true,
        "false" => false,
        name => symbols.contains(name),
    };
    Ok(value != negated)
}

fn require_symbol(argument: &str, span: Span) -> Result<&str, ParseError> {
    let valid = !argument.is_empty()
        && argument
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(argument)
    } else {
        Err(ParseError::InvalidDirective {
            reason: format!("expected a symbol, found '{argument}'"),
            span,
        })
    }
}

/// Replaces every byte of `line` except line terminators with a space.
fn blank_line(line: &str, out: &mut String) {
    for ch in line.chars() {
        match ch {
            '\n' | '\r' => out.push(ch),
            other => {
                for _ in 0..other.len_utf8() {
                    out.push(' ');
                }
            }
        }
    }
}
