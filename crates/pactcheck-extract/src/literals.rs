//! Literal evaluation shared by the TypeScript extractors: numeric
//! expressions, size strings and `@bound` constant declarations.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use pactcheck_core::{BoundKind, BoundOrigin, DeclaredBound, Extraction, FieldRef};
use regex::Regex;

use crate::lexer::{ConstDecl, Lexed, Token, TokenKind};
use crate::source::SourceText;

/// Parse a numeric literal such as `1_000`, `0x10` or `2.5`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned = raw.replace('_', "");
    if let Some(hex) = cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
    {
        return i64::from_str_radix(hex, 16).ok().map(|value| value as f64);
    }
    cleaned.parse::<f64>().ok()
}

static SIZE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*([0-9]+(?:\.[0-9]+)?)\s*(b|kb|kib|mb|mib|gb|gib)?\s*$").ok()
});

static BOUND_TAG: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"@bound\s+([A-Za-z_$][\w$]*)\.([A-Za-z_$][\w$]*)\s+([A-Za-z_]+)").ok()
});

/// Parse a size string such as `10MB`, `512 kb` or `1.5GB` into bytes.
pub fn parse_size(text: &str) -> Option<f64> {
    let caps = SIZE.as_ref()?.captures(text)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps
        .get(2)
        .map(|unit| unit.as_str().to_ascii_lowercase())
        .unwrap_or_default();
    let factor = match unit.as_str() {
        "" | "b" => 1.0,
        "kb" | "kib" => 1024.0,
        "mb" | "mib" => 1024.0 * 1024.0,
        "gb" | "gib" => 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };
    Some(value * factor)
}

/// Evaluate a constant arithmetic expression over number literals, size
/// strings and previously known numeric constants.
pub fn eval_number(tokens: &[Token], constants: &BTreeMap<String, f64>) -> Option<f64> {
    let mut parser = ExprParser {
        tokens,
        pos: 0,
        constants,
    };
    let value = parser.expr()?;
    if parser.pos == tokens.len() {
        Some(value)
    } else {
        None
    }
}

struct ExprParser<'a> {
    tokens: &'a [Token],
    pos: usize,
    constants: &'a BTreeMap<String, f64>,
}

impl ExprParser<'_> {
    fn peek_punct(&self, ch: char) -> bool {
        self.tokens
            .get(self.pos)
            .is_some_and(|token| token.is_punct(ch))
    }

    fn expr(&mut self) -> Option<f64> {
        let mut value = self.term()?;
        loop {
            if self.peek_punct('+') {
                self.pos += 1;
                value += self.term()?;
            } else if self.peek_punct('-') {
                self.pos += 1;
                value -= self.term()?;
            } else {
                return Some(value);
            }
        }
    }

    fn term(&mut self) -> Option<f64> {
        let mut value = self.factor()?;
        loop {
            if self.peek_punct('*') {
                self.pos += 1;
                value *= self.factor()?;
            } else if self.peek_punct('/') {
                self.pos += 1;
                let divisor = self.factor()?;
                if divisor == 0.0 {
                    return None;
                }
                value /= divisor;
            } else {
                return Some(value);
            }
        }
    }

    fn factor(&mut self) -> Option<f64> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        match &token.kind {
            TokenKind::Punct('-') => self.factor().map(|value| -value),
            TokenKind::Punct('(') => {
                let value = self.expr()?;
                if self.peek_punct(')') {
                    self.pos += 1;
                    Some(value)
                } else {
                    None
                }
            }
            TokenKind::Number(raw) => parse_number(raw),
            TokenKind::Str(text) => parse_size(text),
            TokenKind::Ident(name) => self.constants.get(name).copied(),
            _ => None,
        }
    }
}

/// Source text spanned by a token range.
pub fn span_text(text: &str, tokens: &[Token]) -> String {
    match (tokens.first(), tokens.last()) {
        (Some(first), Some(last)) => text[first.start..last.end].to_string(),
        _ => String::new(),
    }
}

/// Numeric values of top-level constants, in declaration order so later
/// constants may refer to earlier ones.
pub fn numeric_constants(lexed: &Lexed, decls: &[ConstDecl]) -> BTreeMap<String, f64> {
    let mut constants = BTreeMap::new();
    for decl in decls {
        let value_tokens = &lexed.tokens[decl.value.clone()];
        if let Some(value) = eval_number(value_tokens, &constants) {
            constants.insert(decl.name.clone(), value);
        }
    }
    constants
}

/// Record `@bound Owner.field kind` constants into `extraction.bounds`.
pub fn collect_bound_constants(
    source: &SourceText,
    lexed: &Lexed,
    decls: &[ConstDecl],
    constants: &BTreeMap<String, f64>,
    extraction: &mut Extraction,
) {
    for decl in decls {
        let const_token = &lexed.tokens[decl.name_idx - 1];
        let Some(comment) = lexed.comment_above(const_token.line) else {
            continue;
        };
        if !comment.text.contains("@bound") {
            continue;
        }
        let location = source.location(const_token.start);
        let Some((owner, field, kind)) = parse_bound_tag(&comment.text) else {
            extraction.warn_with(
                location,
                "malformed @bound tag; expected `@bound Owner.field min|max|minLength|maxLength`",
                &comment.text,
            );
            continue;
        };
        let Some(bound_kind) = BoundKind::parse(&kind) else {
            extraction.warn_with(location, format!("unknown bound kind `{kind}`"), &comment.text);
            continue;
        };
        let value_tokens = &lexed.tokens[decl.value.clone()];
        let literal = span_text(&source.text, value_tokens);
        let Some(value) = constants.get(&decl.name).copied() else {
            extraction.warn_with(
                location,
                format!("bound constant `{}` is not a numeric literal expression", decl.name),
                &literal,
            );
            continue;
        };
        extraction.bounds.push(DeclaredBound {
            target: FieldRef::new(owner, field),
            kind: bound_kind,
            value,
            literal,
            origin: BoundOrigin::Constant {
                name: decl.name.clone(),
            },
            location,
        });
    }
}

fn parse_bound_tag(text: &str) -> Option<(String, String, String)> {
    let caps = BOUND_TAG.as_ref()?.captures(text)?;
    Some((caps[1].to_string(), caps[2].to_string(), caps[3].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::source::LineIndex;

    fn tokens(text: &str) -> Vec<Token> {
        lex(text, &LineIndex::new(text)).tokens
    }

    #[test]
    fn evaluates_arithmetic_and_sizes() {
        let empty = BTreeMap::new();
        assert_eq!(eval_number(&tokens("10 * 1024 * 1024"), &empty), Some(10485760.0));
        assert_eq!(eval_number(&tokens("'20MB'"), &empty), Some(20971520.0));
        assert_eq!(eval_number(&tokens("(2 + 3) * 4"), &empty), Some(20.0));
        assert_eq!(eval_number(&tokens("-1"), &empty), Some(-1.0));
        assert_eq!(eval_number(&tokens("1_000"), &empty), Some(1000.0));
        assert_eq!(eval_number(&tokens("foo()"), &empty), None);
    }

    #[test]
    fn resolves_known_constants() {
        let mut constants = BTreeMap::new();
        constants.insert("MB".to_string(), 1048576.0);
        assert_eq!(eval_number(&tokens("5 * MB"), &constants), Some(5242880.0));
        assert_eq!(eval_number(&tokens("5 * GB"), &constants), None);
    }

    #[test]
    fn parses_size_units() {
        assert_eq!(parse_size("512kb"), Some(524288.0));
        assert_eq!(parse_size("1.5 GB"), Some(1610612736.0));
        assert_eq!(parse_size("lots"), None);
    }
}
