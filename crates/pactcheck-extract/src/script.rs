use std::collections::BTreeMap;

use pactcheck_core::Location;

use crate::lexer::{ConstDecl, Lexed, Token, TemplatePart, TokenKind, lex, top_level_consts};
use crate::literals::numeric_constants;
use crate::source::SourceText;

/// A lexed TypeScript artifact with its top-level constants.
pub struct Script<'a> {
    pub source: &'a SourceText,
    pub lexed: Lexed,
    pub consts: Vec<ConstDecl>,
    /// Top-level constants that evaluate to numbers.
    pub numbers: BTreeMap<String, f64>,
}

impl<'a> Script<'a> {
    pub fn parse(source: &'a SourceText) -> Self {
        let lexed = lex(&source.text, source.index());
        let consts = top_level_consts(&lexed.tokens);
        let numbers = numeric_constants(&lexed, &consts);
        Self {
            source,
            lexed,
            consts,
            numbers,
        }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.lexed.tokens
    }

    pub fn location(&self, token: &Token) -> Location {
        self.source.location_at(token.line, token.column)
    }

    /// Source text of a token slice with whitespace runs collapsed.
    pub fn text(&self, tokens: &[Token]) -> String {
        match (tokens.first(), tokens.last()) {
            (Some(first), Some(last)) => self.source.text[first.start..last.end]
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" "),
            _ => String::new(),
        }
    }

    pub fn const_named(&self, name: &str) -> Option<&ConstDecl> {
        self.consts.iter().find(|decl| decl.name == name)
    }

    /// Leading comment attached to the declaration whose first token is at
    /// `idx`, looking through an `export` keyword.
    pub fn doc_comment(&self, idx: usize) -> Option<&str> {
        let tokens = self.tokens();
        let mut start = idx;
        while start > 0 && matches!(tokens[start - 1].ident(), Some("export" | "declare")) {
            start -= 1;
        }
        let token = tokens.get(start)?;
        self.lexed
            .comment_above(token.line)
            .map(|comment| comment.text.as_str())
    }
}

/// Render a string or template token, substituting `${expr}` with
/// `replace(expr)`. Other tokens yield `None`.
pub fn render_literal(token: &Token, mut replace: impl FnMut(&str) -> String) -> Option<String> {
    match &token.kind {
        TokenKind::Str(value) => Some(value.clone()),
        TokenKind::Template(parts) => Some(
            parts
                .iter()
                .map(|part| match part {
                    TemplatePart::Text(text) => text.clone(),
                    TemplatePart::Expr(expr) => replace(expr),
                })
                .collect(),
        ),
        _ => None,
    }
}
