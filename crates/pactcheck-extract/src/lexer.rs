//! Tokenizer for the declarative subset of TypeScript the contract artifacts
//! use. It understands strings, template literals, comments, numbers,
//! identifiers and punctuation; everything else is left to the extractors.

use std::ops::Range;

use crate::source::LineIndex;

#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Text(String),
    Expr(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Number(String),
    /// Unescaped string literal value.
    Str(String),
    Template(Vec<TemplatePart>),
    Punct(char),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub column: u32,
}

impl Token {
    pub fn ident(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_ident(&self, name: &str) -> bool {
        self.ident() == Some(name)
    }

    pub fn is_punct(&self, ch: char) -> bool {
        self.kind == TokenKind::Punct(ch)
    }

    pub fn string(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Str(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub text: String,
    pub start: usize,
    /// Byte offset just past the comment.
    pub end: usize,
    pub line: u32,
    pub end_line: u32,
    /// Nothing but whitespace precedes the comment on its first line.
    pub own_line: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub offset: usize,
    pub message: String,
}

/// Result of lexing a whole file. Lexing stops at the first error; the
/// tokens before it are kept.
#[derive(Debug, Clone, Default)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub comments: Vec<Comment>,
    pub error: Option<LexError>,
}

impl Lexed {
    /// Comment block ending on the line directly above `line`.
    pub fn comment_above(&self, line: u32) -> Option<&Comment> {
        self.comments
            .iter()
            .rev()
            .find(|comment| comment.own_line && comment.end_line + 1 == line)
    }

    /// Comment starting on `line` at or after byte offset `after`.
    pub fn trailing_comment(&self, line: u32, after: usize) -> Option<&Comment> {
        self.comments
            .iter()
            .find(|comment| comment.line == line && comment.start >= after)
    }
}

pub fn lex(text: &str, index: &LineIndex) -> Lexed {
    let mut lexer = Lexer::new(text, 0, index);
    let mut lexed = Lexed::default();
    loop {
        match lexer.next_token() {
            Ok(Some(token)) => lexed.tokens.push(token),
            Ok(None) => break,
            Err(err) => {
                lexed.error = Some(err);
                break;
            }
        }
    }
    lexed.comments = lexer.comments;
    lexed
}

/// Byte ranges of every comment in `text`, strings and templates excluded.
///
/// Markup and prose in component files do not always lex. A failure only
/// costs the rest of its line; scanning resumes on the next one.
pub fn comment_spans(text: &str, index: &LineIndex) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;
    while start < text.len() {
        let mut lexer = Lexer::new(text, start, index);
        let failed_at = loop {
            match lexer.next_token() {
                Ok(Some(_)) => {}
                Ok(None) => break None,
                Err(err) => break Some(err.offset),
            }
        };
        spans.extend(lexer.comments.iter().map(|comment| comment.start..comment.end));
        let Some(offset) = failed_at else {
            break;
        };
        start = match text[offset..].find('\n') {
            Some(idx) => offset + idx + 1,
            None => text.len(),
        };
    }
    spans
}

pub struct Lexer<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    index: &'a LineIndex,
    comments: Vec<Comment>,
    /// Whether a `/` here would start a regex literal rather than divide.
    regex_allowed: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(text: &'a str, start: usize, index: &'a LineIndex) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: start,
            index,
            comments: Vec::new(),
            regex_allowed: true,
        }
    }

    pub fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        loop {
            self.skip_whitespace();
            if self.pos >= self.bytes.len() {
                return Ok(None);
            }
            if self.starts_with("//") {
                self.line_comment();
                continue;
            }
            if self.starts_with("/*") {
                self.block_comment()?;
                continue;
            }
            if self.bytes[self.pos] == b'/' && self.regex_allowed {
                if self.skip_regex() {
                    continue;
                }
            }
            break;
        }

        let start = self.pos;
        let ch = self.current_char();
        let kind = if ch == '"' || ch == '\'' {
            TokenKind::Str(self.string(ch)?)
        } else if ch == '`' {
            TokenKind::Template(self.template()?)
        } else if ch.is_ascii_digit()
            || (ch == '.' && self.peek_byte(1).is_some_and(|b| b.is_ascii_digit()))
        {
            TokenKind::Number(self.number())
        } else if ch.is_alphabetic() || ch == '_' || ch == '$' {
            TokenKind::Ident(self.identifier())
        } else {
            self.pos += ch.len_utf8();
            TokenKind::Punct(ch)
        };

        self.regex_allowed = match &kind {
            TokenKind::Punct(ch) => !matches!(ch, ')' | ']' | '}'),
            TokenKind::Ident(name) => matches!(name.as_str(), "return" | "typeof" | "case"),
            _ => false,
        };

        let (line, column) = self.index.position(start);
        Ok(Some(Token {
            kind,
            start,
            end: self.pos,
            line,
            column,
        }))
    }

    fn starts_with(&self, pat: &str) -> bool {
        self.text[self.pos..].starts_with(pat)
    }

    fn current_char(&self) -> char {
        self.text[self.pos..].chars().next().unwrap_or('\0')
    }

    fn starts_line(&self, offset: usize) -> bool {
        let line_start = self.text[..offset].rfind('\n').map(|idx| idx + 1).unwrap_or(0);
        self.text[line_start..offset].trim().is_empty()
    }

    fn peek_byte(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.bytes.len() {
            let ch = self.current_char();
            if ch.is_whitespace() {
                self.pos += ch.len_utf8();
            } else {
                break;
            }
        }
    }

    fn line_comment(&mut self) {
        let start = self.pos;
        let end = self.text[start..]
            .find('\n')
            .map(|idx| start + idx)
            .unwrap_or(self.bytes.len());
        let (line, _) = self.index.position(start);
        let own_line = self.starts_line(start);
        self.comments.push(Comment {
            text: self.text[start + 2..end].trim().to_string(),
            start,
            end,
            line,
            end_line: line,
            own_line,
        });
        self.pos = end;
    }

    fn block_comment(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        let Some(rel) = self.text[start + 2..].find("*/") else {
            return Err(LexError {
                offset: start,
                message: "unterminated block comment".to_string(),
            });
        };
        let end = start + 2 + rel + 2;
        let body = &self.text[start + 2..end - 2];
        let text = body
            .lines()
            .map(|line| line.trim().trim_start_matches('*').trim())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        let (line, _) = self.index.position(start);
        let (end_line, _) = self.index.position(end - 1);
        let own_line = self.starts_line(start);
        self.comments.push(Comment {
            text,
            start,
            end,
            line,
            end_line,
            own_line,
        });
        self.pos = end;
        Ok(())
    }

    /// Skip a regex literal; returns false when the slash does not start one.
    fn skip_regex(&mut self) -> bool {
        let mut idx = self.pos + 1;
        let mut in_class = false;
        while idx < self.bytes.len() {
            match self.bytes[idx] {
                b'\n' => return false,
                b'\\' => idx += 1,
                b'[' => in_class = true,
                b']' => in_class = false,
                b'/' if !in_class => {
                    idx += 1;
                    while idx < self.bytes.len() && self.bytes[idx].is_ascii_alphabetic() {
                        idx += 1;
                    }
                    self.pos = idx;
                    self.regex_allowed = false;
                    return true;
                }
                _ => {}
            }
            idx += 1;
        }
        false
    }

    fn string(&mut self, quote: char) -> Result<String, LexError> {
        let start = self.pos;
        self.pos += 1;
        let mut value = String::new();
        while self.pos < self.bytes.len() {
            let ch = self.current_char();
            self.pos += ch.len_utf8();
            match ch {
                '\\' => {
                    let escaped = self.current_char();
                    self.pos += escaped.len_utf8();
                    value.push(unescape(escaped));
                }
                '\n' => break,
                c if c == quote => return Ok(value),
                c => value.push(c),
            }
        }
        Err(LexError {
            offset: start,
            message: "unterminated string literal".to_string(),
        })
    }

    fn template(&mut self) -> Result<Vec<TemplatePart>, LexError> {
        let start = self.pos;
        self.pos += 1;
        let mut parts = Vec::new();
        let mut text = String::new();
        while self.pos < self.bytes.len() {
            let ch = self.current_char();
            if ch == '`' {
                self.pos += 1;
                if !text.is_empty() {
                    parts.push(TemplatePart::Text(text));
                }
                return Ok(parts);
            }
            if ch == '\\' {
                self.pos += 1;
                let escaped = self.current_char();
                self.pos += escaped.len_utf8();
                text.push(unescape(escaped));
                continue;
            }
            if self.starts_with("${") {
                if !text.is_empty() {
                    parts.push(TemplatePart::Text(std::mem::take(&mut text)));
                }
                self.pos += 2;
                let expr_start = self.pos;
                let mut depth = 1usize;
                while self.pos < self.bytes.len() {
                    match self.bytes[self.pos] {
                        b'{' => depth += 1,
                        b'}' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    self.pos += 1;
                }
                if depth != 0 {
                    break;
                }
                parts.push(TemplatePart::Expr(
                    self.text[expr_start..self.pos].trim().to_string(),
                ));
                self.pos += 1;
                continue;
            }
            self.pos += ch.len_utf8();
            text.push(ch);
        }
        Err(LexError {
            offset: start,
            message: "unterminated template literal".to_string(),
        })
    }

    fn number(&mut self) -> String {
        let start = self.pos;
        while self.pos < self.bytes.len() {
            let byte = self.bytes[self.pos];
            if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'.' {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.text[start..self.pos].to_string()
    }

    fn identifier(&mut self) -> String {
        let start = self.pos;
        while self.pos < self.bytes.len() {
            let ch = self.current_char();
            if ch.is_alphanumeric() || ch == '_' || ch == '$' {
                self.pos += ch.len_utf8();
            } else {
                break;
            }
        }
        self.text[start..self.pos].to_string()
    }
}

fn unescape(ch: char) -> char {
    match ch {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        other => other,
    }
}

/// Longest argument list [`call_arguments`] will read.
const MAX_ARG_TOKENS: usize = 4096;

/// Tokens strictly inside the parentheses opened at byte `open`, plus the
/// byte offset just past the closing parenthesis.
pub fn call_arguments(text: &str, open: usize, index: &LineIndex) -> Option<(Vec<Token>, usize)> {
    let mut lexer = Lexer::new(text, open, index);
    let opening = lexer.next_token().ok()??;
    if !opening.is_punct('(') {
        return None;
    }
    let mut tokens = Vec::new();
    let mut depth = 1usize;
    while tokens.len() < MAX_ARG_TOKENS {
        let token = lexer.next_token().ok()??;
        match token.kind {
            TokenKind::Punct('(') | TokenKind::Punct('[') | TokenKind::Punct('{') => depth += 1,
            TokenKind::Punct(')') | TokenKind::Punct(']') | TokenKind::Punct('}') => {
                depth -= 1;
                if depth == 0 {
                    return Some((tokens, token.end));
                }
            }
            _ => {}
        }
        tokens.push(token);
    }
    None
}

/// Index of the token closing the bracket opened at `open`.
pub fn matching_close(tokens: &[Token], open: usize) -> Option<usize> {
    let (opener, closer) = match tokens.get(open)?.kind {
        TokenKind::Punct('{') => ('{', '}'),
        TokenKind::Punct('(') => ('(', ')'),
        TokenKind::Punct('[') => ('[', ']'),
        TokenKind::Punct('<') => ('<', '>'),
        _ => return None,
    };
    let mut depth = 0usize;
    for (idx, token) in tokens.iter().enumerate().skip(open) {
        if token.is_punct(opener) {
            depth += 1;
        } else if token.is_punct(closer) {
            depth -= 1;
            if depth == 0 {
                return Some(idx);
            }
        }
    }
    None
}

/// A top-level `const NAME [: Type] = value` declaration.
#[derive(Debug, Clone)]
pub struct ConstDecl {
    pub name: String,
    pub name_idx: usize,
    /// Token range of the initializer, `as const` and `;` excluded.
    pub value: Range<usize>,
}

/// Collect `const` declarations at brace depth zero.
pub fn top_level_consts(tokens: &[Token]) -> Vec<ConstDecl> {
    let mut decls = Vec::new();
    let mut depth = 0i32;
    let mut idx = 0;
    while idx < tokens.len() {
        let token = &tokens[idx];
        match token.kind {
            TokenKind::Punct('{') | TokenKind::Punct('(') | TokenKind::Punct('[') => depth += 1,
            TokenKind::Punct('}') | TokenKind::Punct(')') | TokenKind::Punct(']') => depth -= 1,
            _ => {}
        }
        if depth == 0 && token.is_ident("const") {
            if let Some((decl, next)) = const_decl(tokens, idx) {
                idx = next;
                decls.push(decl);
                continue;
            }
        }
        idx += 1;
    }
    decls
}

fn const_decl(tokens: &[Token], const_idx: usize) -> Option<(ConstDecl, usize)> {
    let name_idx = const_idx + 1;
    let name = tokens.get(name_idx)?.ident()?.to_string();

    let mut idx = name_idx + 1;
    let mut angle = 0i32;
    let mut nesting = 0i32;
    loop {
        let token = tokens.get(idx)?;
        match token.kind {
            TokenKind::Punct('<') => angle += 1,
            TokenKind::Punct('>') => angle -= 1,
            TokenKind::Punct('{') | TokenKind::Punct('(') | TokenKind::Punct('[') => nesting += 1,
            TokenKind::Punct('}') | TokenKind::Punct(')') | TokenKind::Punct(']') => nesting -= 1,
            TokenKind::Punct('=') if angle <= 0 && nesting == 0 => break,
            TokenKind::Punct(';') if nesting == 0 => return None,
            _ => {}
        }
        idx += 1;
    }

    let value_start = idx + 1;
    let end = expression_end(tokens, value_start);

    let mut value_end = end;
    if value_end >= value_start + 2
        && tokens[value_end - 1].is_ident("const")
        && tokens[value_end - 2].is_ident("as")
    {
        value_end -= 2;
    }

    let decl = ConstDecl {
        name,
        name_idx,
        value: value_start..value_end,
    };
    Some((decl, end))
}

/// End of an expression or type starting at `start`: the first `;` at
/// depth zero, or a statement keyword opening a new line.
pub fn expression_end(tokens: &[Token], start: usize) -> usize {
    let mut end = start;
    let mut depth = 0i32;
    while end < tokens.len() {
        let token = &tokens[end];
        match token.kind {
            TokenKind::Punct('{') | TokenKind::Punct('(') | TokenKind::Punct('[') => depth += 1,
            TokenKind::Punct('}') | TokenKind::Punct(')') | TokenKind::Punct(']') => depth -= 1,
            TokenKind::Punct(';') if depth == 0 => break,
            _ => {}
        }
        if depth < 0 {
            break;
        }
        if depth == 0 && end > start && starts_statement(token) {
            let previous = &tokens[end - 1];
            if previous.line < token.line {
                break;
            }
        }
        end += 1;
    }
    end
}

/// Token ranges between depth-zero commas of `range`.
pub fn split_commas(tokens: &[Token], range: Range<usize>) -> Vec<Range<usize>> {
    let mut items = Vec::new();
    let mut depth = 0i32;
    let mut item_start = range.start;
    let end = range.end.min(tokens.len());
    for idx in range.start..end {
        match tokens[idx].kind {
            TokenKind::Punct('{') | TokenKind::Punct('(') | TokenKind::Punct('[') => depth += 1,
            TokenKind::Punct('}') | TokenKind::Punct(')') | TokenKind::Punct(']') => depth -= 1,
            TokenKind::Punct(',') if depth == 0 => {
                if idx > item_start {
                    items.push(item_start..idx);
                }
                item_start = idx + 1;
            }
            _ => {}
        }
    }
    if end > item_start {
        items.push(item_start..end);
    }
    items
}

/// A `key: value` entry of an object literal.
#[derive(Debug, Clone)]
pub struct Property {
    pub key: String,
    pub key_idx: usize,
    pub value: Range<usize>,
}

/// One comma-separated item of an object literal.
#[derive(Debug, Clone)]
pub enum Entry {
    Property(Property),
    /// Spread, shorthand, method or anything else without a plain key.
    Other(Range<usize>),
}

/// Entries of the object literal opened at `open`, plus its closing index.
///
/// Computed keys such as `[ERROR_CODES.NOT_FOUND]` use their last
/// identifier or string as the key.
pub fn object_entries(tokens: &[Token], open: usize) -> Option<(Vec<Entry>, usize)> {
    if !tokens.get(open)?.is_punct('{') {
        return None;
    }
    let close = matching_close(tokens, open)?;
    let entries = split_commas(tokens, open + 1..close)
        .into_iter()
        .map(|item| property(tokens, item.clone()).map_or(Entry::Other(item), Entry::Property))
        .collect();
    Some((entries, close))
}

fn property(tokens: &[Token], item: Range<usize>) -> Option<Property> {
    let first = tokens.get(item.start)?;
    let (key, key_idx, colon) = match &first.kind {
        TokenKind::Ident(name) | TokenKind::Str(name) | TokenKind::Number(name) => {
            (name.clone(), item.start, item.start + 1)
        }
        TokenKind::Punct('[') => {
            let close = matching_close(tokens, item.start)?;
            let (key_idx, key) = tokens[item.start + 1..close]
                .iter()
                .enumerate()
                .rev()
                .find_map(|(offset, token)| match &token.kind {
                    TokenKind::Ident(name) | TokenKind::Str(name) => {
                        Some((item.start + 1 + offset, name.clone()))
                    }
                    _ => None,
                })?;
            (key, key_idx, close + 1)
        }
        _ => return None,
    };
    if colon >= item.end || !tokens[colon].is_punct(':') || colon + 1 >= item.end {
        return None;
    }
    Some(Property {
        key,
        key_idx,
        value: colon + 1..item.end,
    })
}

fn starts_statement(token: &Token) -> bool {
    matches!(
        token.ident(),
        Some(
            "export"
                | "const"
                | "let"
                | "var"
                | "function"
                | "interface"
                | "type"
                | "import"
                | "enum"
                | "class"
        )
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_str(text: &str) -> Lexed {
        let index = LineIndex::new(text);
        lex(text, &index)
    }

    #[test]
    fn lexes_templates_with_interpolations() {
        let lexed = lex_str("const A = `${API_BASE}/cv/${id}`;");
        assert!(lexed.error.is_none());
        let template = lexed
            .tokens
            .iter()
            .find_map(|token| match &token.kind {
                TokenKind::Template(parts) => Some(parts.clone()),
                _ => None,
            })
            .expect("template token");
        assert_eq!(
            template,
            vec![
                TemplatePart::Expr("API_BASE".to_string()),
                TemplatePart::Text("/cv/".to_string()),
                TemplatePart::Expr("id".to_string()),
            ]
        );
    }

    #[test]
    fn records_comments_with_lines() {
        let lexed = lex_str("/**\n * @table cvs\n */\ninterface CV {}\nconst x = 1; // trailing");
        assert_eq!(lexed.comments.len(), 2);
        assert_eq!(lexed.comments[0].text, "@table cvs");
        assert_eq!(lexed.comment_above(4).map(|c| c.text.as_str()), Some("@table cvs"));
        assert_eq!(
            lexed.trailing_comment(5, 0).map(|c| c.text.as_str()),
            Some("trailing")
        );
    }

    #[test]
    fn comment_spans_skip_comment_markers_inside_strings() {
        let text = "h = { Accept: '*/*' };\nconst glob = 'src/*.ts'; const note = 'a //b';\n/* real */ x();\n";
        let index = LineIndex::new(text);
        let spans = comment_spans(text, &index);
        let found: Vec<&str> = spans.iter().map(|span| &text[span.clone()]).collect();
        assert_eq!(found, vec!["/* real */"]);
    }

    #[test]
    fn comment_spans_resume_after_unlexable_markup() {
        let text = "<p>Don't panic</p>\n// later\nfetch('/x');\n";
        let index = LineIndex::new(text);
        let spans = comment_spans(text, &index);
        let found: Vec<&str> = spans.iter().map(|span| &text[span.clone()]).collect();
        assert_eq!(found, vec!["// later"]);
    }

    #[test]
    fn reports_unterminated_strings() {
        let lexed = lex_str("const a = 'oops\nconst b = 2;");
        let error = lexed.error.expect("lex error");
        assert_eq!(error.offset, 10);
        assert!(error.message.contains("unterminated"));
    }

    #[test]
    fn skips_regex_literals() {
        let lexed = lex_str("const re = /it's/g; const n = 4 / 2;");
        assert!(lexed.error.is_none());
        assert!(lexed.tokens.iter().any(|token| token.is_punct('/')));
    }

    #[test]
    fn finds_top_level_consts() {
        let lexed = lex_str(
            "export const HTTP_STATUS: Record<ErrorCode, number> = { A: 1 };\nexport const B = 'x' as const\nconst C = 3;",
        );
        let decls = top_level_consts(&lexed.tokens);
        let names: Vec<&str> = decls.iter().map(|decl| decl.name.as_str()).collect();
        assert_eq!(names, vec!["HTTP_STATUS", "B", "C"]);
        assert!(lexed.tokens[decls[0].value.start].is_punct('{'));
        assert_eq!(decls[1].value.len(), 1);
    }

    #[test]
    fn splits_object_entries_including_computed_keys() {
        let lexed = lex_str("{ A: 1, [CODES.B]: 'b', ...rest, nested: { x: [1, 2] } }");
        let (entries, close) = object_entries(&lexed.tokens, 0).expect("object");
        assert_eq!(close, lexed.tokens.len() - 1);
        let keys: Vec<Option<&str>> = entries
            .iter()
            .map(|entry| match entry {
                Entry::Property(property) => Some(property.key.as_str()),
                Entry::Other(_) => None,
            })
            .collect();
        assert_eq!(keys, vec![Some("A"), Some("B"), None, Some("nested")]);
    }
}
