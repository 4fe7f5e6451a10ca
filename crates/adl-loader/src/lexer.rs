//! Tokenizer for ADL 1.4 source text.
//!
//! Both the cADL `definition` section and the dADL sections (`language`,
//! `description`, `ontology`) are read from a single token stream. `--`
//! comments are dropped, and `{`/`}` nesting is checked here so that the
//! parser never sees an unbalanced block. Characters with no meaning to the
//! parser (`:` and `?` in date patterns, a lone `-` or `+`, `#`) become
//! [`TokenKind::Symbol`] so that constraint bodies the parser skips still
//! tokenize.

use crate::types::{AdlError, AdlResult};

/// Kind of a token, with its text where it carries one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier or dotted/dashed name (`ELEMENT`, `archetype_id/value`,
    /// `openEHR-EHR-OBSERVATION.urinalysis.v1`).
    Ident(String),
    /// Unsigned integer or decimal literal.
    Number(String),
    /// Double-quoted string, unescaped.
    Str(String),
    /// dADL key `["..."]`.
    Key(String),
    /// Bracketed code reference (`[local::at0051]`) with whitespace and
    /// comments removed.
    Bracketed(String),
    /// Regular expression between slashes, as written.
    Regex(String),
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `<`
    LAngle,
    /// `>`
    RAngle,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `=`
    Equals,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// `|`
    Pipe,
    /// `..`
    Range,
    /// `...`
    Ellipsis,
    /// `*`
    Star,
    /// Any other character, kept opaque.
    Symbol(char),
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ident(s) | Self::Number(s) => f.write_str(s),
            Self::Str(s) => write!(f, "\"{}\"", s),
            Self::Key(s) => write!(f, "[\"{}\"]", s),
            Self::Bracketed(s) => write!(f, "[{}]", s),
            Self::Regex(s) => write!(f, "/{}/", s),
            Self::LBrace => f.write_str("{"),
            Self::RBrace => f.write_str("}"),
            Self::LAngle => f.write_str("<"),
            Self::RAngle => f.write_str(">"),
            Self::LParen => f.write_str("("),
            Self::RParen => f.write_str(")"),
            Self::Equals => f.write_str("="),
            Self::Comma => f.write_str(","),
            Self::Semicolon => f.write_str(";"),
            Self::Pipe => f.write_str("|"),
            Self::Range => f.write_str(".."),
            Self::Ellipsis => f.write_str("..."),
            Self::Star => f.write_str("*"),
            Self::Symbol(c) => write!(f, "{}", c),
        }
    }
}

/// A token and the 1-based line it starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// What was read.
    pub kind: TokenKind,
    /// Source line.
    pub line: usize,
}

/// Splits ADL source into tokens.
///
/// # Errors
/// Returns [`AdlError::UnbalancedBlock`] for a stray or unclosed `{`, and
/// [`AdlError::Parse`] for unterminated strings, brackets or regexes.
pub fn tokenize(source: &str) -> AdlResult<Vec<Token>> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    open_braces: Vec<usize>,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            open_braces: Vec::new(),
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn push(&mut self, kind: TokenKind, line: usize) {
        self.tokens.push(Token { kind, line });
    }

    fn error(&self, line: usize, message: impl Into<String>) -> AdlError {
        AdlError::Parse {
            line,
            construct: "token".to_string(),
            message: message.into(),
        }
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.pos += 1;
        }
    }

    fn run(mut self) -> AdlResult<Vec<Token>> {
        while let Some(c) = self.peek() {
            let line = self.line;
            match c {
                c if c.is_whitespace() => {
                    self.bump();
                }
                '-' if self.peek_at(1) == Some('-') => self.skip_comment(),
                '{' => {
                    self.bump();
                    self.open_braces.push(line);
                    self.push(TokenKind::LBrace, line);
                }
                '}' => {
                    self.bump();
                    if self.open_braces.pop().is_none() {
                        return Err(AdlError::UnbalancedBlock { line });
                    }
                    self.push(TokenKind::RBrace, line);
                }
                '<' => self.single(TokenKind::LAngle),
                '>' => self.single(TokenKind::RAngle),
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                '=' => self.single(TokenKind::Equals),
                ',' => self.single(TokenKind::Comma),
                ';' => self.single(TokenKind::Semicolon),
                '|' => self.single(TokenKind::Pipe),
                '*' => self.single(TokenKind::Star),
                '.' if self.peek_at(1) == Some('.') => {
                    if self.peek_at(2) == Some('.') {
                        self.pos += 3;
                        self.push(TokenKind::Ellipsis, line);
                    } else {
                        self.pos += 2;
                        self.push(TokenKind::Range, line);
                    }
                }
                '"' => self.string()?,
                '[' => self.bracket()?,
                // Patterns only open a block: `{/regex/}`
                '/' if self.after_lbrace() => self.regex()?,
                c if c.is_ascii_digit() => self.number(),
                c if c.is_alphabetic() || c == '_' => self.ident(),
                other => self.single(TokenKind::Symbol(other)),
            }
        }

        if let Some(&line) = self.open_braces.last() {
            return Err(AdlError::UnbalancedBlock { line });
        }

        Ok(self.tokens)
    }

    fn after_lbrace(&self) -> bool {
        matches!(self.tokens.last(), Some(Token { kind: TokenKind::LBrace, .. }))
    }

    fn single(&mut self, kind: TokenKind) {
        let line = self.line;
        self.bump();
        self.push(kind, line);
    }

    fn string(&mut self) -> AdlResult<()> {
        let line = self.line;
        self.bump();
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('"') => break,
                Some('\\') => match self.bump() {
                    Some(escaped) => text.push(escaped),
                    None => return Err(self.error(line, "unterminated string")),
                },
                Some(c) => text.push(c),
                None => return Err(self.error(line, "unterminated string")),
            }
        }
        self.push(TokenKind::Str(text), line);
        Ok(())
    }

    fn bracket(&mut self) -> AdlResult<()> {
        let line = self.line;
        self.bump();

        // dADL key: ["..."]
        if self.peek() == Some('"') {
            self.string()?;
            let key = match self.tokens.pop() {
                Some(Token {
                    kind: TokenKind::Str(key),
                    ..
                }) => key,
                _ => return Err(self.error(line, "malformed key")),
            };
            if self.bump() != Some(']') {
                return Err(self.error(line, "expected ']' after key"));
            }
            self.push(TokenKind::Key(key), line);
            return Ok(());
        }

        let mut text = String::new();
        loop {
            match self.peek() {
                Some(']') => {
                    self.bump();
                    break;
                }
                Some('-') if self.peek_at(1) == Some('-') => self.skip_comment(),
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some(c) => {
                    self.bump();
                    text.push(c);
                }
                None => return Err(self.error(line, "unterminated '['")),
            }
        }
        self.push(TokenKind::Bracketed(text), line);
        Ok(())
    }

    fn regex(&mut self) -> AdlResult<()> {
        let line = self.line;
        self.bump();
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('/') => break,
                Some('\\') => {
                    text.push('\\');
                    match self.bump() {
                        Some(escaped) => text.push(escaped),
                        None => return Err(self.error(line, "unterminated regex")),
                    }
                }
                Some('\n') | None => return Err(self.error(line, "unterminated regex")),
                Some(c) => text.push(c),
            }
        }
        self.push(TokenKind::Regex(text), line);
        Ok(())
    }

    fn number(&mut self) {
        let line = self.line;
        let mut text = String::new();
        while let Some(c) = self.peek().filter(char::is_ascii_digit) {
            text.push(c);
            self.pos += 1;
        }
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            text.push('.');
            self.pos += 1;
            while let Some(c) = self.peek().filter(char::is_ascii_digit) {
                text.push(c);
                self.pos += 1;
            }
        }
        self.push(TokenKind::Number(text), line);
    }

    fn ident(&mut self) {
        let line = self.line;
        let mut text = String::new();
        while let Some(c) = self.peek() {
            let next = self.peek_at(1);
            let continues = c.is_alphanumeric()
                || c == '_'
                || ((c == '-' || c == '.') && next.is_some_and(char::is_alphanumeric))
                || (c == '/' && next.is_some_and(char::is_alphabetic));
            if !continues {
                break;
            }
            text.push(c);
            self.pos += 1;
        }
        self.push(TokenKind::Ident(text), line);
    }
}

/// Read position over a token slice, shared by the section parsers.
pub struct Cursor<'t> {
    tokens: &'t [Token],
    pos: usize,
    construct: &'static str,
}

impl<'t> Cursor<'t> {
    /// Creates a cursor at the first token.
    pub fn new(tokens: &'t [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            construct: "archetype",
        }
    }

    /// Names the construct reported in errors from now on.
    pub fn enter(&mut self, construct: &'static str) {
        self.construct = construct;
    }

    /// Returns true once every token was consumed.
    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Looks at the next token.
    pub fn peek(&self) -> Option<&'t TokenKind> {
        self.peek_nth(0)
    }

    /// Looks `n` tokens ahead.
    pub fn peek_nth(&self, n: usize) -> Option<&'t TokenKind> {
        self.tokens.get(self.pos + n).map(|t| &t.kind)
    }

    /// Consumes the next token.
    pub fn next_token(&mut self) -> AdlResult<&'t Token> {
        let token = self.tokens.get(self.pos).ok_or_else(|| self.eof())?;
        self.pos += 1;
        Ok(token)
    }

    /// Line of the next token, or of the last one at end of input.
    pub fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    /// Returns true if the next token is the identifier `word`.
    pub fn is_ident(&self, word: &str) -> bool {
        matches!(self.peek(), Some(TokenKind::Ident(s)) if s == word)
    }

    /// Consumes the next token if it equals `kind`.
    pub fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consumes the identifier `word` if it is next.
    pub fn eat_ident(&mut self, word: &str) -> bool {
        if self.is_ident(word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consumes a token that must equal `kind`.
    pub fn expect(&mut self, kind: &TokenKind) -> AdlResult<()> {
        match self.peek() {
            Some(found) if found == kind => {
                self.pos += 1;
                Ok(())
            }
            Some(found) => Err(self.error(format!("expected '{}', found '{}'", kind, found))),
            None => Err(self.eof()),
        }
    }

    /// Consumes the identifier `word`.
    pub fn expect_keyword(&mut self, word: &str) -> AdlResult<()> {
        match self.peek() {
            Some(TokenKind::Ident(s)) if s == word => {
                self.pos += 1;
                Ok(())
            }
            Some(found) => Err(self.error(format!("expected '{}', found '{}'", word, found))),
            None => Err(self.eof()),
        }
    }

    /// Consumes any identifier and returns its text.
    pub fn expect_ident(&mut self) -> AdlResult<&'t str> {
        match self.peek() {
            Some(TokenKind::Ident(s)) => {
                self.pos += 1;
                Ok(s)
            }
            Some(found) => Err(self.error(format!("expected identifier, found '{}'", found))),
            None => Err(self.eof()),
        }
    }

    /// Consumes a bracketed reference and returns its content.
    pub fn expect_bracketed(&mut self) -> AdlResult<&'t str> {
        match self.peek() {
            Some(TokenKind::Bracketed(s)) => {
                self.pos += 1;
                Ok(s)
            }
            Some(found) => Err(self.error(format!("expected '[...]', found '{}'", found))),
            None => Err(self.eof()),
        }
    }

    /// Consumes a `{ ... }` block without interpreting it.
    pub fn skip_block(&mut self) -> AdlResult<()> {
        self.expect(&TokenKind::LBrace)?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.next_token()?.kind {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => depth -= 1,
                _ => {}
            }
        }
        Ok(())
    }

    /// Consumes a dADL `< ... >` value without interpreting it.
    ///
    /// Angle brackets inside `|...|` intervals (`|<100.0|`, `|>=0|`) do not
    /// nest.
    pub fn skip_angles(&mut self) -> AdlResult<()> {
        self.expect(&TokenKind::LAngle)?;
        let mut depth = 1usize;
        let mut in_interval = false;
        while depth > 0 {
            match self.next_token()?.kind {
                TokenKind::Pipe => in_interval = !in_interval,
                TokenKind::LAngle if !in_interval => depth += 1,
                TokenKind::RAngle if !in_interval => depth -= 1,
                _ => {}
            }
        }
        Ok(())
    }

    /// Consumes tokens up to, but not including, the `}` closing the
    /// current block.
    pub fn skip_to_close(&mut self) -> AdlResult<()> {
        let mut depth = 0usize;
        loop {
            match self.peek() {
                Some(TokenKind::RBrace) if depth == 0 => return Ok(()),
                Some(TokenKind::RBrace) => depth -= 1,
                Some(TokenKind::LBrace) => depth += 1,
                Some(_) => {}
                None => return Err(self.eof()),
            }
            self.pos += 1;
        }
    }

    /// Builds a parse error at the current line.
    pub fn error(&self, message: impl Into<String>) -> AdlError {
        AdlError::Parse {
            line: self.line(),
            construct: self.construct.to_string(),
            message: message.into(),
        }
    }

    /// Builds an end-of-input error for the current construct.
    pub fn eof(&self) -> AdlError {
        AdlError::UnexpectedEof {
            construct: self.construct.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_object_header() {
        assert_eq!(
            kinds("ELEMENT[at0050] occurrences matches {0..1} matches { -- Glucose\n}"),
            vec![
                TokenKind::Ident("ELEMENT".into()),
                TokenKind::Bracketed("at0050".into()),
                TokenKind::Ident("occurrences".into()),
                TokenKind::Ident("matches".into()),
                TokenKind::LBrace,
                TokenKind::Number("0".into()),
                TokenKind::Range,
                TokenKind::Number("1".into()),
                TokenKind::RBrace,
                TokenKind::Ident("matches".into()),
                TokenKind::LBrace,
                TokenKind::RBrace,
            ]
        );
    }

    #[test]
    fn test_ordinal_and_unbounded() {
        assert_eq!(
            kinds("1|[local::at0051], {0..*; unordered}"),
            vec![
                TokenKind::Number("1".into()),
                TokenKind::Pipe,
                TokenKind::Bracketed("local::at0051".into()),
                TokenKind::Comma,
                TokenKind::LBrace,
                TokenKind::Number("0".into()),
                TokenKind::Range,
                TokenKind::Star,
                TokenKind::Semicolon,
                TokenKind::Ident("unordered".into()),
                TokenKind::RBrace,
            ]
        );
    }

    #[test]
    fn test_multiline_bracket_strips_comments() {
        let source = "[local::\n\tat0102, \t-- Normal\n\tat0103]\t-- Abnormal\n";
        let tokens = tokenize(source).unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(
            tokens[0].kind,
            TokenKind::Bracketed("local::at0102,at0103".into())
        );
        assert_eq!(tokens[0].line, 1);
    }

    #[test]
    fn test_archetype_id_and_paths() {
        assert_eq!(
            kinds("openEHR-EHR-OBSERVATION.urinalysis.v1 archetype_id/value"),
            vec![
                TokenKind::Ident("openEHR-EHR-OBSERVATION.urinalysis.v1".into()),
                TokenKind::Ident("archetype_id/value".into()),
            ]
        );
    }

    #[test]
    fn test_regex_keeps_escapes() {
        assert_eq!(
            kinds(r"{/openEHR-EHR-CLUSTER\.urine_microscopy(-[a-zA-Z0-9_]+)*\.v1/}"),
            vec![
                TokenKind::LBrace,
                TokenKind::Regex(r"openEHR-EHR-CLUSTER\.urine_microscopy(-[a-zA-Z0-9_]+)*\.v1".into()),
                TokenKind::RBrace,
            ]
        );
    }

    #[test]
    fn test_dadl_tokens() {
        assert_eq!(
            kinds("[\"en\"] = <\"a \\\"quoted\\\" word\", ...>"),
            vec![
                TokenKind::Key("en".into()),
                TokenKind::Equals,
                TokenKind::LAngle,
                TokenKind::Str("a \"quoted\" word".into()),
                TokenKind::Comma,
                TokenKind::Ellipsis,
                TokenKind::RAngle,
            ]
        );
    }

    #[test]
    fn test_decimal_number() {
        assert_eq!(
            kinds("adl_version=1.4"),
            vec![
                TokenKind::Ident("adl_version".into()),
                TokenKind::Equals,
                TokenKind::Number("1.4".into()),
            ]
        );
    }

    #[test]
    fn test_line_numbers() {
        let tokens = tokenize("concept\n\t[at0000]\t-- Urinalysis\nlanguage").unwrap();
        let lines: Vec<usize> = tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![1, 2, 3]);
    }

    #[test]
    fn test_unbalanced_blocks() {
        assert!(matches!(
            tokenize("a matches {\n b matches {\n}"),
            Err(AdlError::UnbalancedBlock { line: 1 })
        ));
        assert!(matches!(
            tokenize("a matches {}\n}"),
            Err(AdlError::UnbalancedBlock { line: 2 })
        ));
    }

    #[test]
    fn test_cursor_skip_block() {
        let tokens = tokenize("{ a { b } c } d").unwrap();
        let mut cursor = Cursor::new(&tokens);
        cursor.skip_block().unwrap();
        assert!(cursor.is_ident("d"));
        assert!(cursor.eat_ident("d"));
        assert!(cursor.at_end());
        assert!(matches!(
            cursor.expect(&TokenKind::LBrace),
            Err(AdlError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_cursor_errors_carry_line() {
        let tokens = tokenize("concept\n\t[at0000]").unwrap();
        let mut cursor = Cursor::new(&tokens);
        cursor.enter("concept");
        cursor.expect_keyword("concept").unwrap();
        match cursor.expect(&TokenKind::LBrace) {
            Err(AdlError::Parse {
                line, construct, ..
            }) => {
                assert_eq!(line, 2);
                assert_eq!(construct, "concept");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(cursor.expect_bracketed().unwrap(), "at0000");
    }

    #[test]
    fn test_foreign_characters_are_symbols() {
        assert_eq!(
            kinds("{yyyy-mm-ddTHH:??} {|-10..+10|} #"),
            vec![
                TokenKind::LBrace,
                TokenKind::Ident("yyyy-mm-ddTHH".into()),
                TokenKind::Symbol(':'),
                TokenKind::Symbol('?'),
                TokenKind::Symbol('?'),
                TokenKind::RBrace,
                TokenKind::LBrace,
                TokenKind::Pipe,
                TokenKind::Symbol('-'),
                TokenKind::Number("10".into()),
                TokenKind::Range,
                TokenKind::Symbol('+'),
                TokenKind::Number("10".into()),
                TokenKind::Pipe,
                TokenKind::RBrace,
                TokenKind::Symbol('#'),
            ]
        );
    }

    #[test]
    fn test_slash_outside_pattern() {
        assert_eq!(
            kinds("<http://snomed.info/id/123>"),
            vec![
                TokenKind::LAngle,
                TokenKind::Ident("http".into()),
                TokenKind::Symbol(':'),
                TokenKind::Symbol('/'),
                TokenKind::Symbol('/'),
                TokenKind::Ident("snomed.info/id".into()),
                TokenKind::Symbol('/'),
                TokenKind::Number("123".into()),
                TokenKind::RAngle,
            ]
        );
    }

    #[test]
    fn test_cursor_skip_angles_and_to_close() {
        let tokens = tokenize("{ <a = <|<100.0|> b = <[x::y]>> c { e } f }").unwrap();
        let mut cursor = Cursor::new(&tokens);
        cursor.expect(&TokenKind::LBrace).unwrap();
        cursor.skip_angles().unwrap();
        assert!(cursor.is_ident("c"));
        cursor.skip_to_close().unwrap();
        assert_eq!(cursor.peek(), Some(&TokenKind::RBrace));
        assert!(cursor.eat(&TokenKind::RBrace));
        assert!(cursor.at_end());
    }

    #[test]
    fn test_unterminated_string() {
        assert!(matches!(
            tokenize("text = <\"open"),
            Err(AdlError::Parse { line: 1, .. })
        ));
    }
}
