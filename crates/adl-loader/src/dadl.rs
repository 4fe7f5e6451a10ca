//! Reader and writer for dADL, the data syntax of the `language`,
//! `description` and `ontology` sections.
//!
//! dADL is read into a small generic tree ([`DadlValue`]) first; the parser
//! then picks the attributes it understands out of that tree. The writer is
//! the exact inverse, so sections round-trip through the same structure.

use crate::lexer::{Cursor, TokenKind};
use crate::types::AdlResult;

/// A `[terminology::code]` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeRef {
    /// Terminology id, e.g. `ISO_639-1` or `LOINC`.
    pub terminology: String,
    /// Code within the terminology.
    pub code: String,
}

impl CodeRef {
    /// Splits `terminology::code`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (terminology, code) = raw.split_once("::")?;
        if terminology.is_empty() || code.is_empty() {
            return None;
        }
        Some(Self {
            terminology: terminology.to_string(),
            code: code.to_string(),
        })
    }
}

impl std::fmt::Display for CodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}::{}]", self.terminology, self.code)
    }
}

/// How an object entry is named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DadlKey {
    /// `name = <...>`
    Attr(String),
    /// `["key"] = <...>`
    Key(String),
}

/// A dADL value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DadlValue {
    /// Nested object of named or keyed entries, in source order.
    Object(Vec<(DadlKey, DadlValue)>),
    /// List of strings; `open` is set when the list ends with `...`.
    Strings {
        /// The strings.
        values: Vec<String>,
        /// Trailing `...` marker.
        open: bool,
    },
    /// List of code references.
    Codes(Vec<CodeRef>),
    /// A bare number or identifier, or the unparsed text of a value such as
    /// `<http://snomed.info/id/24028007>`.
    Atom(String),
    /// `<>`
    Empty,
}

impl DadlValue {
    /// Creates a single-string value.
    pub fn string(value: impl Into<String>) -> Self {
        Self::Strings {
            values: vec![value.into()],
            open: false,
        }
    }

    /// Returns the value of a named attribute of an object.
    pub fn get(&self, name: &str) -> Option<&DadlValue> {
        match self {
            Self::Object(entries) => entries.iter().find_map(|(key, value)| match key {
                DadlKey::Attr(attr) if attr == name => Some(value),
                _ => None,
            }),
            _ => None,
        }
    }

    /// Iterates over the keyed entries of an object.
    pub fn keyed(&self) -> impl Iterator<Item = (&str, &DadlValue)> {
        let entries = match self {
            Self::Object(entries) => entries.as_slice(),
            _ => &[],
        };
        entries.iter().filter_map(|(key, value)| match key {
            DadlKey::Key(k) => Some((k.as_str(), value)),
            DadlKey::Attr(_) => None,
        })
    }

    /// Returns the first string of a string list.
    pub fn as_str(&self) -> Option<&str> {
        self.strings().first().map(String::as_str)
    }

    /// Returns the strings of a string list, empty for anything else.
    pub fn strings(&self) -> &[String] {
        match self {
            Self::Strings { values, .. } => values,
            _ => &[],
        }
    }

    /// Returns the first code of a code list.
    pub fn first_code(&self) -> Option<&CodeRef> {
        match self {
            Self::Codes(codes) => codes.first(),
            _ => None,
        }
    }

    /// Collects keyed string entries (`["name"] = <"...">`) as pairs.
    pub fn string_pairs(&self) -> Vec<(String, String)> {
        self.keyed()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.to_string(), s.to_string())))
            .collect()
    }
}

/// Reads `name = <...>` attributes until the next token that does not start
/// one, returning them as an object.
pub fn parse_attributes(cursor: &mut Cursor<'_>) -> AdlResult<DadlValue> {
    let mut entries = Vec::new();
    while let (Some(TokenKind::Ident(name)), Some(TokenKind::Equals)) =
        (cursor.peek(), cursor.peek_nth(1))
    {
        cursor.next_token()?;
        cursor.next_token()?;
        let value = parse_value(cursor)?;
        entries.push((DadlKey::Attr(name.clone()), value));
    }
    Ok(DadlValue::Object(entries))
}

/// Reads one `<...>` value.
pub fn parse_value(cursor: &mut Cursor<'_>) -> AdlResult<DadlValue> {
    cursor.expect(&TokenKind::LAngle)?;

    let value = match cursor.peek() {
        Some(TokenKind::RAngle) => DadlValue::Empty,
        Some(TokenKind::Key(_)) => parse_entries(cursor)?,
        Some(TokenKind::Ident(_)) if cursor.peek_nth(1) == Some(&TokenKind::Equals) => {
            parse_entries(cursor)?
        }
        Some(TokenKind::Str(_)) => parse_strings(cursor)?,
        Some(TokenKind::Bracketed(_)) => parse_codes(cursor)?,
        Some(TokenKind::Number(atom)) | Some(TokenKind::Ident(atom))
            if cursor.peek_nth(1) == Some(&TokenKind::RAngle) =>
        {
            cursor.next_token()?;
            DadlValue::Atom(atom.clone())
        }
        Some(TokenKind::Number(_) | TokenKind::Ident(_) | TokenKind::Symbol(_)) => {
            parse_raw(cursor)?
        }
        Some(other) => return Err(cursor.error(format!("unexpected '{}' in dADL value", other))),
        None => return Err(cursor.eof()),
    };

    cursor.expect(&TokenKind::RAngle)?;
    Ok(value)
}

fn parse_entries(cursor: &mut Cursor<'_>) -> AdlResult<DadlValue> {
    let mut entries = Vec::new();
    loop {
        let key = match cursor.peek() {
            Some(TokenKind::Key(key)) => DadlKey::Key(key.clone()),
            Some(TokenKind::Ident(name)) => DadlKey::Attr(name.clone()),
            Some(TokenKind::RAngle) => break,
            Some(other) => {
                return Err(cursor.error(format!("expected dADL entry, found '{}'", other)))
            }
            None => return Err(cursor.eof()),
        };
        cursor.next_token()?;
        cursor.expect(&TokenKind::Equals)?;
        entries.push((key, parse_value(cursor)?));
    }
    Ok(DadlValue::Object(entries))
}

/// Reads the tokens of a value up to its closing `>` back into text.
fn parse_raw(cursor: &mut Cursor<'_>) -> AdlResult<DadlValue> {
    let mut text = String::new();
    let mut depth = 0usize;
    loop {
        match cursor.peek() {
            Some(TokenKind::RAngle) if depth == 0 => break,
            Some(TokenKind::RAngle) => depth -= 1,
            Some(TokenKind::LAngle) => depth += 1,
            Some(_) => {}
            None => return Err(cursor.eof()),
        }
        text.push_str(&cursor.next_token()?.kind.to_string());
    }
    Ok(DadlValue::Atom(text))
}

fn parse_strings(cursor: &mut Cursor<'_>) -> AdlResult<DadlValue> {
    let mut values = Vec::new();
    let mut open = false;
    loop {
        match cursor.peek() {
            Some(TokenKind::Str(s)) => {
                cursor.next_token()?;
                values.push(s.clone());
            }
            Some(TokenKind::Ellipsis) => {
                cursor.next_token()?;
                open = true;
                break;
            }
            Some(other) => return Err(cursor.error(format!("expected string, found '{}'", other))),
            None => return Err(cursor.eof()),
        }
        if !cursor.eat(&TokenKind::Comma) {
            break;
        }
    }
    Ok(DadlValue::Strings { values, open })
}

fn parse_codes(cursor: &mut Cursor<'_>) -> AdlResult<DadlValue> {
    let mut codes = Vec::new();
    loop {
        let raw = cursor.expect_bracketed()?;
        let code = CodeRef::parse(raw)
            .ok_or_else(|| cursor.error(format!("expected [terminology::code], found [{}]", raw)))?;
        codes.push(code);
        if !cursor.eat(&TokenKind::Comma) {
            break;
        }
        // A trailing `...` closes an open code list.
        if cursor.eat(&TokenKind::Ellipsis) {
            break;
        }
    }
    Ok(DadlValue::Codes(codes))
}

/// Escapes a string for a dADL or cADL literal.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Writes `name = <...>` at the given indent depth.
pub fn write_attribute(out: &mut String, depth: usize, name: &str, value: &DadlValue) {
    write_entry(out, depth, &DadlKey::Attr(name.to_string()), value);
}

fn write_entry(out: &mut String, depth: usize, key: &DadlKey, value: &DadlValue) {
    indent(out, depth);
    match key {
        DadlKey::Attr(name) => out.push_str(name),
        DadlKey::Key(key) => {
            out.push('[');
            out.push_str(&quote(key));
            out.push(']');
        }
    }
    out.push_str(" = ");
    write_value(out, depth, value);
    out.push('\n');
}

fn write_value(out: &mut String, depth: usize, value: &DadlValue) {
    match value {
        DadlValue::Object(entries) => {
            out.push_str("<\n");
            for (key, child) in entries {
                write_entry(out, depth + 1, key, child);
            }
            indent(out, depth);
            out.push('>');
        }
        DadlValue::Strings { values, open } => {
            let mut parts: Vec<String> = values.iter().map(|v| quote(v)).collect();
            if *open {
                parts.push("...".to_string());
            }
            out.push('<');
            out.push_str(&parts.join(", "));
            out.push('>');
        }
        DadlValue::Codes(codes) => {
            let parts: Vec<String> = codes.iter().map(CodeRef::to_string).collect();
            out.push('<');
            out.push_str(&parts.join(", "));
            out.push('>');
        }
        DadlValue::Atom(atom) => {
            out.push('<');
            out.push_str(atom);
            out.push('>');
        }
        DadlValue::Empty => out.push_str("<>"),
    }
}

/// Appends `depth` tabs.
pub fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push('\t');
    }
}
