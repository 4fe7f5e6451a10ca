//! ADL 1.4 archetype parser.
//!
//! Reads the section sequence
//!
//! ```text
//! archetype (adl_version=1.4) <id>
//! concept [atNNNN]
//! language ...
//! description ...
//! definition ...
//! ontology ...
//! revision_history ...
//! ```
//!
//! into an [`Archetype`]. Parsing is all-or-nothing: the first malformed
//! construct aborts the whole archetype.

use adl_types::{
    well_known, ArchetypeDescription, ArchetypeHeader, ArchetypeId, AttributeConstraint,
    Cardinality, CodedOption, ConstraintNode, ConstraintTree, DescriptionDetail, InternalRef,
    Interval, NodeId, SlotAssertion, TermBinding, TermEntry, Translation, TreeBuilder,
    TreeError, ValueConstraint,
};

use crate::archetype::Archetype;
use crate::dadl::{self, CodeRef, DadlValue};
use crate::lexer::{tokenize, Cursor, TokenKind};
use crate::ontology::Ontology;
use crate::types::{AdlError, AdlResult, ParseConfig};

/// Parses ADL source text into an archetype.
///
/// # Errors
/// Returns the first grammar error ([`AdlError::Parse`],
/// [`AdlError::UnbalancedBlock`], [`AdlError::UnexpectedEof`], ...) or the
/// first cross-section invariant violated (see [`Archetype::new`]).
pub fn parse_archetype(source: &str, config: &ParseConfig) -> AdlResult<Archetype> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        cursor: Cursor::new(&tokens),
        builder: ConstraintTree::builder(),
    };

    let (id, adl_version) = parser.parse_header()?;
    let concept = parser.parse_concept()?;

    parser.cursor.enter("language");
    parser.cursor.expect_keyword("language")?;
    let language_section = dadl::parse_attributes(&mut parser.cursor)?;
    let (original_language, translations) = read_language(&language_section, &parser.cursor)?;

    let description = if parser.cursor.eat_ident("description") {
        parser.cursor.enter("description");
        let section = dadl::parse_attributes(&mut parser.cursor)?;
        Some(read_description(&section))
    } else {
        None
    };

    parser.cursor.enter("definition");
    parser.cursor.expect_keyword("definition")?;
    let root = parser.parse_object()?;

    if parser.cursor.is_ident("invariant") {
        return Err(parser.cursor.error("invariant sections are not supported"));
    }

    parser.cursor.enter("ontology");
    parser.cursor.expect_keyword("ontology")?;
    let ontology_line = parser.cursor.line();
    let ontology_section = dadl::parse_attributes(&mut parser.cursor)?;
    let ontology = read_ontology(&ontology_section, &original_language, ontology_line)?;

    if parser.cursor.eat_ident("revision_history") {
        parser.cursor.enter("revision_history");
        dadl::parse_attributes(&mut parser.cursor)?;
        tracing::debug!("{}: skipped revision_history", id);
    }

    if !parser.cursor.at_end() {
        return Err(parser.cursor.error("unexpected content after ontology"));
    }

    let definition = parser.builder.finish(root).map_err(|e| match e {
        TreeError::DuplicateCode(code) => AdlError::DuplicateCode { code },
        TreeError::DanglingReference(code) => AdlError::DanglingCode { code },
        other => AdlError::Parse {
            line: 0,
            construct: "definition".to_string(),
            message: other.to_string(),
        },
    })?;

    let header = ArchetypeHeader {
        id,
        adl_version,
        concept,
        original_language,
        translations,
        description,
    };
    Archetype::new(header, definition, ontology, config)
}

struct Parser<'t> {
    cursor: Cursor<'t>,
    builder: TreeBuilder,
}

impl Parser<'_> {
    fn parse_header(&mut self) -> AdlResult<(ArchetypeId, String)> {
        self.cursor.enter("archetype");
        self.cursor.expect_keyword("archetype")?;

        let mut adl_version = well_known::DEFAULT_ADL_VERSION.to_string();
        if self.cursor.eat(&TokenKind::LParen) {
            while !self.cursor.eat(&TokenKind::RParen) {
                let name = self.cursor.expect_ident()?;
                if self.cursor.eat(&TokenKind::Equals) {
                    let value = match &self.cursor.next_token()?.kind {
                        TokenKind::Number(v) | TokenKind::Ident(v) => v.clone(),
                        other => {
                            return Err(self.cursor.error(format!("unexpected '{}'", other)))
                        }
                    };
                    if name == "adl_version" {
                        adl_version = value;
                    }
                }
                if !self.cursor.eat(&TokenKind::Semicolon) {
                    self.cursor.eat(&TokenKind::Comma);
                }
            }
        }

        let id = ArchetypeId::parse(self.cursor.expect_ident()?)?;

        if self.cursor.is_ident("specialise") || self.cursor.is_ident("specialize") {
            return Err(self.cursor.error("specialised archetypes are not supported"));
        }
        Ok((id, adl_version))
    }

    fn parse_concept(&mut self) -> AdlResult<String> {
        self.cursor.enter("concept");
        self.cursor.expect_keyword("concept")?;
        self.expect_code()
    }

    fn expect_code(&mut self) -> AdlResult<String> {
        let code = self.cursor.expect_bracketed()?;
        if !adl_types::is_local_code(code) {
            return Err(self.cursor.error(format!("'{}' is not a local code", code)));
        }
        Ok(code.to_string())
    }

    // -------------------------------------------------------------------------
    // cADL
    // -------------------------------------------------------------------------

    fn parse_object(&mut self) -> AdlResult<NodeId> {
        if self.cursor.eat_ident("allow_archetype") {
            return self.parse_slot();
        }

        let rm_type = self.cursor.expect_ident()?.to_string();
        if !matches!(self.cursor.peek(), Some(TokenKind::Bracketed(_))) {
            return Err(self
                .cursor
                .error(format!("object node {} has no node id", rm_type)));
        }
        let code = self.expect_code()?;
        let occurrences = self.parse_occurrences()?;
        self.cursor.expect_keyword("matches")?;
        self.cursor.expect(&TokenKind::LBrace)?;

        let any = self.cursor.eat(&TokenKind::Star);
        let node = if well_known::is_element_type(&rm_type) {
            let value = if any {
                self.cursor.expect(&TokenKind::RBrace)?;
                ValueConstraint::Any { rm_type: None }
            } else {
                self.parse_element_body(&code)?
            };
            ConstraintNode::element(rm_type, code, occurrences, value)
        } else {
            let attributes = if any {
                self.cursor.expect(&TokenKind::RBrace)?;
                Vec::new()
            } else {
                self.parse_attributes()?
            };
            if well_known::is_cluster_type(&rm_type) {
                ConstraintNode::cluster(rm_type, code, occurrences, attributes)
            } else {
                ConstraintNode::container(rm_type, code, occurrences, attributes)
            }
        };

        Ok(self.builder.push(node))
    }

    fn parse_occurrences(&mut self) -> AdlResult<Interval> {
        if !self.cursor.eat_ident("occurrences") {
            return Ok(Interval::required());
        }
        self.cursor.expect_keyword("matches")?;
        let line = self.cursor.line();
        let text = self.read_interval_text()?;
        Interval::parse(&text).map_err(|source| AdlError::InvalidInterval { line, source })
    }

    /// Reads `{ ... }` holding an interval, and returns it as text such as
    /// `1..*; unordered`.
    fn read_interval_text(&mut self) -> AdlResult<String> {
        self.cursor.expect(&TokenKind::LBrace)?;
        let mut text = String::new();
        loop {
            match &self.cursor.next_token()?.kind {
                TokenKind::RBrace => break,
                TokenKind::Number(n) | TokenKind::Ident(n) => text.push_str(n),
                TokenKind::Range => text.push_str(".."),
                TokenKind::Star => text.push('*'),
                TokenKind::Semicolon => text.push_str("; "),
                other => {
                    return Err(self
                        .cursor
                        .error(format!("unexpected '{}' in interval", other)))
                }
            }
        }
        Ok(text)
    }

    /// Reads the optional `existence` and `cardinality` clauses of an attribute.
    fn parse_attribute_clauses(&mut self) -> AdlResult<(Option<Interval>, Option<Cardinality>)> {
        let mut existence = None;
        let mut cardinality = None;

        if self.cursor.eat_ident("existence") {
            self.cursor.expect_keyword("matches")?;
            let line = self.cursor.line();
            let text = self.read_interval_text()?;
            existence = Some(
                Interval::parse(&text)
                    .map_err(|source| AdlError::InvalidInterval { line, source })?,
            );
        }
        if self.cursor.eat_ident("cardinality") {
            self.cursor.expect_keyword("matches")?;
            let line = self.cursor.line();
            let text = self.read_interval_text()?;
            cardinality = Some(
                Cardinality::parse(&text)
                    .map_err(|source| AdlError::InvalidInterval { line, source })?,
            );
        }

        Ok((existence, cardinality))
    }

    /// Reads attributes up to and including the closing `}` of the owner.
    fn parse_attributes(&mut self) -> AdlResult<Vec<AttributeConstraint>> {
        let mut attributes = Vec::new();
        while !self.cursor.eat(&TokenKind::RBrace) {
            attributes.push(self.parse_attribute()?);
        }
        Ok(attributes)
    }

    fn parse_attribute(&mut self) -> AdlResult<AttributeConstraint> {
        let name = self.cursor.expect_ident()?.to_string();
        let (existence, cardinality) = self.parse_attribute_clauses()?;
        self.cursor.expect_keyword("matches")?;
        self.cursor.expect(&TokenKind::LBrace)?;

        let mut children = Vec::new();
        let mut references = Vec::new();
        while !self.cursor.eat(&TokenKind::RBrace) {
            if self.cursor.eat(&TokenKind::Star) {
                continue;
            }
            match (self.cursor.peek(), self.cursor.peek_nth(1)) {
                (Some(TokenKind::Ident(word)), _) if word == "allow_archetype" => {
                    children.push(self.parse_object()?);
                }
                (Some(TokenKind::Ident(word)), _) if word == "use_node" => {
                    references.push(self.parse_use_node()?);
                }
                (Some(TokenKind::Ident(_)), Some(TokenKind::Bracketed(_))) => {
                    children.push(self.parse_object()?);
                }
                (Some(TokenKind::Ident(rm_type)), _) => {
                    tracing::warn!(
                        "line {}: skipping {} without node id under '{}'",
                        self.cursor.line(),
                        rm_type,
                        name
                    );
                    self.skip_object()?;
                }
                _ => {
                    tracing::warn!(
                        "line {}: skipping primitive constraint on '{}'",
                        self.cursor.line(),
                        name
                    );
                    self.cursor.skip_to_close()?;
                }
            }
        }

        let mut attribute = match cardinality {
            Some(cardinality) => AttributeConstraint::multiple(name, Some(cardinality), children),
            None => AttributeConstraint::single(name, children),
        };
        attribute.existence = existence;
        attribute.references = references;
        Ok(attribute)
    }

    /// Consumes `RM_TYPE [occurrences matches {..}] matches { ... }` or the
    /// dADL form `C_DV_QUANTITY < ... >` of an object that is not kept.
    fn skip_object(&mut self) -> AdlResult<()> {
        self.cursor.expect_ident()?;
        if matches!(self.cursor.peek(), Some(TokenKind::Bracketed(_))) {
            self.cursor.next_token()?;
        }
        self.parse_occurrences()?;
        if self.cursor.peek() == Some(&TokenKind::LAngle) {
            return self.cursor.skip_angles();
        }
        self.cursor.expect_keyword("matches")?;
        self.cursor.skip_block()
    }

    /// `use_node ELEMENT occurrences matches {0..1} /data[at0001]/items[at0004]`
    fn parse_use_node(&mut self) -> AdlResult<InternalRef> {
        self.cursor.expect_keyword("use_node")?;
        let rm_type = self.cursor.expect_ident()?.to_string();
        if matches!(self.cursor.peek(), Some(TokenKind::Bracketed(_))) {
            self.cursor.next_token()?;
        }
        let occurrences = self.parse_occurrences()?;

        let mut path = String::new();
        let mut target = None;
        while self.cursor.eat(&TokenKind::Symbol('/')) {
            path.push('/');
            let attribute = match self.cursor.peek() {
                Some(TokenKind::Ident(name)) if name.starts_with(|c: char| c.is_lowercase()) => {
                    name.clone()
                }
                _ => continue,
            };
            self.cursor.next_token()?;
            path.push_str(&attribute);
            if let Some(TokenKind::Bracketed(code)) = self.cursor.peek() {
                let code = code.clone();
                self.cursor.next_token()?;
                path.push_str(&format!("[{}]", code));
                target = Some(code);
            }
        }

        let target = target
            .filter(|code| adl_types::is_local_code(code))
            .ok_or_else(|| {
                self.cursor
                    .error(format!("use_node path '{}' names no node", path))
            })?;
        Ok(InternalRef {
            rm_type,
            occurrences,
            path,
            target,
        })
    }

    /// Reads the body of an ELEMENT after its opening `{`.
    fn parse_element_body(&mut self, code: &str) -> AdlResult<ValueConstraint> {
        let mut value = None;
        while !self.cursor.eat(&TokenKind::RBrace) {
            let name = self.cursor.expect_ident()?;
            self.parse_attribute_clauses()?;
            self.cursor.expect_keyword("matches")?;

            if name == well_known::VALUE_ATTRIBUTE {
                if value.is_some() {
                    return Err(self.cursor.error(format!("{} declares value twice", code)));
                }
                value = Some(self.parse_value_block()?);
            } else {
                tracing::warn!("{}: skipping unsupported element attribute '{}'", code, name);
                self.cursor.skip_block()?;
            }
        }
        Ok(value.unwrap_or(ValueConstraint::Any { rm_type: None }))
    }

    /// Reads `{ <value constraint> }` of an element's `value` attribute.
    fn parse_value_block(&mut self) -> AdlResult<ValueConstraint> {
        self.cursor.expect(&TokenKind::LBrace)?;

        let value = match self.cursor.peek() {
            Some(TokenKind::Star) => {
                self.cursor.next_token()?;
                ValueConstraint::Any { rm_type: None }
            }
            Some(TokenKind::Number(_)) => self.parse_ordinals()?,
            Some(TokenKind::Bracketed(_)) => self.parse_code_phrase()?,
            Some(TokenKind::Ident(_)) => self.parse_typed_value()?,
            Some(other) => {
                return Err(self
                    .cursor
                    .error(format!("unexpected '{}' in value constraint", other)))
            }
            None => return Err(self.cursor.eof()),
        };

        if !self.cursor.eat(&TokenKind::RBrace) {
            return Err(self
                .cursor
                .error("multiple value alternatives are not supported"));
        }
        Ok(value)
    }

    /// `1|[local::at0051], 2|[local::at0052]`
    fn parse_ordinals(&mut self) -> AdlResult<ValueConstraint> {
        let mut options = Vec::new();
        loop {
            let ordinal = match &self.cursor.next_token()?.kind {
                TokenKind::Number(n) => n
                    .parse::<u32>()
                    .map_err(|_| self.cursor.error(format!("invalid ordinal '{}'", n)))?,
                other => {
                    return Err(self
                        .cursor
                        .error(format!("expected ordinal, found '{}'", other)))
                }
            };
            self.cursor.expect(&TokenKind::Pipe)?;
            let code = self.expect_code_ref()?;
            options.push(CodedOption {
                ordinal,
                terminology: code.terminology,
                code: code.code,
            });
            if !self.cursor.eat(&TokenKind::Comma) {
                break;
            }
        }

        // Assumed value: `; 1`
        if self.cursor.eat(&TokenKind::Semicolon) {
            self.cursor.next_token()?;
        }
        Ok(ValueConstraint::CodedChoice { options })
    }

    fn expect_code_ref(&mut self) -> AdlResult<CodeRef> {
        let raw = self.cursor.expect_bracketed()?;
        CodeRef::parse(raw).ok_or_else(|| {
            self.cursor
                .error(format!("expected [terminology::code], found [{}]", raw))
        })
    }

    /// `[local::at0102, at0103]`
    fn parse_code_phrase(&mut self) -> AdlResult<ValueConstraint> {
        let code = self.expect_code_ref()?;
        let codes = code.code.split(',').map(str::to_string).collect();
        if self.cursor.eat(&TokenKind::Semicolon) {
            self.cursor.next_token()?;
        }
        Ok(ValueConstraint::CodePhrase {
            terminology: code.terminology,
            codes,
        })
    }

    /// `DV_TEXT matches {*}`, `DV_CODED_TEXT matches { defining_code ... }`, ...
    fn parse_typed_value(&mut self) -> AdlResult<ValueConstraint> {
        let rm_type = self.cursor.expect_ident()?.to_string();

        // dADL form: C_DV_QUANTITY < property = <...> list = <...> >
        if self.cursor.peek() == Some(&TokenKind::LAngle) {
            let rm_type = rm_type
                .strip_prefix("C_")
                .map(str::to_string)
                .unwrap_or(rm_type);
            tracing::warn!(
                "line {}: {} constraint body not supported, value left unconstrained",
                self.cursor.line(),
                rm_type
            );
            self.cursor.skip_angles()?;
            return Ok(typed_any(rm_type));
        }
        self.cursor.expect_keyword("matches")?;

        let unconstrained = self.cursor.peek() == Some(&TokenKind::LBrace)
            && self.cursor.peek_nth(1) == Some(&TokenKind::Star)
            && self.cursor.peek_nth(2) == Some(&TokenKind::RBrace);
        if unconstrained {
            self.cursor.skip_block()?;
            return Ok(typed_any(rm_type));
        }

        let defining_code = rm_type == well_known::DV_CODED_TEXT
            && matches!(
                self.cursor.peek_nth(1),
                Some(TokenKind::Ident(name)) if name == well_known::DEFINING_CODE_ATTRIBUTE
            )
            && matches!(self.cursor.peek_nth(4), Some(TokenKind::Bracketed(raw)) if raw.contains("::"));
        if defining_code {
            self.cursor.expect(&TokenKind::LBrace)?;
            self.cursor.expect_keyword(well_known::DEFINING_CODE_ATTRIBUTE)?;
            self.cursor.expect_keyword("matches")?;
            self.cursor.expect(&TokenKind::LBrace)?;
            let value = self.parse_code_phrase()?;
            self.cursor.expect(&TokenKind::RBrace)?;
            self.cursor.expect(&TokenKind::RBrace)?;
            return Ok(value);
        }

        tracing::warn!(
            "line {}: {} constraint body not supported, value left unconstrained",
            self.cursor.line(),
            rm_type
        );
        self.cursor.skip_block()?;
        Ok(typed_any(rm_type))
    }

    /// `allow_archetype CLUSTER[at0104] occurrences matches {0..*} matches { include ... }`
    fn parse_slot(&mut self) -> AdlResult<NodeId> {
        let rm_type = self.cursor.expect_ident()?.to_string();
        if !matches!(self.cursor.peek(), Some(TokenKind::Bracketed(_))) {
            return Err(self.cursor.error("archetype slot has no node id"));
        }
        let code = self.expect_code()?;
        let occurrences = self.parse_occurrences()?;
        self.cursor.expect_keyword("matches")?;
        self.cursor.expect(&TokenKind::LBrace)?;

        let mut includes = Vec::new();
        let mut excludes = Vec::new();
        let mut target: Option<bool> = None;
        while !self.cursor.eat(&TokenKind::RBrace) {
            if self.cursor.eat(&TokenKind::Star) {
                continue;
            }
            if self.cursor.eat_ident("include") {
                target = Some(true);
                continue;
            }
            if self.cursor.eat_ident("exclude") {
                target = Some(false);
                continue;
            }
            let assertion = self.parse_slot_assertion()?;
            match target {
                Some(true) => includes.push(assertion),
                Some(false) => excludes.push(assertion),
                None => {
                    return Err(self
                        .cursor
                        .error("slot assertion outside include/exclude"))
                }
            }
        }

        let node = ConstraintNode::element(
            rm_type,
            code,
            occurrences,
            ValueConstraint::ExternalReference { includes, excludes },
        );
        Ok(self.builder.push(node))
    }

    /// `archetype_id/value matches {/regex/}`
    fn parse_slot_assertion(&mut self) -> AdlResult<SlotAssertion> {
        let path = self.cursor.expect_ident()?.to_string();
        self.cursor.expect_keyword("matches")?;
        self.cursor.expect(&TokenKind::LBrace)?;
        let pattern = match &self.cursor.next_token()?.kind {
            TokenKind::Regex(pattern) => pattern.clone(),
            other => {
                return Err(self
                    .cursor
                    .error(format!("expected /pattern/, found '{}'", other)))
            }
        };
        self.cursor.expect(&TokenKind::RBrace)?;
        Ok(SlotAssertion { path, pattern })
    }
}

fn typed_any(rm_type: String) -> ValueConstraint {
    if rm_type == well_known::DV_TEXT {
        ValueConstraint::FreeText
    } else {
        ValueConstraint::Any {
            rm_type: Some(rm_type),
        }
    }
}

// -----------------------------------------------------------------------------
// dADL sections
// -----------------------------------------------------------------------------

fn read_language(
    section: &DadlValue,
    cursor: &Cursor<'_>,
) -> AdlResult<(String, Vec<Translation>)> {
    let original = section
        .get("original_language")
        .and_then(DadlValue::first_code)
        .ok_or_else(|| cursor.error("original_language is missing"))?
        .code
        .clone();

    let translations = section
        .get("translations")
        .map(|t| {
            t.keyed()
                .map(|(language, body)| Translation {
                    language: language.to_string(),
                    author: body
                        .get("author")
                        .map(DadlValue::string_pairs)
                        .unwrap_or_default(),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok((original, translations))
}

fn read_description(section: &DadlValue) -> ArchetypeDescription {
    let text = |value: &DadlValue, name: &str| {
        value
            .get(name)
            .and_then(DadlValue::as_str)
            .map(str::to_string)
    };

    let details = section
        .get("details")
        .map(|d| {
            d.keyed()
                .map(|(language, body)| DescriptionDetail {
                    language: language.to_string(),
                    purpose: text(body, "purpose"),
                    usage: text(body, "use"),
                    misuse: text(body, "misuse"),
                    keywords: body
                        .get("keywords")
                        .map(|k| k.strings().to_vec())
                        .unwrap_or_default(),
                })
                .collect()
        })
        .unwrap_or_default();

    ArchetypeDescription {
        original_author: section
            .get("original_author")
            .map(DadlValue::string_pairs)
            .unwrap_or_default(),
        lifecycle_state: text(section, "lifecycle_state"),
        details,
    }
}

fn read_ontology(section: &DadlValue, original_language: &str, line: usize) -> AdlResult<Ontology> {
    let mut ontology = Ontology::new(original_language);
    ontology.set_terminologies_available(
        section
            .get("terminologies_available")
            .map(|t| t.strings().to_vec())
            .unwrap_or_default(),
    );

    for table in ["term_definitions", "constraint_definitions"] {
        let Some(by_language) = section.get(table) else {
            continue;
        };
        for (language, body) in by_language.keyed() {
            let Some(items) = body.get("items") else {
                continue;
            };
            for (code, entry) in items.keyed() {
                let text = entry
                    .get("text")
                    .and_then(DadlValue::as_str)
                    .ok_or_else(|| AdlError::Parse {
                        line,
                        construct: "ontology".to_string(),
                        message: format!("{} has no text in '{}'", code, language),
                    })?;
                let description = entry
                    .get("description")
                    .and_then(DadlValue::as_str)
                    .unwrap_or_default();
                let mut term = TermEntry::new(code, language, text, description);
                term.comment = entry
                    .get("comment")
                    .and_then(DadlValue::as_str)
                    .map(str::to_string);
                ontology.insert(term);
            }
        }
    }

    if let Some(by_terminology) = section.get("term_bindings") {
        for (terminology, body) in by_terminology.keyed() {
            let Some(items) = body.get("items") else {
                continue;
            };
            for (code, target) in items.keyed() {
                let target = target.first_code().ok_or_else(|| AdlError::Parse {
                    line,
                    construct: "ontology".to_string(),
                    message: format!("binding of {} is not a code", code),
                })?;
                ontology.insert_binding(TermBinding {
                    code: code.to_string(),
                    terminology: terminology.to_string(),
                    target: target.code.clone(),
                });
            }
        }
    }

    Ok(ontology)
}

#[cfg(test)]
mod tests {
    use super::*;
    use adl_types::NodeKind;

    const URINALYSIS: &str =
        include_str!("../../../archetypes/openEHR-EHR-OBSERVATION.urinalysis.v1.adl");

    fn make_archetype(definition: &str) -> String {
        format!(
            r#"archetype (adl_version=1.4)
	openEHR-EHR-CLUSTER.test.v1

concept
	[at0000]
language
	original_language = <[ISO_639-1::en]>
definition
{}
ontology
	term_definitions = <
		["en"] = <
			items = <
				["at0000"] = <text = <"Test"> description = <"Test cluster">>
				["at0001"] = <text = <"First"> description = <"">>
				["at0002"] = <text = <"Second"> description = <"">>
				["at0003"] = <text = <"Third"> description = <"">>
			>
		>
	>
"#,
            definition
        )
    }

    fn line_of(source: &str, needle: &str) -> usize {
        source.lines().position(|l| l.contains(needle)).unwrap() + 1
    }

    fn parse(source: &str) -> AdlResult<Archetype> {
        parse_archetype(source, &ParseConfig::default())
    }

    #[test]
    fn test_parse_urinalysis_header() {
        let archetype = parse(URINALYSIS).unwrap();
        let header = archetype.header();
        assert_eq!(header.id.as_str(), "openEHR-EHR-OBSERVATION.urinalysis.v1");
        assert_eq!(header.adl_version, "1.4");
        assert_eq!(header.concept, "at0000");
        assert_eq!(header.original_language, "en");
        assert_eq!(header.translations.len(), 1);
        assert_eq!(header.translations[0].language, "de");
        assert_eq!(
            header.translations[0].author[0],
            ("name".to_string(), "Sebastian Garde".to_string())
        );

        let description = header.description.as_ref().unwrap();
        assert_eq!(description.lifecycle_state.as_deref(), Some("AuthorDraft"));
        let en = description.detail("en").unwrap();
        assert_eq!(en.keywords.len(), 4);
        assert!(en.usage.as_deref().unwrap().starts_with("Use to record"));
    }

    #[test]
    fn test_parse_urinalysis_definition() {
        let archetype = parse(URINALYSIS).unwrap();
        let tree = archetype.definition();
        assert_eq!(tree.root_node().rm_type, "OBSERVATION");
        assert_eq!(tree.len(), 20);

        let history = tree.get(tree.find_by_code("at0001").unwrap()).unwrap();
        let events = &history.attributes()[0];
        assert_eq!(events.name, "events");
        let cardinality = events.cardinality.unwrap();
        assert_eq!(cardinality.interval, Interval::one_or_more());
        assert!(!cardinality.ordered);

        let glucose = tree.get(tree.find_by_code("at0050").unwrap()).unwrap();
        assert_eq!(glucose.occurrences, Interval::optional());
        match glucose.value() {
            Some(ValueConstraint::CodedChoice { options }) => {
                assert_eq!(options.len(), 6);
                assert_eq!(options[2], CodedOption::local(3, "at0053"));
            }
            other => panic!("unexpected value: {:?}", other),
        }

        let interpretation = tree.get(tree.find_by_code("at0101").unwrap()).unwrap();
        assert_eq!(
            interpretation.value(),
            Some(&ValueConstraint::CodePhrase {
                terminology: "local".to_string(),
                codes: vec!["at0102".to_string(), "at0103".to_string()],
            })
        );

        let comment = tree.get(tree.find_by_code("at0100").unwrap()).unwrap();
        assert_eq!(comment.value(), Some(&ValueConstraint::FreeText));

        let strip = tree.get(tree.find_by_code("at0107").unwrap()).unwrap();
        assert!(matches!(strip.kind, NodeKind::Cluster(_)));
        assert!(strip.attributes()[0].cardinality.unwrap().ordered);
    }

    #[test]
    fn test_parse_urinalysis_slot() {
        let archetype = parse(URINALYSIS).unwrap();
        let tree = archetype.definition();
        let id = tree.find_by_code("at0104").unwrap();
        let slot = tree.get(id).unwrap();
        assert_eq!(slot.rm_type, "CLUSTER");
        assert_eq!(slot.occurrences, Interval::unbounded());
        match slot.value() {
            Some(ValueConstraint::ExternalReference { includes, excludes }) => {
                assert_eq!(includes.len(), 1);
                assert_eq!(includes[0].path, "archetype_id/value");
                assert!(excludes.is_empty());
            }
            other => panic!("unexpected value: {:?}", other),
        }
        let matcher = archetype.slot_matcher(id).unwrap();
        assert!(matcher.matches("openEHR-EHR-CLUSTER.urine_microscopy.v1"));
    }

    #[test]
    fn test_parse_urinalysis_ontology() {
        let archetype = parse(URINALYSIS).unwrap();
        let ontology = archetype.ontology();
        assert_eq!(ontology.terminologies_available().to_vec(), vec!["LOINC".to_string()]);
        assert_eq!(ontology.resolve("at0053", "en").unwrap().text, "+");
        assert_eq!(ontology.resolve("at0050", "de").unwrap().text, "Glukose");
        assert_eq!(ontology.resolve("at0053", "de").unwrap().text, "+");
        assert_eq!(ontology.binding("LOINC", "at0081").unwrap().target, "5803-2");
        assert_eq!(ontology.bindings().count(), 8);
    }

    #[test]
    fn test_strict_translations_reject_sample() {
        let result = parse_archetype(URINALYSIS, &ParseConfig::strict());
        assert!(matches!(
            result,
            Err(AdlError::MissingTranslation { ref language, .. }) if language == "de"
        ));
    }

    #[test]
    fn test_single_value_interval_and_existence() {
        let source = make_archetype(
            "	CLUSTER[at0000] matches {
		items existence matches {1} cardinality matches {1..2} matches {
			ELEMENT[at0001] occurrences matches {1} matches {*}
		}
	}",
        );
        let archetype = parse(&source).unwrap();
        let tree = archetype.definition();
        let items = &tree.root_node().attributes()[0];
        assert_eq!(items.existence, Some(Interval::required()));
        // Without a qualifier ADL cardinality is ordered.
        assert!(items.cardinality.unwrap().ordered);
        let first = tree.get(tree.find_by_code("at0001").unwrap()).unwrap();
        assert_eq!(first.occurrences, Interval::required());
        assert_eq!(first.value(), Some(&ValueConstraint::Any { rm_type: None }));
    }

    #[test]
    fn test_unsupported_constructs_are_skipped() {
        let source = make_archetype(
            "	CLUSTER[at0000] matches {
		items cardinality matches {0..*; unordered} matches {
			ELEMENT[at0001] matches {
				name matches { DV_TEXT matches { value matches {\"x\"} } }
				value matches { DV_QUANTITY matches { property matches {[openehr::125]} } }
			}
		}
	}",
        );
        let archetype = parse(&source).unwrap();
        let tree = archetype.definition();
        let first = tree.get(tree.find_by_code("at0001").unwrap()).unwrap();
        assert_eq!(
            first.value(),
            Some(&ValueConstraint::Any {
                rm_type: Some("DV_QUANTITY".to_string())
            })
        );
    }

    #[test]
    fn test_duplicate_node_code() {
        let source = make_archetype(
            "	CLUSTER[at0000] matches {
		items matches {
			ELEMENT[at0001] matches {*}
			ELEMENT[at0001] matches {*}
		}
	}",
        );
        assert!(matches!(
            parse(&source),
            Err(AdlError::DuplicateCode { ref code }) if code == "at0001"
        ));
    }

    #[test]
    fn test_multiple_value_alternatives_rejected() {
        let source = make_archetype(
            "	CLUSTER[at0000] matches {
		items matches {
			ELEMENT[at0001] matches {
				value matches {
					DV_TEXT matches {*}
					DV_CODED_TEXT matches {*}
				}
			}
		}
	}",
        );
        let line = line_of(&source, "DV_CODED_TEXT");
        assert!(matches!(parse(&source), Err(AdlError::Parse { line: l, .. }) if l == line));
    }

    #[test]
    fn test_root_without_node_id_rejected() {
        let source = make_archetype("	CLUSTER matches {*}");
        let line = line_of(&source, "CLUSTER matches");
        assert!(matches!(parse(&source), Err(AdlError::Parse { line: l, .. }) if l == line));
    }

    #[test]
    fn test_primitive_bodies_are_skipped() {
        let source = make_archetype(
            "	CLUSTER[at0000] matches {
		items cardinality matches {0..*; unordered} matches {
			ELEMENT[at0001] occurrences matches {0..1} matches {
				value matches {
					DV_DATE_TIME matches {
						value matches {yyyy-mm-ddTHH:??:??}
					}
				}
			}
			ELEMENT[at0002] occurrences matches {0..1} matches {
				value matches {
					DV_COUNT matches {
						magnitude matches {|-10..10|}
					}
				}
			}
			ELEMENT[at0003] occurrences matches {0..1} matches {
				value matches {
					C_DV_QUANTITY <
						property = <[openehr::125]>
						list = <
							[\"1\"] = <
								units = <\"mm[Hg]\">
								magnitude = <|0.0..<1000.0|>
							>
						>
					>
				}
			}
		}
	}",
        );
        let archetype = parse(&source).unwrap();
        let tree = archetype.definition();
        let value_of = |code: &str| {
            tree.get(tree.find_by_code(code).unwrap())
                .unwrap()
                .value()
                .cloned()
        };
        let any = |rm_type: &str| {
            Some(ValueConstraint::Any {
                rm_type: Some(rm_type.to_string()),
            })
        };
        assert_eq!(value_of("at0001"), any("DV_DATE_TIME"));
        assert_eq!(value_of("at0002"), any("DV_COUNT"));
        assert_eq!(value_of("at0003"), any("DV_QUANTITY"));
    }

    #[test]
    fn test_uri_constraint_bindings_are_read() {
        let source = make_archetype("	CLUSTER[at0000] matches {*}")
            + "	constraint_bindings = <
		[\"SNOMED-CT\"] = <
			items = <
				[\"ac0001\"] = <http://snomed.info/id/24028007>
			>
		>
	>
";
        let archetype = parse(&source).unwrap();
        assert_eq!(archetype.definition().len(), 1);
    }

    #[test]
    fn test_objects_without_node_id_are_skipped() {
        let source = make_archetype(
            "	HISTORY[at0000] matches {
		name matches {
			DV_TEXT matches {*}
		}
		events cardinality matches {1..*; unordered} matches {
			INTERVAL_EVENT[at0001] occurrences matches {0..*} matches {
				width matches {
					DV_DURATION matches {
						value matches {PT0S..PT24H}
					}
				}
				math_function matches {
					DV_CODED_TEXT matches {
						defining_code matches {[openehr::146]}
					}
				}
				data matches {
					ITEM_TREE[at0002] matches {*}
				}
			}
		}
	}",
        );
        let archetype = parse(&source).unwrap();
        let tree = archetype.definition();
        assert_eq!(tree.len(), 3);

        let root = tree.root_node();
        assert_eq!(root.attributes()[0].name, "name");
        assert!(root.attributes()[0].children.is_empty());

        let event = tree.get(tree.find_by_code("at0001").unwrap()).unwrap();
        let names: Vec<&str> = event.attributes().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["width", "math_function", "data"]);
        assert_eq!(event.attributes()[2].children.len(), 1);
    }

    #[test]
    fn test_use_node_reference() {
        let source = make_archetype(
            "	CLUSTER[at0000] matches {
		items cardinality matches {0..*; unordered} matches {
			CLUSTER[at0001] occurrences matches {0..1} matches {
				items matches {
					ELEMENT[at0002] occurrences matches {0..1} matches {*}
				}
			}
			CLUSTER[at0003] occurrences matches {0..1} matches {
				items matches {
					use_node ELEMENT occurrences matches {0..1} /items[at0001]/items[at0002]
				}
			}
		}
	}",
        );
        let archetype = parse(&source).unwrap();
        let tree = archetype.definition();
        let reuse = tree.get(tree.find_by_code("at0003").unwrap()).unwrap();
        let items = &reuse.attributes()[0];
        assert!(items.children.is_empty());
        assert_eq!(
            items.references,
            vec![InternalRef {
                rm_type: "ELEMENT".to_string(),
                occurrences: Interval::optional(),
                path: "/items[at0001]/items[at0002]".to_string(),
                target: "at0002".to_string(),
            }]
        );

        let dangling = source.replace("/items[at0002]", "/items[at0009]");
        assert!(matches!(
            parse(&dangling),
            Err(AdlError::DanglingCode { ref code }) if code == "at0009"
        ));
    }

    #[test]
    fn test_unbalanced_definition() {
        let source = make_archetype(
            "	CLUSTER[at0000] matches {
		items matches {
			ELEMENT[at0001] matches {*}
	}",
        );
        assert!(matches!(parse(&source), Err(AdlError::UnbalancedBlock { .. })));
    }

    #[test]
    fn test_invalid_interval() {
        let source = make_archetype(
            "	CLUSTER[at0000] matches {
		items matches {
			ELEMENT[at0001] occurrences matches {2..1} matches {*}
		}
	}",
        );
        let line = line_of(&source, "{2..1}");
        assert!(matches!(
            parse(&source),
            Err(AdlError::InvalidInterval { line: l, .. }) if l == line
        ));
    }

    #[test]
    fn test_invalid_archetype_id() {
        let source = make_archetype("	CLUSTER[at0000] matches {*}")
            .replace("openEHR-EHR-CLUSTER.test.v1", "not-an-id");
        assert!(matches!(parse(&source), Err(AdlError::InvalidArchetypeId(_))));
    }

    #[test]
    fn test_truncated_source() {
        let source = make_archetype("	CLUSTER[at0000] matches {*}");
        let truncated = &source[..source.find("ontology").unwrap()];
        assert!(matches!(
            parse(truncated),
            Err(AdlError::UnexpectedEof { ref construct }) if construct == "ontology"
        ));
    }

    #[test]
    fn test_specialised_archetype_rejected() {
        let source = make_archetype("	CLUSTER[at0000] matches {*}").replace(
            "openEHR-EHR-CLUSTER.test.v1\n",
            "openEHR-EHR-CLUSTER.test-child.v1\nspecialise\n\topenEHR-EHR-CLUSTER.test.v1\n",
        );
        assert!(matches!(parse(&source), Err(AdlError::Parse { .. })));
    }

    #[test]
    fn test_slot_with_exclude() {
        let source = make_archetype(
            "	CLUSTER[at0000] matches {
		items matches {
			allow_archetype CLUSTER[at0001] occurrences matches {0..*} matches {
				include
					archetype_id/value matches {/.*/}
				exclude
					archetype_id/value matches {/openEHR-EHR-CLUSTER\\.device\\.v1/}
			}
		}
	}",
        );
        let archetype = parse(&source).unwrap();
        let id = archetype.definition().find_by_code("at0001").unwrap();
        let matcher = archetype.slot_matcher(id).unwrap();
        assert!(matcher.matches("openEHR-EHR-CLUSTER.other.v1"));
        assert!(!matcher.matches("openEHR-EHR-CLUSTER.device.v1"));
    }
}
