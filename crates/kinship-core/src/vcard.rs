//! Interchange codec for the vCard `RELATED` property
//!
//! Only the relationship property is handled here:
//! `RELATED;TYPE=<kind>:<prefix>:<payload>`. Every other property of a card
//! belongs to the importer/exporter and is ignored on parse.

use crate::reference::RelationshipReference;
use crate::taxonomy::{self, RelationKind};
use crate::warning::{Warning, WarningKind};

const PROPERTY: &str = "RELATED";

/// A relationship read from (or written to) a card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardRelation {
    pub kind: RelationKind,
    pub reference: RelationshipReference,
}

impl CardRelation {
    pub fn new(kind: RelationKind, reference: RelationshipReference) -> Self {
        Self { kind, reference }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParsedCard {
    pub relations: Vec<CardRelation>,
    pub warnings: Vec<Warning>,
}

/// Undo RFC 6350 line folding: a line starting with a space or tab
/// continues the previous one
fn unfold(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        match (line.strip_prefix([' ', '\t']), lines.last_mut()) {
            (Some(rest), Some(previous)) => previous.push_str(rest),
            _ => lines.push(line.to_string()),
        }
    }
    lines
}

/// Parse every `RELATED` property of a card
pub fn parse(text: &str) -> ParsedCard {
    let mut parsed = ParsedCard::default();

    for line in unfold(text) {
        let Some((head, value)) = line.split_once(':') else {
            continue;
        };
        let mut parts = head.split(';');
        let name = parts.next().unwrap_or_default().trim();
        // strip an optional group prefix, e.g. `item1.RELATED`
        let name = name.rsplit('.').next().unwrap_or(name);
        if !name.eq_ignore_ascii_case(PROPERTY) {
            continue;
        }

        let term = parts.find_map(|param| {
            let (key, value) = param.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("TYPE")
                .then(|| value.trim().trim_matches('"').to_string())
        });
        let Some(term) = term.filter(|t| !t.is_empty()) else {
            parsed.warnings.push(Warning::new(
                WarningKind::MalformedEntry,
                format!("RELATED property without TYPE: '{line}'"),
            ));
            continue;
        };
        // TYPE may carry a comma separated list; the first known kind wins
        let Some(kind) = term.split(',').find_map(taxonomy::normalize) else {
            parsed.warnings.push(Warning::new(
                WarningKind::UnknownKind,
                format!("unknown relationship kind '{term}'"),
            ));
            continue;
        };

        let reference = RelationshipReference::parse(&unescape(value));
        if reference.is_empty() {
            parsed.warnings.push(Warning::new(
                WarningKind::MalformedEntry,
                format!("empty RELATED value: '{line}'"),
            ));
            continue;
        }
        parsed.relations.push(CardRelation::new(kind, reference));
    }
    parsed
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.trim().chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' | ',' | ';' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

pub fn render_line(relation: &CardRelation) -> String {
    format!(
        "{};TYPE={}:{}",
        PROPERTY,
        relation.kind.key(),
        escape(&relation.reference.to_string())
    )
}

/// Render `RELATED` lines (CRLF terminated) in kind, payload, then
/// namespace order
pub fn render(relations: &[CardRelation]) -> String {
    let mut sorted = relations.to_vec();
    sorted.sort_by(|a, b| {
        a.kind
            .key()
            .cmp(b.kind.key())
            .then_with(|| a.reference.payload.cmp(&b.reference.payload))
            .then_with(|| a.reference.namespace.cmp(&b.reference.namespace))
    });
    sorted.dedup();
    sorted
        .iter()
        .map(|relation| render_line(relation) + "\r\n")
        .collect()
}
