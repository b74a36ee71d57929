//! Structured-block codec: `RELATED[kind]` / `RELATED[n:kind]` fields
//!
//! The first entry of a kind is unindexed, later ones carry `1`, `2`, ...
//! Existing numbering is never changed; new entries go after the highest
//! index already used for their kind.

use crate::document::{format_field, ContactDocument};
use crate::reference::RelationshipReference;
use crate::taxonomy::{self, RelationKind};
use crate::warning::{Warning, WarningKind};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

pub const FIELD_PREFIX: &str = "RELATED";

static KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^RELATED\[\s*(?:(\d+)\s*:)?\s*([^\]]*?)\s*\]$").expect("valid related key regex")
});

/// One `RELATED` field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEntry {
    pub kind: RelationKind,
    /// `None` for the unindexed first entry of a kind
    pub index: Option<u32>,
    pub reference: RelationshipReference,
}

impl BlockEntry {
    pub fn new(kind: RelationKind, index: Option<u32>, reference: RelationshipReference) -> Self {
        Self {
            kind,
            index,
            reference,
        }
    }

    pub fn key(&self) -> String {
        match self.index {
            None => format!("{}[{}]", FIELD_PREFIX, self.kind.key()),
            Some(n) => format!("{}[{}:{}]", FIELD_PREFIX, n, self.kind.key()),
        }
    }

    pub fn value(&self) -> String {
        self.reference.to_string()
    }
}

/// Parse result: the valid entries plus warnings for everything skipped
#[derive(Debug, Clone, Default)]
pub struct ParsedBlock {
    pub entries: Vec<BlockEntry>,
    /// Raw key of each entry, parallel to `entries`
    pub keys: Vec<String>,
    /// Raw value of each entry, parallel to `entries`
    pub values: Vec<String>,
    pub warnings: Vec<Warning>,
}

/// True for any field key in the `RELATED` family, valid or not:
/// `RELATED` itself or `RELATED[...`. `RELATED_NOTES` is somebody else's.
pub fn is_related_key(key: &str) -> bool {
    let Some(head) = key.get(..FIELD_PREFIX.len()) else {
        return false;
    };
    head.eq_ignore_ascii_case(FIELD_PREFIX)
        && matches!(key[FIELD_PREFIX.len()..].chars().next(), None | Some('['))
}

/// Parse the `RELATED` fields out of raw document text
pub fn parse(document_text: &str) -> ParsedBlock {
    parse_document(&ContactDocument::parse("", document_text))
}

pub fn parse_document(document: &ContactDocument) -> ParsedBlock {
    let fields = document
        .front()
        .map(|front| front.fields().collect::<Vec<_>>())
        .unwrap_or_default();
    let mut parsed = parse_fields(fields.into_iter());
    for warning in &mut parsed.warnings {
        warning.document = document.path.clone();
    }
    parsed
}

/// Parse from `(key, value)` pairs; non-`RELATED` keys are ignored
pub fn parse_fields<'a>(fields: impl Iterator<Item = (&'a str, &'a str)>) -> ParsedBlock {
    let mut parsed = ParsedBlock::default();
    let mut seen_keys = BTreeSet::new();

    for (key, value) in fields {
        if !is_related_key(key) {
            continue;
        }
        let Some(caps) = KEY_RE.captures(key) else {
            parsed.warnings.push(Warning::new(
                WarningKind::MalformedEntry,
                format!("malformed relationship key '{key}'"),
            ));
            continue;
        };

        let index = match caps.get(1).map(|m| m.as_str().parse::<u32>()) {
            None => None,
            Some(Ok(n)) if n > 0 => Some(n),
            Some(_) => {
                parsed.warnings.push(Warning::new(
                    WarningKind::MalformedEntry,
                    format!("invalid index in '{key}'"),
                ));
                continue;
            }
        };

        let term = &caps[2];
        let Some(kind) = taxonomy::normalize(term) else {
            parsed.warnings.push(Warning::new(
                WarningKind::UnknownKind,
                format!("unknown relationship kind '{term}' in '{key}'"),
            ));
            continue;
        };

        let reference = RelationshipReference::parse(value);
        if reference.is_empty() {
            parsed.warnings.push(Warning::new(
                WarningKind::MalformedEntry,
                format!("empty reference for '{key}'"),
            ));
            continue;
        }

        if !seen_keys.insert((kind.key(), index)) {
            parsed.warnings.push(Warning::new(
                WarningKind::DuplicateKey,
                format!("'{key}' repeats an existing slot"),
            ));
        }

        tracing::trace!("Parsed {} -> {}", key, reference);
        parsed.keys.push(key.to_string());
        parsed.values.push(value.to_string());
        parsed.entries.push(BlockEntry::new(kind, index, reference));
    }

    parsed.warnings.extend(gap_warnings(&parsed.entries));
    parsed
}

fn gap_warnings(entries: &[BlockEntry]) -> Vec<Warning> {
    let mut by_kind: BTreeMap<&str, BTreeSet<u32>> = BTreeMap::new();
    for entry in entries {
        by_kind
            .entry(entry.kind.key())
            .or_default()
            .insert(entry.index.unwrap_or(0));
    }
    by_kind
        .into_iter()
        .filter_map(|(kind, slots)| {
            let max = slots.iter().max().copied().unwrap_or(0);
            let missing: Vec<u32> = (0..=max).filter(|n| !slots.contains(n)).collect();
            if missing.is_empty() {
                return None;
            }
            let missing = missing
                .iter()
                .map(|n| if *n == 0 { "unindexed".to_string() } else { n.to_string() })
                .collect::<Vec<_>>()
                .join(", ");
            Some(Warning::new(
                WarningKind::IndexGap,
                format!("'{kind}' entries are missing slot(s) {missing}; new entries go after {max}"),
            ))
        })
        .collect()
}

/// Deterministic order: kind key, then reference payload
pub fn sort_entries(entries: &mut [BlockEntry]) {
    entries.sort_by(|a, b| {
        a.kind
            .key()
            .cmp(b.kind.key())
            .then_with(|| a.reference.payload.cmp(&b.reference.payload))
            .then_with(|| a.reference.namespace.cmp(&b.reference.namespace))
            .then_with(|| a.index.cmp(&b.index))
    });
}

/// Render entries as `KEY: value` lines in deterministic order
pub fn render(entries: &[BlockEntry]) -> String {
    let mut sorted = entries.to_vec();
    sort_entries(&mut sorted);
    sorted
        .iter()
        .map(|entry| format_field(&entry.key(), &entry.value()) + "\n")
        .collect()
}

/// Assign slots to new entries without renumbering existing ones
///
/// A kind with no existing entries starts unindexed; otherwise numbering
/// continues after the highest slot in use (gaps are left alone).
pub fn assign_slots(
    existing: &[BlockEntry],
    additions: impl IntoIterator<Item = (RelationKind, RelationshipReference)>,
) -> Vec<BlockEntry> {
    let mut next: BTreeMap<RelationKind, u32> = BTreeMap::new();
    let mut occupied: BTreeSet<RelationKind> = BTreeSet::new();
    for entry in existing {
        occupied.insert(entry.kind);
        let slot = next.entry(entry.kind).or_insert(1);
        *slot = (*slot).max(entry.index.unwrap_or(0) + 1);
    }

    let mut additions: Vec<_> = additions.into_iter().collect();
    additions.sort_by(|a, b| a.0.key().cmp(b.0.key()).then_with(|| a.1.payload.cmp(&b.1.payload)));

    additions
        .into_iter()
        .map(|(kind, reference)| {
            if occupied.insert(kind) {
                next.insert(kind, 1);
                BlockEntry::new(kind, None, reference)
            } else {
                let slot = next.entry(kind).or_insert(1);
                let index = *slot;
                *slot += 1;
                BlockEntry::new(kind, Some(index), reference)
            }
        })
        .collect()
}

/// Append entries to the document's front block after any existing
/// `RELATED` fields, leaving existing fields untouched
pub fn append_to_document(document: &mut ContactDocument, entries: &[BlockEntry]) {
    if entries.is_empty() {
        return;
    }
    let mut sorted = entries.to_vec();
    sort_entries(&mut sorted);
    let fields: Vec<(String, String)> = sorted.iter().map(|e| (e.key(), e.value())).collect();
    document.front_mut().insert_grouped(is_related_key, &fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(fields: &str) -> String {
        format!("---\nFN: X\n{fields}---\nbody\n")
    }

    #[test]
    fn test_parse_indexed_entries() {
        let parsed = parse(&doc(
            "RELATED[friend]: name:A\nRELATED[1:friend]: local-id:b\nRELATED[2:friend]: stable-id:c\nRELATED[mother]: name:Mum\n",
        ));
        assert!(parsed.warnings.is_empty(), "{:?}", parsed.warnings);
        let slots: Vec<_> = parsed.entries.iter().map(|e| (e.kind, e.index)).collect();
        assert_eq!(
            slots,
            vec![
                (RelationKind::Friend, None),
                (RelationKind::Friend, Some(1)),
                (RelationKind::Friend, Some(2)),
                (RelationKind::Parent, None),
            ]
        );
        assert_eq!(parsed.keys[3], "RELATED[mother]");
    }

    #[test]
    fn test_malformed_entries_are_skipped_with_warnings() {
        let parsed = parse(&doc(
            "RELATED[frenemy]: name:A\nRELATED[0:friend]: name:B\nRELATED[friend]:\nRELATED: name:C\nRELATED[colleague]: name:D\n",
        ));
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].kind, RelationKind::Colleague);
        let kinds: Vec<_> = parsed.warnings.iter().map(|w| w.kind).collect();
        assert_eq!(
            kinds,
            vec![
                WarningKind::UnknownKind,
                WarningKind::MalformedEntry,
                WarningKind::MalformedEntry,
                WarningKind::MalformedEntry,
            ]
        );
    }

    #[test]
    fn test_lookalike_keys_are_not_relations() {
        assert!(is_related_key("RELATED[friend]"));
        assert!(is_related_key("related[2:friend]"));
        assert!(is_related_key("RELATED"));
        assert!(!is_related_key("RELATED_NOTES"));
        assert!(!is_related_key("RELATEDNESS"));
        assert!(!is_related_key("REL"));

        let parsed = parse(&doc("RELATED_NOTES: met at work\nRELATED[friend]: name:A\n"));
        assert_eq!(parsed.entries.len(), 1);
        assert!(parsed.warnings.is_empty(), "{:?}", parsed.warnings);
    }

    #[test]
    fn test_gap_is_a_warning_and_numbering_continues_after_max() {
        let parsed = parse(&doc("RELATED[friend]: name:A\nRELATED[3:friend]: name:B\n"));
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].kind, WarningKind::IndexGap);

        let added = assign_slots(
            &parsed.entries,
            vec![(RelationKind::Friend, RelationshipReference::name("C"))],
        );
        assert_eq!(added[0].index, Some(4));
    }

    #[test]
    fn test_adding_fourth_entry_keeps_existing_numbering() {
        let text = doc("RELATED[friend]: name:A\nRELATED[1:friend]: name:B\nRELATED[2:friend]: name:C\n");
        let mut document = ContactDocument::parse("x.md", &text);
        let parsed = parse_document(&document);
        let added = assign_slots(
            &parsed.entries,
            vec![(RelationKind::Friend, RelationshipReference::name("D"))],
        );
        append_to_document(&mut document, &added);

        let reparsed = parse_document(&document);
        let keys: Vec<_> = reparsed.entries.iter().map(|e| e.key()).collect();
        assert_eq!(
            keys,
            vec![
                "RELATED[friend]",
                "RELATED[1:friend]",
                "RELATED[2:friend]",
                "RELATED[3:friend]"
            ]
        );
        assert!(document.to_text().contains("RELATED[2:friend]: name:C\nRELATED[3:friend]: name:D\n---"));
    }

    #[test]
    fn test_new_kind_starts_unindexed() {
        let added = assign_slots(
            &[],
            vec![
                (RelationKind::Sibling, RelationshipReference::name("Z")),
                (RelationKind::Sibling, RelationshipReference::name("A")),
            ],
        );
        assert_eq!(added[0], BlockEntry::new(RelationKind::Sibling, None, RelationshipReference::name("A")));
        assert_eq!(added[1].index, Some(1));
    }

    #[test]
    fn test_render_is_sorted_and_stable() {
        let text = doc("RELATED[spouse]: name:Zoe\nRELATED[1:friend]: name:Bo\nRELATED[friend]: name:Al\nRELATED[brother]: name:Cy\n");
        let once = render(&parse(&text).entries);
        assert_eq!(
            once,
            "RELATED[friend]: name:Al\nRELATED[1:friend]: name:Bo\nRELATED[sibling]: name:Cy\nRELATED[spouse]: name:Zoe\n"
        );
        let twice = render(&parse(&doc(&once)).entries);
        assert_eq!(once, twice);
    }
}
