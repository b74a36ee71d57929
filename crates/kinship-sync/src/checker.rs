//! Consistency checker
//!
//! Finds three kinds of problem across the vault:
//! - a declared relationship whose peer document does not declare the
//!   reciprocal
//! - the same relationship written twice in one representation of one
//!   document
//! - graph edges that hang off a document-less placeholder nobody declares

use crate::index::{DeclaredEdge, VaultIndex};
use kinship_core::{ContactDocument, ContactId, RelationshipEdge};
use serde::Serialize;
use std::collections::HashSet;

/// A declared edge whose peer lacks the reciprocal entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingReciprocal {
    pub edge: RelationshipEdge,
    /// Document that declares `edge`
    pub document: String,
    /// Document that should declare the reciprocal
    pub peer_document: String,
}

/// Where a duplicate entry sits in its document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "in", rename_all = "snake_case")]
pub enum EntryLocation {
    /// Structured-block field, identified by its raw key and value
    Block { key: String, value: String },
    /// Text-list line (0-based within the body)
    List { line: usize },
}

/// A later copy of a relationship already declared earlier in the same
/// representation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateEdge {
    pub document: String,
    pub edge: RelationshipEdge,
    pub location: EntryLocation,
}

/// An edge touching a dangling placeholder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanedEdge {
    pub edge: RelationshipEdge,
    /// The document-less node
    pub node: ContactId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub missing_reciprocals: Vec<MissingReciprocal>,
    pub duplicate_edges: Vec<DuplicateEdge>,
    pub orphaned_edges: Vec<OrphanedEdge>,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }

    pub fn total(&self) -> usize {
        self.missing_reciprocals.len() + self.duplicate_edges.len() + self.orphaned_edges.len()
    }

    pub fn merge(&mut self, other: CheckReport) {
        self.missing_reciprocals.extend(other.missing_reciprocals);
        self.duplicate_edges.extend(other.duplicate_edges);
        self.orphaned_edges.extend(other.orphaned_edges);
    }
}

/// Full check over an indexed vault and its documents
pub fn check(index: &VaultIndex, documents: &[ContactDocument]) -> CheckReport {
    let mut report = check_graph(index);
    for document in documents {
        report.duplicate_edges.extend(duplicates_in(index, document));
    }
    report
}

/// Check a set of documents from scratch
pub fn check_documents(documents: &[ContactDocument], heading: &str) -> CheckReport {
    let (index, _) = VaultIndex::new().with_heading(heading).build(documents);
    check(&index, documents)
}

/// Missing reciprocals and orphans; needs no document text
pub fn check_graph(index: &VaultIndex) -> CheckReport {
    CheckReport {
        missing_reciprocals: missing_reciprocals(index),
        orphaned_edges: orphaned_edges(index),
        ..Default::default()
    }
}

fn missing_reciprocals(index: &VaultIndex) -> Vec<MissingReciprocal> {
    let mut missing = Vec::new();
    for source in index.declaring_contacts() {
        let Some(document) = index.document_path(&source) else {
            continue;
        };
        let Some(edges) = index.declared(&source) else {
            continue;
        };
        for (kind, target) in edges {
            let Some(peer_document) = index.document_path(target) else {
                continue;
            };
            if target == &source || index.declares(target, kind.reciprocal(), &source) {
                continue;
            }
            missing.push(MissingReciprocal {
                edge: RelationshipEdge::new(source.clone(), target.clone(), *kind),
                document: document.to_string(),
                peer_document: peer_document.to_string(),
            });
        }
    }
    missing
}

fn orphaned_edges(index: &VaultIndex) -> Vec<OrphanedEdge> {
    let graph = index.graph();
    graph
        .nodes()
        .filter(|node| !node.is_backed() && graph.degree(&node.id) == 1)
        .filter_map(|node| {
            let edge = graph.edges().iter().find(|e| e.touches(&node.id))?;
            let declared = index.declares(&edge.source, edge.kind, &edge.target);
            (!declared).then(|| OrphanedEdge {
                edge: edge.clone(),
                node: node.id.clone(),
            })
        })
        .collect()
}

/// Later copies of an edge within the block or within the list
pub fn duplicates_in(index: &VaultIndex, document: &ContactDocument) -> Vec<DuplicateEdge> {
    let resolved = index.resolve_document(document);
    let edge = |(kind, target): DeclaredEdge| RelationshipEdge::new(resolved.id.clone(), target, kind);
    let mut duplicates = Vec::new();

    let mut seen: HashSet<DeclaredEdge> = HashSet::new();
    for entry in &resolved.block {
        let pair = (entry.entry.kind, entry.target.clone());
        if !seen.insert(pair.clone()) {
            duplicates.push(DuplicateEdge {
                document: document.path.clone(),
                edge: edge(pair),
                location: EntryLocation::Block {
                    key: entry.key.clone(),
                    value: entry.value.clone(),
                },
            });
        }
    }

    seen.clear();
    for entry in &resolved.list {
        let pair = (entry.entry.kind, entry.target.clone());
        if !seen.insert(pair.clone()) {
            duplicates.push(DuplicateEdge {
                document: document.path.clone(),
                edge: edge(pair),
                location: EntryLocation::List {
                    line: entry.entry.line,
                },
            });
        }
    }
    duplicates
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinship_core::RelationKind;

    fn docs(items: &[(&str, &str)]) -> Vec<ContactDocument> {
        items
            .iter()
            .map(|(path, text)| ContactDocument::parse(*path, text))
            .collect()
    }

    #[test]
    fn test_consistent_vault_is_clean() {
        let documents = docs(&[
            ("Ann.md", "---\nUID: ann\nRELATED[spouse]: local-id:bob\n---\n"),
            ("Bob.md", "---\nUID: bob\nRELATED[spouse]: local-id:ann\n---\n"),
        ]);
        assert!(check_documents(&documents, "Related").is_clean());
    }

    #[test]
    fn test_missing_reciprocal_names_both_documents() {
        let documents = docs(&[
            ("Ann.md", "---\nUID: ann\nRELATED[parent]: local-id:bob\n---\n"),
            ("Bob.md", "---\nUID: bob\n---\n"),
        ]);
        let report = check_documents(&documents, "Related");
        assert_eq!(
            report.missing_reciprocals,
            vec![MissingReciprocal {
                edge: RelationshipEdge::new(
                    ContactId::new("ann"),
                    ContactId::new("bob"),
                    RelationKind::Parent
                ),
                document: "Ann.md".to_string(),
                peer_document: "Bob.md".to_string(),
            }]
        );
    }

    #[test]
    fn test_placeholder_targets_need_no_reciprocal() {
        let documents = docs(&[("Ann.md", "## Related\n- friend [[Nobody]]\n")]);
        let report = check_documents(&documents, "Related");
        assert!(report.is_clean(), "{report:?}");
    }

    #[test]
    fn test_duplicates_keep_first_copy() {
        let documents = docs(&[(
            "Ann.md",
            "---\nRELATED[friend]: name:Kim\nRELATED[1:friend]: name:kim\n---\n## Related\n- friend [[Kim]]\n- buddy [[Kim]]\n- friend [[Kim]]\n",
        )]);
        let report = check_documents(&documents, "Related");
        let locations: Vec<_> = report.duplicate_edges.iter().map(|d| d.location.clone()).collect();
        assert_eq!(
            locations,
            vec![
                EntryLocation::Block {
                    key: "RELATED[1:friend]".to_string(),
                    value: "name:kim".to_string()
                },
                EntryLocation::List { line: 3 },
            ]
        );
    }

    #[test]
    fn test_stale_placeholder_edge_is_orphaned() {
        let documents = docs(&[("Ann.md", "## Related\n- friend [[Yuri]]\n")]);
        let (mut index, _) = VaultIndex::new().build(&documents);
        // the entry is deleted; the derived edge back from the placeholder stays
        index.index_document(&ContactDocument::parse("Ann.md", "# Ann\n"));

        let report = check_graph(&index);
        assert_eq!(report.orphaned_edges.len(), 1);
        let orphan = &report.orphaned_edges[0];
        assert_eq!(orphan.node, ContactId::new("placeholder:name:yuri"));
        assert_eq!(orphan.edge.target, ContactId::new("Ann"));
    }
}
