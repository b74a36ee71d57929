//! Vault index: contact directory, relationship graph and the edges each
//! document declares
//!
//! The graph is a valid picture of *some* prior document state. A document's
//! outgoing edges are replaced wholesale whenever it is re-indexed, so edges
//! a user removed disappear from the graph on the next pass over that
//! document.

use kinship_core::related_block::{self, ParsedBlock};
use kinship_core::related_list::{self, ListLine, ParsedList, DEFAULT_HEADING};
use kinship_core::{
    BlockEntry, Contact, ContactDirectory, ContactDocument, ContactId, ContactNode, Gender,
    ListEntry, Namespace, RelationKind, RelationshipEdge, RelationshipGraph,
    RelationshipReference, Warning, WarningKind,
};
use std::collections::{BTreeSet, HashMap};

/// A `(kind, target)` pair declared by a document
pub type DeclaredEdge = (RelationKind, ContactId);

/// A structured-block entry with its raw field and resolved target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBlockEntry {
    pub entry: BlockEntry,
    pub key: String,
    pub value: String,
    pub target: ContactId,
}

/// A text-list entry with its resolved target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedListEntry {
    pub entry: ListEntry,
    pub target: ContactId,
}

/// Both representations of one document, resolved against the index
#[derive(Debug, Clone)]
pub struct ResolvedDocument {
    pub path: String,
    pub id: ContactId,
    pub block: Vec<ResolvedBlockEntry>,
    pub list: Vec<ResolvedListEntry>,
    /// Nodes for references that did not resolve
    pub placeholders: Vec<ContactNode>,
    pub warnings: Vec<Warning>,
}

impl ResolvedDocument {
    pub fn block_edges(&self) -> BTreeSet<DeclaredEdge> {
        self.block
            .iter()
            .map(|e| (e.entry.kind, e.target.clone()))
            .collect()
    }

    pub fn list_edges(&self) -> BTreeSet<DeclaredEdge> {
        self.list
            .iter()
            .map(|e| (e.entry.kind, e.target.clone()))
            .collect()
    }

    /// Union of both representations
    pub fn declared(&self) -> BTreeSet<DeclaredEdge> {
        let mut edges = self.block_edges();
        edges.extend(self.list_edges());
        edges
    }

    pub fn block_entries(&self) -> Vec<BlockEntry> {
        self.block.iter().map(|e| e.entry.clone()).collect()
    }
}

/// In-memory view of a whole vault
#[derive(Debug, Clone)]
pub struct VaultIndex {
    directory: ContactDirectory,
    graph: RelationshipGraph,
    declared: HashMap<ContactId, BTreeSet<DeclaredEdge>>,
    heading: String,
}

impl Default for VaultIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl VaultIndex {
    pub fn new() -> Self {
        Self {
            directory: ContactDirectory::new(),
            graph: RelationshipGraph::new(),
            declared: HashMap::new(),
            heading: DEFAULT_HEADING.to_string(),
        }
    }

    /// Heading of the text-list section
    pub fn with_heading(mut self, heading: impl Into<String>) -> Self {
        self.heading = heading.into();
        self
    }

    pub fn heading(&self) -> &str {
        &self.heading
    }

    /// Index a set of documents and derive reciprocal edges
    ///
    /// All contacts are registered before any entry is resolved, so
    /// references between documents resolve regardless of load order.
    pub fn build(mut self, documents: &[ContactDocument]) -> (Self, Vec<Warning>) {
        for document in documents {
            self.register(document);
        }
        let mut warnings = Vec::new();
        for document in documents {
            warnings.extend(self.index_document(document).warnings);
        }
        let derived = self.graph.derive_reciprocals();
        tracing::info!(
            "Indexed {} documents ({} nodes, {} edges, {} derived)",
            documents.len(),
            self.graph.node_count(),
            self.graph.edge_count(),
            derived.len()
        );
        (self, warnings)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Contacts
    // ─────────────────────────────────────────────────────────────────────────

    /// Register (or refresh) the contact a document describes
    ///
    /// If the document previously had another id (e.g. a UID was just
    /// minted), the old node is folded into the new one. Placeholders that
    /// now resolve to this contact are adopted the same way.
    pub fn register(&mut self, document: &ContactDocument) -> ContactId {
        let node = document.to_node();
        let id = node.id.clone();

        let previous = self
            .directory
            .find_by_document(&document.path)
            .map(|n| n.id.clone())
            .filter(|previous| previous != &id);

        self.directory.insert(node.clone());
        self.graph.upsert_node(node.clone());

        if let Some(previous) = previous {
            tracing::debug!("Contact {} re-keyed to {}", previous, id);
            self.directory.remove(&previous);
            self.fold(&previous, &id);
        }

        let mut adoptable = vec![
            RelationshipReference::name(node.display_name.as_str()),
            RelationshipReference::local_id(id.as_str()),
            RelationshipReference::stable_id(id.as_str()),
        ];
        if let Some(local) = &node.local_id {
            adoptable.push(RelationshipReference::local_id(local.as_str()));
            adoptable.push(RelationshipReference::name(local.as_str()));
        }
        adoptable.push(RelationshipReference::name(document.path.as_str()));
        for reference in adoptable {
            let placeholder = ContactId::placeholder(&reference);
            if self.graph.contains_node(&placeholder) {
                tracing::debug!("Placeholder {} now resolves to {}", placeholder, id);
                self.fold(&placeholder, &id);
            }
        }
        id
    }

    /// Move every edge and declaration from `from` onto `into`
    fn fold(&mut self, from: &ContactId, into: &ContactId) {
        if let Err(e) = self.graph.merge_node(from, into) {
            tracing::warn!("Failed to merge {} into {}: {}", from, into, e);
        }
        if let Some(edges) = self.declared.remove(from) {
            self.declared.entry(into.clone()).or_default().extend(edges);
        }
        for edges in self.declared.values_mut() {
            let stale: Vec<DeclaredEdge> = edges.iter().filter(|(_, t)| t == from).cloned().collect();
            for (kind, _) in stale {
                edges.remove(&(kind, from.clone()));
                edges.insert((kind, into.clone()));
            }
        }
    }

    /// Forget a contact entirely (explicit deletion)
    pub fn unregister(&mut self, id: &ContactId) -> Option<ContactNode> {
        self.declared.remove(id);
        self.graph.remove_node(id);
        self.directory.remove(id)
    }

    /// Forget the contact backed by a document path
    pub fn unregister_path(&mut self, path: &str) -> Option<ContactNode> {
        let id = self.directory.find_by_document(path)?.id.clone();
        self.unregister(&id)
    }

    pub fn directory(&self) -> &ContactDirectory {
        &self.directory
    }

    pub fn graph(&self) -> &RelationshipGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut RelationshipGraph {
        &mut self.graph
    }

    /// Graph node, falling back to the directory for contacts not yet in
    /// the graph
    pub fn node(&self, id: &ContactId) -> Option<&ContactNode> {
        self.graph.node(id).or_else(|| self.directory.get(id))
    }

    pub fn contact_for_path(&self, path: &str) -> Option<&ContactNode> {
        self.directory.find_by_document(path)
    }

    pub fn document_path(&self, id: &ContactId) -> Option<&str> {
        self.node(id).and_then(|n| n.document.as_deref())
    }

    pub fn set_gender(&mut self, id: &ContactId, gender: Gender) {
        if let Some(node) = self.directory.get(id).cloned() {
            self.directory.insert(node.with_gender(gender));
        }
        if let Err(e) = self.graph.set_gender(id, gender) {
            tracing::debug!("Gender not recorded in graph: {}", e);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resolution
    // ─────────────────────────────────────────────────────────────────────────

    /// Resolve a reference without touching the index
    ///
    /// Name-form payloads are tried in order as an exact document path, a
    /// unique display name, a document path without its extension, a shared
    /// display name (first in directory order, reported) and finally a file
    /// stem, since list links name files.
    pub fn resolve(&self, reference: &RelationshipReference) -> (Contact, Option<Warning>) {
        if reference.namespace != Namespace::Name {
            let contact = reference.resolve(&self.directory);
            let warning = (!contact.is_resolved()).then(|| {
                Warning::new(
                    WarningKind::Unresolved,
                    format!("'{}' does not match any known contact", reference),
                )
            });
            return (contact, warning);
        }

        let payload = reference.payload.as_str();
        if let Some(node) = self.directory.find_by_document(payload) {
            return (Contact::Resolved(node.clone()), None);
        }
        let matches = self.directory.find_by_name(payload);
        if let [node] = matches.as_slice() {
            return (Contact::Resolved((*node).clone()), None);
        }
        if let Some(node) = self.directory.find_by_document(&format!("{payload}.md")) {
            return (Contact::Resolved(node.clone()), None);
        }
        if let Some(node) = matches.first() {
            let warning = Warning::new(
                WarningKind::AmbiguousName,
                format!(
                    "name '{}' matches {} contacts; using {}",
                    payload,
                    matches.len(),
                    node.id
                ),
            );
            return (Contact::Resolved((*node).clone()), Some(warning));
        }

        let stem = payload.rsplit('/').next().unwrap_or(payload);
        let stem = stem.strip_suffix(".md").unwrap_or(stem);
        match self
            .directory
            .find_local(payload)
            .or_else(|| self.directory.find_local(stem))
        {
            Some(node) => (Contact::Resolved(node.clone()), None),
            None => (Contact::Placeholder(reference.clone()), None),
        }
    }

    /// The list line that links `node` so that it reads back as `node`
    ///
    /// The bare display name is used when it is link-safe and names nobody
    /// else; otherwise the document path is linked with the display name as
    /// alias. `None` when neither reads back.
    pub fn list_line(&self, kind: RelationKind, term: &str, node: &ContactNode) -> Option<ListLine> {
        let name = node.display_name.trim();
        if related_list::is_bare_link(name)
            && self.directory.find_by_name(name).len() <= 1
            && self.resolves_to(name, &node.id)
        {
            return Some(ListLine::new(kind, term, name));
        }
        let path = node.document.as_deref()?;
        if !related_list::is_link_target(path) || !self.resolves_to(path, &node.id) {
            return None;
        }
        let label = if name.is_empty() { document_stem(path) } else { name };
        Some(ListLine::new(kind, term, label).with_link(path))
    }

    fn resolves_to(&self, link: &str, id: &ContactId) -> bool {
        self.resolve(&RelationshipReference::name(link)).0.id() == *id
    }

    /// Parse both representations of a document and resolve every entry
    ///
    /// Pure: placeholder nodes are returned, not inserted.
    pub fn resolve_document(&self, document: &ContactDocument) -> ResolvedDocument {
        let id = self
            .contact_for_path(&document.path)
            .map(|n| n.id.clone())
            .unwrap_or_else(|| document.contact_id());
        let block: ParsedBlock = related_block::parse_document(document);
        let list: ParsedList = related_list::parse_with_heading(document.body(), &self.heading);

        let mut resolved = ResolvedDocument {
            path: document.path.clone(),
            id,
            block: Vec::new(),
            list: Vec::new(),
            placeholders: Vec::new(),
            warnings: Vec::new(),
        };
        resolved.warnings.extend(block.warnings);
        resolved.warnings.extend(list.warnings);

        for ((entry, key), value) in block.entries.into_iter().zip(block.keys).zip(block.values) {
            if let Some(target) = self.resolve_target(&mut resolved, &entry.reference) {
                resolved.block.push(ResolvedBlockEntry {
                    entry,
                    key,
                    value,
                    target,
                });
            }
        }
        for entry in list.entries {
            if let Some(target) = self.resolve_target(&mut resolved, &entry.reference) {
                resolved.list.push(ResolvedListEntry { entry, target });
            }
        }

        for warning in &mut resolved.warnings {
            warning.document = document.path.clone();
        }
        resolved
    }

    fn resolve_target(
        &self,
        resolved: &mut ResolvedDocument,
        reference: &RelationshipReference,
    ) -> Option<ContactId> {
        let (contact, warning) = self.resolve(reference);
        resolved.warnings.extend(warning);
        let target = contact.id();
        if target == resolved.id {
            resolved.warnings.push(Warning::new(
                WarningKind::MalformedEntry,
                format!("'{}' refers to the document's own contact", reference),
            ));
            return None;
        }
        if let Contact::Placeholder(_) = contact {
            if !resolved.placeholders.iter().any(|n| n.id == target) {
                resolved.placeholders.push(contact.to_node());
            }
        }
        Some(target)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Declared edges
    // ─────────────────────────────────────────────────────────────────────────

    /// Register, resolve and record a document's declared edges
    pub fn index_document(&mut self, document: &ContactDocument) -> ResolvedDocument {
        self.register(document);
        let resolved = self.resolve_document(document);
        self.insert_placeholders(&resolved);
        self.set_declared(&resolved.id, resolved.declared());
        resolved
    }

    pub fn insert_placeholders(&mut self, resolved: &ResolvedDocument) {
        for node in &resolved.placeholders {
            self.graph.add_node(node.clone());
        }
    }

    /// Replace a contact's outgoing edges with `edges`
    ///
    /// Returns the edges that were not in the graph before.
    pub fn set_declared(
        &mut self,
        id: &ContactId,
        edges: BTreeSet<DeclaredEdge>,
    ) -> Vec<RelationshipEdge> {
        let stale: Vec<RelationshipEdge> = self
            .graph
            .edges_from(id)
            .filter(|e| !edges.contains(&(e.kind, e.target.clone())))
            .cloned()
            .collect();
        for edge in &stale {
            self.graph.remove_edge(&edge.source, &edge.target, edge.kind);
        }

        let mut added = Vec::new();
        for (kind, target) in &edges {
            match self.graph.add_edge(id.clone(), target.clone(), *kind) {
                Ok(true) => added.push(RelationshipEdge::new(id.clone(), target.clone(), *kind)),
                Ok(false) => {}
                Err(e) => tracing::debug!("Edge {} -[{}]-> {} skipped: {}", id, kind, target, e),
            }
        }
        self.declared.insert(id.clone(), edges);
        added
    }

    pub fn declared(&self, id: &ContactId) -> Option<&BTreeSet<DeclaredEdge>> {
        self.declared.get(id)
    }

    /// Whether `source`'s document declares `target` as `kind`
    pub fn declares(&self, source: &ContactId, kind: RelationKind, target: &ContactId) -> bool {
        self.declared
            .get(source)
            .is_some_and(|edges| edges.contains(&(kind, target.clone())))
    }

    /// Entries `id` must carry because a document-backed peer declares `id`
    ///
    /// Only declarations count; derived graph edges never do.
    pub fn implied_by_peers(&self, id: &ContactId) -> BTreeSet<DeclaredEdge> {
        self.graph
            .edges_to(id)
            .filter(|e| &e.source != id)
            .filter(|e| self.node(&e.source).is_some_and(ContactNode::is_backed))
            .filter(|e| self.declares(&e.source, e.kind, id))
            .map(|e| (e.kind.reciprocal(), e.source.clone()))
            .collect()
    }

    /// Documents that declare no reciprocal for one of `id`'s declarations
    pub fn pending_peers(&self, id: &ContactId) -> Vec<String> {
        let mut peers: Vec<String> = Vec::new();
        let Some(edges) = self.declared.get(id) else {
            return peers;
        };
        for (kind, target) in edges {
            if target == id || self.declares(target, kind.reciprocal(), id) {
                continue;
            }
            if let Some(path) = self.document_path(target) {
                if !peers.iter().any(|p| p == path) {
                    peers.push(path.to_string());
                }
            }
        }
        peers
    }

    /// Every document-backed contact that declares something, in id order
    pub fn declaring_contacts(&self) -> Vec<ContactId> {
        let mut ids: Vec<ContactId> = self.declared.keys().cloned().collect();
        ids.sort();
        ids
    }
}

fn document_stem(path: &str) -> &str {
    let file = path.rsplit('/').next().unwrap_or(path);
    file.rsplit_once('.').map_or(file, |(stem, _)| stem)
}
