//! Sync engine: additive reconciliation of the structured block, the text
//! list and the relationship graph for one document, plus fan-out to peers
//!
//! A pass only ever appends. An entry present in one representation and
//! absent from the other is copied across; nothing is removed because the
//! other side lacks it. Removal is the checker's business.

use crate::checker::{self, CheckReport, EntryLocation};
use crate::error::{Result, SyncError};
use crate::index::{DeclaredEdge, VaultIndex};
use chrono::{DateTime, Utc};
use kinship_core::related_block;
use kinship_core::related_list::{self, ListLine};
use kinship_core::{
    BlockEntry, ContactDocument, ContactNode, RelationshipReference, Warning, WarningKind,
};
use kinship_store::ContactStore;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

/// Which directions a pass copies entries in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncScope {
    /// Text list entries missing from the block are added to the block
    pub list_to_block: bool,
    /// Block entries missing from the list are added to the list
    pub block_to_list: bool,
    /// Entries implied by peers' declarations are added to both
    pub reciprocals: bool,
}

impl SyncScope {
    pub const FULL: Self = Self {
        list_to_block: true,
        block_to_list: true,
        reciprocals: true,
    };
    pub const LIST_TO_BLOCK: Self = Self {
        list_to_block: true,
        block_to_list: false,
        reciprocals: false,
    };
    pub const BLOCK_TO_LIST: Self = Self {
        list_to_block: false,
        block_to_list: true,
        reciprocals: false,
    };
    pub const RECIPROCALS: Self = Self {
        list_to_block: false,
        block_to_list: false,
        reciprocals: true,
    };
}

impl Default for SyncScope {
    fn default() -> Self {
        Self::FULL
    }
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub scope: SyncScope,
    /// Write `stable-id:` references when the target's id allows it
    pub prefer_stable_id: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            scope: SyncScope::FULL,
            prefer_stable_id: true,
        }
    }
}

impl SyncOptions {
    pub fn with_scope(mut self, scope: SyncScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_prefer_stable_id(mut self, prefer: bool) -> Self {
        self.prefer_stable_id = prefer;
        self
    }
}

/// What one reconciliation pass did to a document
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub block_added: Vec<BlockEntry>,
    pub list_added: Vec<ListLine>,
    /// Peer documents that still lack a reciprocal entry
    pub peers: Vec<String>,
    pub warnings: Vec<Warning>,
}

impl Reconciliation {
    pub fn changed(&self) -> bool {
        !self.block_added.is_empty() || !self.list_added.is_empty()
    }
}

/// Reconcile one document against itself and the index
///
/// Mutates the document in memory only; the caller decides whether to
/// persist it. The revision marker is not touched here.
pub fn reconcile(
    index: &mut VaultIndex,
    document: &mut ContactDocument,
    options: &SyncOptions,
) -> Reconciliation {
    index.register(document);
    let resolved = index.resolve_document(document);
    index.insert_placeholders(&resolved);
    let id = resolved.id.clone();
    let scope = options.scope;

    let block_edges = resolved.block_edges();
    let list_edges = resolved.list_edges();
    let implied = if scope.reciprocals {
        index.implied_by_peers(&id)
    } else {
        BTreeSet::new()
    };

    let mut want_block: BTreeSet<DeclaredEdge> = implied.clone();
    if scope.list_to_block {
        want_block.extend(list_edges.iter().cloned());
    }
    let mut want_list: BTreeSet<DeclaredEdge> = implied;
    if scope.block_to_list {
        want_list.extend(block_edges.iter().cloned());
    }

    let mut result = Reconciliation {
        warnings: resolved.warnings.clone(),
        ..Default::default()
    };

    let block_missing: Vec<&DeclaredEdge> = want_block.difference(&block_edges).collect();
    if !block_missing.is_empty() {
        let additions: Vec<_> = block_missing
            .iter()
            .filter_map(|(kind, target)| {
                let node = index.node(target)?;
                Some((*kind, RelationshipReference::render(node, options.prefer_stable_id)))
            })
            .collect();
        result.block_added = related_block::assign_slots(&resolved.block_entries(), additions);
        related_block::append_to_document(document, &result.block_added);
    }

    let list_missing: Vec<&DeclaredEdge> = want_list.difference(&list_edges).collect();
    for (kind, target) in list_missing {
        let Some(node) = index.node(target) else {
            continue;
        };
        match index.list_line(*kind, kind.render(node.gender), node) {
            Some(line) => result.list_added.push(line),
            None => result.warnings.push(
                Warning::new(
                    WarningKind::Unrepresentable,
                    format!("no list link reads back as '{}'", node.id),
                )
                .in_document(document.path.clone()),
            ),
        }
    }
    if !result.list_added.is_empty() {
        let body = related_list::append(document.body(), index.heading(), &result.list_added);
        document.set_body(body);
    }

    let mut declared = resolved.declared();
    declared.extend(want_block);
    index.set_declared(&id, declared);
    index.graph_mut().derive_reciprocals();
    result.peers = index.pending_peers(&id);

    if result.changed() {
        tracing::debug!(
            "{}: +{} block, +{} list entries",
            document.path,
            result.block_added.len(),
            result.list_added.len()
        );
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Reports
// ─────────────────────────────────────────────────────────────────────────────

/// Aggregate outcome of one or more sync passes
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Documents visited, in order
    pub synced: Vec<String>,
    /// Documents written back
    pub written: Vec<String>,
    pub block_added: usize,
    pub list_added: usize,
    /// Peers still lacking reciprocals (not yet visited)
    pub peers: Vec<String>,
    pub warnings: Vec<Warning>,
}

impl SyncReport {
    pub fn merge(&mut self, other: SyncReport) {
        self.synced.extend(other.synced);
        for path in other.written {
            if !self.written.contains(&path) {
                self.written.push(path);
            }
        }
        self.block_added += other.block_added;
        self.list_added += other.list_added;
        self.peers = other.peers;
        self.warnings.extend(other.warnings);
    }

    pub fn changed(&self) -> bool {
        !self.written.is_empty()
    }
}

/// Outcome of applying a check report
#[derive(Debug, Clone, Default, Serialize)]
pub struct FixReport {
    /// Missing reciprocals that their peer now declares
    pub reciprocals_added: usize,
    pub duplicates_removed: usize,
    pub orphans_dropped: usize,
    pub sync: SyncReport,
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

/// Sync engine bound to a document store
///
/// Not thread-safe on purpose: callers serialize access (see
/// [`crate::service::SyncService`]).
pub struct SyncEngine {
    store: Arc<dyn ContactStore>,
    index: VaultIndex,
    options: SyncOptions,
}

impl SyncEngine {
    /// Load every document from the store and build the index
    pub async fn open(
        store: Arc<dyn ContactStore>,
        heading: &str,
        options: SyncOptions,
    ) -> Result<Self> {
        let documents = store.load_all().await?;
        let (index, warnings) = VaultIndex::new().with_heading(heading).build(&documents);
        for warning in &warnings {
            tracing::debug!("{}", warning);
        }
        Ok(Self {
            store,
            index,
            options,
        })
    }

    pub fn index(&self) -> &VaultIndex {
        &self.index
    }

    pub fn index_mut(&mut self) -> &mut VaultIndex {
        &mut self.index
    }

    pub fn store(&self) -> &Arc<dyn ContactStore> {
        &self.store
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub(crate) async fn load(&self, path: &str) -> Result<ContactDocument> {
        self.store
            .load_document(path)
            .await?
            .ok_or_else(|| SyncError::DocumentNotFound(path.to_string()))
    }

    /// Persist a changed document with a fresh revision marker
    pub async fn commit(&mut self, document: &mut ContactDocument, now: DateTime<Utc>) -> Result<()> {
        document.touch(now);
        self.store.save_document(document).await?;
        self.index.register(document);
        Ok(())
    }

    /// One pass over one document; peers are reported, not visited
    pub async fn sync_document(&mut self, path: &str) -> Result<SyncReport> {
        let mut document = self.load(path).await?;
        let pass = reconcile(&mut self.index, &mut document, &self.options);

        let mut report = SyncReport {
            synced: vec![path.to_string()],
            block_added: pass.block_added.len(),
            list_added: pass.list_added.len(),
            peers: pass.peers.clone(),
            warnings: pass.warnings.clone(),
            ..Default::default()
        };
        if pass.changed() {
            self.commit(&mut document, Utc::now()).await?;
            report.written.push(path.to_string());
        }
        Ok(report)
    }

    /// Sync a document, then every peer that still lacks a reciprocal
    ///
    /// Terminates because each visit only adds entries and a peer that
    /// already carries its reciprocal is never queued again.
    pub async fn sync_with_fanout(&mut self, path: &str) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let mut queue = VecDeque::from([path.to_string()]);
        while let Some(next) = queue.pop_front() {
            let pass = self.sync_document(&next).await?;
            for peer in &pass.peers {
                if !queue.contains(peer) {
                    queue.push_back(peer.clone());
                }
            }
            report.merge(pass);
        }
        report.peers.clear();
        Ok(report)
    }

    /// Sync every document in the store
    pub async fn sync_all(&mut self) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        for path in self.store.list_documents().await? {
            report.merge(self.sync_with_fanout(&path).await?);
        }
        tracing::info!(
            "Synced {} documents, wrote {}",
            report.synced.len(),
            report.written.len()
        );
        Ok(report)
    }

    /// Re-read a document after an external change; a vanished document
    /// drops its contact from the index
    pub async fn reload_document(&mut self, path: &str) -> Result<Option<ContactDocument>> {
        match self.store.load_document(path).await? {
            Some(document) => {
                self.index.index_document(&document);
                self.index.graph_mut().derive_reciprocals();
                Ok(Some(document))
            }
            None => {
                if let Some(node) = self.index.unregister_path(path) {
                    tracing::info!("Forgot contact {} ({} removed)", node.id, path);
                }
                Ok(None)
            }
        }
    }

    /// Explicit contact deletion: the document and its node go away
    pub async fn delete_contact(&mut self, path: &str) -> Result<Option<ContactNode>> {
        self.store.delete_document(path).await?;
        Ok(self.index.unregister_path(path))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Consistency
    // ─────────────────────────────────────────────────────────────────────────

    /// Re-index every document and run the consistency checker
    pub async fn check(&mut self) -> Result<CheckReport> {
        let documents = self.store.load_all().await?;
        for document in &documents {
            self.index.register(document);
        }
        for document in &documents {
            self.index.index_document(document);
        }
        self.index.graph_mut().derive_reciprocals();
        let report = checker::check(&self.index, &documents);
        tracing::info!(
            "Check: {} missing reciprocals, {} duplicates, {} orphans",
            report.missing_reciprocals.len(),
            report.duplicate_edges.len(),
            report.orphaned_edges.len()
        );
        Ok(report)
    }

    /// Apply the corrective actions for a check report
    ///
    /// Duplicates lose every copy but the first, orphans leave the graph,
    /// and missing reciprocals are added to the graph and written into the
    /// peer documents through a normal sync pass.
    pub async fn fix(&mut self, report: &CheckReport) -> Result<FixReport> {
        let mut fixed = FixReport::default();
        let now = Utc::now();

        let mut by_document: BTreeMap<&str, Vec<&EntryLocation>> = BTreeMap::new();
        for duplicate in &report.duplicate_edges {
            by_document
                .entry(duplicate.document.as_str())
                .or_default()
                .push(&duplicate.location);
        }
        for (path, locations) in by_document {
            let mut document = self.load(path).await?;
            let mut lines = Vec::new();
            for location in locations {
                match location {
                    EntryLocation::Block { key, value } => {
                        if document.front_mut().remove_field(key, value) {
                            fixed.duplicates_removed += 1;
                        }
                    }
                    EntryLocation::List { line } => lines.push(*line),
                }
            }
            if !lines.is_empty() {
                fixed.duplicates_removed += lines.len();
                let body = related_list::remove_lines(document.body(), &lines);
                document.set_body(body);
            }
            self.commit(&mut document, now).await?;
            self.index.index_document(&document);
            fixed.sync.written.push(path.to_string());
        }

        for orphan in &report.orphaned_edges {
            let edge = &orphan.edge;
            let graph = self.index.graph_mut();
            if graph.remove_edge(&edge.source, &edge.target, edge.kind) {
                fixed.orphans_dropped += 1;
            }
            if graph.degree(&orphan.node) == 0
                && graph.node(&orphan.node).is_some_and(ContactNode::is_placeholder)
            {
                graph.remove_node(&orphan.node);
            }
        }

        let mut peers: Vec<String> = Vec::new();
        for missing in &report.missing_reciprocals {
            let reciprocal = missing.edge.reciprocal();
            if let Err(e) = self
                .index
                .graph_mut()
                .add_edge(reciprocal.source, reciprocal.target, reciprocal.kind)
            {
                tracing::debug!("Reciprocal of {} not added to graph: {}", missing.edge, e);
            }
            if !peers.contains(&missing.peer_document) {
                peers.push(missing.peer_document.clone());
            }
        }
        for peer in peers {
            fixed.sync.merge(self.sync_with_fanout(&peer).await?);
        }
        fixed.reciprocals_added = report
            .missing_reciprocals
            .iter()
            .filter(|m| self.index.declares(&m.edge.target, m.edge.kind.reciprocal(), &m.edge.source))
            .count();
        Ok(fixed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinship_core::{ContactId, RelationKind, RelationshipEdge};
    use kinship_store::MemoryStore;

    async fn engine(documents: &[(&str, &str)]) -> (Arc<MemoryStore>, SyncEngine) {
        let store = Arc::new(MemoryStore::with_documents(documents.iter().copied()));
        let engine = SyncEngine::open(store.clone(), "Related", SyncOptions::default())
            .await
            .unwrap();
        (store, engine)
    }

    fn reconcile_text(index: &mut VaultIndex, path: &str, text: &str) -> (ContactDocument, Reconciliation) {
        let mut document = ContactDocument::parse(path, text);
        let pass = reconcile(index, &mut document, &SyncOptions::default());
        (document, pass)
    }

    #[test]
    fn test_list_entry_is_copied_to_block() {
        let mut index = VaultIndex::new();
        let (document, pass) = reconcile_text(&mut index, "X.md", "---\nFN: X\n---\n## Related\n\n- friend [[Y]]\n");
        assert_eq!(pass.block_added.len(), 1);
        assert_eq!(document.field("RELATED[friend]"), Some("name:Y"));
        assert!(document.body().contains("- friend [[Y]]"));
    }

    #[test]
    fn test_block_entry_is_copied_to_list_with_display_name() {
        let (mut index, _) = VaultIndex::new().build(&[ContactDocument::parse(
            "Zed.md",
            "---\nUID: abc\nFN: Zoe Zed\nGENDER: F\n---\n",
        )]);
        let text = "---\nFN: X\nRELATED[colleague]: stable-id:abc\n---\n# X\n";
        let (document, pass) = reconcile_text(&mut index, "X.md", text);

        assert!(pass.block_added.is_empty());
        assert_eq!(
            document.to_text(),
            "---\nFN: X\nRELATED[colleague]: stable-id:abc\n---\n# X\n\n## Related\n\n- colleague [[Zoe Zed]]\n"
        );
    }

    #[test]
    fn test_disjoint_entries_merge_into_both() {
        let (mut index, _) = VaultIndex::new().build(&[
            ContactDocument::parse("Al.md", "---\nUID: al\nFN: Al\nGENDER: M\n---\n"),
            ContactDocument::parse("Bea.md", "---\nUID: bea\nFN: Bea\n---\n"),
        ]);
        let text = "---\nFN: X\nRELATED[parent]: local-id:al\n---\n## Related\n- sister [[Bea]]\n";
        let (document, pass) = reconcile_text(&mut index, "X.md", text);
        assert!(pass.changed());

        let again = index.resolve_document(&document);
        let expected: BTreeSet<DeclaredEdge> = [
            (RelationKind::Parent, ContactId::new("al")),
            (RelationKind::Sibling, ContactId::new("bea")),
        ]
        .into_iter()
        .collect();
        assert_eq!(again.block_edges(), expected);
        assert_eq!(again.list_edges(), expected);
        assert!(document.body().contains("- sister [[Bea]]\n- father [[Al]]\n"));
        assert!(document.to_text().contains("RELATED[parent]: local-id:al\nRELATED[sibling]: local-id:bea\n"));
    }

    #[test]
    fn test_unresolved_id_is_not_written_to_list() {
        let mut index = VaultIndex::new();
        let (document, pass) =
            reconcile_text(&mut index, "X.md", "---\nRELATED[friend]: stable-id:nobody\n---\n");
        assert!(pass.list_added.is_empty());
        assert!(pass.warnings.iter().any(|w| w.kind == WarningKind::Unrepresentable));
        assert!(!document.body().contains("nobody"));
    }

    #[tokio::test]
    async fn test_second_sync_writes_nothing() {
        let (store, mut engine) = engine(&[
            ("X.md", "---\nFN: X\n---\n## Related\n- friend [[Y]]\n"),
            ("Y.md", "---\nFN: Y\nRELATED[colleague]: local-id:X\n---\n"),
        ])
        .await;

        let first = engine.sync_all().await.unwrap();
        assert!(first.changed());
        let writes = store.write_count();

        let second = engine.sync_all().await.unwrap();
        assert!(second.written.is_empty(), "{:?}", second.written);
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn test_shared_name_links_by_path_and_settles() {
        let (store, mut engine) = engine(&[
            ("a/Sam.md", "---\nUID: sam-a\nFN: Sam\n---\n"),
            ("b/Sam.md", "---\nUID: sam-b\nFN: Sam\n---\n"),
            ("X.md", "---\nUID: x\nFN: X\nRELATED[friend]: local-id:sam-b\n---\n"),
        ])
        .await;
        engine.sync_all().await.unwrap();
        let x = store.get("X.md").unwrap();
        assert!(x.contains("- friend [[b/Sam.md|Sam]]\n"), "{x}");
        assert!(!x.contains("sam-a"), "{x}");

        for _ in 0..2 {
            let again = engine.sync_document("X.md").await.unwrap();
            assert!(again.written.is_empty(), "{:?}", again.written);
        }
        assert_eq!(store.get("X.md").unwrap(), x);
        let x_id = ContactId::new("x");
        assert!(engine.index().declares(&x_id, RelationKind::Friend, &ContactId::new("sam-b")));
        assert!(!engine.index().declares(&x_id, RelationKind::Friend, &ContactId::new("sam-a")));
        assert!(engine.sync_all().await.unwrap().written.is_empty());
    }

    #[tokio::test]
    async fn test_names_with_link_syntax_settle() {
        let names = ["AC/DC", "C#", "Simon | Garfunkel", "Rock]Roll"];
        let mut documents = Vec::new();
        for (i, name) in names.iter().enumerate() {
            documents.push((format!("Band{i}.md"), format!("---\nUID: band{i}\nFN: {name}\n---\n")));
            documents.push((format!("X{i}.md"), format!("---\nUID: x{i}\nFN: X{i}\nRELATED[friend]: local-id:band{i}\n---\n")));
        }
        let borrowed: Vec<(&str, &str)> = documents.iter().map(|(p, t)| (p.as_str(), t.as_str())).collect();
        let (store, mut engine) = engine(&borrowed).await;

        assert!(engine.sync_all().await.unwrap().changed());
        for (i, name) in names.iter().enumerate() {
            let x = store.get(&format!("X{i}.md")).unwrap();
            assert!(x.contains(&format!("- friend [[Band{i}.md|{name}]]\n")), "{x}");
        }

        let writes = store.write_count();
        for _ in 0..2 {
            let again = engine.sync_all().await.unwrap();
            assert!(again.written.is_empty(), "{:?}", again.written);
            assert!(
                !again.warnings.iter().any(|w| w.kind == WarningKind::MalformedEntry),
                "{:?}",
                again.warnings
            );
        }
        assert_eq!(store.write_count(), writes);
        assert!(engine.index().graph().nodes().all(|node| !node.is_placeholder()));
    }

    #[tokio::test]
    async fn test_fanout_writes_reciprocal_into_peer() {
        let (store, mut engine) = engine(&[
            ("Ann.md", "---\nUID: ann\nFN: Ann\nGENDER: F\nRELATED[child]: local-id:bob\n---\n"),
            ("Bob.md", "---\nUID: bob\nFN: Bob\n---\n# Bob\n"),
        ])
        .await;

        let report = engine.sync_with_fanout("Ann.md").await.unwrap();
        assert_eq!(report.written, vec!["Ann.md", "Bob.md"]);
        let bob = store.get("Bob.md").unwrap();
        assert!(bob.contains("RELATED[parent]: local-id:ann\n"), "{bob}");
        assert!(bob.contains("## Related\n\n- mother [[Ann]]\n"), "{bob}");

        let ann = ContactId::new("ann");
        let bob_id = ContactId::new("bob");
        for edge in engine.index().graph().edges() {
            assert!(engine.index().graph().contains_edge(&edge.reciprocal()), "{edge}");
        }
        assert!(engine
            .index()
            .graph()
            .contains_edge(&RelationshipEdge::new(bob_id, ann, RelationKind::Parent)));
    }

    #[tokio::test]
    async fn test_revision_only_refreshed_on_change() {
        let (store, mut engine) = engine(&[("Solo.md", "---\nFN: Solo\nREV: 20200101T000000Z\n---\n")]).await;
        let report = engine.sync_document("Solo.md").await.unwrap();
        assert!(report.written.is_empty());
        assert!(store.get("Solo.md").unwrap().contains("REV: 20200101T000000Z"));

        store
            .write_document("Solo.md", "---\nFN: Solo\nREV: 20200101T000000Z\n---\n## Related\n- friend [[Kim]]\n")
            .await
            .unwrap();
        engine.sync_document("Solo.md").await.unwrap();
        assert!(!store.get("Solo.md").unwrap().contains("REV: 20200101T000000Z"));
    }

    #[tokio::test]
    async fn test_missing_document_is_an_error() {
        let (_store, mut engine) = engine(&[]).await;
        assert!(matches!(
            engine.sync_document("nope.md").await,
            Err(SyncError::DocumentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_check_and_fix_round_trip() {
        let (store, mut engine) = engine(&[
            (
                "Ann.md",
                "---\nUID: ann\nFN: Ann\nRELATED[friend]: local-id:bob\nRELATED[1:friend]: name:Bob\n---\n",
            ),
            ("Bob.md", "---\nUID: bob\nFN: Bob\n---\n"),
        ])
        .await;

        let report = engine.check().await.unwrap();
        assert_eq!(report.duplicate_edges.len(), 1);
        assert_eq!(report.missing_reciprocals.len(), 1);

        let fixed = engine.fix(&report).await.unwrap();
        assert_eq!(fixed.duplicates_removed, 1);
        assert_eq!(fixed.reciprocals_added, 1);
        assert!(!store.get("Ann.md").unwrap().contains("RELATED[1:friend]"));
        assert!(store.get("Bob.md").unwrap().contains("RELATED[friend]: local-id:ann"));

        assert!(engine.check().await.unwrap().is_clean());
    }

    #[tokio::test]
    async fn test_delete_contact_removes_node() {
        let (store, mut engine) = engine(&[("Ann.md", "---\nUID: ann\n---\n")]).await;
        let removed = engine.delete_contact("Ann.md").await.unwrap();
        assert_eq!(removed.unwrap().id, ContactId::new("ann"));
        assert!(store.get("Ann.md").is_none());
        assert!(engine.index().directory().is_empty());
    }

    #[tokio::test]
    async fn test_vault_on_disk_converges() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("People")).unwrap();
        std::fs::write(
            dir.path().join("People/Ann.md"),
            "---\nUID: ann\nFN: Ann\nGENDER: F\n---\n# Ann\n\n## Related\n\n- son [[Ben]]\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("People/Ben.md"), "---\nUID: ben\nFN: Ben\nGENDER: M\n---\n# Ben\n").unwrap();

        let store = Arc::new(kinship_store::VaultStore::new(dir.path()));
        let mut engine = SyncEngine::open(store, "Related", SyncOptions::default()).await.unwrap();
        engine.sync_all().await.unwrap();

        let ann = std::fs::read_to_string(dir.path().join("People/Ann.md")).unwrap();
        let ben = std::fs::read_to_string(dir.path().join("People/Ben.md")).unwrap();
        assert!(ann.contains("RELATED[child]: local-id:ben\n"), "{ann}");
        assert!(ben.contains("RELATED[parent]: local-id:ann\n"), "{ben}");
        assert!(ben.ends_with("# Ben\n\n## Related\n\n- mother [[Ann]]\n"), "{ben}");

        let second = engine.sync_all().await.unwrap();
        assert!(second.written.is_empty());
    }
}
