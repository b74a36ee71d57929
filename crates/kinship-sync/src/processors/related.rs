use crate::engine::SyncScope;
use crate::pipeline::{PeerEdit, Processor, ProcessorContext, ProcessorDescriptor, QueueItem, RunTiming};

fn entries(n: usize) -> String {
    if n == 1 {
        "1 entry".to_string()
    } else {
        format!("{n} entries")
    }
}

/// Copies text-list entries into the structured block
pub struct ListToBlockProcessor;

impl Processor for ListToBlockProcessor {
    fn descriptor(&self) -> ProcessorDescriptor {
        ProcessorDescriptor {
            name: "Related list",
            timing: RunTiming::Immediate,
            setting_key: "related_list_processor",
            default_enabled: true,
        }
    }

    fn process(&self, ctx: &mut ProcessorContext<'_>) -> Option<QueueItem> {
        let pass = ctx.reconcile(SyncScope::LIST_TO_BLOCK);
        if pass.block_added.is_empty() {
            return None;
        }
        let message = format!("added {} to the RELATED block", entries(pass.block_added.len()));
        Some(ctx.item(&self.descriptor(), message))
    }
}

/// Copies structured-block entries into the text list
pub struct BlockToListProcessor;

impl Processor for BlockToListProcessor {
    fn descriptor(&self) -> ProcessorDescriptor {
        ProcessorDescriptor {
            name: "Related front matter",
            timing: RunTiming::Immediate,
            setting_key: "related_front_matter_processor",
            default_enabled: true,
        }
    }

    fn process(&self, ctx: &mut ProcessorContext<'_>) -> Option<QueueItem> {
        let pass = ctx.reconcile(SyncScope::BLOCK_TO_LIST);
        if pass.list_added.is_empty() {
            return None;
        }
        let message = format!("added {} to the related list", entries(pass.list_added.len()));
        Some(ctx.item(&self.descriptor(), message))
    }
}

/// Adds entries implied by peers here and schedules peers missing the
/// reciprocal of what this document declares
pub struct ReciprocalProcessor;

impl Processor for ReciprocalProcessor {
    fn descriptor(&self) -> ProcessorDescriptor {
        ProcessorDescriptor {
            name: "Related reciprocal",
            timing: RunTiming::Improvement,
            setting_key: "related_reciprocal_processor",
            default_enabled: true,
        }
    }

    fn process(&self, ctx: &mut ProcessorContext<'_>) -> Option<QueueItem> {
        let pass = ctx.reconcile(SyncScope::RECIPROCALS);
        for peer in &pass.peers {
            ctx.edit_peer(PeerEdit::Sync { path: peer.clone() });
        }
        if !pass.changed() && pass.peers.is_empty() {
            return None;
        }
        let mut parts = Vec::new();
        if pass.changed() {
            let added = pass.block_added.len().max(pass.list_added.len());
            parts.push(format!("added {} implied by peers", entries(added)));
        }
        if !pass.peers.is_empty() {
            parts.push(format!("{} peer(s) need a reciprocal", pass.peers.len()));
        }
        Some(ctx.item(&self.descriptor(), parts.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::testing;

    #[test]
    fn test_list_to_block_leaves_list_alone() {
        let (mut index, mut documents) = testing::index(&[
            (
                "Ann.md",
                "---\nUID: ann\nRELATED[spouse]: local-id:bob\n---\n## Related\n\n- mother [[Cat]]\n",
            ),
            ("Bob.md", "---\nUID: bob\nFN: Bob\n---\n"),
            ("Cat.md", "---\nUID: cat\nFN: Cat\n---\n"),
        ]);
        let mut ann = documents.remove(0);

        let (item, _) = testing::run(&ListToBlockProcessor, &mut index, &mut ann);
        assert!(item.is_some());
        assert!(ann.to_text().contains("RELATED[parent]: local-id:cat"));
        assert!(!ann.body().contains("[[Bob]]"));

        let (again, _) = testing::run(&ListToBlockProcessor, &mut index, &mut ann);
        assert!(again.is_none());
    }

    #[test]
    fn test_block_to_list_leaves_block_alone() {
        let (mut index, mut documents) = testing::index(&[
            (
                "Ann.md",
                "---\nUID: ann\nRELATED[spouse]: local-id:bob\n---\n## Related\n\n- mother [[Cat]]\n",
            ),
            ("Bob.md", "---\nUID: bob\nFN: Bob\nGENDER: M\n---\n"),
            ("Cat.md", "---\nUID: cat\nFN: Cat\n---\n"),
        ]);
        let mut ann = documents.remove(0);

        let (item, _) = testing::run(&BlockToListProcessor, &mut index, &mut ann);
        assert!(item.is_some());
        assert!(ann.body().contains("- husband [[Bob]]"));
        assert!(!ann.to_text().contains("local-id:cat"));

        let (again, _) = testing::run(&BlockToListProcessor, &mut index, &mut ann);
        assert!(again.is_none());
    }

    #[test]
    fn test_reciprocal_schedules_peer_then_settles() {
        let (mut index, mut documents) = testing::index(&[
            (
                "Ann.md",
                "---\nUID: ann\nRELATED[parent]: local-id:bob\n---\n## Related\n\n- parent [[Bob]]\n",
            ),
            ("Bob.md", "---\nUID: bob\nFN: Bob\n---\n"),
        ]);
        let mut bob = documents.pop().unwrap();
        let mut ann = documents.pop().unwrap();

        let (item, edits) = testing::run(&ReciprocalProcessor, &mut index, &mut ann);
        assert!(item.is_some());
        assert_eq!(edits, vec![PeerEdit::Sync { path: "Bob.md".to_string() }]);

        // the peer's own pass picks up the child entry
        let (peer_item, _) = testing::run(&ReciprocalProcessor, &mut index, &mut bob);
        assert!(peer_item.is_some());
        assert!(bob.to_text().contains("RELATED[child]: local-id:ann"));

        let (settled, edits) = testing::run(&ReciprocalProcessor, &mut index, &mut ann);
        assert!(settled.is_none());
        assert!(edits.is_empty());
    }
}
