use crate::checker;
use crate::pipeline::{Processor, ProcessorContext, ProcessorDescriptor, QueueItem, RunTiming};

/// Reports graph-wide consistency findings plus duplicates in this document
///
/// Read-only; `kinship fix` is what acts on the findings.
pub struct ConsistencyProcessor;

impl Processor for ConsistencyProcessor {
    fn descriptor(&self) -> ProcessorDescriptor {
        ProcessorDescriptor {
            name: "Consistency",
            timing: RunTiming::Manual,
            setting_key: "consistency_processor",
            default_enabled: false,
        }
    }

    fn process(&self, ctx: &mut ProcessorContext<'_>) -> Option<QueueItem> {
        let mut report = checker::check_graph(ctx.index);
        report
            .duplicate_edges
            .extend(checker::duplicates_in(ctx.index, ctx.document));
        if report.is_clean() {
            return None;
        }

        let message = format!(
            "{} missing reciprocal(s), {} duplicate(s), {} orphaned edge(s)",
            report.missing_reciprocals.len(),
            report.duplicate_edges.len(),
            report.orphaned_edges.len()
        );
        Some(ctx.item(&self.descriptor(), message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::testing;

    #[test]
    fn test_reports_without_changing_the_document() {
        let (mut index, mut documents) = testing::index(&[
            (
                "Ann.md",
                "---\nUID: ann\nRELATED[parent]: local-id:bob\nRELATED[1:parent]: local-id:bob\n---\n",
            ),
            ("Bob.md", "---\nUID: bob\nFN: Bob\n---\n"),
        ]);
        let mut ann = documents.remove(0);
        let before = ann.to_text();

        let (item, _) = testing::run(&ConsistencyProcessor, &mut index, &mut ann);
        let item = item.unwrap();
        assert_eq!(item.message, "1 missing reciprocal(s), 1 duplicate(s), 0 orphaned edge(s)");
        assert_eq!(ann.to_text(), before);
    }

    #[test]
    fn test_clean_vault_reports_nothing() {
        let (mut index, mut documents) = testing::index(&[
            ("Ann.md", "---\nUID: ann\nRELATED[friend]: local-id:bob\n---\n"),
            ("Bob.md", "---\nUID: bob\nRELATED[friend]: local-id:ann\n---\n"),
        ]);
        let mut ann = documents.remove(0);
        let (item, _) = testing::run(&ConsistencyProcessor, &mut index, &mut ann);
        assert!(item.is_none());
    }
}
