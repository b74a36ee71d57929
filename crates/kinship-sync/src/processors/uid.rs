use crate::pipeline::{Processor, ProcessorContext, ProcessorDescriptor, QueueItem, RunTiming};
use kinship_core::document::UID_KEY;
use kinship_core::ContactId;

/// Mints a UID for documents that have none
pub struct UidProcessor;

impl Processor for UidProcessor {
    fn descriptor(&self) -> ProcessorDescriptor {
        ProcessorDescriptor {
            name: "UID",
            timing: RunTiming::Immediate,
            setting_key: "uid_processor",
            default_enabled: true,
        }
    }

    fn process(&self, ctx: &mut ProcessorContext<'_>) -> Option<QueueItem> {
        if ctx.document.uid().is_some() {
            return None;
        }
        let id = ContactId::generate();
        ctx.document.front_mut().set(UID_KEY, id.as_str());
        // folds the stem-keyed node and its edges onto the new id
        ctx.index.register(ctx.document);
        Some(ctx.item(&self.descriptor(), format!("assigned UID {id}")))
    }
}
