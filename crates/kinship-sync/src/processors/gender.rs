use crate::pipeline::{PeerEdit, Processor, ProcessorContext, ProcessorDescriptor, QueueItem, RunTiming};
use kinship_core::related_list;
use kinship_core::taxonomy::infer_gender;
use kinship_core::Gender;

/// Records the gender implied by list terms on peers that have none
///
/// `- mother [[Cat]]` says Cat is female. The first term wins when several
/// disagree; a peer with any recorded gender (including unknown) is left
/// alone.
pub struct GenderInferenceProcessor;

impl Processor for GenderInferenceProcessor {
    fn descriptor(&self) -> ProcessorDescriptor {
        ProcessorDescriptor {
            name: "Gender inference",
            timing: RunTiming::Improvement,
            setting_key: "gender_inference_processor",
            default_enabled: true,
        }
    }

    fn process(&self, ctx: &mut ProcessorContext<'_>) -> Option<QueueItem> {
        let resolved = ctx.index.resolve_document(ctx.document);
        let mut inferred = Vec::new();

        for entry in &resolved.list {
            let Some(gender) = infer_gender(&entry.entry.term) else {
                continue;
            };
            if entry.target == resolved.id {
                continue;
            }
            let Some(node) = ctx.index.node(&entry.target) else {
                continue;
            };
            if node.gender.is_set() {
                continue;
            }
            let Some(path) = node.document.clone() else {
                continue;
            };
            let name = node.display_name.clone();
            ctx.index.set_gender(&entry.target, gender);
            ctx.edit_peer(PeerEdit::SetGender { path, gender });
            inferred.push(format!("{name} = {}", gender.code()));
        }

        if inferred.is_empty() {
            return None;
        }
        Some(ctx.item(&self.descriptor(), format!("inferred gender: {}", inferred.join(", "))))
    }
}

/// Rewrites gendered list terms that contradict the target's recorded gender
///
/// Neutral terms are never touched, so `- parent [[Al]]` stays as written.
pub struct GenderRenderProcessor;

impl Processor for GenderRenderProcessor {
    fn descriptor(&self) -> ProcessorDescriptor {
        ProcessorDescriptor {
            name: "Gender render",
            timing: RunTiming::Improvement,
            setting_key: "gender_render_processor",
            default_enabled: true,
        }
    }

    fn process(&self, ctx: &mut ProcessorContext<'_>) -> Option<QueueItem> {
        let resolved = ctx.index.resolve_document(ctx.document);
        let lines: Vec<&str> = ctx.document.body().split('\n').collect();
        let mut replacements = Vec::new();

        for entry in &resolved.list {
            let Some(implied) = infer_gender(&entry.entry.term) else {
                continue;
            };
            let Some(node) = ctx.index.node(&entry.target) else {
                continue;
            };
            if !matches!(node.gender, Gender::Male | Gender::Female | Gender::NonBinary) || node.gender == implied {
                continue;
            }
            let term = entry.entry.kind.render(node.gender);
            let Some(line) = lines.get(entry.entry.line) else {
                continue;
            };
            if let Some(rewritten) = replace_term(line, &entry.entry.term, term) {
                replacements.push((entry.entry.line, rewritten));
            }
        }

        if replacements.is_empty() {
            return None;
        }
        let body = related_list::replace_lines(ctx.document.body(), &replacements);
        ctx.document.set_body(body);
        let message = format!("re-rendered {} gendered term(s)", replacements.len());
        Some(ctx.item(&self.descriptor(), message))
    }
}

/// Swap the term in front of the link, keeping the marker and link as written
fn replace_term(line: &str, old: &str, new: &str) -> Option<String> {
    let link = line.find("[[")?;
    let start = line[..link].rfind(old)?;
    Some(format!("{}{}{}", &line[..start], new, &line[start + old.len()..]))
}
