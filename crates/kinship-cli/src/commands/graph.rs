//! Graph command: print relationship edges

use clap::Args;
use serde::Serialize;

use kinship_core::vcard::{self, CardRelation};
use kinship_core::{ContactId, RelationshipEdge, RelationshipReference};
use kinship_sync::VaultIndex;

use crate::output::{self, OutputFormat};
use crate::{AppContext, Cli};

#[derive(Args)]
pub struct GraphArgs {
    /// Only edges out of this document's contact
    pub document: Option<String>,

    /// Print the document's declared relationships as vCard RELATED lines
    #[arg(long, requires = "document")]
    pub vcard: bool,
}

#[derive(Debug, Serialize)]
struct EdgeRow {
    source: ContactId,
    source_name: String,
    kind: String,
    target: ContactId,
    target_name: String,
    /// Written in the source document rather than derived from the target's
    declared: bool,
}

pub async fn run(args: &GraphArgs, cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    let engine = ctx.engine().await?;
    let index = engine.index();

    let source = match &args.document {
        Some(document) => match index.contact_for_path(document) {
            Some(node) => Some(node.id.clone()),
            None => anyhow::bail!("No contact for document {}", document),
        },
        None => None,
    };

    if args.vcard {
        if let Some(id) = &source {
            print!("{}", vcard::render(&card_relations(index, id, ctx.config.prefer_stable_id)));
        }
        return Ok(());
    }

    let graph = index.graph();
    let edges: Vec<&RelationshipEdge> = match &source {
        Some(id) => graph.edges_from(id).collect(),
        None => graph.edges().iter().collect(),
    };
    let mut rows: Vec<EdgeRow> = edges.into_iter().map(|edge| row(index, edge)).collect();
    rows.sort_by(|a, b| {
        a.source_name
            .cmp(&b.source_name)
            .then_with(|| a.kind.cmp(&b.kind))
            .then_with(|| a.target_name.cmp(&b.target_name))
    });

    match cli.output() {
        OutputFormat::Json => println!("{}", output::to_json(&rows)),
        OutputFormat::Table => {
            let cells: Vec<Vec<String>> = rows
                .iter()
                .map(|r| {
                    vec![
                        r.source_name.clone(),
                        r.kind.clone(),
                        r.target_name.clone(),
                        if r.declared { "declared" } else { "derived" }.to_string(),
                    ]
                })
                .collect();
            print!("{}", output::table(&["contact", "lists as", "contact", "origin"], &cells));
        }
    }
    Ok(())
}

fn name(index: &VaultIndex, id: &ContactId) -> String {
    index
        .node(id)
        .map(|node| node.display_name.clone())
        .unwrap_or_else(|| id.to_string())
}

fn row(index: &VaultIndex, edge: &RelationshipEdge) -> EdgeRow {
    let gender = index.node(&edge.target).map(|node| node.gender).unwrap_or_default();
    EdgeRow {
        source: edge.source.clone(),
        source_name: name(index, &edge.source),
        kind: edge.kind.render(gender).to_string(),
        target: edge.target.clone(),
        target_name: name(index, &edge.target),
        declared: index.declares(&edge.source, edge.kind, &edge.target),
    }
}

fn card_relations(index: &VaultIndex, id: &ContactId, prefer_stable_id: bool) -> Vec<CardRelation> {
    let Some(declared) = index.declared(id) else {
        return Vec::new();
    };
    declared
        .iter()
        .filter_map(|(kind, target)| {
            let node = index.node(target)?;
            Some(CardRelation::new(*kind, RelationshipReference::render(node, prefer_stable_id)))
        })
        .collect()
}
