//! Curate command: run the processor pipeline through the sync service

use clap::Args;
use kinship_store::ContactStore;
use kinship_sync::{CurateReport, RunTiming, SyncService};

use crate::output::{self, OutputFormat};
use crate::{AppContext, Cli};

#[derive(Args)]
pub struct CurateArgs {
    /// Vault-relative document path; omit to curate every document
    pub document: Option<String>,

    /// Which processors run: immediate, improvement, manual
    #[arg(short, long, default_value = "improvement")]
    pub trigger: RunTiming,
}

pub async fn run(args: &CurateArgs, cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    let documents = match &args.document {
        Some(document) => vec![document.clone()],
        None => ctx.store.list_documents().await?,
    };

    let service = SyncService::spawn(ctx.engine().await?, ctx.registry.clone(), ctx.settings.clone());
    let handle = service.handle();
    let mut reports = Vec::new();
    for document in &documents {
        reports.push(handle.curate(document.clone(), args.trigger).await?);
    }
    // reciprocal fan-out queued by the runs above
    handle.drain().await?;
    service.shutdown(None).await?;

    match cli.output() {
        OutputFormat::Json => println!("{}", output::to_json(&reports)),
        OutputFormat::Table => {
            if !cli.quiet {
                print!("{}", format_reports(&reports, args.trigger));
            }
        }
    }
    Ok(())
}

fn format_reports(reports: &[CurateReport], trigger: RunTiming) -> String {
    let rows: Vec<Vec<String>> = reports
        .iter()
        .flat_map(|report| report.items.iter())
        .map(|item| vec![item.document.clone(), item.processor.clone(), item.message.clone()])
        .collect();

    let mut out = String::new();
    if !rows.is_empty() {
        out.push_str(&output::table(&["document", "processor", "change"], &rows));
    }
    let written: usize = reports.iter().map(|r| r.written.len()).sum();
    out.push_str(&format!(
        "Curated {} document(s) ({} run), wrote {}\n",
        reports.len(),
        trigger,
        written
    ));
    for report in reports {
        out.push_str(&output::warnings(&report.warnings));
    }
    out
}
