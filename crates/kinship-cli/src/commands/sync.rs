//! Sync, check and fix commands

use clap::Args;

use crate::output::{self, OutputFormat};
use crate::{AppContext, Cli};
use kinship_sync::{CheckReport, EntryLocation, FixReport, SyncReport};

#[derive(Args)]
pub struct SyncArgs {
    /// Vault-relative document path; omit to sync every document
    pub document: Option<String>,
}

pub async fn run(args: &SyncArgs, cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    let mut engine = ctx.engine().await?;
    let report = match &args.document {
        Some(document) => engine.sync_with_fanout(document).await?,
        None => engine.sync_all().await?,
    };

    match cli.output() {
        OutputFormat::Json => println!("{}", output::to_json(&report)),
        OutputFormat::Table => {
            if !cli.quiet {
                print!("{}", format_sync(&report));
            }
        }
    }
    Ok(())
}

pub async fn run_check(cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    let mut engine = ctx.engine().await?;
    let report = engine.check().await?;

    match cli.output() {
        OutputFormat::Json => println!("{}", output::to_json(&report)),
        OutputFormat::Table => {
            if report.is_clean() {
                if !cli.quiet {
                    println!("No problems found.");
                }
            } else {
                print!("{}", format_check(&report));
            }
        }
    }
    if !report.is_clean() {
        std::process::exit(1);
    }
    Ok(())
}

pub async fn run_fix(cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    let mut engine = ctx.engine().await?;
    let report = engine.check().await?;
    let fixed = engine.fix(&report).await?;

    match cli.output() {
        OutputFormat::Json => println!("{}", output::to_json(&fixed)),
        OutputFormat::Table => {
            if !cli.quiet {
                print!("{}", format_fix(&fixed));
            }
        }
    }
    Ok(())
}

fn format_sync(report: &SyncReport) -> String {
    let mut out = String::new();
    if !report.written.is_empty() {
        let rows: Vec<Vec<String>> = report.written.iter().map(|path| vec![path.clone()]).collect();
        out.push_str(&output::table(&["written"], &rows));
    }
    out.push_str(&format!(
        "Synced {} document(s), wrote {} (+{} block, +{} list entries)\n",
        report.synced.len(),
        report.written.len(),
        report.block_added,
        report.list_added
    ));
    out.push_str(&output::warnings(&report.warnings));
    out
}

pub fn format_check(report: &CheckReport) -> String {
    let mut rows = Vec::new();
    for missing in &report.missing_reciprocals {
        rows.push(vec![
            "missing reciprocal".to_string(),
            missing.document.clone(),
            format!(
                "{} has no {} entry for {}",
                missing.peer_document,
                missing.edge.kind.reciprocal(),
                missing.edge.source
            ),
        ]);
    }
    for duplicate in &report.duplicate_edges {
        let location = match &duplicate.location {
            EntryLocation::Block { key, value } => format!("{key}: {value}"),
            EntryLocation::List { line } => format!("list line {}", line + 1),
        };
        rows.push(vec!["duplicate".to_string(), duplicate.document.clone(), location]);
    }
    for orphan in &report.orphaned_edges {
        rows.push(vec!["orphaned edge".to_string(), "-".to_string(), orphan.edge.to_string()]);
    }
    let mut out = output::table(&["problem", "document", "detail"], &rows);
    out.push_str(&format!("{} problem(s)\n", report.total()));
    out
}

fn format_fix(fixed: &FixReport) -> String {
    let mut out = format!(
        "Added {} reciprocal(s), removed {} duplicate(s), dropped {} orphaned edge(s)\n",
        fixed.reciprocals_added, fixed.duplicates_removed, fixed.orphans_dropped
    );
    for path in &fixed.sync.written {
        out.push_str(&format!("  wrote {path}\n"));
    }
    out.push_str(&output::warnings(&fixed.sync.warnings));
    out
}
