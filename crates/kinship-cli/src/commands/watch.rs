//! Watch command: keep a vault consistent while it is being edited

use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Args;
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use kinship_store::VaultStore;
use kinship_sync::{debounce, SyncService};

use crate::AppContext;

#[derive(Args)]
pub struct WatchArgs {
    /// Quiet window in milliseconds (overrides the config file)
    #[arg(long)]
    pub debounce_ms: Option<u64>,

    /// Seconds between consistency sweeps, 0 to disable (overrides the config file)
    #[arg(long)]
    pub check_interval: Option<u64>,

    /// Skip the full sync on startup
    #[arg(long)]
    pub no_initial_sync: bool,
}

pub async fn run(args: &WatchArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let window = Duration::from_millis(args.debounce_ms.unwrap_or(ctx.config.debounce_ms));
    let sweep_every = args.check_interval.unwrap_or(ctx.config.check_interval_secs);

    let service = SyncService::spawn(ctx.engine().await?, ctx.registry.clone(), ctx.settings.clone());
    let handle = service.handle();
    if !args.no_initial_sync {
        let report = handle.sync_all().await?;
        tracing::info!("Initial sync wrote {} document(s)", report.written.len());
    }

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let last_changed = Arc::new(Mutex::new(None::<String>));
    let watcher = create_fs_watcher(ctx.store.clone(), events_tx, last_changed.clone())?;
    let debouncer = debounce::spawn(window, events_rx, handle.clone());
    println!("Watching {} (Ctrl-C to stop)", ctx.store.root().display());

    let mut sweep = tokio::time::interval(Duration::from_secs(sweep_every.max(1)));
    // the first tick is immediate; the initial sync already covered it
    sweep.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = sweep.tick(), if sweep_every > 0 => {
                match handle.fix().await {
                    Ok(fixed) => tracing::info!(
                        "Sweep: +{} reciprocals, -{} duplicates, -{} orphans",
                        fixed.reciprocals_added,
                        fixed.duplicates_removed,
                        fixed.orphans_dropped
                    ),
                    Err(e) => tracing::warn!("Consistency sweep failed: {}", e),
                }
            }
        }
    }

    tracing::info!("Stopping watcher");
    // dropping the watcher closes the event channel; the debouncer flushes and exits
    drop(watcher);
    debouncer.await?;
    let last_focused = last_changed.lock().ok().and_then(|last| last.clone());
    service.shutdown(last_focused).await?;
    Ok(())
}

fn create_fs_watcher(
    store: Arc<VaultStore>,
    sender: mpsc::UnboundedSender<String>,
    last_changed: Arc<Mutex<Option<String>>>,
) -> anyhow::Result<RecommendedWatcher> {
    let root = store.root().to_path_buf();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!("Watcher error: {e}");
                    return;
                }
            };
            if matches!(event.kind, EventKind::Access(_)) {
                return;
            }
            for path in event.paths {
                if !store.is_document(&path) {
                    continue;
                }
                let Some(relative) = store.relative(&path) else {
                    continue;
                };
                if let Ok(mut last) = last_changed.lock() {
                    *last = Some(relative.clone());
                }
                let _ = sender.send(relative);
            }
        },
        NotifyConfig::default(),
    )
    .map_err(|e| anyhow::anyhow!("watcher init failed: {e}"))?;
    watcher
        .watch(&root, RecursiveMode::Recursive)
        .map_err(|e| anyhow::anyhow!("failed to watch {}: {e}", root.display()))?;
    Ok(watcher)
}
