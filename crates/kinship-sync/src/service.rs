//! Serialized sync service
//!
//! One task owns the [`SyncEngine`]; every mutating request goes through an
//! unbounded channel and is served strictly in arrival order. Fan-out peers
//! are pushed onto the back of the same queue, so the engine is never
//! re-entered while a pass is in flight.

use crate::checker::CheckReport;
use crate::engine::{FixReport, SyncEngine, SyncReport};
use crate::error::{Result, SyncError};
use crate::pipeline::{CurateReport, ProcessorRegistry, RunTiming, Settings};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

type Reply<T> = oneshot::Sender<Result<T>>;

enum Job {
    /// One pass over one document; peers are queued behind
    Sync {
        path: String,
        reply: Option<Reply<SyncReport>>,
    },
    /// A document changed (or vanished) outside the service
    Changed { path: String },
    SyncAll { reply: Reply<SyncReport> },
    Curate {
        path: String,
        trigger: RunTiming,
        reply: Reply<CurateReport>,
    },
    Check { reply: Reply<CheckReport> },
    /// Check, then apply the fixes
    Fix { reply: Reply<FixReport> },
    Shutdown {
        last_focused: Option<String>,
        reply: oneshot::Sender<()>,
    },
}

impl Job {
    fn name(&self) -> &'static str {
        match self {
            Self::Sync { .. } => "sync",
            Self::Changed { .. } => "changed",
            Self::SyncAll { .. } => "sync-all",
            Self::Curate { .. } => "curate",
            Self::Check { .. } => "check",
            Self::Fix { .. } => "fix",
            Self::Shutdown { .. } => "shutdown",
        }
    }
}

/// Cloneable client for a running [`SyncService`]
#[derive(Clone)]
pub struct SyncHandle {
    jobs: mpsc::UnboundedSender<Job>,
    pending: Arc<watch::Sender<usize>>,
}

impl SyncHandle {
    fn enqueue(&self, job: Job) -> Result<()> {
        self.pending.send_modify(|n| *n += 1);
        self.jobs.send(job).map_err(|_| {
            self.pending.send_modify(|n| *n = n.saturating_sub(1));
            SyncError::ServiceStopped
        })
    }

    async fn request<T>(&self, job: impl FnOnce(Reply<T>) -> Job) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.enqueue(job(tx))?;
        rx.await.map_err(|_| SyncError::ServiceStopped)?
    }

    /// Sync one document; its peers are synced afterwards, in queue order
    pub async fn sync(&self, path: impl Into<String>) -> Result<SyncReport> {
        let path = path.into();
        self.request(|reply| Job::Sync {
            path,
            reply: Some(reply),
        })
        .await
    }

    /// Queue a sync without waiting for it
    pub fn enqueue_sync(&self, path: impl Into<String>) -> Result<()> {
        self.enqueue(Job::Sync {
            path: path.into(),
            reply: None,
        })
    }

    /// Report an external change; a missing document is forgotten
    pub fn notify_changed(&self, path: impl Into<String>) -> Result<()> {
        self.enqueue(Job::Changed { path: path.into() })
    }

    pub async fn sync_all(&self) -> Result<SyncReport> {
        self.request(|reply| Job::SyncAll { reply }).await
    }

    pub async fn curate(&self, path: impl Into<String>, trigger: RunTiming) -> Result<CurateReport> {
        let path = path.into();
        self.request(|reply| Job::Curate {
            path,
            trigger,
            reply,
        })
        .await
    }

    pub async fn check(&self) -> Result<CheckReport> {
        self.request(|reply| Job::Check { reply }).await
    }

    pub async fn fix(&self) -> Result<FixReport> {
        self.request(|reply| Job::Fix { reply }).await
    }

    /// Number of queued or running jobs
    pub fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    /// Wait until the queue is empty, fan-out included
    pub async fn drain(&self) -> Result<()> {
        let mut pending = self.pending.subscribe();
        pending
            .wait_for(|n| *n == 0)
            .await
            .map_err(|_| SyncError::ServiceStopped)?;
        Ok(())
    }
}

/// The worker task plus a handle to it
pub struct SyncService {
    handle: SyncHandle,
    worker: JoinHandle<()>,
}

impl SyncService {
    pub fn spawn(engine: SyncEngine, registry: Arc<ProcessorRegistry>, settings: Settings) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (pending, _) = watch::channel(0usize);
        let handle = SyncHandle {
            jobs: tx,
            pending: Arc::new(pending),
        };
        let worker = Worker {
            engine,
            registry,
            settings,
            queue: handle.clone(),
        };
        let worker = tokio::spawn(worker.run(rx));
        Self { handle, worker }
    }

    pub fn handle(&self) -> SyncHandle {
        self.handle.clone()
    }

    /// Drain the queue, give the last-focused document one final pass, and
    /// stop the worker
    pub async fn shutdown(self, last_focused: Option<String>) -> Result<()> {
        self.handle.drain().await?;
        let (tx, rx) = oneshot::channel();
        self.handle.enqueue(Job::Shutdown {
            last_focused,
            reply: tx,
        })?;
        rx.await.map_err(|_| SyncError::ServiceStopped)?;
        self.worker
            .await
            .map_err(|e| SyncError::Worker(e.to_string()))?;
        Ok(())
    }
}

struct Worker {
    engine: SyncEngine,
    registry: Arc<ProcessorRegistry>,
    settings: Settings,
    /// Fan-out goes back through the public queue
    queue: SyncHandle,
}

impl Worker {
    async fn run(mut self, mut jobs: mpsc::UnboundedReceiver<Job>) {
        tracing::debug!("Sync service started");
        while let Some(job) = jobs.recv().await {
            let name = job.name();
            let stop = self.handle(job).await;
            self.queue.pending.send_modify(|n| *n = n.saturating_sub(1));
            tracing::trace!("Finished {} job", name);
            if stop {
                break;
            }
        }
        tracing::debug!("Sync service stopped");
    }

    /// Returns true when the service should stop
    async fn handle(&mut self, job: Job) -> bool {
        match job {
            Job::Sync { path, reply } => {
                let result = self.sync(&path).await;
                respond(reply, result, "sync", &path);
            }
            Job::Changed { path } => {
                let result = match self.engine.reload_document(&path).await {
                    Ok(Some(_)) => self.sync(&path).await.map(|_| ()),
                    Ok(None) => Ok(()),
                    Err(e) => Err(e),
                };
                if let Err(e) = result {
                    tracing::warn!("Sync after change to {} failed: {}", path, e);
                }
            }
            Job::SyncAll { reply } => {
                let _ = reply.send(self.engine.sync_all().await);
            }
            Job::Curate {
                path,
                trigger,
                reply,
            } => {
                let result = self
                    .engine
                    .curate(&path, &self.registry, &self.settings, trigger)
                    .await;
                if let Ok(report) = &result {
                    self.fan_out(&report.fanout);
                }
                let _ = reply.send(result);
            }
            Job::Check { reply } => {
                let _ = reply.send(self.engine.check().await);
            }
            Job::Fix { reply } => {
                let result = match self.engine.check().await {
                    Ok(report) => self.engine.fix(&report).await,
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            Job::Shutdown {
                last_focused,
                reply,
            } => {
                if let Some(path) = last_focused {
                    // best effort: no fan-out, failures only logged
                    if let Err(e) = self.engine.sync_document(&path).await {
                        tracing::warn!("Final pass over {} failed: {}", path, e);
                    }
                }
                let _ = reply.send(());
                return true;
            }
        }
        false
    }

    async fn sync(&mut self, path: &str) -> Result<SyncReport> {
        let report = self.engine.sync_document(path).await?;
        self.fan_out(&report.peers);
        Ok(report)
    }

    fn fan_out(&self, peers: &[String]) {
        for peer in peers {
            tracing::debug!("Queueing reciprocal pass for {}", peer);
            if let Err(e) = self.queue.enqueue_sync(peer.clone()) {
                tracing::warn!("Could not queue {}: {}", peer, e);
            }
        }
    }
}

fn respond<T>(reply: Option<Reply<T>>, result: Result<T>, job: &str, path: &str) {
    match reply {
        Some(reply) => {
            let _ = reply.send(result);
        }
        None => {
            if let Err(e) = result {
                tracing::warn!("Queued {} of {} failed: {}", job, path, e);
            }
        }
    }
}
