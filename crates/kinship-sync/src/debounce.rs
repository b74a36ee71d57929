//! Per-document debouncing of change notifications
//!
//! Every notification for a document restarts that document's quiet window;
//! the document is released once the window passes with no new
//! notification.

use crate::service::SyncHandle;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

/// Default quiet window
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    deadlines: HashMap<String, Instant>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadlines: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a notification; resets the document's timer
    pub fn notify(&mut self, path: impl Into<String>, now: Instant) {
        self.deadlines.insert(path.into(), now + self.window);
    }

    pub fn pending(&self) -> usize {
        self.deadlines.len()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// Documents whose window has passed, oldest deadline first
    pub fn take_due(&mut self, now: Instant) -> Vec<String> {
        let mut due: Vec<(Instant, String)> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(path, deadline)| (*deadline, path.clone()))
            .collect();
        due.sort();
        for (_, path) in &due {
            self.deadlines.remove(path);
        }
        due.into_iter().map(|(_, path)| path).collect()
    }

    /// Everything still waiting, regardless of deadline
    pub fn flush(&mut self) -> Vec<String> {
        let mut all: Vec<(Instant, String)> = self.deadlines.drain().map(|(p, d)| (d, p)).collect();
        all.sort();
        all.into_iter().map(|(_, path)| path).collect()
    }
}

/// Forward debounced paths from `events` to the sync service
///
/// Stops when `events` closes (pending paths are flushed first) or the
/// service goes away.
pub fn spawn(window: Duration, mut events: mpsc::UnboundedReceiver<String>, sync: SyncHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut debouncer = Debouncer::new(window);
        loop {
            let next_deadline = debouncer.next_deadline();

            tokio::select! {
                event = events.recv() => match event {
                    Some(path) => {
                        tracing::trace!("Change notification for {}", path);
                        debouncer.notify(path, Instant::now());
                    }
                    None => {
                        for path in debouncer.flush() {
                            let _ = sync.notify_changed(path);
                        }
                        break;
                    }
                },
                () = async {
                    if let Some(deadline) = next_deadline {
                        time::sleep_until(deadline).await;
                    }
                }, if next_deadline.is_some() => {
                    for path in debouncer.take_due(Instant::now()) {
                        tracing::debug!("Debounced change to {}", path);
                        if sync.notify_changed(path).is_err() {
                            tracing::debug!("Sync service gone, debouncer stopping");
                            return;
                        }
                    }
                }
            }
        }
    })
}
