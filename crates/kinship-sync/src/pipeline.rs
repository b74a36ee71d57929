//! Curator pipeline: an ordered registry of processors run over a document
//!
//! The registry is built once at startup and sealed; settings snapshots can
//! only be made from a sealed registry, so nothing reads processor defaults
//! before every processor has registered.

use crate::engine::{reconcile, Reconciliation, SyncEngine, SyncOptions, SyncScope};
use crate::error::{RegistryError, Result};
use crate::index::VaultIndex;
use chrono::Utc;
use kinship_core::document::GENDER_KEY;
use kinship_core::{ContactDocument, Gender, Warning};
use serde::Serialize;
use std::collections::BTreeMap;

/// When a processor is allowed to run
///
/// Ordered: a trigger runs every processor whose class is at or below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTiming {
    /// On every document change
    Immediate,
    /// On idle / periodic improvement passes
    Improvement,
    /// Only when explicitly invoked; ignores enabled settings
    Manual,
}

impl RunTiming {
    pub fn runs_under(&self, trigger: RunTiming) -> bool {
        *self <= trigger
    }
}

impl std::fmt::Display for RunTiming {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Immediate => "immediate",
            Self::Improvement => "improvement",
            Self::Manual => "manual",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for RunTiming {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "immediate" => Ok(Self::Immediate),
            "improvement" => Ok(Self::Improvement),
            "manual" => Ok(Self::Manual),
            other => Err(format!("unknown run timing: {other}")),
        }
    }
}

/// Static description of a processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessorDescriptor {
    pub name: &'static str,
    pub timing: RunTiming,
    pub setting_key: &'static str,
    pub default_enabled: bool,
}

/// Report of one processor's effect on one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueItem {
    pub processor: String,
    pub document: String,
    pub message: String,
}

/// A change to another document, applied after the pipeline finishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEdit {
    /// Record a gender on a peer whose document has none
    SetGender { path: String, gender: Gender },
    /// Run a sync pass over a peer (reciprocal fan-out)
    Sync { path: String },
}

/// Everything a processor may look at or change
pub struct ProcessorContext<'a> {
    pub document: &'a mut ContactDocument,
    pub index: &'a mut VaultIndex,
    pub settings: &'a Settings,
    pub options: &'a SyncOptions,
    pub warnings: Vec<Warning>,
    pub peer_edits: Vec<PeerEdit>,
}

impl<'a> ProcessorContext<'a> {
    pub fn new(
        document: &'a mut ContactDocument,
        index: &'a mut VaultIndex,
        settings: &'a Settings,
        options: &'a SyncOptions,
    ) -> Self {
        Self {
            document,
            index,
            settings,
            options,
            warnings: Vec::new(),
            peer_edits: Vec::new(),
        }
    }

    /// Run a sync pass restricted to `scope` over the current document
    pub fn reconcile(&mut self, scope: SyncScope) -> Reconciliation {
        let options = self.options.clone().with_scope(scope);
        let mut pass = reconcile(self.index, self.document, &options);
        self.warnings.append(&mut pass.warnings);
        pass
    }

    pub fn item(&self, descriptor: &ProcessorDescriptor, message: impl Into<String>) -> QueueItem {
        QueueItem {
            processor: descriptor.name.to_string(),
            document: self.document.path.clone(),
            message: message.into(),
        }
    }

    pub fn edit_peer(&mut self, edit: PeerEdit) {
        if !self.peer_edits.contains(&edit) {
            self.peer_edits.push(edit);
        }
    }
}

/// A pipeline step
///
/// Must be idempotent: a second run over an unchanged document changes
/// nothing.
pub trait Processor: Send + Sync {
    fn descriptor(&self) -> ProcessorDescriptor;

    /// Returns an item when it changed (or has something to report about)
    /// the document
    fn process(&self, ctx: &mut ProcessorContext<'_>) -> Option<QueueItem>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Collects processors; [`RegistryBuilder::build`] seals the set
#[derive(Default)]
pub struct RegistryBuilder {
    processors: Vec<Box<dyn Processor>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, processor: impl Processor + 'static) -> std::result::Result<&mut Self, RegistryError> {
        let descriptor = processor.descriptor();
        if descriptor.name.trim().is_empty() || descriptor.name.trim() != descriptor.name {
            return Err(RegistryError::InvalidName(descriptor.name.to_string()));
        }
        if !is_setting_key(descriptor.setting_key) {
            return Err(RegistryError::InvalidName(descriptor.setting_key.to_string()));
        }
        for existing in &self.processors {
            let existing = existing.descriptor();
            if existing.name == descriptor.name {
                return Err(RegistryError::DuplicateProcessor(descriptor.name.to_string()));
            }
            if existing.setting_key == descriptor.setting_key {
                return Err(RegistryError::DuplicateProcessor(descriptor.setting_key.to_string()));
            }
        }
        tracing::debug!("Registered processor {} ({})", descriptor.name, descriptor.timing);
        self.processors.push(Box::new(processor));
        Ok(self)
    }

    pub fn build(self) -> ProcessorRegistry {
        ProcessorRegistry {
            processors: self.processors,
        }
    }
}

fn is_setting_key(key: &str) -> bool {
    key.starts_with(|c: char| c.is_ascii_lowercase())
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Sealed, ordered set of processors
pub struct ProcessorRegistry {
    processors: Vec<Box<dyn Processor>>,
}

impl ProcessorRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// The built-in processors in their run order
    pub fn standard() -> std::result::Result<Self, RegistryError> {
        let mut builder = RegistryBuilder::new();
        crate::processors::register_standard(&mut builder)?;
        Ok(builder.build())
    }

    /// Descriptors in registration (= run) order
    pub fn descriptors(&self) -> Vec<ProcessorDescriptor> {
        self.processors.iter().map(|p| p.descriptor()).collect()
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Snapshot of every processor's default
    pub fn default_settings(&self) -> Settings {
        Settings {
            enabled: self
                .processors
                .iter()
                .map(|p| {
                    let d = p.descriptor();
                    (d.setting_key.to_string(), d.default_enabled)
                })
                .collect(),
        }
    }

    /// Defaults overlaid with user overrides; unknown keys are rejected
    pub fn settings(&self, overrides: &BTreeMap<String, bool>) -> std::result::Result<Settings, RegistryError> {
        let mut settings = self.default_settings();
        for (key, enabled) in overrides {
            match settings.enabled.get_mut(key) {
                Some(slot) => *slot = *enabled,
                None => return Err(RegistryError::UnknownSetting(key.clone())),
            }
        }
        Ok(settings)
    }

    /// Run every eligible processor over a document, in order
    ///
    /// A `Manual` trigger runs everything regardless of settings. The
    /// document's revision marker is left to the caller.
    pub fn run(
        &self,
        document: &mut ContactDocument,
        index: &mut VaultIndex,
        settings: &Settings,
        options: &SyncOptions,
        trigger: RunTiming,
    ) -> PipelineOutcome {
        let before = document.to_text();
        let mut ctx = ProcessorContext::new(document, index, settings, options);
        let mut items = Vec::new();

        for processor in &self.processors {
            let descriptor = processor.descriptor();
            if !descriptor.timing.runs_under(trigger) {
                continue;
            }
            if trigger != RunTiming::Manual && !settings.is_enabled(descriptor.setting_key) {
                tracing::trace!("Processor {} disabled", descriptor.name);
                continue;
            }
            if let Some(item) = processor.process(&mut ctx) {
                tracing::debug!("{}: {}", item.processor, item.message);
                items.push(item);
            }
        }

        let ProcessorContext {
            warnings, peer_edits, ..
        } = ctx;
        let changed = document.to_text() != before;
        PipelineOutcome {
            items,
            warnings,
            peer_edits,
            changed,
        }
    }
}

/// Immutable view of which processors are enabled
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    enabled: BTreeMap<String, bool>,
}

impl Settings {
    pub fn is_enabled(&self, setting_key: &str) -> bool {
        self.enabled.get(setting_key).copied().unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.enabled.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Aggregated result of one pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineOutcome {
    pub items: Vec<QueueItem>,
    pub warnings: Vec<Warning>,
    pub peer_edits: Vec<PeerEdit>,
    /// Whether the document text differs from before the run
    pub changed: bool,
}

/// Result of curating one document against the store
#[derive(Debug, Clone, Default, Serialize)]
pub struct CurateReport {
    pub document: String,
    pub items: Vec<QueueItem>,
    pub warnings: Vec<Warning>,
    /// Documents written, the curated one first if it changed
    pub written: Vec<String>,
    /// Peers that need a sync pass for reciprocal fan-out
    pub fanout: Vec<String>,
}

impl SyncEngine {
    /// Run the pipeline over one stored document and persist the results
    ///
    /// The curated document gets one revision refresh if anything changed;
    /// gender edits are written to peers here, fan-out syncs are returned
    /// for the caller to schedule.
    pub async fn curate(
        &mut self,
        path: &str,
        registry: &ProcessorRegistry,
        settings: &Settings,
        trigger: RunTiming,
    ) -> Result<CurateReport> {
        let now = Utc::now();
        let mut document = self.load(path).await?;
        let options = self.options().clone();
        let outcome = registry.run(&mut document, self.index_mut(), settings, &options, trigger);

        let mut report = CurateReport {
            document: path.to_string(),
            items: outcome.items,
            warnings: outcome.warnings,
            ..Default::default()
        };
        if outcome.changed {
            self.commit(&mut document, now).await?;
            report.written.push(path.to_string());
        }

        for edit in outcome.peer_edits {
            match edit {
                PeerEdit::SetGender { path: peer, gender } => {
                    let Some(mut peer_document) = self.store().load_document(&peer).await? else {
                        tracing::warn!("Gender for missing document {} dropped", peer);
                        continue;
                    };
                    if peer_document.gender().is_set() {
                        continue;
                    }
                    peer_document.front_mut().set(GENDER_KEY, gender.code());
                    self.commit(&mut peer_document, now).await?;
                    report.written.push(peer);
                }
                PeerEdit::Sync { path: peer } => {
                    if !report.fanout.contains(&peer) {
                        report.fanout.push(peer);
                    }
                }
            }
        }
        Ok(report)
    }
}
