//! Kinship Sync - keeps contact relationships consistent
//!
//! Provides:
//! - The sync engine reconciling RELATED blocks, related lists and the graph
//! - The consistency checker and its fixes
//! - The curator pipeline and its built-in processors
//! - A serialized sync service with per-document debouncing

pub mod checker;
pub mod debounce;
pub mod engine;
pub mod error;
pub mod index;
pub mod pipeline;
pub mod processors;
pub mod service;

pub use checker::{CheckReport, DuplicateEdge, EntryLocation, MissingReciprocal, OrphanedEdge};
pub use debounce::Debouncer;
pub use engine::{reconcile, FixReport, Reconciliation, SyncEngine, SyncOptions, SyncReport, SyncScope};
pub use error::{RegistryError, Result, SyncError};
pub use index::{ResolvedDocument, VaultIndex};
pub use pipeline::{
    CurateReport, PeerEdit, Processor, ProcessorContext, ProcessorDescriptor, ProcessorRegistry, QueueItem,
    RegistryBuilder, RunTiming, Settings,
};
pub use service::{SyncHandle, SyncService};
