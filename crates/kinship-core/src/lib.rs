//! Kinship Core - Relationship model for contact documents
//!
//! This crate provides the contact and relationship types, the relationship
//! taxonomy, reference resolution, the in-memory relationship graph and the
//! codecs for the places a relationship is written down in a document.

pub mod contact;
pub mod directory;
pub mod document;
pub mod error;
pub mod graph;
pub mod reference;
pub mod related_block;
pub mod related_list;
pub mod taxonomy;
pub mod vcard;
pub mod warning;

pub use contact::{Contact, ContactId, ContactNode, Gender};
pub use directory::ContactDirectory;
pub use document::ContactDocument;
pub use error::{Error, Result};
pub use graph::{RelationshipEdge, RelationshipGraph};
pub use reference::{Namespace, RelationshipReference};
pub use related_block::BlockEntry;
pub use related_list::{ListEntry, ListLine};
pub use taxonomy::RelationKind;
pub use vcard::CardRelation;
pub use warning::{Warning, WarningKind};
