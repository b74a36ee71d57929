//! Relationship references: how an edge endpoint is written in a document

use crate::contact::{Contact, ContactNode};
use crate::directory::ContactDirectory;
use serde::{Deserialize, Serialize};

/// Namespace tag of a serialized reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Namespace {
    /// Verified globally-unique id
    StableId,
    /// Id believed unique within the vault only
    LocalId,
    /// Display-name fallback
    Name,
}

impl Namespace {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::StableId => "stable-id",
            Self::LocalId => "local-id",
            Self::Name => "name",
        }
    }

    const ALL: [Namespace; 3] = [Self::StableId, Self::LocalId, Self::Name];
}

/// One endpoint of an edge as written in a document, e.g. `stable-id:abc`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationshipReference {
    pub namespace: Namespace,
    pub payload: String,
}

impl RelationshipReference {
    pub fn new(namespace: Namespace, payload: impl Into<String>) -> Self {
        Self {
            namespace,
            payload: payload.into(),
        }
    }

    pub fn stable_id(id: impl Into<String>) -> Self {
        Self::new(Namespace::StableId, id)
    }

    pub fn local_id(id: impl Into<String>) -> Self {
        Self::new(Namespace::LocalId, id)
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self::new(Namespace::Name, name)
    }

    /// Parse a raw reference string
    ///
    /// Recognizes the `stable-id:`, `local-id:` and `name:` prefixes and
    /// treats anything else as a bare display name.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        for namespace in Namespace::ALL {
            if let Some(rest) = raw
                .strip_prefix(namespace.prefix())
                .and_then(|rest| rest.strip_prefix(':'))
            {
                return Self::new(namespace, rest.trim());
            }
        }
        Self::name(raw)
    }

    /// Choose the reference form for a node
    ///
    /// Stable-id form when the id is verified globally unique (and preferred),
    /// local-id form for any other real id, name form for placeholders.
    pub fn render(node: &ContactNode, prefer_stable_id: bool) -> Self {
        if node.is_placeholder() {
            return Self::name(node.display_name.clone());
        }
        if prefer_stable_id && node.id.is_globally_unique() {
            Self::stable_id(node.id.as_str())
        } else {
            Self::local_id(node.id.as_str())
        }
    }

    /// Resolve against the directory
    ///
    /// Unresolved references come back as `Contact::Placeholder` so callers
    /// must decide what to do with them.
    pub fn resolve(&self, directory: &ContactDirectory) -> Contact {
        let found = match self.namespace {
            Namespace::StableId => directory.get_by_id_str(&self.payload),
            Namespace::LocalId => directory.find_local(&self.payload),
            Namespace::Name => directory.find_by_name(&self.payload).into_iter().next(),
        };
        match found {
            Some(node) => Contact::Resolved(node.clone()),
            None => Contact::Placeholder(self.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.payload.trim().is_empty()
    }
}

impl std::fmt::Display for RelationshipReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.namespace.prefix(), self.payload)
    }
}
