//! Non-fatal findings collected while parsing and syncing documents

use serde::{Deserialize, Serialize};

/// Category of a non-fatal problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// An entry could not be parsed and was skipped
    MalformedEntry,
    /// A relationship term is not part of the taxonomy
    UnknownKind,
    /// Per-kind index numbering has a gap
    IndexGap,
    /// The same structured key appears more than once
    DuplicateKey,
    /// A reference did not match any known contact
    Unresolved,
    /// A name matched more than one contact
    AmbiguousName,
    /// An entry cannot be expressed in the target representation
    Unrepresentable,
}

/// A warning attached to a parse, sync or pipeline result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// Document the warning was raised for (empty when not tied to one)
    pub document: String,
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            document: String::new(),
            kind,
            message: message.into(),
        }
    }

    /// Attach the document path this warning belongs to
    pub fn in_document(mut self, document: impl Into<String>) -> Self {
        self.document = document.into();
        self
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.document.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.document, self.message)
        }
    }
}
