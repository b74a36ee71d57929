//! Contact (node) types

use crate::reference::{Namespace, RelationshipReference};
use serde::{Deserialize, Serialize};
use ulid::Ulid;
use uuid::Uuid;

const URN_UUID_PREFIX: &str = "urn:uuid:";
const PLACEHOLDER_PREFIX: &str = "placeholder:";

/// Identifier of a contact node
///
/// Either the `UID` a document carries, a document-local id, or a synthetic
/// placeholder id for references that did not resolve to any document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContactId(String);

impl ContactId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh globally-unique id
    pub fn generate() -> Self {
        Self(format!("{}{}", URN_UUID_PREFIX, Uuid::new_v4()))
    }

    /// Synthetic id for a reference that did not resolve
    ///
    /// Name references are keyed case-insensitively so that `[[Ann]]` and
    /// `name:ann` land on the same placeholder.
    pub fn placeholder(reference: &RelationshipReference) -> Self {
        let payload = match reference.namespace {
            Namespace::Name => reference.payload.trim().to_lowercase(),
            _ => reference.payload.trim().to_string(),
        };
        Self(format!(
            "{}{}:{}",
            PLACEHOLDER_PREFIX,
            reference.namespace.prefix(),
            payload
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_placeholder(&self) -> bool {
        self.0.starts_with(PLACEHOLDER_PREFIX)
    }

    /// True when the id is a verified globally-unique identifier (UUID or ULID)
    pub fn is_globally_unique(&self) -> bool {
        if self.is_placeholder() {
            return false;
        }
        let raw = self.0.strip_prefix(URN_UUID_PREFIX).unwrap_or(&self.0);
        Uuid::parse_str(raw).is_ok() || (raw.len() == 26 && Ulid::from_string(raw).is_ok())
    }

    /// The same id with the `urn:uuid:` prefix toggled, used for lenient lookups
    pub(crate) fn urn_variant(&self) -> Option<Self> {
        if let Some(bare) = self.0.strip_prefix(URN_UUID_PREFIX) {
            Some(Self(bare.to_string()))
        } else if Uuid::parse_str(&self.0).is_ok() {
            Some(Self(format!("{}{}", URN_UUID_PREFIX, self.0)))
        } else {
            None
        }
    }
}

impl std::fmt::Display for ContactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ContactId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Gender of a contact, as recorded in the `GENDER` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    NonBinary,
    /// No gender recorded
    #[default]
    Unspecified,
    /// Explicitly recorded as unknown
    Unknown,
}

impl Gender {
    /// Parse a vCard-style gender code (`M`, `F`, `NB`/`O`, `N`, `U`)
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "M" | "MALE" => Some(Self::Male),
            "F" | "FEMALE" => Some(Self::Female),
            "NB" | "O" | "NONBINARY" | "NON-BINARY" => Some(Self::NonBinary),
            "N" | "" => Some(Self::Unspecified),
            "U" | "UNKNOWN" => Some(Self::Unknown),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Male => "M",
            Self::Female => "F",
            Self::NonBinary => "NB",
            Self::Unspecified => "N",
            Self::Unknown => "U",
        }
    }

    /// Whether a gender has been recorded at all
    pub fn is_set(&self) -> bool {
        !matches!(self, Self::Unspecified)
    }
}

/// A contact in the relationship graph (a node)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactNode {
    /// Unique identifier
    pub id: ContactId,

    /// Name shown in related lists
    pub display_name: String,

    pub gender: Gender,

    /// Path of the backing document; `None` for placeholders
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,

    /// Document-local alias (the file stem), resolvable through `local-id:`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_id: Option<String>,
}

impl ContactNode {
    pub fn new(id: ContactId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            gender: Gender::Unspecified,
            document: None,
            local_id: None,
        }
    }

    /// Name-only node for a reference that did not resolve
    pub fn placeholder(reference: &RelationshipReference) -> Self {
        Self::new(
            ContactId::placeholder(reference),
            reference.payload.trim().to_string(),
        )
    }

    pub fn with_gender(mut self, gender: Gender) -> Self {
        self.gender = gender;
        self
    }

    pub fn with_document(mut self, path: impl Into<String>) -> Self {
        self.document = Some(path.into());
        self
    }

    pub fn with_local_id(mut self, local_id: impl Into<String>) -> Self {
        self.local_id = Some(local_id.into());
        self
    }

    pub fn is_placeholder(&self) -> bool {
        self.id.is_placeholder()
    }

    /// True when a document backs this contact
    pub fn is_backed(&self) -> bool {
        self.document.is_some()
    }
}

/// Outcome of resolving a reference against the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contact {
    Resolved(ContactNode),
    Placeholder(RelationshipReference),
}

impl Contact {
    pub fn id(&self) -> ContactId {
        match self {
            Self::Resolved(node) => node.id.clone(),
            Self::Placeholder(reference) => ContactId::placeholder(reference),
        }
    }

    /// Node to insert into the graph for this contact
    pub fn to_node(&self) -> ContactNode {
        match self {
            Self::Resolved(node) => node.clone(),
            Self::Placeholder(reference) => ContactNode::placeholder(reference),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_globally_unique() {
        let id = ContactId::generate();
        assert!(id.as_str().starts_with("urn:uuid:"));
        assert!(id.is_globally_unique());
        assert_ne!(id, ContactId::generate());
    }

    #[test]
    fn test_uniqueness_detection() {
        assert!(ContactId::new("01ARZ3NDEKTSV4RRFFQ69G5FAV").is_globally_unique());
        assert!(ContactId::new("67e55044-10b1-426f-9247-bb680e5fe0c8").is_globally_unique());
        assert!(!ContactId::new("john-smith").is_globally_unique());
        assert!(!ContactId::new("42").is_globally_unique());
    }

    #[test]
    fn test_placeholder_ids_fold_name_case() {
        let a = ContactId::placeholder(&RelationshipReference::name("Ann Lee"));
        let b = ContactId::placeholder(&RelationshipReference::name("ann lee"));
        assert_eq!(a, b);
        assert!(a.is_placeholder());
        assert!(!a.is_globally_unique());
    }

    #[test]
    fn test_gender_codes() {
        assert_eq!(Gender::from_code("m"), Some(Gender::Male));
        assert_eq!(Gender::from_code("O"), Some(Gender::NonBinary));
        assert_eq!(Gender::from_code("x"), None);
        assert_eq!(Gender::Female.code(), "F");
        assert!(!Gender::Unspecified.is_set());
    }

    #[test]
    fn test_contact_resolution_variants() {
        let node = ContactNode::new(ContactId::new("abc"), "Zed").with_document("Zed.md");
        let resolved = Contact::Resolved(node.clone());
        assert_eq!(resolved.id(), node.id);
        assert!(resolved.to_node().is_backed());

        let placeholder = Contact::Placeholder(RelationshipReference::name("Yuri"));
        assert!(!placeholder.is_resolved());
        assert_eq!(placeholder.to_node().display_name, "Yuri");
        assert!(placeholder.to_node().is_placeholder());
    }
}
