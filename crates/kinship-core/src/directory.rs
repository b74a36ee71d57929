//! Directory of known contacts used for reference resolution

use crate::contact::{ContactId, ContactNode};
use std::collections::HashMap;

/// Snapshot of every known (document-backed) contact
///
/// Iteration order is insertion order, which makes name resolution ties
/// deterministic for a given load order.
#[derive(Debug, Clone, Default)]
pub struct ContactDirectory {
    contacts: Vec<ContactNode>,
    by_id: HashMap<ContactId, usize>,
    by_local_id: HashMap<String, usize>,
}

impl ContactDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_contacts(contacts: impl IntoIterator<Item = ContactNode>) -> Self {
        let mut directory = Self::new();
        for contact in contacts {
            directory.insert(contact);
        }
        directory
    }

    /// Insert or replace a contact (keyed by id)
    pub fn insert(&mut self, contact: ContactNode) {
        if let Some(&index) = self.by_id.get(&contact.id) {
            self.contacts[index] = contact;
        } else {
            self.contacts.push(contact);
        }
        self.reindex();
    }

    /// Remove a contact; returns it if present
    pub fn remove(&mut self, id: &ContactId) -> Option<ContactNode> {
        let index = *self.by_id.get(id)?;
        let removed = self.contacts.remove(index);
        self.reindex();
        Some(removed)
    }

    fn reindex(&mut self) {
        self.by_id.clear();
        self.by_local_id.clear();
        for (index, contact) in self.contacts.iter().enumerate() {
            self.by_id.insert(contact.id.clone(), index);
            if !contact.id.is_globally_unique() {
                self.by_local_id
                    .entry(contact.id.as_str().to_string())
                    .or_insert(index);
            }
            if let Some(local) = &contact.local_id {
                self.by_local_id.entry(local.clone()).or_insert(index);
            }
        }
    }

    pub fn get(&self, id: &ContactId) -> Option<&ContactNode> {
        if let Some(&index) = self.by_id.get(id) {
            return Some(&self.contacts[index]);
        }
        let variant = id.urn_variant()?;
        self.by_id.get(&variant).map(|&index| &self.contacts[index])
    }

    pub fn get_by_id_str(&self, id: &str) -> Option<&ContactNode> {
        self.get(&ContactId::new(id.trim()))
    }

    /// Look up through the local-id index (non-global ids and file stems)
    pub fn find_local(&self, local_id: &str) -> Option<&ContactNode> {
        self.by_local_id
            .get(local_id.trim())
            .map(|&index| &self.contacts[index])
    }

    /// All contacts whose display name matches case-insensitively, in
    /// directory order
    pub fn find_by_name(&self, name: &str) -> Vec<&ContactNode> {
        let wanted = name.trim().to_lowercase();
        self.contacts
            .iter()
            .filter(|c| c.display_name.trim().to_lowercase() == wanted)
            .collect()
    }

    pub fn find_by_document(&self, path: &str) -> Option<&ContactNode> {
        self.contacts
            .iter()
            .find(|c| c.document.as_deref() == Some(path))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContactNode> {
        self.contacts.iter()
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::Gender;

    #[test]
    fn test_insert_replaces_by_id() {
        let mut dir = ContactDirectory::new();
        dir.insert(ContactNode::new(ContactId::new("a"), "Ann"));
        dir.insert(ContactNode::new(ContactId::new("a"), "Ann").with_gender(Gender::Female));
        assert_eq!(dir.len(), 1);
        assert_eq!(dir.get(&ContactId::new("a")).unwrap().gender, Gender::Female);
    }

    #[test]
    fn test_name_ties_resolve_in_directory_order() {
        let dir = ContactDirectory::from_contacts(vec![
            ContactNode::new(ContactId::new("first"), "Sam"),
            ContactNode::new(ContactId::new("second"), "sam"),
        ]);
        let matches = dir.find_by_name("SAM");
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id.as_str(), "first");
    }

    #[test]
    fn test_urn_prefix_is_lenient() {
        let dir = ContactDirectory::from_contacts(vec![ContactNode::new(
            ContactId::new("urn:uuid:67e55044-10b1-426f-9247-bb680e5fe0c8"),
            "Una",
        )]);
        assert!(dir
            .get_by_id_str("67e55044-10b1-426f-9247-bb680e5fe0c8")
            .is_some());
        // globally unique ids are not in the local index
        assert!(dir
            .find_local("urn:uuid:67e55044-10b1-426f-9247-bb680e5fe0c8")
            .is_none());
    }

    #[test]
    fn test_remove_reindexes() {
        let mut dir = ContactDirectory::from_contacts(vec![
            ContactNode::new(ContactId::new("a"), "Ann").with_local_id("Ann"),
            ContactNode::new(ContactId::new("b"), "Bob").with_local_id("Bob"),
        ]);
        assert!(dir.remove(&ContactId::new("a")).is_some());
        assert!(dir.find_local("Ann").is_none());
        assert_eq!(dir.find_local("Bob").unwrap().id.as_str(), "b");
    }
}
