//! Relationship taxonomy
//!
//! Static tables mapping gendered terms to genderless kinds, kinds to their
//! reciprocal, and kinds back to male/female/neutral display terms.

use crate::contact::Gender;
use serde::{Deserialize, Serialize};

/// Canonical, gender-neutral relationship category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    Acquaintance,
    Auncle,
    Boss,
    Child,
    ChildInLaw,
    Colleague,
    Cousin,
    Employee,
    Friend,
    Godchild,
    Godparent,
    Grandchild,
    Grandparent,
    Neighbor,
    Nibling,
    Parent,
    ParentInLaw,
    Partner,
    Relative,
    Sibling,
    SiblingInLaw,
    Spouse,
    StepChild,
    StepParent,
}

struct KindInfo {
    kind: RelationKind,
    key: &'static str,
    reciprocal: RelationKind,
    male: &'static str,
    female: &'static str,
}

use RelationKind as K;

#[rustfmt::skip]
const KINDS: &[KindInfo] = &[
    KindInfo { kind: K::Acquaintance, key: "acquaintance",   reciprocal: K::Acquaintance, male: "acquaintance",   female: "acquaintance" },
    KindInfo { kind: K::Auncle,       key: "auncle",         reciprocal: K::Nibling,      male: "uncle",          female: "aunt" },
    KindInfo { kind: K::Boss,         key: "boss",           reciprocal: K::Employee,     male: "boss",           female: "boss" },
    KindInfo { kind: K::Child,        key: "child",          reciprocal: K::Parent,       male: "son",            female: "daughter" },
    KindInfo { kind: K::ChildInLaw,   key: "child-in-law",   reciprocal: K::ParentInLaw,  male: "son-in-law",     female: "daughter-in-law" },
    KindInfo { kind: K::Colleague,    key: "colleague",      reciprocal: K::Colleague,    male: "colleague",      female: "colleague" },
    KindInfo { kind: K::Cousin,       key: "cousin",         reciprocal: K::Cousin,       male: "cousin",         female: "cousin" },
    KindInfo { kind: K::Employee,     key: "employee",       reciprocal: K::Boss,         male: "employee",       female: "employee" },
    KindInfo { kind: K::Friend,       key: "friend",         reciprocal: K::Friend,       male: "friend",         female: "friend" },
    KindInfo { kind: K::Godchild,     key: "godchild",       reciprocal: K::Godparent,    male: "godson",         female: "goddaughter" },
    KindInfo { kind: K::Godparent,    key: "godparent",      reciprocal: K::Godchild,     male: "godfather",      female: "godmother" },
    KindInfo { kind: K::Grandchild,   key: "grandchild",     reciprocal: K::Grandparent,  male: "grandson",       female: "granddaughter" },
    KindInfo { kind: K::Grandparent,  key: "grandparent",    reciprocal: K::Grandchild,   male: "grandfather",    female: "grandmother" },
    KindInfo { kind: K::Neighbor,     key: "neighbor",       reciprocal: K::Neighbor,     male: "neighbor",       female: "neighbor" },
    KindInfo { kind: K::Nibling,      key: "nibling",        reciprocal: K::Auncle,       male: "nephew",         female: "niece" },
    KindInfo { kind: K::Parent,       key: "parent",         reciprocal: K::Child,        male: "father",         female: "mother" },
    KindInfo { kind: K::ParentInLaw,  key: "parent-in-law",  reciprocal: K::ChildInLaw,   male: "father-in-law",  female: "mother-in-law" },
    KindInfo { kind: K::Partner,      key: "partner",        reciprocal: K::Partner,      male: "boyfriend",      female: "girlfriend" },
    KindInfo { kind: K::Relative,     key: "relative",       reciprocal: K::Relative,     male: "relative",       female: "relative" },
    KindInfo { kind: K::Sibling,      key: "sibling",        reciprocal: K::Sibling,      male: "brother",        female: "sister" },
    KindInfo { kind: K::SiblingInLaw, key: "sibling-in-law", reciprocal: K::SiblingInLaw, male: "brother-in-law", female: "sister-in-law" },
    KindInfo { kind: K::Spouse,       key: "spouse",         reciprocal: K::Spouse,       male: "husband",        female: "wife" },
    KindInfo { kind: K::StepChild,    key: "step-child",     reciprocal: K::StepParent,   male: "stepson",        female: "stepdaughter" },
    KindInfo { kind: K::StepParent,   key: "step-parent",    reciprocal: K::StepChild,    male: "stepfather",     female: "stepmother" },
];

/// Aliases that name a kind without implying gender
const NEUTRAL_ALIASES: &[(&str, RelationKind)] = &[
    ("co-worker", K::Colleague),
    ("coworker", K::Colleague),
    ("kin", K::Relative),
    ("family", K::Relative),
    ("neighbour", K::Neighbor),
    ("aunt-uncle", K::Auncle),
    ("niece-nephew", K::Nibling),
    ("stepparent", K::StepParent),
    ("stepchild", K::StepChild),
    ("manager", K::Boss),
    ("husband-wife", K::Spouse),
];

impl RelationKind {
    /// Every kind, in key order
    pub fn all() -> impl Iterator<Item = RelationKind> {
        KINDS.iter().map(|info| info.kind)
    }

    fn info(&self) -> &'static KindInfo {
        // KINDS lists every variant exactly once
        KINDS
            .iter()
            .find(|info| info.kind == *self)
            .unwrap_or(&KINDS[0])
    }

    /// Canonical key used in structured fields (`RELATED[friend]`)
    pub fn key(&self) -> &'static str {
        self.info().key
    }

    /// Kind that must exist in the opposite direction
    pub fn reciprocal(&self) -> RelationKind {
        self.info().reciprocal
    }

    /// Symmetric kinds are their own reciprocal
    pub fn is_symmetric(&self) -> bool {
        self.reciprocal() == *self
    }

    /// Display term for a target of the given gender
    ///
    /// Falls back to the neutral form (the key) unless the gender is male or
    /// female.
    pub fn render(&self, gender: Gender) -> &'static str {
        let info = self.info();
        match gender {
            Gender::Male => info.male,
            Gender::Female => info.female,
            _ => info.key,
        }
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl std::str::FromStr for RelationKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize(s).ok_or_else(|| crate::Error::Validation(format!("unknown relationship kind: {s}")))
    }
}

fn canonical_term(term: &str) -> String {
    term.trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Resolve a term to its kind and, for gendered terms, the implied gender
fn lookup(term: &str) -> Option<(RelationKind, Option<Gender>)> {
    let term = canonical_term(term);
    if term.is_empty() {
        return None;
    }
    for info in KINDS {
        if info.key == term {
            return Some((info.kind, None));
        }
    }
    for info in KINDS {
        if info.male == info.female {
            continue;
        }
        if info.male == term {
            return Some((info.kind, Some(Gender::Male)));
        }
        if info.female == term {
            return Some((info.kind, Some(Gender::Female)));
        }
    }
    NEUTRAL_ALIASES
        .iter()
        .find(|(alias, _)| *alias == term)
        .map(|(_, kind)| (*kind, None))
}

/// Map any known term (gendered, neutral or alias) to its genderless kind
pub fn normalize(term: &str) -> Option<RelationKind> {
    lookup(term).map(|(kind, _)| kind)
}

pub fn reciprocal_of(kind: RelationKind) -> RelationKind {
    kind.reciprocal()
}

pub fn render(kind: RelationKind, target_gender: Gender) -> &'static str {
    kind.render(target_gender)
}

/// Gender implied by a term; neutral terms never imply one
pub fn infer_gender(term: &str) -> Option<Gender> {
    lookup(term).and_then(|(_, gender)| gender)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_variant_has_one_entry() {
        assert_eq!(RelationKind::all().count(), KINDS.len());
        let mut keys: Vec<_> = KINDS.iter().map(|info| info.key).collect();
        let sorted = {
            let mut k = keys.clone();
            k.sort();
            k
        };
        assert_eq!(keys, sorted, "KINDS must stay in key order");
        keys.dedup();
        assert_eq!(keys.len(), KINDS.len());
    }

    #[test]
    fn test_normalize_gendered_and_aliases() {
        assert_eq!(normalize("Mother"), Some(RelationKind::Parent));
        assert_eq!(normalize("father"), Some(RelationKind::Parent));
        assert_eq!(normalize("  brother  "), Some(RelationKind::Sibling));
        assert_eq!(normalize("co-worker"), Some(RelationKind::Colleague));
        assert_eq!(normalize("Sister In Law"), Some(RelationKind::SiblingInLaw));
        assert_eq!(normalize("Step Parent"), Some(RelationKind::StepParent));
        assert_eq!(normalize("stepfather"), Some(RelationKind::StepParent));
        assert_eq!(normalize("nemesis"), None);
        assert_eq!(normalize(""), None);
    }

    #[test]
    fn test_reciprocal_is_total_and_involutive() {
        for kind in RelationKind::all() {
            assert_eq!(reciprocal_of(reciprocal_of(kind)), kind, "{kind}");
        }
        assert_eq!(reciprocal_of(RelationKind::Parent), RelationKind::Child);
        assert_eq!(reciprocal_of(RelationKind::Auncle), RelationKind::Nibling);
    }

    #[test]
    fn test_symmetric_kinds() {
        for kind in [
            RelationKind::Spouse,
            RelationKind::Sibling,
            RelationKind::Friend,
            RelationKind::Colleague,
        ] {
            assert!(kind.is_symmetric());
            assert_eq!(reciprocal_of(kind), kind);
        }
        assert!(!RelationKind::Parent.is_symmetric());
    }

    #[test]
    fn test_render_falls_back_to_neutral() {
        assert_eq!(render(RelationKind::Parent, Gender::Female), "mother");
        assert_eq!(render(RelationKind::Parent, Gender::Male), "father");
        assert_eq!(render(RelationKind::Parent, Gender::NonBinary), "parent");
        assert_eq!(render(RelationKind::Parent, Gender::Unspecified), "parent");
        assert_eq!(render(RelationKind::Friend, Gender::Female), "friend");
    }

    #[test]
    fn test_infer_gender_only_from_gendered_terms() {
        assert_eq!(infer_gender("mother"), Some(Gender::Female));
        assert_eq!(infer_gender("Grandfather"), Some(Gender::Male));
        assert_eq!(infer_gender("parent"), None);
        assert_eq!(infer_gender("friend"), None);
        assert_eq!(infer_gender("cousin"), None);
        assert_eq!(infer_gender("unknown-term"), None);
    }

    #[test]
    fn test_kind_parses_from_str() {
        let kind: RelationKind = "wife".parse().unwrap();
        assert_eq!(kind, RelationKind::Spouse);
        assert!("frenemy".parse::<RelationKind>().is_err());
    }
}
