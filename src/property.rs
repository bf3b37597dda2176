//! Property store: typical/rigid properties and the profiles that bundle them.
//!
//! A [`Property`] is identified by its name and kind only; strength and
//! provenance ride along as metadata. A [`Profile`] is an immutable bag of
//! properties for one subject (an artwork or a concept), with the typical and
//! rigid sets kept disjoint by name.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{ProfileError, ProfileResult};

/// Whether a property is a defeasible default or an essential attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    /// Holds normally, but can be overridden in a combination.
    Typical,
    /// Always holds; never subject to the non-monotonic step.
    Rigid,
}

impl std::fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Typical => write!(f, "typical"),
            Self::Rigid => write!(f, "rigid"),
        }
    }
}

/// Which source concept of a combination a property came from.
///
/// The derived ordering (`Head < Modifier`) is the tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Head,
    Modifier,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Head => write!(f, "head"),
            Self::Modifier => write!(f, "modifier"),
        }
    }
}

/// A single named property of a subject.
///
/// Names starting with `-` denote the negation of the unprefixed property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub kind: PropertyKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}

impl Property {
    /// A typical property with the given strength.
    pub fn typical(name: impl Into<String>, strength: f64) -> Self {
        Self {
            name: name.into(),
            kind: PropertyKind::Typical,
            strength: Some(strength),
            provenance: None,
        }
    }

    /// A typical property with no recorded strength.
    pub fn typical_unweighted(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: PropertyKind::Typical,
            strength: None,
            provenance: None,
        }
    }

    /// A rigid property.
    pub fn rigid(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: PropertyKind::Rigid,
            strength: None,
            provenance: None,
        }
    }

    /// Tag the property with the concept it came from.
    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = Some(provenance);
        self
    }

    /// Whether this property is the negation of another (`-name`).
    pub fn is_negated(&self) -> bool {
        self.name.starts_with('-')
    }

    /// The property name with any leading negation removed.
    pub fn base_name(&self) -> &str {
        self.name.strip_prefix('-').unwrap_or(&self.name)
    }
}

impl PartialEq for Property {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.kind == other.kind
    }
}

impl Eq for Property {}

impl Hash for Property {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.kind.hash(state);
    }
}

/// Total preference order over properties: strongest first, then HEAD before
/// MODIFIER, then by name.
///
/// Missing strengths sort after every present strength, and missing
/// provenance after both tagged sources.
pub fn preference_order(a: &Property, b: &Property) -> Ordering {
    let strength = match (a.strength, b.strength) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    strength
        .then_with(|| provenance_rank(a.provenance).cmp(&provenance_rank(b.provenance)))
        .then_with(|| a.name.cmp(&b.name))
}

fn provenance_rank(provenance: Option<Provenance>) -> u8 {
    match provenance {
        Some(Provenance::Head) => 0,
        Some(Provenance::Modifier) => 1,
        None => 2,
    }
}

/// The property profile of one subject (artwork or concept).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    subject_id: String,
    typical: Vec<Property>,
    rigid: Vec<Property>,
}

impl Profile {
    /// Build a profile, checking that names are non-empty and unique, that
    /// every property sits in the set matching its kind, and that no name is
    /// both typical and rigid.
    pub fn new(
        subject_id: impl Into<String>,
        typical: Vec<Property>,
        rigid: Vec<Property>,
    ) -> ProfileResult<Self> {
        let subject_id = subject_id.into();
        if subject_id.trim().is_empty() {
            return Err(ProfileError::EmptyName {
                subject: subject_id,
            });
        }

        check_set(&subject_id, &typical, PropertyKind::Typical)?;
        check_set(&subject_id, &rigid, PropertyKind::Rigid)?;

        let rigid_names: HashSet<&str> = rigid.iter().map(|p| p.name.as_str()).collect();
        if let Some(p) = typical.iter().find(|p| rigid_names.contains(p.name.as_str())) {
            return Err(ProfileError::OverlappingKinds {
                subject: subject_id,
                name: p.name.clone(),
            });
        }

        Ok(Self {
            subject_id,
            typical,
            rigid,
        })
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Typical properties, in insertion order.
    pub fn typical(&self) -> &[Property] {
        &self.typical
    }

    /// Rigid properties, in insertion order.
    pub fn rigid(&self) -> &[Property] {
        &self.rigid
    }

    /// Look up a typical property by name.
    pub fn typical_named(&self, name: &str) -> Option<&Property> {
        self.typical.iter().find(|p| p.name == name)
    }

    pub fn has_typical(&self, name: &str) -> bool {
        self.typical_named(name).is_some()
    }

    /// Whether the subject holds `name`, typically or rigidly.
    pub fn exhibits(&self, name: &str) -> bool {
        self.has_typical(name) || self.rigid.iter().any(|p| p.name == name)
    }

    /// A copy of this profile with every property tagged with `provenance`.
    pub fn tagged(&self, provenance: Provenance) -> Self {
        let tag = |props: &[Property]| -> Vec<Property> {
            props
                .iter()
                .cloned()
                .map(|p| p.with_provenance(provenance))
                .collect()
        };
        Self {
            subject_id: self.subject_id.clone(),
            typical: tag(&self.typical),
            rigid: tag(&self.rigid),
        }
    }
}

fn check_set(subject: &str, props: &[Property], kind: PropertyKind) -> ProfileResult<()> {
    let mut seen = HashSet::new();
    for p in props {
        if p.name.trim().is_empty() || p.name == "-" {
            return Err(ProfileError::EmptyName {
                subject: subject.to_string(),
            });
        }
        if p.kind != kind {
            return Err(ProfileError::WrongKind {
                subject: subject.to_string(),
                name: p.name.clone(),
                expected: kind.to_string(),
                actual: p.kind.to_string(),
            });
        }
        if !seen.insert(p.name.as_str()) {
            return Err(ProfileError::DuplicateProperty {
                subject: subject.to_string(),
                name: p.name.clone(),
            });
        }
    }
    Ok(())
}
