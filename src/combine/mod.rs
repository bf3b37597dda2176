//! Conceptual combination: HEAD + MODIFIER → novel concept.
//!
//! [`prepare`] merges two source profiles into a [`CombinationRequest`] with
//! every property tagged by provenance. The [`engine::CombinationEngine`]
//! then walks the typical candidates in preference order, keeping each one
//! the reasoning oracle accepts as consistent with the rigid core, up to the
//! `max_inherited` cap.

pub mod engine;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{CombineError, CombineResult};
use crate::property::{Profile, Property, Provenance, preference_order};

/// Merged input for one combination, ready for the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinationRequest {
    pub head: Profile,
    pub modifier: Profile,
    pub max_inherited: usize,
}

/// Build a combination request from HEAD and MODIFIER profiles.
///
/// Both profiles are copied with every property tagged with its provenance;
/// the inputs are left untouched.
pub fn prepare(
    head: &Profile,
    modifier: &Profile,
    max_inherited: usize,
) -> CombineResult<CombinationRequest> {
    if head.subject_id() == modifier.subject_id() {
        return Err(CombineError::SameConcept {
            subject: head.subject_id().to_string(),
        });
    }

    Ok(CombinationRequest {
        head: head.tagged(Provenance::Head),
        modifier: modifier.tagged(Provenance::Modifier),
        max_inherited,
    })
}

impl CombinationRequest {
    /// `HEAD_MODIFIER`.
    pub fn subject_id(&self) -> String {
        combined_id(self.head.subject_id(), self.modifier.subject_id())
    }

    /// Union of both rigid sets, HEAD first, deduplicated by name.
    pub fn rigid_union(&self) -> Vec<Property> {
        let mut seen = HashSet::new();
        self.head
            .rigid()
            .iter()
            .chain(self.modifier.rigid())
            .filter(|p| seen.insert(p.name.clone()))
            .cloned()
            .collect()
    }

    /// Typical candidates of both concepts, deduplicated by name and sorted
    /// by [`preference_order`].
    ///
    /// When both sides assert a name, the stronger one survives; on equal
    /// strength the HEAD copy wins.
    pub fn candidates(&self) -> Vec<Property> {
        let mut merged: Vec<Property> = Vec::new();
        for p in self.head.typical().iter().chain(self.modifier.typical()) {
            match merged.iter_mut().find(|m| m.name == p.name) {
                Some(existing) => {
                    if preference_order(p, existing).is_lt() {
                        *existing = p.clone();
                    }
                }
                None => merged.push(p.clone()),
            }
        }
        merged.sort_by(preference_order);
        merged
    }
}

/// Identifier of the novel concept built from `head` and `modifier`.
pub fn combined_id(head: &str, modifier: &str) -> String {
    format!("{head}_{modifier}")
}

/// What happened to one candidate during the inheritance walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateOutcome {
    /// Consistent with the rigid core and the already accepted set.
    Accepted,
    /// The oracle found it inconsistent; dropped for good.
    Inconsistent,
    /// Already holds rigidly for the combined concept.
    AlreadyRigid,
    /// Not evaluated: `max_inherited` properties were already accepted.
    CapReached,
}

/// One step of the inheritance walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateVerdict {
    pub property: Property,
    pub outcome: CandidateOutcome,
}

/// Why a combination could not produce a consistent concept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InheritanceFailure {
    /// The rigid properties of HEAD and MODIFIER contradict each other.
    RigidConflict,
    /// The oracle missed the per-combination deadline.
    Timeout { timeout_ms: u64 },
}

impl std::fmt::Display for InheritanceFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RigidConflict => write!(f, "rigid properties are inconsistent"),
            Self::Timeout { timeout_ms } => write!(f, "oracle timed out after {timeout_ms} ms"),
        }
    }
}

/// The novel concept produced by a combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinationResult {
    pub subject_id: String,
    /// Accepted typical properties, in acceptance order.
    pub inherited_typical: Vec<Property>,
    pub rigid: Vec<Property>,
    pub inheritance_ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<InheritanceFailure>,
    /// Candidates in the order they were considered.
    #[serde(default)]
    pub trace: Vec<CandidateVerdict>,
}

impl CombinationResult {
    /// A result for a concept read back from disk, with no walk trace.
    pub fn completed(
        subject_id: impl Into<String>,
        inherited_typical: Vec<Property>,
        rigid: Vec<Property>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            inherited_typical,
            rigid,
            inheritance_ok: true,
            failure: None,
            trace: Vec::new(),
        }
    }

    pub(crate) fn failed(
        subject_id: String,
        rigid: Vec<Property>,
        failure: InheritanceFailure,
    ) -> Self {
        Self {
            subject_id,
            inherited_typical: Vec::new(),
            rigid,
            inheritance_ok: false,
            failure: Some(failure),
            trace: Vec::new(),
        }
    }

    /// Names of the inherited typical properties.
    pub fn inherited_names(&self) -> Vec<&str> {
        self.inherited_typical.iter().map(|p| p.name.as_str()).collect()
    }

    /// The novel concept as a plain profile (inherited typical + rigid).
    pub fn to_profile(&self) -> crate::error::ProfileResult<Profile> {
        let strip = |props: &[Property]| -> Vec<Property> {
            props
                .iter()
                .cloned()
                .map(|mut p| {
                    p.provenance = None;
                    p
                })
                .collect()
        };
        Profile::new(
            self.subject_id.clone(),
            strip(&self.inherited_typical),
            strip(&self.rigid),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str, typical: &[(&str, f64)], rigid: &[&str]) -> Profile {
        Profile::new(
            id,
            typical
                .iter()
                .map(|(n, s)| Property::typical(*n, *s))
                .collect(),
            rigid.iter().map(|n| Property::rigid(*n)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn prepare_rejects_same_subject() {
        let rock = profile("rock", &[("loud", 0.8)], &[]);
        let err = prepare(&rock, &rock, 3).unwrap_err();
        assert!(matches!(err, CombineError::SameConcept { .. }));
    }

    #[test]
    fn prepare_tags_provenance_and_keeps_everything() {
        let head = profile("pop", &[("catchy", 0.8)], &["melodic"]);
        let modifier = profile("metal", &[("loud", 0.9)], &["distorted"]);
        let req = prepare(&head, &modifier, 2).unwrap();

        assert_eq!(req.subject_id(), "pop_metal");
        assert_eq!(req.head.typical()[0].provenance, Some(Provenance::Head));
        assert_eq!(req.modifier.rigid()[0].provenance, Some(Provenance::Modifier));
        assert_eq!(req.rigid_union().len(), 2);
        assert_eq!(req.candidates().len(), 2);
    }

    #[test]
    fn candidates_keep_stronger_duplicate_and_prefer_head_on_ties() {
        let head = profile("a", &[("dark", 0.4), ("fast", 0.7)], &[]);
        let modifier = profile("b", &[("dark", 0.6), ("fast", 0.7)], &[]);
        let req = prepare(&head, &modifier, 5).unwrap();
        let cands = req.candidates();

        assert_eq!(cands.len(), 2);
        assert_eq!(cands[0].name, "fast");
        assert_eq!(cands[0].provenance, Some(Provenance::Head));
        assert_eq!(cands[1].name, "dark");
        assert_eq!(cands[1].provenance, Some(Provenance::Modifier));
        assert_eq!(cands[1].strength, Some(0.6));
    }

    #[test]
    fn rigid_union_deduplicates_by_name() {
        let head = profile("a", &[], &["guitar", "vocals"]);
        let modifier = profile("b", &[], &["vocals", "drums"]);
        let req = prepare(&head, &modifier, 1).unwrap();
        let names: Vec<String> = req.rigid_union().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["guitar", "vocals", "drums"]);
    }

    #[test]
    fn request_serializes_to_json() {
        let head = profile("pop", &[("catchy", 0.8)], &[]);
        let modifier = profile("rap", &[("spoken", 0.9)], &[]);
        let req = prepare(&head, &modifier, 2).unwrap();
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["max_inherited"], 2);
        assert_eq!(json["head"]["typical"][0]["provenance"], "head");
    }
}
