//! Embedded oracle: contradiction by negation and declared disjointness.
//!
//! A set of properties is inconsistent when it holds both `p` and `-p`, or
//! both members of a pair declared disjoint (e.g. `happy` / `sad`). Rigid and
//! typical properties are checked together, so a typical `loud` clashes with
//! a rigid `-loud` just as two rigid properties would.

use std::collections::HashSet;
use std::time::Duration;

use crate::error::OracleResult;
use crate::property::Property;

use super::{OracleSession, ReasoningOracle};

/// Consistency by negation and a fixed list of disjoint property pairs.
#[derive(Debug, Clone, Default)]
pub struct DisjointnessOracle {
    disjoint: Vec<(String, String)>,
}

impl DisjointnessOracle {
    /// An oracle that only knows `p` / `-p` contradictions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `a` and `b` mutually exclusive.
    pub fn with_disjoint(mut self, a: impl Into<String>, b: impl Into<String>) -> Self {
        self.disjoint.push((a.into(), b.into()));
        self
    }

    /// Build from a list of declared pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            disjoint: pairs.into_iter().collect(),
        }
    }

    /// The first contradiction found in `props`, if any.
    pub fn conflict<'a>(&'a self, props: &'a [&'a Property]) -> Option<(&'a str, &'a str)> {
        let names: HashSet<&str> = props.iter().map(|p| p.name.as_str()).collect();

        for p in props {
            if p.is_negated() && names.contains(p.base_name()) {
                return Some((p.base_name(), p.name.as_str()));
            }
        }

        self.disjoint
            .iter()
            .find(|(a, b)| names.contains(a.as_str()) && names.contains(b.as_str()))
            .map(|(a, b)| (a.as_str(), b.as_str()))
    }
}

impl ReasoningOracle for DisjointnessOracle {
    fn name(&self) -> &str {
        "builtin"
    }

    fn open_session(&self, _timeout: Duration) -> OracleResult<Box<dyn OracleSession + '_>> {
        Ok(Box::new(DisjointnessSession { oracle: self }))
    }
}

struct DisjointnessSession<'a> {
    oracle: &'a DisjointnessOracle,
}

impl OracleSession for DisjointnessSession<'_> {
    fn check_consistency(
        &mut self,
        rigid: &[Property],
        typical: &[Property],
    ) -> OracleResult<bool> {
        let all: Vec<&Property> = rigid.iter().chain(typical).collect();
        match self.oracle.conflict(&all) {
            Some((a, b)) => {
                tracing::debug!(a, b, "builtin oracle: contradiction");
                Ok(false)
            }
            None => Ok(true),
        }
    }
}
