//! Bounded, preference-ordered, consistency-gated inheritance.
//!
//! For one [`CombinationRequest`]:
//!
//! 1. Open an oracle session (released when `combine` returns).
//! 2. Check that the rigid core alone is consistent; if not, the
//!    combination fails with [`InheritanceFailure::RigidConflict`].
//! 3. Walk the candidates in preference order. Each candidate is checked
//!    together with the rigid core and every candidate accepted so far;
//!    consistent candidates are kept, inconsistent ones are dropped.
//! 4. Stop accepting once `max_inherited` candidates are in.
//!
//! The walk is strictly sequential: each check depends on the set accepted
//! before it.

use std::time::Duration;

use crate::error::{CombineResult, OracleError};
use crate::oracle::ReasoningOracle;
use crate::property::Property;

use super::{
    CandidateOutcome, CandidateVerdict, CombinationRequest, CombinationResult, InheritanceFailure,
};

/// Default per-combination oracle deadline.
pub const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs combinations against a reasoning oracle.
pub struct CombinationEngine<'a> {
    oracle: &'a dyn ReasoningOracle,
    timeout: Duration,
}

impl<'a> CombinationEngine<'a> {
    pub fn new(oracle: &'a dyn ReasoningOracle) -> Self {
        Self {
            oracle,
            timeout: DEFAULT_ORACLE_TIMEOUT,
        }
    }

    /// Set the per-combination oracle deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Combine HEAD and MODIFIER into a novel concept.
    ///
    /// Timeouts and an inconsistent rigid core come back as a result with
    /// `inheritance_ok == false`. Only an unreachable oracle or a protocol
    /// failure is an `Err`.
    pub fn combine(&self, request: &CombinationRequest) -> CombineResult<CombinationResult> {
        let subject_id = request.subject_id();
        let rigid = request.rigid_union();
        let candidates = request.candidates();

        let mut session = self.oracle.open_session(self.timeout)?;

        match session.check_consistency(&rigid, &[]) {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(subject = %subject_id, "rigid core inconsistent, no concept produced");
                return Ok(CombinationResult::failed(
                    subject_id,
                    rigid,
                    InheritanceFailure::RigidConflict,
                ));
            }
            Err(OracleError::Timeout { timeout_ms }) => {
                return Ok(self.timed_out(subject_id, rigid, timeout_ms));
            }
            Err(e) => return Err(e.into()),
        }

        let mut accepted: Vec<Property> = Vec::new();
        let mut trace = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let outcome = if accepted.len() >= request.max_inherited {
                CandidateOutcome::CapReached
            } else if rigid.iter().any(|r| r.name == candidate.name) {
                CandidateOutcome::AlreadyRigid
            } else {
                accepted.push(candidate.clone());
                match session.check_consistency(&rigid, &accepted) {
                    Ok(true) => CandidateOutcome::Accepted,
                    Ok(false) => {
                        accepted.pop();
                        CandidateOutcome::Inconsistent
                    }
                    Err(OracleError::Timeout { timeout_ms }) => {
                        return Ok(self.timed_out(subject_id, rigid, timeout_ms));
                    }
                    Err(e) => return Err(e.into()),
                }
            };

            tracing::debug!(
                subject = %subject_id,
                property = %candidate.name,
                outcome = ?outcome,
                "candidate evaluated"
            );
            trace.push(CandidateVerdict {
                property: candidate,
                outcome,
            });
        }

        let rejected = trace
            .iter()
            .filter(|v| v.outcome == CandidateOutcome::Inconsistent)
            .count();
        tracing::info!(
            subject = %subject_id,
            oracle = self.oracle.name(),
            inherited = accepted.len(),
            rejected,
            max = request.max_inherited,
            "combination complete"
        );

        Ok(CombinationResult {
            subject_id,
            inherited_typical: accepted,
            rigid,
            inheritance_ok: true,
            failure: None,
            trace,
        })
    }

    fn timed_out(
        &self,
        subject_id: String,
        rigid: Vec<Property>,
        timeout_ms: u64,
    ) -> CombinationResult {
        tracing::warn!(
            subject = %subject_id,
            oracle = self.oracle.name(),
            timeout_ms,
            "oracle timed out, combination abandoned"
        );
        CombinationResult::failed(subject_id, rigid, InheritanceFailure::Timeout { timeout_ms })
    }
}
