//! Reasoning oracle: the consistency capability the combination engine relies on.
//!
//! The engine never talks to a reasoner directly. It opens one
//! [`OracleSession`] per combination through [`ReasoningOracle::open_session`],
//! asks it whether sets of properties are consistent, and drops it when the
//! combination ends. Dropping a session releases whatever it holds (for the
//! process oracle, the child process), whichever way the combination exits.
//!
//! Two implementations ship with the crate:
//!
//! - [`DisjointnessOracle`]: embedded; `p`/`-p` pairs and declared disjoint
//!   pairs are contradictions
//! - [`ProcessOracle`]: an external reasoner driven over stdin/stdout

pub mod disjoint;
pub mod process;

use std::time::Duration;

pub use disjoint::DisjointnessOracle;
pub use process::ProcessOracle;

use crate::error::OracleResult;
use crate::property::Property;

/// A source of consistency sessions.
pub trait ReasoningOracle: Send + Sync {
    /// Short human-readable name, used in logs.
    fn name(&self) -> &str;

    /// Acquire a session for one combination.
    ///
    /// `timeout` bounds the whole session: once it has elapsed, further
    /// checks fail with [`OracleError::Timeout`](crate::error::OracleError::Timeout).
    fn open_session(&self, timeout: Duration) -> OracleResult<Box<dyn OracleSession + '_>>;
}

/// A scoped handle to the reasoner, valid for one combination.
pub trait OracleSession {
    /// Whether a concept holding every property of `rigid` plus every
    /// property of `typical` is free of contradictions.
    fn check_consistency(
        &mut self,
        rigid: &[Property],
        typical: &[Property],
    ) -> OracleResult<bool>;
}
