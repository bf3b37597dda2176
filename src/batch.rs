//! Work-lists of independent units and their structured reports.
//!
//! A combination batch is a list of [`CombinationUnit`]s, each producing at
//! most one output file. Units share no mutable state. Units run alone until
//! one of them reaches the reasoning oracle, which tells a broken environment
//! from a bad pair; the rest may then be dispatched to the rayon pool.
//!
//! Failure policy:
//!
//! - Oracle unavailable on the first attempt to reach it: the whole run fails.
//! - Oracle unavailable later: units not yet started are halted; outputs
//!   already written stay.
//! - Anything else is local to its unit and lands in the report. A unit that
//!   produces no output also removes its output from an earlier run.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rayon::prelude::*;
use serde::Serialize;

use crate::combine::engine::{CombinationEngine, DEFAULT_ORACLE_TIMEOUT};
use crate::combine::{CombinationRequest, InheritanceFailure, combined_id, prepare};
use crate::config::DegariConfig;
use crate::error::{
    BatchError, BatchResult, CombineError, DegariResult, OracleError, ProfileError, ProfileResult,
};
use crate::library::ConceptLibrary;
use crate::oracle::ReasoningOracle;
use crate::profile_file;
use crate::property::Profile;
use crate::recommend::{ConceptRanking, RecommendSettings, RecommendationReport, recommend_with};

/// How a run ended, for the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    /// The batch completed but some units failed.
    Partial,
    Fatal,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Fatal => 1,
            Self::Partial => 2,
        }
    }
}

/// A source profile: a concept in the library or a profile file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileRef {
    Concept(String),
    File(PathBuf),
}

impl ProfileRef {
    /// An existing file path is a file; anything else names a concept.
    pub fn from_arg(arg: &str) -> Self {
        let path = Path::new(arg);
        if path.is_file() {
            Self::File(path.to_path_buf())
        } else {
            Self::Concept(arg.to_string())
        }
    }

    /// The subject id this reference resolves to.
    pub fn label(&self) -> String {
        match self {
            Self::Concept(id) => id.clone(),
            Self::File(path) => profile_file::subject_id_from_path(path)
                .unwrap_or_else(|_| path.display().to_string()),
        }
    }

    pub fn load(&self, library: Option<&ConceptLibrary>) -> ProfileResult<Profile> {
        match (self, library) {
            (Self::File(path), _) => profile_file::read_profile(path),
            (Self::Concept(id), Some(library)) => library.load(id),
            (Self::Concept(id), None) => Err(ProfileError::UnknownConcept { id: id.clone() }),
        }
    }
}

/// One HEAD × MODIFIER combination to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinationUnit {
    pub head: ProfileRef,
    pub modifier: ProfileRef,
}

impl CombinationUnit {
    pub fn new(head: ProfileRef, modifier: ProfileRef) -> Self {
        Self { head, modifier }
    }

    pub fn concepts(head: impl Into<String>, modifier: impl Into<String>) -> Self {
        Self::new(ProfileRef::Concept(head.into()), ProfileRef::Concept(modifier.into()))
    }

    pub fn subject_id(&self) -> String {
        combined_id(&self.head.label(), &self.modifier.label())
    }
}

/// Every ordered pair of distinct library concepts.
pub fn library_units(library: &ConceptLibrary) -> ProfileResult<Vec<CombinationUnit>> {
    Ok(library
        .pairs()?
        .into_iter()
        .map(|(head, modifier)| CombinationUnit::concepts(head, modifier))
        .collect())
}

#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub max_inherited: usize,
    pub oracle_timeout: Duration,
    pub parallel: bool,
    pub output_dir: PathBuf,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_inherited: 2,
            oracle_timeout: DEFAULT_ORACLE_TIMEOUT,
            parallel: false,
            output_dir: PathBuf::from("combinations"),
        }
    }
}

impl BatchSettings {
    pub fn from_config(config: &DegariConfig) -> Self {
        Self {
            max_inherited: config.combine.max_inherited,
            oracle_timeout: config.combine.oracle_timeout(),
            parallel: config.combine.parallel,
            output_dir: config.library.output_dir.clone(),
        }
    }
}

/// A unit that produced its output file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinationSummary {
    pub subject_id: String,
    pub path: PathBuf,
    pub inherited: Vec<String>,
}

/// A unit that produced no output, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitFailure {
    pub subject_id: String,
    pub reason: String,
}

/// Outcome of a combination batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub succeeded: Vec<CombinationSummary>,
    /// Rigid cores that contradict each other (`inheritance_ok == false`).
    pub skipped_inconsistent: Vec<UnitFailure>,
    /// Invalid input, oracle timeouts and oracle errors.
    pub failed: Vec<UnitFailure>,
    /// Units never started because the oracle went away mid-batch.
    pub halted: Vec<String>,
}

impl BatchReport {
    pub fn exit_status(&self) -> ExitStatus {
        if self.skipped_inconsistent.is_empty() && self.failed.is_empty() && self.halted.is_empty()
        {
            ExitStatus::Success
        } else {
            ExitStatus::Partial
        }
    }

    /// Every unit without an output, by subject id.
    pub fn failures(&self) -> Vec<UnitFailure> {
        self.skipped_inconsistent
            .iter()
            .chain(&self.failed)
            .cloned()
            .chain(self.halted.iter().map(|s| UnitFailure {
                subject_id: s.clone(),
                reason: "halted: reasoning oracle unavailable".into(),
            }))
            .collect()
    }

    fn record(&mut self, outcome: UnitOutcome) {
        match outcome {
            UnitOutcome::Succeeded(summary) => self.succeeded.push(summary),
            UnitOutcome::Inconsistent(failure) => self.skipped_inconsistent.push(failure),
            UnitOutcome::Failed(failure) | UnitOutcome::Unavailable(failure, _) => {
                self.failed.push(failure)
            }
            UnitOutcome::Halted(subject) => self.halted.push(subject),
        }
    }
}

enum UnitOutcome {
    Succeeded(CombinationSummary),
    Inconsistent(UnitFailure),
    Failed(UnitFailure),
    Unavailable(UnitFailure, OracleError),
    Halted(String),
}

/// Run every unit, writing one profile per successful combination into
/// `settings.output_dir`.
pub fn run_combinations(
    units: &[CombinationUnit],
    library: Option<&ConceptLibrary>,
    oracle: &dyn ReasoningOracle,
    settings: &BatchSettings,
) -> BatchResult<BatchReport> {
    std::fs::create_dir_all(&settings.output_dir).map_err(|source| BatchError::OutputDir {
        path: settings.output_dir.display().to_string(),
        source,
    })?;

    let mut report = BatchReport::default();

    // Units that fail before reaching the oracle say nothing about it.
    let mut next = units.len();
    for (idx, unit) in units.iter().enumerate() {
        let request = match load_request(unit, library, settings) {
            Ok(request) => request,
            Err(outcome) => {
                report.record(settle(unit, outcome, settings));
                continue;
            }
        };
        match combine_unit(&request, oracle, settings) {
            UnitOutcome::Unavailable(failure, source) => {
                return Err(BatchError::OracleUnavailable {
                    subject: failure.subject_id,
                    source,
                });
            }
            outcome => report.record(settle(unit, outcome, settings)),
        }
        next = idx + 1;
        break;
    }
    let rest = &units[next..];

    let halted = AtomicBool::new(false);
    let step = |unit: &CombinationUnit| {
        if halted.load(Ordering::Acquire) {
            return UnitOutcome::Halted(unit.subject_id());
        }
        let outcome = run_unit(unit, library, oracle, settings);
        if matches!(outcome, UnitOutcome::Unavailable(..)) {
            tracing::error!(subject = %unit.subject_id(), "reasoning oracle lost, halting batch");
            halted.store(true, Ordering::Release);
        }
        outcome
    };

    let outcomes: Vec<UnitOutcome> = if settings.parallel {
        rest.par_iter().map(&step).collect()
    } else {
        rest.iter().map(&step).collect()
    };
    for outcome in outcomes {
        report.record(outcome);
    }

    tracing::info!(
        succeeded = report.succeeded.len(),
        skipped_inconsistent = report.skipped_inconsistent.len(),
        failed = report.failed.len(),
        halted = report.halted.len(),
        "combination batch complete"
    );
    Ok(report)
}

fn run_unit(
    unit: &CombinationUnit,
    library: Option<&ConceptLibrary>,
    oracle: &dyn ReasoningOracle,
    settings: &BatchSettings,
) -> UnitOutcome {
    let outcome = match load_request(unit, library, settings) {
        Ok(request) => combine_unit(&request, oracle, settings),
        Err(outcome) => outcome,
    };
    settle(unit, outcome, settings)
}

/// Drop the output of an earlier run when this one produced none.
fn settle(unit: &CombinationUnit, outcome: UnitOutcome, settings: &BatchSettings) -> UnitOutcome {
    if matches!(
        outcome,
        UnitOutcome::Inconsistent(_) | UnitOutcome::Failed(_) | UnitOutcome::Unavailable(..)
    ) {
        let subject_id = unit.subject_id();
        match profile_file::remove_combination(&settings.output_dir, &subject_id) {
            Ok(true) => tracing::info!(subject = %subject_id, "stale combination output removed"),
            Ok(false) => {}
            Err(e) => tracing::warn!(subject = %subject_id, error = %e, "stale output not removed"),
        }
    }
    outcome
}

fn unit_failed(subject_id: &str, reason: String) -> UnitOutcome {
    tracing::warn!(subject = %subject_id, %reason, "combination failed");
    UnitOutcome::Failed(UnitFailure {
        subject_id: subject_id.to_string(),
        reason,
    })
}

/// Load both profiles and build the request, without touching the oracle.
fn load_request(
    unit: &CombinationUnit,
    library: Option<&ConceptLibrary>,
    settings: &BatchSettings,
) -> Result<CombinationRequest, UnitOutcome> {
    let loaded = unit
        .head
        .load(library)
        .and_then(|head| unit.modifier.load(library).map(|modifier| (head, modifier)));
    let (head, modifier) =
        loaded.map_err(|e| unit_failed(&unit.subject_id(), e.to_string()))?;
    prepare(&head, &modifier, settings.max_inherited)
        .map_err(|e| unit_failed(&unit.subject_id(), e.to_string()))
}

fn combine_unit(
    request: &CombinationRequest,
    oracle: &dyn ReasoningOracle,
    settings: &BatchSettings,
) -> UnitOutcome {
    let subject_id = request.subject_id();
    let engine = CombinationEngine::new(oracle).with_timeout(settings.oracle_timeout);
    match engine.combine(request) {
        Ok(result) if result.inheritance_ok => {
            match profile_file::write_combination(&settings.output_dir, &result) {
                Ok(path) => UnitOutcome::Succeeded(CombinationSummary {
                    subject_id: result.subject_id.clone(),
                    path,
                    inherited: result.inherited_names().iter().map(|s| s.to_string()).collect(),
                }),
                Err(e) => unit_failed(&subject_id, e.to_string()),
            }
        }
        Ok(result) => {
            let reason = result
                .failure
                .as_ref()
                .map_or_else(|| "inheritance failed".to_string(), |f| f.to_string());
            match result.failure {
                Some(InheritanceFailure::Timeout { .. }) => unit_failed(&subject_id, reason),
                _ => UnitOutcome::Inconsistent(UnitFailure { subject_id, reason }),
            }
        }
        Err(CombineError::Oracle(e @ OracleError::Unavailable { .. })) => {
            let reason = e.to_string();
            UnitOutcome::Unavailable(UnitFailure { subject_id, reason }, e)
        }
        Err(e) => unit_failed(&subject_id, e.to_string()),
    }
}

/// Outcome of ranking a corpus against a set of concepts.
#[derive(Debug, Clone, Default)]
pub struct RecommendRun {
    pub report: RecommendationReport,
    pub rankings: Vec<ConceptRanking>,
    /// Concept files that could not be read.
    pub failed: Vec<UnitFailure>,
}

impl RecommendRun {
    pub fn exit_status(&self) -> ExitStatus {
        if self.failed.is_empty() {
            ExitStatus::Success
        } else {
            ExitStatus::Partial
        }
    }
}

/// Rank every artwork profile in `artworks_dir` against the concept output
/// at `concepts`, or against every combination output in that directory.
///
/// An unreadable artwork corpus fails the run; an unreadable concept only
/// fails that concept.
pub fn recommend_paths(
    artworks_dir: &Path,
    concepts: &Path,
    settings: &RecommendSettings,
) -> DegariResult<RecommendRun> {
    let artworks = profile_file::read_profiles_dir(artworks_dir)?;
    let mut run = RecommendRun {
        report: RecommendationReport::new(artworks.len()),
        ..Default::default()
    };

    let files = if concepts.is_dir() {
        let mut selected = Vec::new();
        for path in profile_file::list_profile_files(concepts)? {
            match profile_file::is_result_file(&path) {
                Ok(true) => selected.push(path),
                Ok(false) => {}
                Err(e) => run.failed.push(concept_failure(&path, &e)),
            }
        }
        selected
    } else {
        vec![concepts.to_path_buf()]
    };

    for path in files {
        match profile_file::read_combination(&path) {
            Ok(concept) => {
                let ranking = recommend_with(&artworks, &concept, settings);
                run.report.add(&ranking);
                run.rankings.push(ranking);
            }
            Err(e) => run.failed.push(concept_failure(&path, &e)),
        }
    }

    tracing::info!(
        concepts = run.rankings.len(),
        failed = run.failed.len(),
        covered = run.report.covered().len(),
        artworks = run.report.total_artworks(),
        "recommendation run complete"
    );
    Ok(run)
}

fn concept_failure(path: &Path, err: &ProfileError) -> UnitFailure {
    tracing::warn!(path = %path.display(), error = %err, "concept skipped");
    UnitFailure {
        subject_id: profile_file::subject_id_from_path(path)
            .unwrap_or_else(|_| path.display().to_string()),
        reason: err.to_string(),
    }
}
