//! End-to-end tests for the degari engines.
//!
//! These drive the public library API over real files: source profiles on
//! disk are combined into novel concepts, written back, and used to rank an
//! artwork corpus into the TSV reports.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use degari::batch::{
    self, BatchSettings, CombinationUnit, ExitStatus, ProfileRef, run_combinations,
};
use degari::combine::engine::CombinationEngine;
use degari::combine::{CandidateOutcome, prepare};
use degari::error::{BatchError, OracleError, OracleResult};
use degari::library::ConceptLibrary;
use degari::oracle::{DisjointnessOracle, OracleSession, ProcessOracle, ReasoningOracle};
use degari::profile_file;
use degari::recommend::{RECOMMENDATIONS_FILE, RESUME_FILE, RecommendSettings};

fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

fn settings(out: &Path, max_inherited: usize) -> BatchSettings {
    BatchSettings {
        max_inherited,
        output_dir: out.to_path_buf(),
        ..Default::default()
    }
}

fn joy_blues(dir: &Path) -> CombinationUnit {
    let joy = write(dir, "joy.txt", "happy: 0.9\nenergetic: 0.6\n");
    let blues = write(dir, "blues.txt", "sad: 0.8\nslow: 0.5\n");
    CombinationUnit::new(ProfileRef::File(joy), ProfileRef::File(blues))
}

fn happy_sad_oracle() -> DisjointnessOracle {
    DisjointnessOracle::new().with_disjoint("happy", "sad")
}

#[test]
fn combination_skips_inconsistent_candidate_and_writes_result() {
    let dir = tempfile::TempDir::new().unwrap();
    let out = dir.path().join("out");
    let unit = joy_blues(&dir.path().join("src"));

    let report = run_combinations(&[unit], None, &happy_sad_oracle(), &settings(&out, 3)).unwrap();
    assert_eq!(report.exit_status(), ExitStatus::Success);
    assert_eq!(report.succeeded[0].inherited, vec!["happy", "energetic", "slow"]);

    let path = out.join("joy_blues.txt");
    assert!(profile_file::is_result_file(&path).unwrap());
    let concept = profile_file::read_combination(&path).unwrap();
    assert_eq!(concept.inherited_names(), vec!["happy", "energetic", "slow"]);
}

#[test]
fn combination_respects_cap_of_one() {
    let dir = tempfile::TempDir::new().unwrap();
    let out = dir.path().join("out");
    let unit = joy_blues(&dir.path().join("src"));

    let report = run_combinations(&[unit], None, &happy_sad_oracle(), &settings(&out, 1)).unwrap();
    assert_eq!(report.succeeded[0].inherited, vec!["happy"]);
    let concept = profile_file::read_combination(&out.join("joy_blues.txt")).unwrap();
    assert_eq!(concept.inherited_names(), vec!["happy"]);
}

#[test]
fn combine_is_deterministic_and_preserves_rigid_union() {
    let dir = tempfile::TempDir::new().unwrap();
    let head = write(dir.path(), "rock.txt", "loud: 0.8\nfast: 0.8\nrigid: guitar\n");
    let modifier = write(
        dir.path(),
        "folk.txt",
        "-loud: 0.7\nacoustic: 0.9\nrigid: vocals\nrigid: guitar\n",
    );
    let head = profile_file::read_profile(&head).unwrap();
    let modifier = profile_file::read_profile(&modifier).unwrap();
    let request = prepare(&head, &modifier, 5).unwrap();
    let oracle = DisjointnessOracle::new();
    let engine = CombinationEngine::new(&oracle);

    let first = engine.combine(&request).unwrap();
    let second = engine.combine(&request).unwrap();
    assert_eq!(first, second);

    let rigid: Vec<&str> = first.rigid.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(rigid, vec!["guitar", "vocals"]);
    // acoustic 0.9, then fast/loud at 0.8 (HEAD, by name), then -loud.
    assert_eq!(first.inherited_names(), vec!["acoustic", "fast", "loud"]);
    assert_eq!(first.trace[3].outcome, CandidateOutcome::Inconsistent);
}

#[test]
fn rigid_conflict_writes_nothing_and_batch_continues() {
    let dir = tempfile::TempDir::new().unwrap();
    let src = dir.path().join("src");
    let out = dir.path().join("out");
    let metal = write(&src, "metal.txt", "loud: 0.9\nrigid: distorted\n");
    let ambient = write(&src, "ambient.txt", "calm: 0.9\nrigid: -distorted\n");
    let pop = write(&src, "pop.txt", "catchy: 0.8\n");

    let units = vec![
        CombinationUnit::new(ProfileRef::File(metal.clone()), ProfileRef::File(ambient)),
        CombinationUnit::new(ProfileRef::File(metal), ProfileRef::File(pop)),
    ];
    let report =
        run_combinations(&units, None, &DisjointnessOracle::new(), &settings(&out, 2)).unwrap();

    assert_eq!(report.skipped_inconsistent.len(), 1);
    assert_eq!(report.skipped_inconsistent[0].subject_id, "metal_ambient");
    assert!(!out.join("metal_ambient.txt").exists());
    assert_eq!(report.succeeded.len(), 1);
    assert!(out.join("metal_pop.txt").exists());
    assert_eq!(report.exit_status(), ExitStatus::Partial);
}

#[test]
fn recommendation_run_ranks_and_writes_reports() {
    let dir = tempfile::TempDir::new().unwrap();
    let combos = dir.path().join("combinations");
    let unit = joy_blues(&dir.path().join("src"));
    run_combinations(&[unit], None, &happy_sad_oracle(), &settings(&combos, 3)).unwrap();
    // A plain source profile next to the outputs is not a concept.
    write(&combos, "notes.txt", "happy: 1\n");

    let artworks = dir.path().join("artworks");
    write(&artworks, "t1.txt", "happy: 1\nslow: 1\n");
    write(&artworks, "t2.txt", "loud: 1\n");

    let run = batch::recommend_paths(&artworks, &combos, &RecommendSettings::default()).unwrap();
    assert_eq!(run.exit_status(), ExitStatus::Success);
    assert_eq!(run.rankings.len(), 1);

    let ranking = &run.rankings[0];
    assert_eq!(ranking.evaluated, 2);
    assert_eq!(ranking.recommendations.len(), 1);
    let rec = &ranking.recommendations[0];
    assert_eq!(rec.artwork_id, "t1");
    assert!((rec.score - 2.0 / 3.0).abs() < 1e-12);
    assert!((run.report.coverage_percent() - 50.0).abs() < 1e-9);

    let reports = dir.path().join("reports");
    std::fs::create_dir_all(&reports).unwrap();
    let (recs, resume) = run.report.write_tsv(&reports).unwrap();
    assert_eq!(std::fs::read_to_string(recs).unwrap(), "t1\tjoy_blues\n");
    assert_eq!(std::fs::read_to_string(resume).unwrap(), "joy_blues\t1\n");
}

#[test]
fn rerunning_recommendations_reproduces_identical_tables() {
    let dir = tempfile::TempDir::new().unwrap();
    let combos = dir.path().join("combinations");
    write(&combos, "a_b.txt", "result: happy: 0.9\nresult: slow: 0.5\n");
    write(&combos, "c_d.txt", "result: loud: 0.7\n");
    let artworks = dir.path().join("artworks");
    write(&artworks, "t1.txt", "happy: 1\n");
    write(&artworks, "t2.txt", "slow: 1\nloud: 1\n");
    write(&artworks, "t3.txt", "quiet: 1\n");

    let mut tables = Vec::new();
    for _ in 0..2 {
        let run =
            batch::recommend_paths(&artworks, &combos, &RecommendSettings::default()).unwrap();
        run.report.write_tsv(dir.path()).unwrap();
        tables.push((
            std::fs::read_to_string(dir.path().join(RECOMMENDATIONS_FILE)).unwrap(),
            std::fs::read_to_string(dir.path().join(RESUME_FILE)).unwrap(),
        ));
    }
    assert_eq!(tables[0], tables[1]);
    assert_eq!(tables[0].1, "a_b\t2\nc_d\t1\n");
}

#[test]
fn concept_without_inherited_properties_gets_zero_row() {
    let dir = tempfile::TempDir::new().unwrap();
    let concept = write(dir.path(), "x_y.txt", "rigid: guitar\n");
    let artworks = dir.path().join("artworks");
    write(&artworks, "t1.txt", "happy: 1\n");

    let run = batch::recommend_paths(&artworks, &concept, &RecommendSettings::default()).unwrap();
    assert!(run.rankings[0].empty_input.is_some());
    assert_eq!(run.report.render_resume(), "x_y\t0\n");
    assert_eq!(run.report.render_recommendations(), "");
}

#[test]
fn unreachable_oracle_on_first_unit_is_fatal() {
    let dir = tempfile::TempDir::new().unwrap();
    let out = dir.path().join("out");
    let unit = joy_blues(&dir.path().join("src"));
    let oracle = ProcessOracle::new("degari-no-such-reasoner", vec![]);

    let err = run_combinations(&[unit], None, &oracle, &settings(&out, 2)).unwrap_err();
    assert!(matches!(err, BatchError::OracleUnavailable { .. }));
    assert!(!out.join("joy_blues.txt").exists());
}

/// Serves a fixed number of sessions, then behaves as if the reasoner vanished.
struct VanishingOracle {
    inner: DisjointnessOracle,
    sessions_left: AtomicUsize,
}

impl ReasoningOracle for VanishingOracle {
    fn name(&self) -> &str {
        "vanishing"
    }

    fn open_session(&self, timeout: Duration) -> OracleResult<Box<dyn OracleSession + '_>> {
        let left = self.sessions_left.load(Ordering::SeqCst);
        if left == 0 {
            return Err(OracleError::Unavailable {
                command: "vanishing".into(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "reasoner gone"),
            });
        }
        self.sessions_left.store(left - 1, Ordering::SeqCst);
        self.inner.open_session(timeout)
    }
}

#[test]
fn oracle_lost_mid_batch_halts_remaining_units_and_keeps_outputs() {
    let dir = tempfile::TempDir::new().unwrap();
    let src = dir.path().join("src");
    let out = dir.path().join("out");
    let a = write(&src, "a.txt", "x: 0.5\n");
    let b = write(&src, "b.txt", "y: 0.5\n");
    let c = write(&src, "c.txt", "z: 0.5\n");
    let units = vec![
        CombinationUnit::new(ProfileRef::File(a.clone()), ProfileRef::File(b.clone())),
        CombinationUnit::new(ProfileRef::File(b.clone()), ProfileRef::File(c.clone())),
        CombinationUnit::new(ProfileRef::File(c), ProfileRef::File(a)),
    ];
    let oracle = VanishingOracle {
        inner: DisjointnessOracle::new(),
        sessions_left: AtomicUsize::new(1),
    };

    let report = run_combinations(&units, None, &oracle, &settings(&out, 2)).unwrap();
    assert_eq!(report.succeeded.len(), 1);
    assert!(out.join("a_b.txt").exists());
    assert_eq!(report.failed[0].subject_id, "b_c");
    assert_eq!(report.halted, vec!["c_a".to_string()]);
    assert_eq!(report.exit_status(), ExitStatus::Partial);
    assert_eq!(report.failures().len(), 2);
}

#[test]
fn library_batch_runs_every_pair_in_parallel() {
    let dir = tempfile::TempDir::new().unwrap();
    let typical = dir.path().join("typical");
    let rigid = dir.path().join("rigid");
    write(&typical, "joy.txt", "happy: 0.9\nenergetic: 0.6\n");
    write(&typical, "blues.txt", "sad: 0.8\nslow: 0.5\n");
    write(&typical, "rock.txt", "loud: 0.8\n");
    write(&rigid, "rock.txt", "guitar\n");
    let library = ConceptLibrary::new(typical, rigid);

    let units = batch::library_units(&library).unwrap();
    assert_eq!(units.len(), 6);

    let sequential = settings(&dir.path().join("seq"), 2);
    let parallel = BatchSettings {
        parallel: true,
        ..settings(&dir.path().join("par"), 2)
    };
    let oracle = happy_sad_oracle();
    let seq = run_combinations(&units, Some(&library), &oracle, &sequential).unwrap();
    let par = run_combinations(&units, Some(&library), &oracle, &parallel).unwrap();

    assert_eq!(seq.exit_status(), ExitStatus::Success);
    let ids = |r: &batch::BatchReport| -> Vec<(String, Vec<String>)> {
        r.succeeded
            .iter()
            .map(|s| (s.subject_id.clone(), s.inherited.clone()))
            .collect()
    };
    assert_eq!(ids(&seq), ids(&par));
    assert_eq!(seq.succeeded.len(), 6);

    let rock_joy = profile_file::read_combination(&dir.path().join("par/rock_joy.txt")).unwrap();
    assert_eq!(rock_joy.inherited_names(), vec!["happy", "loud"]);
    assert_eq!(rock_joy.rigid[0].name, "guitar");
}

#[test]
fn unreachable_oracle_is_fatal_even_after_units_that_never_reached_it() {
    let dir = tempfile::TempDir::new().unwrap();
    let src = dir.path().join("src");
    let out = dir.path().join("out");
    let bad = write(&src, "bad.txt", "happy: very\n");
    let a = write(&src, "a.txt", "x: 0.5\n");
    let b = write(&src, "b.txt", "y: 0.5\n");
    let units = vec![
        CombinationUnit::new(ProfileRef::File(bad), ProfileRef::File(a.clone())),
        CombinationUnit::new(ProfileRef::File(a.clone()), ProfileRef::File(a.clone())),
        CombinationUnit::new(ProfileRef::File(a.clone()), ProfileRef::File(b.clone())),
        CombinationUnit::new(ProfileRef::File(b), ProfileRef::File(a)),
    ];
    let oracle = ProcessOracle::new("degari-no-such-reasoner", vec![]);

    let err = run_combinations(&units, None, &oracle, &settings(&out, 2)).unwrap_err();
    match err {
        BatchError::OracleUnavailable { subject, .. } => assert_eq!(subject, "a_b"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn combinations_inheriting_nothing_still_get_a_zero_row() {
    let dir = tempfile::TempDir::new().unwrap();
    let src = dir.path().join("src");
    let out = dir.path().join("out");
    let a = write(&src, "a.txt", "x: 0.5\n");
    let b = write(&src, "b.txt", "y: 0.5\n");
    let c = write(&src, "c.txt", "z: 0.5\n");
    let units = vec![
        CombinationUnit::new(ProfileRef::File(a.clone()), ProfileRef::File(b)),
        CombinationUnit::new(ProfileRef::File(a), ProfileRef::File(c)),
    ];
    let report =
        run_combinations(&units, None, &DisjointnessOracle::new(), &settings(&out, 0)).unwrap();
    assert_eq!(report.succeeded.len(), 2);

    let artworks = dir.path().join("artworks");
    write(&artworks, "t1.txt", "x: 1\n");
    let run = batch::recommend_paths(&artworks, &out, &RecommendSettings::default()).unwrap();
    assert_eq!(run.report.render_resume(), "a_b\t0\na_c\t0\n");
    assert_eq!(run.report.render_recommendations(), "");
}

#[test]
fn rerun_without_output_removes_the_previous_result() {
    let dir = tempfile::TempDir::new().unwrap();
    let src = dir.path().join("src");
    let out = dir.path().join("out");
    let metal = write(&src, "metal.txt", "loud: 0.9\nrigid: distorted\n");
    let ambient = write(&src, "ambient.txt", "calm: 0.9\n");
    let units = vec![CombinationUnit::new(
        ProfileRef::File(metal),
        ProfileRef::File(ambient),
    )];

    run_combinations(&units, None, &DisjointnessOracle::new(), &settings(&out, 2)).unwrap();
    assert!(out.join("metal_ambient.txt").exists());

    write(&src, "ambient.txt", "calm: 0.9\nrigid: -distorted\n");
    let report =
        run_combinations(&units, None, &DisjointnessOracle::new(), &settings(&out, 2)).unwrap();
    assert_eq!(report.skipped_inconsistent.len(), 1);
    assert!(!out.join("metal_ambient.txt").exists());

    let artworks = dir.path().join("artworks");
    write(&artworks, "t1.txt", "loud: 1\n");
    let run = batch::recommend_paths(&artworks, &out, &RecommendSettings::default()).unwrap();
    assert!(run.rankings.is_empty());
}
