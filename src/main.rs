//! degari CLI: conceptual combination and artwork re-classification.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use degari::batch::{self, BatchReport, BatchSettings, ExitStatus, ProfileRef, RecommendRun};
use degari::combine::engine::CombinationEngine;
use degari::combine::{CandidateOutcome, CombinationResult, prepare};
use degari::config::DegariConfig;
use degari::profile_file;

#[derive(Parser)]
#[command(
    name = "degari",
    version,
    about = "Combine concepts into novel ones and re-classify artworks against them"
)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG still wins when set).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the JSON combination request for HEAD and MODIFIER.
    Prepare {
        /// Profile file or library concept id.
        head: String,
        /// Profile file or library concept id.
        modifier: String,
        #[arg(long)]
        max_inherited: Option<usize>,
    },

    /// Combine one HEAD/MODIFIER pair into a novel concept.
    Combine {
        /// Profile file or library concept id.
        head: String,
        /// Profile file or library concept id.
        modifier: String,
        /// Maximum number of inherited typical properties.
        #[arg(long)]
        max_inherited: Option<usize>,
        /// Output directory for the combined profile.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Combine every ordered pair of concepts in the library.
    CombineAll {
        #[arg(long)]
        max_inherited: Option<usize>,
        #[arg(long)]
        out: Option<PathBuf>,
        /// Run independent pairs on a worker pool.
        #[arg(long)]
        parallel: bool,
    },

    /// Rank artworks against novel concepts and write the TSV reports.
    Recommend {
        /// Directory of artwork profiles.
        artworks: PathBuf,
        /// A combined profile, or a directory of them.
        concepts: PathBuf,
        /// Directory for recommendations.tsv and resume.tsv.
        #[arg(long, default_value = ".")]
        out: PathBuf,
        #[arg(long)]
        min_match_rate: Option<f64>,
        #[arg(long)]
        max_per_concept: Option<usize>,
        /// Rigid properties of a concept an artwork must exhibit.
        #[arg(long)]
        min_anchors: Option<usize>,
        /// Drop artworks exhibiting `p` for concepts holding `-p`.
        #[arg(long)]
        exclude_negated: bool,
    },
}

fn main() -> Result<ExitCode> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = DegariConfig::load_or_default(cli.config.as_deref())?;
    let library = config.library.library();

    let status = match cli.command {
        Commands::Prepare {
            head,
            modifier,
            max_inherited,
        } => {
            let head = ProfileRef::from_arg(&head).load(Some(&library))?;
            let modifier = ProfileRef::from_arg(&modifier).load(Some(&library))?;
            let request = prepare(
                &head,
                &modifier,
                max_inherited.unwrap_or(config.combine.max_inherited),
            )?;
            println!(
                "{}",
                serde_json::to_string_pretty(&request).into_diagnostic()?
            );
            ExitStatus::Success
        }

        Commands::Combine {
            head,
            modifier,
            max_inherited,
            out,
        } => {
            let head = ProfileRef::from_arg(&head).load(Some(&library))?;
            let modifier = ProfileRef::from_arg(&modifier).load(Some(&library))?;
            let request = prepare(
                &head,
                &modifier,
                max_inherited.unwrap_or(config.combine.max_inherited),
            )?;

            let oracle = config.oracle.build();
            let result = CombinationEngine::new(oracle.as_ref())
                .with_timeout(config.combine.oracle_timeout())
                .combine(&request)?;
            print_combination(&result);

            if result.inheritance_ok {
                let out = out.unwrap_or_else(|| config.library.output_dir.clone());
                std::fs::create_dir_all(&out).into_diagnostic()?;
                let path = profile_file::write_combination(&out, &result)?;
                println!("Wrote {}", path.display());
                ExitStatus::Success
            } else {
                ExitStatus::Partial
            }
        }

        Commands::CombineAll {
            max_inherited,
            out,
            parallel,
        } => {
            let mut settings = BatchSettings::from_config(&config);
            if let Some(n) = max_inherited {
                settings.max_inherited = n;
            }
            if let Some(out) = out {
                settings.output_dir = out;
            }
            settings.parallel |= parallel;

            let units = batch::library_units(&library)?;
            if units.is_empty() {
                miette::bail!(
                    "no concepts found under {} or {}",
                    library.typical_dir().display(),
                    library.rigid_dir().display()
                );
            }
            let oracle = config.oracle.build();
            let report =
                batch::run_combinations(&units, Some(&library), oracle.as_ref(), &settings)?;
            print_batch(&report);
            report.exit_status()
        }

        Commands::Recommend {
            artworks,
            concepts,
            out,
            min_match_rate,
            max_per_concept,
            min_anchors,
            exclude_negated,
        } => {
            let mut settings = config.recommend.settings();
            if let Some(rate) = min_match_rate {
                settings.min_match_rate = rate;
            }
            if max_per_concept.is_some() {
                settings.max_per_concept = max_per_concept;
            }
            if let Some(n) = min_anchors {
                settings.min_anchors = n;
            }
            settings.exclude_negated |= exclude_negated;
            settings.validate()?;

            let run = batch::recommend_paths(&artworks, &concepts, &settings)?;
            std::fs::create_dir_all(&out).into_diagnostic()?;
            let (recs, resume) = run.report.write_tsv(&out)?;
            print_recommendations(&run);
            println!("Wrote {} and {}", recs.display(), resume.display());
            run.exit_status()
        }
    };

    Ok(ExitCode::from(status.code()))
}

fn print_combination(result: &CombinationResult) {
    println!("Combination {}:", result.subject_id);
    for verdict in &result.trace {
        let mark = match verdict.outcome {
            CandidateOutcome::Accepted => "+",
            CandidateOutcome::Inconsistent => "x",
            CandidateOutcome::AlreadyRigid => "=",
            CandidateOutcome::CapReached => ".",
        };
        let strength = verdict
            .property
            .strength
            .map(|s| format!("{s}"))
            .unwrap_or_else(|| "-".into());
        println!(
            "  {mark} {} ({strength}, {})",
            verdict.property.name,
            verdict
                .property
                .provenance
                .map(|p| p.to_string())
                .unwrap_or_default()
        );
    }
    match &result.failure {
        Some(failure) => println!("  no concept produced: {failure}"),
        None => println!("  inherited: {}", result.inherited_names().join(", ")),
    }
}

fn print_batch(report: &BatchReport) {
    println!(
        "Combinations: {} succeeded, {} skipped (inconsistent), {} failed, {} halted",
        report.succeeded.len(),
        report.skipped_inconsistent.len(),
        report.failed.len(),
        report.halted.len()
    );
    for failure in report.failures() {
        println!("  {}: {}", failure.subject_id, failure.reason);
    }
}

fn print_recommendations(run: &RecommendRun) {
    for ranking in &run.rankings {
        println!(
            "{}: {} of {} artworks",
            ranking.concept_id,
            ranking.recommendations.len(),
            ranking.evaluated
        );
        for rec in &ranking.recommendations {
            let because: Vec<&str> = rec.explanation.iter().map(|p| p.name.as_str()).collect();
            println!(
                "  {:.3} {} ({})",
                rec.score,
                rec.artwork_id,
                because.join(", ")
            );
        }
    }
    println!(
        "Classified {} of {} artworks ({:.1}%)",
        run.report.covered().len(),
        run.report.total_artworks(),
        run.report.coverage_percent()
    );
    for failure in &run.failed {
        println!("  failed {}: {}", failure.subject_id, failure.reason);
    }
}
