//! Rich diagnostic error types for the degari engines.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for degari.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, sources) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum DegariError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Combine(#[from] CombineError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Recommend(#[from] RecommendError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Profile errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ProfileError {
    #[error("failed to access profile file: {path}")]
    #[diagnostic(
        code(degari::profile::io),
        help("Check that the file or directory exists and is readable (or writable for outputs).")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed profile line {line} in {path}: {message}")]
    #[diagnostic(
        code(degari::profile::malformed),
        help(
            "Profile lines must be `<name>: <strength>`, `result: <name>: <strength>` \
             or `rigid: <name>`. Blank lines and `#` comments are ignored."
        )
    )]
    Malformed {
        path: String,
        line: usize,
        message: String,
    },

    #[error("property \"{name}\" is listed twice for \"{subject}\"")]
    #[diagnostic(
        code(degari::profile::duplicate),
        help("Each property name may appear at most once per kind in a profile. Remove the duplicate line.")
    )]
    DuplicateProperty { subject: String, name: String },

    #[error("property \"{name}\" of \"{subject}\" is both typical and rigid")]
    #[diagnostic(
        code(degari::profile::overlapping_kinds),
        help(
            "A property is either a default (typical) or an essential (rigid) attribute \
             of a subject, never both. Keep only one of the two lines."
        )
    )]
    OverlappingKinds { subject: String, name: String },

    #[error("property of kind {expected} expected for \"{subject}\", got \"{name}\" as {actual}")]
    #[diagnostic(
        code(degari::profile::wrong_kind),
        help("Typical properties go in the typical set and rigid properties in the rigid set.")
    )]
    WrongKind {
        subject: String,
        name: String,
        expected: String,
        actual: String,
    },

    #[error("empty identifier in profile for \"{subject}\"")]
    #[diagnostic(
        code(degari::profile::empty_name),
        help("Subjects and properties need a non-empty name.")
    )]
    EmptyName { subject: String },

    #[error("concept \"{id}\" not found in the concept library")]
    #[diagnostic(
        code(degari::profile::unknown_concept),
        help(
            "Neither a typical nor a rigid property file exists for this concept. \
             Check the `[library]` directories in the configuration."
        )
    )]
    UnknownConcept { id: String },
}

pub type ProfileResult<T> = std::result::Result<T, ProfileError>;

// ---------------------------------------------------------------------------
// Reasoning oracle errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum OracleError {
    #[error("reasoning oracle `{command}` could not be started")]
    #[diagnostic(
        code(degari::oracle::unavailable),
        help(
            "The external reasoner could not be launched. Check the `[oracle]` command \
             in the configuration, or switch to `kind = \"builtin\"`."
        )
    )]
    Unavailable {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("reasoning oracle did not answer within {timeout_ms} ms")]
    #[diagnostic(
        code(degari::oracle::timeout),
        help("Raise `oracle_timeout_ms` under `[combine]` if the reasoner is slow on large profiles.")
    )]
    Timeout { timeout_ms: u64 },

    #[error("reasoning oracle protocol error: {message}")]
    #[diagnostic(
        code(degari::oracle::protocol),
        help(
            "The reasoner must answer each query line with `consistent` or `inconsistent`. \
             Check that the configured command speaks this protocol."
        )
    )]
    Protocol { message: String },
}

pub type OracleResult<T> = std::result::Result<T, OracleError>;

// ---------------------------------------------------------------------------
// Combination errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum CombineError {
    #[error("cannot combine \"{subject}\" with itself")]
    #[diagnostic(
        code(degari::combine::same_concept),
        help("HEAD and MODIFIER must be two different concepts.")
    )]
    SameConcept { subject: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Profile(#[from] ProfileError),
}

pub type CombineResult<T> = std::result::Result<T, CombineError>;

// ---------------------------------------------------------------------------
// Recommendation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum RecommendError {
    #[error("failed to write recommendation table: {path}")]
    #[diagnostic(
        code(degari::recommend::write),
        help("Ensure the output directory exists and you have write permissions.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Profile(#[from] ProfileError),
}

pub type RecommendResult<T> = std::result::Result<T, RecommendError>;

// ---------------------------------------------------------------------------
// Batch errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum BatchError {
    #[error("reasoning oracle unavailable on the first combination ({subject})")]
    #[diagnostic(
        code(degari::batch::oracle_unavailable),
        help(
            "The very first consistency check could not reach the reasoner, which \
             points at a broken environment rather than a bad pair. Nothing was written."
        )
    )]
    OracleUnavailable {
        subject: String,
        #[source]
        source: OracleError,
    },

    #[error("failed to prepare output directory: {path}")]
    #[diagnostic(
        code(degari::batch::output_dir),
        help("Ensure the parent directory exists and you have write permissions.")
    )]
    OutputDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type BatchResult<T> = std::result::Result<T, BatchError>;

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(degari::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(degari::config::parse),
        help("Check the TOML syntax and the section/field names in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(degari::config::invalid), help("{message}"))]
    Invalid { message: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Convenience alias for functions returning degari results.
pub type DegariResult<T> = std::result::Result<T, DegariError>;
