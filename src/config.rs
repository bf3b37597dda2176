//! Run configuration, persisted as TOML.
//!
//! ```toml
//! [combine]
//! max_inherited = 2
//! oracle_timeout_ms = 30000
//! parallel = false
//!
//! [oracle]
//! kind = "builtin"
//! disjoint = [["happy", "sad"]]
//!
//! [recommend]
//! min_match_rate = 0.0
//! min_anchors = 0
//! exclude_negated = false
//!
//! [library]
//! typical_dir = "typical"
//! rigid_dir = "rigid"
//! output_dir = "combinations"
//! ```
//!
//! Every section and field is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::library::ConceptLibrary;
use crate::oracle::{DisjointnessOracle, ProcessOracle, ReasoningOracle};
use crate::recommend::RecommendSettings;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DegariConfig {
    pub combine: CombineConfig,
    pub oracle: OracleConfig,
    pub recommend: RecommendConfig,
    pub library: LibraryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombineConfig {
    /// Maximum number of typical properties the novel concept inherits.
    #[serde(default = "default_max_inherited")]
    pub max_inherited: usize,
    /// Per-combination deadline for the reasoning oracle.
    #[serde(default = "default_oracle_timeout_ms")]
    pub oracle_timeout_ms: u64,
    /// Dispatch independent pairs to a worker pool.
    #[serde(default)]
    pub parallel: bool,
}

fn default_max_inherited() -> usize {
    2
}
fn default_oracle_timeout_ms() -> u64 {
    30_000
}

impl Default for CombineConfig {
    fn default() -> Self {
        Self {
            max_inherited: default_max_inherited(),
            oracle_timeout_ms: default_oracle_timeout_ms(),
            parallel: false,
        }
    }
}

impl CombineConfig {
    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle_timeout_ms)
    }
}

/// Which reasoning oracle to use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OracleConfig {
    /// Embedded negation/disjointness checks.
    Builtin {
        #[serde(default)]
        disjoint: Vec<[String; 2]>,
    },
    /// External reasoner process.
    Process {
        command: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self::Builtin {
            disjoint: Vec::new(),
        }
    }
}

impl OracleConfig {
    pub fn build(&self) -> Box<dyn ReasoningOracle> {
        match self {
            Self::Builtin { disjoint } => Box::new(DisjointnessOracle::from_pairs(
                disjoint.iter().map(|[a, b]| (a.clone(), b.clone())),
            )),
            Self::Process { command, args } => {
                Box::new(ProcessOracle::new(command.clone(), args.clone()))
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendConfig {
    pub min_match_rate: f64,
    pub max_per_concept: Option<usize>,
    /// Rigid properties of the concept an artwork must exhibit.
    pub min_anchors: usize,
    pub exclude_negated: bool,
}

impl RecommendConfig {
    pub fn settings(&self) -> RecommendSettings {
        RecommendSettings {
            min_match_rate: self.min_match_rate,
            max_per_concept: self.max_per_concept,
            min_anchors: self.min_anchors,
            exclude_negated: self.exclude_negated,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    #[serde(default = "default_typical_dir")]
    pub typical_dir: PathBuf,
    #[serde(default = "default_rigid_dir")]
    pub rigid_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_typical_dir() -> PathBuf {
    "typical".into()
}
fn default_rigid_dir() -> PathBuf {
    "rigid".into()
}
fn default_output_dir() -> PathBuf {
    "combinations".into()
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            typical_dir: default_typical_dir(),
            rigid_dir: default_rigid_dir(),
            output_dir: default_output_dir(),
        }
    }
}

impl LibraryConfig {
    pub fn library(&self) -> ConceptLibrary {
        ConceptLibrary::new(self.typical_dir.clone(), self.rigid_dir.clone())
    }
}

impl DegariConfig {
    /// Parse a TOML document. `origin` only labels error messages.
    pub fn from_toml(text: &str, origin: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text, &path.display().to_string())
    }

    /// Load from `path` if given, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.combine.oracle_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                message: "combine.oracle_timeout_ms must be > 0".into(),
            });
        }
        self.recommend.settings().validate()?;
        if let OracleConfig::Process { command, .. } = &self.oracle {
            if command.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    message: "oracle.command must name the reasoner executable".into(),
                });
            }
        }
        Ok(())
    }
}
