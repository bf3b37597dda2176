//! Re-classification of artworks against novel concepts.
//!
//! Each artwork is matched by typical-property name against the inherited
//! typical properties of a concept. The score is the fraction of the
//! concept's inherited properties the artwork exhibits, so scores compare
//! across concepts of different sizes. Artworks with no match are not
//! recommended but still count towards the totals.
//!
//! Two optional filters tighten the rule. The concept's rigid properties act
//! as anchors, of which at least `min_anchors` must be exhibited. With
//! `exclude_negated`, an artwork exhibiting `p` is dropped for a concept that
//! holds `-p`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::combine::CombinationResult;
use crate::error::{ConfigError, ConfigResult, RecommendError, RecommendResult};
use crate::property::{Profile, Property, preference_order};

pub const RECOMMENDATIONS_FILE: &str = "recommendations.tsv";
pub const RESUME_FILE: &str = "resume.tsv";

/// Optional filters on top of the "at least one match" rule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecommendSettings {
    /// Minimum score for a positive recommendation.
    pub min_match_rate: f64,
    /// Keep at most this many recommendations per concept.
    pub max_per_concept: Option<usize>,
    /// Minimum number of the concept's rigid properties the artwork must
    /// exhibit.
    pub min_anchors: usize,
    /// Drop artworks exhibiting `p` when the concept holds `-p`.
    pub exclude_negated: bool,
}

impl RecommendSettings {
    pub fn validate(&self) -> ConfigResult<()> {
        if !(0.0..=1.0).contains(&self.min_match_rate) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "min_match_rate must be within [0, 1], got {}",
                    self.min_match_rate
                ),
            });
        }
        if self.max_per_concept == Some(0) {
            return Err(ConfigError::Invalid {
                message: "max_per_concept must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// One artwork recommended for one concept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub artwork_id: String,
    pub concept_id: String,
    pub score: f64,
    /// Matched properties, in the concept's inheritance order.
    pub matched: Vec<Property>,
    /// Matched properties, most salient first.
    pub explanation: Vec<Property>,
    /// Rigid properties of the concept the artwork exhibits.
    pub anchors: Vec<String>,
}

/// Why a ranking came out empty without looking at any artwork.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyInput {
    NoArtworks,
    NoInheritedProperties,
}

impl std::fmt::Display for EmptyInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoArtworks => write!(f, "no artworks to rank"),
            Self::NoInheritedProperties => write!(f, "concept has no inherited typical properties"),
        }
    }
}

/// Ranked recommendations of one concept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConceptRanking {
    pub concept_id: String,
    /// Positive recommendations, best first.
    pub recommendations: Vec<Recommendation>,
    /// Number of artworks considered.
    pub evaluated: usize,
    pub empty_input: Option<EmptyInput>,
}

/// Compatibility score: matched share of the concept's inherited properties.
pub fn score(matched: usize, inherited: usize) -> f64 {
    matched as f64 / inherited.max(1) as f64
}

/// Rank `artworks` against `concept` with default settings.
pub fn recommend(artworks: &[Profile], concept: &CombinationResult) -> ConceptRanking {
    recommend_with(artworks, concept, &RecommendSettings::default())
}

/// Rank `artworks` against `concept`.
///
/// Ties keep artwork insertion order.
pub fn recommend_with(
    artworks: &[Profile],
    concept: &CombinationResult,
    settings: &RecommendSettings,
) -> ConceptRanking {
    let empty_input = if artworks.is_empty() {
        Some(EmptyInput::NoArtworks)
    } else if concept.inherited_typical.is_empty() {
        Some(EmptyInput::NoInheritedProperties)
    } else {
        None
    };
    if let Some(reason) = empty_input {
        tracing::warn!(concept = %concept.subject_id, %reason, "empty recommendation input");
        return ConceptRanking {
            concept_id: concept.subject_id.clone(),
            recommendations: Vec::new(),
            evaluated: artworks.len(),
            empty_input,
        };
    }

    let inherited = concept.inherited_typical.len();
    let negated: Vec<&str> = concept
        .inherited_typical
        .iter()
        .chain(&concept.rigid)
        .filter(|p| p.is_negated())
        .map(|p| p.base_name())
        .collect();

    let mut recommendations: Vec<Recommendation> = artworks
        .iter()
        .filter_map(|artwork| {
            if settings.exclude_negated {
                if let Some(name) = negated.iter().find(|n| artwork.exhibits(n)) {
                    tracing::debug!(
                        artwork = artwork.subject_id(),
                        concept = %concept.subject_id,
                        property = %name,
                        "artwork exhibits a negated property"
                    );
                    return None;
                }
            }

            let anchors: Vec<String> = concept
                .rigid
                .iter()
                .filter(|p| artwork.exhibits(&p.name))
                .map(|p| p.name.clone())
                .collect();
            if anchors.len() < settings.min_anchors {
                return None;
            }

            let matched: Vec<Property> = concept
                .inherited_typical
                .iter()
                .filter(|p| artwork.has_typical(&p.name))
                .cloned()
                .collect();
            if matched.is_empty() {
                return None;
            }

            let score = score(matched.len(), inherited);
            if score < settings.min_match_rate {
                return None;
            }

            let mut explanation = matched.clone();
            explanation.sort_by(preference_order);
            Some(Recommendation {
                artwork_id: artwork.subject_id().to_string(),
                concept_id: concept.subject_id.clone(),
                score,
                matched,
                explanation,
                anchors,
            })
        })
        .collect();

    recommendations.sort_by(|a, b| b.score.total_cmp(&a.score));
    if let Some(cap) = settings.max_per_concept {
        recommendations.truncate(cap);
    }

    tracing::info!(
        concept = %concept.subject_id,
        recommended = recommendations.len(),
        evaluated = artworks.len(),
        "concept ranked"
    );

    ConceptRanking {
        concept_id: concept.subject_id.clone(),
        recommendations,
        evaluated: artworks.len(),
        empty_input: None,
    }
}

/// Accumulated recommendations over a set of concepts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecommendationReport {
    rows: Vec<(String, String)>,
    counts: Vec<(String, usize)>,
    covered: BTreeSet<String>,
    total_artworks: usize,
}

impl RecommendationReport {
    /// Start a report over a corpus of `total_artworks` artworks.
    pub fn new(total_artworks: usize) -> Self {
        Self {
            total_artworks,
            ..Default::default()
        }
    }

    /// Fold one concept's ranking into the report.
    pub fn add(&mut self, ranking: &ConceptRanking) {
        for rec in &ranking.recommendations {
            self.rows.push((rec.artwork_id.clone(), rec.concept_id.clone()));
            self.covered.insert(rec.artwork_id.clone());
        }
        self.counts
            .push((ranking.concept_id.clone(), ranking.recommendations.len()));
    }

    /// `(artwork_id, concept_id)` for every positive recommendation.
    pub fn rows(&self) -> &[(String, String)] {
        &self.rows
    }

    /// `(concept_id, count)` in the order concepts were added.
    pub fn counts(&self) -> &[(String, usize)] {
        &self.counts
    }

    /// Distinct artworks recommended for at least one concept.
    pub fn covered(&self) -> &BTreeSet<String> {
        &self.covered
    }

    pub fn total_artworks(&self) -> usize {
        self.total_artworks
    }

    /// Share of the corpus recommended at least once, in percent.
    pub fn coverage_percent(&self) -> f64 {
        100.0 * self.covered.len() as f64 / self.total_artworks.max(1) as f64
    }

    pub fn render_recommendations(&self) -> String {
        self.rows
            .iter()
            .map(|(artwork, concept)| format!("{}\t{}\n", tsv_field(artwork), tsv_field(concept)))
            .collect()
    }

    pub fn render_resume(&self) -> String {
        self.counts
            .iter()
            .map(|(concept, count)| format!("{}\t{count}\n", tsv_field(concept)))
            .collect()
    }

    /// Write `recommendations.tsv` and `resume.tsv` into `dir`, replacing
    /// previous contents.
    pub fn write_tsv(&self, dir: &Path) -> RecommendResult<(PathBuf, PathBuf)> {
        let recs = dir.join(RECOMMENDATIONS_FILE);
        let resume = dir.join(RESUME_FILE);
        write_file(&recs, &self.render_recommendations())?;
        write_file(&resume, &self.render_resume())?;
        Ok((recs, resume))
    }
}

/// Rank `artworks` against every concept and aggregate the results.
pub fn recommend_all(
    artworks: &[Profile],
    concepts: &[CombinationResult],
    settings: &RecommendSettings,
) -> RecommendationReport {
    let mut report = RecommendationReport::new(artworks.len());
    for concept in concepts {
        report.add(&recommend_with(artworks, concept, settings));
    }
    report
}

fn tsv_field(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}

fn write_file(path: &Path, contents: &str) -> RecommendResult<()> {
    std::fs::write(path, contents).map_err(|source| RecommendError::Write {
        path: path.display().to_string(),
        source,
    })
}
