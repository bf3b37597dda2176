//! Concept library: source concepts kept as separate typical and rigid files.
//!
//! Each concept `<id>` may have `typical/<id>.txt` (`name: strength` lines)
//! and `rigid/<id>.txt` (one bare property name per line). A missing file
//! means an empty set; a concept with neither file does not exist.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::{ProfileError, ProfileResult};
use crate::profile_file::{self, parse_typical_line};
use crate::property::{Profile, Property};

/// Typical/rigid directories holding the source concepts.
#[derive(Debug, Clone)]
pub struct ConceptLibrary {
    typical_dir: PathBuf,
    rigid_dir: PathBuf,
}

impl ConceptLibrary {
    pub fn new(typical_dir: impl Into<PathBuf>, rigid_dir: impl Into<PathBuf>) -> Self {
        Self {
            typical_dir: typical_dir.into(),
            rigid_dir: rigid_dir.into(),
        }
    }

    pub fn typical_dir(&self) -> &Path {
        &self.typical_dir
    }

    pub fn rigid_dir(&self) -> &Path {
        &self.rigid_dir
    }

    /// Ids of every concept with at least one property file, sorted.
    pub fn concept_ids(&self) -> ProfileResult<Vec<String>> {
        let mut ids = BTreeSet::new();
        for dir in [&self.typical_dir, &self.rigid_dir] {
            if !dir.is_dir() {
                continue;
            }
            for path in profile_file::list_profile_files(dir)? {
                ids.insert(profile_file::subject_id_from_path(&path)?);
            }
        }
        Ok(ids.into_iter().collect())
    }

    /// Every ordered pair of distinct concepts, as `(head, modifier)`.
    pub fn pairs(&self) -> ProfileResult<Vec<(String, String)>> {
        let ids = self.concept_ids()?;
        let mut pairs = Vec::with_capacity(ids.len() * ids.len().saturating_sub(1));
        for head in &ids {
            for modifier in &ids {
                if head != modifier {
                    pairs.push((head.clone(), modifier.clone()));
                }
            }
        }
        Ok(pairs)
    }

    /// Load the profile of concept `id`.
    pub fn load(&self, id: &str) -> ProfileResult<Profile> {
        let typical_path = self.typical_dir.join(format!("{id}.txt"));
        let rigid_path = self.rigid_dir.join(format!("{id}.txt"));

        let typical_text = read_optional(&typical_path)?;
        let rigid_text = read_optional(&rigid_path)?;
        if typical_text.is_none() && rigid_text.is_none() {
            return Err(ProfileError::UnknownConcept { id: id.to_string() });
        }

        let mut typical = Vec::new();
        for (idx, line) in typical_text.as_deref().unwrap_or_default().lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let prop = parse_typical_line(line).map_err(|message| ProfileError::Malformed {
                path: typical_path.display().to_string(),
                line: idx + 1,
                message,
            })?;
            typical.push(prop);
        }

        let rigid = rigid_text
            .as_deref()
            .unwrap_or_default()
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(Property::rigid)
            .collect();

        let profile = Profile::new(id, typical, rigid)?;
        tracing::debug!(
            concept = id,
            typical = profile.typical().len(),
            rigid = profile.rigid().len(),
            "concept loaded"
        );
        Ok(profile)
    }
}

fn read_optional(path: &Path) -> ProfileResult<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ProfileError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> (tempfile::TempDir, ConceptLibrary) {
        let dir = tempfile::TempDir::new().unwrap();
        let typical = dir.path().join("typical");
        let rigid = dir.path().join("rigid");
        std::fs::create_dir_all(&typical).unwrap();
        std::fs::create_dir_all(&rigid).unwrap();
        std::fs::write(typical.join("rock.txt"), "loud: 0.8\nguitar_solo: 0.55\n").unwrap();
        std::fs::write(rigid.join("rock.txt"), "guitar\n\n-synth\n").unwrap();
        std::fs::write(typical.join("pop.txt"), "catchy: 0.9\n").unwrap();
        std::fs::write(rigid.join("jazz.txt"), "improvised\n").unwrap();
        let lib = ConceptLibrary::new(typical, rigid);
        (dir, lib)
    }

    #[test]
    fn loads_typical_and_rigid_files() {
        let (_dir, lib) = library();
        let rock = lib.load("rock").unwrap();
        assert_eq!(rock.typical().len(), 2);
        assert_eq!(rock.typical_named("loud").unwrap().strength, Some(0.8));
        let rigid: Vec<&str> = rock.rigid().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(rigid, vec!["guitar", "-synth"]);
    }

    #[test]
    fn missing_half_is_empty_and_missing_both_is_unknown() {
        let (_dir, lib) = library();
        assert!(lib.load("pop").unwrap().rigid().is_empty());
        assert!(lib.load("jazz").unwrap().typical().is_empty());
        assert!(matches!(
            lib.load("polka"),
            Err(ProfileError::UnknownConcept { .. })
        ));
    }

    #[test]
    fn pairs_cover_every_ordered_distinct_combination() {
        let (_dir, lib) = library();
        assert_eq!(lib.concept_ids().unwrap(), vec!["jazz", "pop", "rock"]);
        let pairs = lib.pairs().unwrap();
        assert_eq!(pairs.len(), 6);
        assert!(pairs.contains(&("rock".to_string(), "pop".to_string())));
        assert!(pairs.contains(&("pop".to_string(), "rock".to_string())));
        assert!(pairs.iter().all(|(h, m)| h != m));
    }
}
