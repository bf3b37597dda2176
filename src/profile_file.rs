//! Flat-file property format: reading and writing profiles.
//!
//! One property per line:
//!
//! ```text
//! happy: 0.9            # typical property
//! result: happy: 0.9    # typical property accepted by a combination
//! rigid: guitar         # rigid property
//! ```
//!
//! Blank lines and `#` comments are ignored, and the `result:` / `rigid:`
//! prefixes are case-insensitive, so `result` and `rigid` cannot name a
//! property. A completed novel-concept output starts with a
//! `# novel concept: <id>` header and holds one `result:` line per inherited
//! property; either marks the file as a result. The subject id is the file
//! stem.

use std::path::{Path, PathBuf};

use crate::combine::CombinationResult;
use crate::error::{ProfileError, ProfileResult};
use crate::property::{Profile, Property};

const RESULT_PREFIX: &str = "result:";
const RIGID_PREFIX: &str = "rigid:";
const NOVEL_CONCEPT_HEADER: &str = "# novel concept:";
const RESERVED_NAMES: [&str; 2] = ["result", "rigid"];

/// Everything a profile file says about its subject, line kinds kept apart.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileDocument {
    pub subject_id: String,
    pub typical: Vec<Property>,
    pub rigid: Vec<Property>,
    pub result: Vec<Property>,
}

impl ProfileDocument {
    /// Whether the document is a completed combination output.
    pub fn is_result(&self) -> bool {
        !self.result.is_empty()
    }

    /// The subject's profile.
    ///
    /// For a completed novel concept the `result:` lines are its typical
    /// properties; otherwise the plain typical lines are.
    pub fn into_profile(self) -> ProfileResult<Profile> {
        let typical = if self.result.is_empty() {
            self.typical
        } else {
            self.result
        };
        Profile::new(self.subject_id, typical, self.rigid)
    }

    /// The document read as a combination output.
    pub fn into_combination(self) -> ProfileResult<CombinationResult> {
        // Validate through Profile so malformed outputs are caught on load.
        let profile = Profile::new(self.subject_id, self.result, self.rigid)?;
        Ok(CombinationResult::completed(
            profile.subject_id(),
            profile.typical().to_vec(),
            profile.rigid().to_vec(),
        ))
    }
}

/// Parse profile text for `subject_id`. `origin` only labels error messages.
pub fn parse_profile(
    subject_id: &str,
    text: &str,
    origin: &str,
) -> ProfileResult<ProfileDocument> {
    let mut doc = ProfileDocument {
        subject_id: subject_id.to_string(),
        typical: Vec::new(),
        rigid: Vec::new(),
        result: Vec::new(),
    };

    for (idx, raw) in text.lines().enumerate() {
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }
        let malformed = |message: &str| ProfileError::Malformed {
            path: origin.to_string(),
            line: idx + 1,
            message: message.to_string(),
        };

        if let Some(rest) = strip_prefix_ci(line, RESULT_PREFIX) {
            if !rest.contains(':') {
                return Err(malformed(
                    "`result:` lines need `<name>: <strength>`; `result` is not a property name",
                ));
            }
            let prop = parse_typical_line(rest).map_err(|m| malformed(&m))?;
            doc.result.push(prop);
        } else if let Some(rest) = strip_prefix_ci(line, RIGID_PREFIX) {
            let name = rest.trim();
            if name.is_empty() || name.contains(':') {
                return Err(malformed("rigid line needs exactly one property name"));
            }
            if name.parse::<f64>().is_ok() {
                return Err(malformed(
                    "`rigid` is a reserved line prefix and cannot name a typical property",
                ));
            }
            if is_reserved(name) {
                return Err(malformed(&format!("\"{name}\" is a reserved word")));
            }
            doc.rigid.push(Property::rigid(name));
        } else {
            let prop = parse_typical_line(line).map_err(|m| malformed(&m))?;
            doc.typical.push(prop);
        }
    }

    Ok(doc)
}

/// Parse `name: strength` (strength may be empty) into a typical property.
pub(crate) fn parse_typical_line(line: &str) -> Result<Property, String> {
    let (name, strength) = line
        .rsplit_once(':')
        .ok_or_else(|| format!("expected `<name>: <strength>`, got \"{line}\""))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("property name is empty".into());
    }
    if is_reserved(name) {
        return Err(format!("\"{name}\" is a reserved word and cannot name a property"));
    }

    let strength = strength.trim();
    if strength.is_empty() {
        return Ok(Property::typical_unweighted(name));
    }
    let value: f64 = strength
        .parse()
        .map_err(|_| format!("strength \"{strength}\" is not a number"))?;
    if !value.is_finite() {
        return Err(format!("strength \"{strength}\" is not finite"));
    }
    Ok(Property::typical(name, value))
}

fn is_reserved(name: &str) -> bool {
    RESERVED_NAMES.iter().any(|r| r.eq_ignore_ascii_case(name))
}

fn strip_comment(line: &str) -> &str {
    line.split_once('#').map_or(line, |(before, _)| before)
}

fn strip_prefix_ci<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &line[prefix.len()..])
}

/// Subject id for a profile path: its file stem.
pub fn subject_id_from_path(path: &Path) -> ProfileResult<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ProfileError::EmptyName {
            subject: path.display().to_string(),
        })
}

/// Read and parse a profile file.
pub fn read_document(path: &Path) -> ProfileResult<ProfileDocument> {
    let text = std::fs::read_to_string(path).map_err(|source| ProfileError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_profile(&subject_id_from_path(path)?, &text, &path.display().to_string())
}

/// Read a profile file as a plain profile.
pub fn read_profile(path: &Path) -> ProfileResult<Profile> {
    read_document(path)?.into_profile()
}

/// Read a completed combination output.
pub fn read_combination(path: &Path) -> ProfileResult<CombinationResult> {
    read_document(path)?.into_combination()
}

/// Whether the file is a combination output: it carries the novel-concept
/// header or at least one `result:` line. An output that inherited nothing
/// has only the header.
pub fn is_result_file(path: &Path) -> ProfileResult<bool> {
    let text = std::fs::read_to_string(path).map_err(|source| ProfileError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(text.lines().any(|l| {
        let line = l.trim();
        strip_prefix_ci(line, NOVEL_CONCEPT_HEADER).is_some()
            || strip_prefix_ci(strip_comment(line).trim(), RESULT_PREFIX).is_some()
    }))
}

/// Regular files directly inside `dir`, sorted by name.
pub fn list_profile_files(dir: &Path) -> ProfileResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|source| ProfileError::Io {
        path: dir.display().to_string(),
        source,
    })?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| !n.starts_with('.'))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Load every profile in `dir`, in file-name order.
pub fn read_profiles_dir(dir: &Path) -> ProfileResult<Vec<Profile>> {
    list_profile_files(dir)?
        .iter()
        .map(|p| read_profile(p))
        .collect()
}

/// Render a combination output in the flat-file format.
pub fn render_combination(result: &CombinationResult) -> String {
    let mut out = format!("{NOVEL_CONCEPT_HEADER} {}\n", result.subject_id);
    for p in &result.rigid {
        out.push_str(&format!("{RIGID_PREFIX} {}\n", p.name));
    }
    for p in &result.inherited_typical {
        match p.strength {
            Some(s) => out.push_str(&format!("{RESULT_PREFIX} {}: {s}\n", p.name)),
            None => out.push_str(&format!("{RESULT_PREFIX} {}:\n", p.name)),
        }
    }
    out
}

/// Write `<dir>/<subject_id>.txt`, replacing any previous output.
pub fn write_combination(dir: &Path, result: &CombinationResult) -> ProfileResult<PathBuf> {
    let path = dir.join(format!("{}.txt", result.subject_id));
    std::fs::write(&path, render_combination(result)).map_err(|source| ProfileError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(path)
}

/// Remove `<dir>/<subject_id>.txt` if present. Returns whether a file was removed.
pub fn remove_combination(dir: &Path, subject_id: &str) -> ProfileResult<bool> {
    let path = dir.join(format!("{subject_id}.txt"));
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(ProfileError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}
