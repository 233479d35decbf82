//! Domain models: problems, problem types, persisted attempts, favorites.

use serde::{Deserialize, Serialize};

/// Score threshold separating "passed" from "retry" attempts.
pub const PASS_SCORE: u32 = 80;

/// Catalog file assumed for attempt lines written before catalogs
/// became switchable. Used to backfill `source_catalog_file` on read.
pub const DEFAULT_CATALOG_FILE: &str = "problems.json";

/// Tag describing what shape of answer a problem expects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ProblemType {
  #[serde(rename = "coding")]
  Coding,
  #[serde(rename = "concept")]
  Concept,
  #[serde(rename = "fill-in-blank")]
  FillInBlank,
}

impl Default for ProblemType {
  fn default() -> Self { ProblemType::Coding }
}

// Catalog authors write free-form type strings. An unrecognized value
// falls back to `Coding` instead of failing the whole catalog file.
impl<'de> Deserialize<'de> for ProblemType {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: serde::Deserializer<'de>,
  {
    let s = String::deserialize(deserializer)?;
    Ok(match s.as_str() {
      "concept" => ProblemType::Concept,
      "fill-in-blank" => ProblemType::FillInBlank,
      _ => ProblemType::Coding,
    })
  }
}

impl ProblemType {
  pub fn as_str(&self) -> &'static str {
    match self {
      ProblemType::Coding => "coding",
      ProblemType::Concept => "concept",
      ProblemType::FillInBlank => "fill-in-blank",
    }
  }
}

/// One entry of the problem catalog. Immutable once loaded.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Problem {
  pub id: String,
  pub title: String,
  pub body: String,
  pub difficulty: String,   // free-form (e.g., "Level 1 – Intro")
  pub kind: String,         // dotted hierarchy: "SQL", "Python.Pandas", ...
  #[serde(default)] pub problem_type: ProblemType,
  #[serde(default)] pub schema: String,
  #[serde(default)] pub sample_rows: Vec<String>,
  #[serde(default)] pub hint: String,
}

impl Problem {
  /// Language part of `kind`: text before the first `.`, lowercased.
  /// "Python.Pandas" -> "python", "SQL" -> "sql".
  pub fn language(&self) -> String {
    self
      .kind
      .split('.')
      .next()
      .unwrap_or(&self.kind)
      .to_lowercase()
  }

  /// Library part of `kind`: text after the first `.`, or None.
  /// "Python.Pandas" -> Some("Pandas"), "SQL" -> None.
  pub fn library(&self) -> Option<&str> {
    self.kind.split_once('.').map(|(_, lib)| lib)
  }
}

/// One persisted record of a user's submission plus the feedback it
/// received. Written once, never updated in place. Serialized as a single
/// JSON line in the wrong-notes file; unknown extra fields on disk are
/// ignored, optional fields absent from older lines get defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
  pub problem_id: String,
  pub title: String,
  pub difficulty: String,
  pub kind: String,
  pub score: u32,
  pub status: String,       // "passed" iff score >= PASS_SCORE else "retry"
  pub submitted_code: String,
  pub feedback_text: String,
  pub improvement_text: String,
  pub reasoning_text: String,
  pub question_text: String,
  pub timestamp: String,    // "YYYY-MM-DD HH:MM (Www)"
  #[serde(default)] pub rechallenge_hint: String,
  #[serde(default)] pub nickname: String,
  #[serde(default = "default_catalog_file")] pub source_catalog_file: String,
}

fn default_catalog_file() -> String {
  DEFAULT_CATALOG_FILE.to_string()
}

/// Status string derived from a score.
pub fn status_for_score(score: u32) -> &'static str {
  if score >= PASS_SCORE { "passed" } else { "retry" }
}

/// One favorited problem. Display metadata is denormalized so the
/// favorites list renders without re-reading the catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
  pub problem_id: String,
  #[serde(default = "default_catalog_file")] pub source_catalog_file: String,
  #[serde(default)] pub title: String,
  #[serde(default)] pub difficulty: String,
  #[serde(default)] pub kind: String,
  #[serde(default)] pub timestamp: String,
}

impl Favorite {
  /// Compound identity: `(source_catalog_file, problem_id)`.
  pub fn key(&self) -> (String, String) {
    (self.source_catalog_file.clone(), self.problem_id.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn language_and_library_split_on_first_dot() {
    let p = Problem {
      id: "p1".into(),
      title: "t".into(),
      body: "b".into(),
      difficulty: "Level 1 – Intro".into(),
      kind: "Python.Pandas".into(),
      problem_type: ProblemType::Coding,
      schema: String::new(),
      sample_rows: vec![],
      hint: String::new(),
    };
    assert_eq!(p.language(), "python");
    assert_eq!(p.library(), Some("Pandas"));

    let sql = Problem { kind: "SQL".into(), ..p };
    assert_eq!(sql.language(), "sql");
    assert_eq!(sql.library(), None);
  }

  #[test]
  fn status_threshold_is_eighty() {
    assert_eq!(status_for_score(80), "passed");
    assert_eq!(status_for_score(100), "passed");
    assert_eq!(status_for_score(79), "retry");
    assert_eq!(status_for_score(0), "retry");
  }

  #[test]
  fn unknown_problem_type_strings_fall_back_to_coding() {
    let raw = r#"{"id":"x","title":"t","body":"b","difficulty":"L1","kind":"SQL","problem_type":"quiz"}"#;
    let p: Problem = serde_json::from_str(raw).unwrap();
    assert_eq!(p.problem_type, ProblemType::Coding);

    let known: ProblemType = serde_json::from_str(r#""fill-in-blank""#).unwrap();
    assert_eq!(known, ProblemType::FillInBlank);
  }

  #[test]
  fn problem_type_defaults_to_coding_when_absent() {
    let raw = r#"{"id":"x","title":"t","body":"b","difficulty":"L1","kind":"SQL"}"#;
    let p: Problem = serde_json::from_str(raw).unwrap();
    assert_eq!(p.problem_type, ProblemType::Coding);
    assert!(p.schema.is_empty());
    assert!(p.sample_rows.is_empty());
  }
}
