//! Problem catalog: an immutable set of problems loaded from one JSON file.
//!
//! Catalogs are swappable at runtime by filename. Swapping constructs a
//! whole new `Catalog` value and replaces the one held by AppState; there
//! is no merging and no in-place mutation.

use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};

use crate::domain::Problem;
use crate::util::unique_preserve_order;

#[derive(Debug, Error)]
pub enum CatalogError {
  #[error("catalog file not found: {0}")]
  NotFound(String),
  #[error("failed to read catalog {file}: {source}")]
  Io {
    file: String,
    #[source]
    source: std::io::Error,
  },
  #[error("failed to parse catalog {file}: {source}")]
  Parse {
    file: String,
    #[source]
    source: serde_json::Error,
  },
}

/// One loaded catalog. `file` is the filename under the data directory
/// (e.g. "problems.json"); it doubles as the catalog half of every
/// compound record key.
#[derive(Clone, Debug)]
pub struct Catalog {
  pub file: String,
  pub problems: Vec<Problem>,
}

impl Catalog {
  /// Load a catalog from `<data_dir>/<file>`. Missing or invalid file is
  /// a typed error: running with a silently empty catalog would be a
  /// worse failure mode than stopping.
  pub fn load(data_dir: &Path, file: &str) -> Result<Self, CatalogError> {
    let path = data_dir.join(file);
    if !path.exists() {
      return Err(CatalogError::NotFound(path.display().to_string()));
    }
    let raw = std::fs::read_to_string(&path).map_err(|source| CatalogError::Io {
      file: file.to_string(),
      source,
    })?;
    let problems: Vec<Problem> =
      serde_json::from_str(&raw).map_err(|source| CatalogError::Parse {
        file: file.to_string(),
        source,
      })?;

    // Ids are the catalog author's contract; flag duplicates but keep
    // going (lookup resolves to the first occurrence).
    let unique_ids = unique_preserve_order(problems.iter().map(|p| p.id.clone()));
    if unique_ids.len() != problems.len() {
      warn!(target: "dojo_backend", %file, total = problems.len(), unique = unique_ids.len(),
        "Catalog contains duplicate problem ids");
    }

    info!(target: "dojo_backend", %file, count = problems.len(), "Catalog loaded");
    Ok(Self { file: file.to_string(), problems })
  }

  /// First problem with this id, if any.
  pub fn get(&self, id: &str) -> Option<&Problem> {
    self.problems.iter().find(|p| p.id == id)
  }

  /// Distinct difficulties in catalog order (dropdown options).
  pub fn difficulty_options(&self) -> Vec<String> {
    unique_preserve_order(self.problems.iter().map(|p| p.difficulty.clone()))
  }

  /// Distinct kinds, sorted so dotted kinds group under their language
  /// ("Python", "Python.Pandas", "SQL", ...).
  pub fn kind_options(&self) -> Vec<String> {
    let mut kinds = unique_preserve_order(self.problems.iter().map(|p| p.kind.clone()));
    kinds.sort();
    kinds
  }
}

/// List the catalog files available in the data directory: every `.json`
/// except the favorites document. Sorted for a stable dropdown.
pub fn available_catalog_files(data_dir: &Path) -> Vec<String> {
  let mut files = Vec::new();
  let entries = match std::fs::read_dir(data_dir) {
    Ok(e) => e,
    Err(_) => return files,
  };
  for entry in entries.flatten() {
    let name = entry.file_name().to_string_lossy().to_string();
    if name.ends_with(".json") && name != "favorites.json" {
      files.push(name);
    }
  }
  files.sort();
  files
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::ProblemType;
  use std::fs;
  use tempfile::tempdir;

  fn write_catalog(dir: &Path, file: &str, body: &str) {
    fs::write(dir.join(file), body).unwrap();
  }

  const SMALL_BANK: &str = r#"[
    {"id":"a","title":"Joins","body":"...","difficulty":"L1","kind":"SQL"},
    {"id":"b","title":"GroupBy","body":"...","difficulty":"L1","kind":"Python.Pandas","problem_type":"concept"},
    {"id":"c","title":"Windows","body":"...","difficulty":"L2","kind":"SQL"}
  ]"#;

  #[test]
  fn load_builds_option_lists_in_order() {
    let dir = tempdir().unwrap();
    write_catalog(dir.path(), "problems.json", SMALL_BANK);

    let cat = Catalog::load(dir.path(), "problems.json").unwrap();
    assert_eq!(cat.problems.len(), 3);
    assert_eq!(cat.difficulty_options(), vec!["L1", "L2"]);
    assert_eq!(cat.kind_options(), vec!["Python.Pandas", "SQL"]);
    assert_eq!(cat.get("b").unwrap().title, "GroupBy");
    assert!(cat.get("zzz").is_none());
  }

  #[test]
  fn missing_file_is_a_typed_error() {
    let dir = tempdir().unwrap();
    match Catalog::load(dir.path(), "nope.json") {
      Err(CatalogError::NotFound(_)) => {}
      other => panic!("expected NotFound, got {:?}", other.map(|c| c.file)),
    }
  }

  #[test]
  fn unknown_problem_type_does_not_fail_the_catalog() {
    let dir = tempdir().unwrap();
    write_catalog(
      dir.path(),
      "problems.json",
      r#"[
        {"id":"a","title":"t","body":"...","difficulty":"L1","kind":"SQL","problem_type":"quiz"},
        {"id":"b","title":"t","body":"...","difficulty":"L1","kind":"SQL","problem_type":"concept"}
      ]"#,
    );

    let cat = Catalog::load(dir.path(), "problems.json").unwrap();
    assert_eq!(cat.problems.len(), 2);
    assert_eq!(cat.get("a").unwrap().problem_type, ProblemType::Coding);
    assert_eq!(cat.get("b").unwrap().problem_type, ProblemType::Concept);
  }

  #[test]
  fn invalid_json_is_a_parse_error() {
    let dir = tempdir().unwrap();
    write_catalog(dir.path(), "broken.json", "{ not json");
    assert!(matches!(
      Catalog::load(dir.path(), "broken.json"),
      Err(CatalogError::Parse { .. })
    ));
  }

  #[test]
  fn available_files_skip_favorites_document() {
    let dir = tempdir().unwrap();
    write_catalog(dir.path(), "problems.json", "[]");
    write_catalog(dir.path(), "problems_sql.json", "[]");
    write_catalog(dir.path(), "favorites.json", "[]");
    fs::write(dir.path().join("wrong_notes.md"), "").unwrap();

    let files = available_catalog_files(dir.path());
    assert_eq!(files, vec!["problems.json", "problems_sql.json"]);
  }
}
