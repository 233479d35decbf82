//! Favorites store: one JSON array, rewritten in full on every mutation.
//!
//! Entries are keyed by `(source_catalog_file, problem_id)`. The store is
//! forgiving on read (absent/unparsable/non-array documents are treated
//! as empty) and strict on write only to the extent of deduplication.

use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};

use crate::domain::{Favorite, Problem};
use crate::util::format_timestamp;

#[derive(Debug, Error)]
pub enum FavoritesError {
  #[error("failed to serialize favorites: {0}")]
  Serialize(#[from] serde_json::Error),
  #[error("favorites I/O error: {0}")]
  Io(#[from] std::io::Error),
}

/// Read the favorites document. Never fails: a missing file, broken JSON,
/// or a document that is not an array all yield an empty list.
pub fn load(path: &Path) -> Vec<Favorite> {
  let raw = match fs::read_to_string(path) {
    Ok(s) => s,
    Err(_) => return Vec::new(),
  };
  match serde_json::from_str::<serde_json::Value>(&raw) {
    Ok(serde_json::Value::Array(items)) => items
      .into_iter()
      .filter_map(|v| serde_json::from_value::<Favorite>(v).ok())
      .collect(),
    Ok(_) => {
      warn!(target: "dojo_backend", path = %path.display(), "Favorites document is not an array; treating as empty");
      Vec::new()
    }
    Err(e) => {
      warn!(target: "dojo_backend", path = %path.display(), error = %e, "Favorites document unparsable; treating as empty");
      Vec::new()
    }
  }
}

/// Rewrite the whole document. Entries are deduplicated by compound key,
/// last one wins; output is pretty-printed UTF-8 with non-ASCII text
/// left unescaped.
pub fn save(path: &Path, favorites: &[Favorite]) -> Result<(), FavoritesError> {
  let mut deduped: Vec<Favorite> = Vec::new();
  for fav in favorites {
    if fav.problem_id.is_empty() {
      continue;
    }
    if let Some(existing) = deduped.iter_mut().find(|f| f.key() == fav.key()) {
      *existing = fav.clone();
    } else {
      deduped.push(fav.clone());
    }
  }

  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)?;
  }
  let body = serde_json::to_string_pretty(&deduped)?;
  fs::write(path, body)?;
  Ok(())
}

/// Membership check by compound key.
pub fn is_favorite(path: &Path, source_catalog_file: &str, problem_id: &str) -> bool {
  load(path)
    .iter()
    .any(|f| f.source_catalog_file == source_catalog_file && f.problem_id == problem_id)
}

/// Flip membership for one problem: remove if present, add with current
/// display metadata otherwise. Returns the new membership state so the
/// caller can label its toggle button.
pub fn toggle(
  path: &Path,
  problem: &Problem,
  source_catalog_file: &str,
) -> Result<bool, FavoritesError> {
  let mut favorites = load(path);
  let existed = favorites
    .iter()
    .any(|f| f.source_catalog_file == source_catalog_file && f.problem_id == problem.id);

  if existed {
    favorites
      .retain(|f| !(f.source_catalog_file == source_catalog_file && f.problem_id == problem.id));
  } else {
    favorites.push(Favorite {
      problem_id: problem.id.clone(),
      source_catalog_file: source_catalog_file.to_string(),
      title: problem.title.clone(),
      difficulty: problem.difficulty.clone(),
      kind: problem.kind.clone(),
      timestamp: format_timestamp(),
    });
  }

  save(path, &favorites)?;
  let now_favorite = !existed;
  info!(target: "dojo_backend", problem_id = %problem.id, catalog = %source_catalog_file, favorite = now_favorite, "Favorite toggled");
  Ok(now_favorite)
}
