//! Filter resolution and problem selection.
//!
//! Filtering is strict: a request either matches problems exactly or
//! reports a typed "no candidates" outcome carrying the filter snapshot,
//! so the caller can render a precise message instead of silently
//! substituting another filter.

use std::collections::HashSet;
use std::fmt;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{Problem, ProblemType};

/// Wildcard accepted for the difficulty and kind filters.
pub const ANY: &str = "any";

/// A snapshot of the user's constraints. `problem_types` is the one
/// place where an empty collection means "no restriction" rather than
/// "match nothing".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Filters {
  #[serde(default = "any_string")]
  pub difficulty: String,
  /// Either a bare language ("Python" matches every Python.* kind) or a
  /// fully dotted kind ("Python.Pandas" matches exactly), or "any".
  #[serde(default = "any_string")]
  pub kind: String,
  #[serde(default)]
  pub problem_types: HashSet<ProblemType>,
}

fn any_string() -> String {
  ANY.to_string()
}

impl Default for Filters {
  fn default() -> Self {
    Self {
      difficulty: any_string(),
      kind: any_string(),
      problem_types: HashSet::new(),
    }
  }
}

impl fmt::Display for Filters {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut types: Vec<&str> = self.problem_types.iter().map(|t| t.as_str()).collect();
    types.sort();
    let types = if types.is_empty() {
      "any".to_string()
    } else {
      types.join(", ")
    };
    write!(
      f,
      "difficulty={}, kind={}, types={}",
      self.difficulty, self.kind, types
    )
  }
}

/// The distinguished "no candidates" outcome. Not an error: an expected
/// result the caller renders as a message naming the failed filters.
#[derive(Clone, Debug, PartialEq)]
pub struct NoMatch {
  pub filters: Filters,
  pub catalog_file: String,
}

impl fmt::Display for NoMatch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "no problems match: {} in `{}`",
      self.filters, self.catalog_file
    )
  }
}

/// Membership test. All three constraints must hold:
/// - difficulty: "any" or exact (case-sensitive) equality;
/// - kind: "any"; a bare language compared case-insensitively against
///   the problem's derived language; or a dotted kind compared
///   case-insensitively against the full kind;
/// - type: empty set or membership.
pub fn matches(problem: &Problem, filters: &Filters) -> bool {
  let difficulty_ok = filters.difficulty == ANY || problem.difficulty == filters.difficulty;

  let kind_ok = if filters.kind == ANY {
    true
  } else if !filters.kind.contains('.') {
    problem.language() == filters.kind.to_lowercase()
  } else {
    problem.kind.to_lowercase() == filters.kind.to_lowercase()
  };

  let type_ok =
    filters.problem_types.is_empty() || filters.problem_types.contains(&problem.problem_type);

  difficulty_ok && kind_ok && type_ok
}

/// Pick uniformly at random among the problems satisfying the filters.
/// Each call is independent; previously-seen problems are not excluded.
pub fn pick<'a>(
  problems: &'a [Problem],
  filters: &Filters,
  catalog_file: &str,
) -> Result<&'a Problem, NoMatch> {
  let candidates: Vec<&Problem> = problems.iter().filter(|p| matches(p, filters)).collect();
  debug!(target: "selection", %filters, candidates = candidates.len(), "Filter resolved");

  let mut rng = rand::thread_rng();
  match candidates.choose(&mut rng) {
    Some(p) => {
      info!(target: "selection", %filters, chosen = %p.id, pool = candidates.len(), "Problem picked");
      Ok(p)
    }
    None => Err(NoMatch {
      filters: filters.clone(),
      catalog_file: catalog_file.to_string(),
    }),
  }
}
