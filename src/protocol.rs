//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{Attempt, Favorite, Problem, ProblemType, DEFAULT_CATALOG_FILE};
use crate::selection::Filters;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
  Ping,
  NewProblem {
    #[serde(rename = "catalogFile", default = "default_catalog")]
    catalog_file: String,
    #[serde(default)]
    filters: Filters,
  },
  /// Fetch a specific problem by id, e.g. to re-practice a favorite.
  LoadProblem {
    #[serde(rename = "problemId")]
    problem_id: String,
    #[serde(rename = "catalogFile", default = "default_catalog")]
    catalog_file: String,
  },
  Hint {
    #[serde(rename = "problemId")]
    problem_id: String,
    #[serde(rename = "catalogFile", default = "default_catalog")]
    catalog_file: String,
  },
  SubmitCode {
    #[serde(rename = "problemId")]
    problem_id: String,
    code: String,
  },
  SaveNote {
    #[serde(rename = "problemId")]
    problem_id: String,
    #[serde(rename = "catalogFile", default = "default_catalog")]
    catalog_file: String,
    code: String,
    feedback: String,
    #[serde(default)]
    nickname: String,
  },
  ListNoteProblems,
  ListNoteAttempts {
    #[serde(rename = "catalogFile")]
    catalog_file: String,
    #[serde(rename = "problemId")]
    problem_id: String,
  },
  Rechallenge {
    #[serde(rename = "catalogFile")]
    catalog_file: String,
    #[serde(rename = "problemId")]
    problem_id: String,
    nickname: String,
    timestamp: String,
  },
  ListCatalogs,
  ListFavorites,
  ToggleFavorite {
    #[serde(rename = "problemId")]
    problem_id: String,
    #[serde(rename = "catalogFile", default = "default_catalog")]
    catalog_file: String,
  },
}

fn default_catalog() -> String {
  DEFAULT_CATALOG_FILE.to_string()
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
  Pong,
  Problem {
    problem: ProblemOut,
    rendered: String,
  },
  /// Strict filtering found no candidates. Expected outcome, not `Error`.
  NoMatch {
    message: String,
  },
  Hint {
    #[serde(rename = "problemId")]
    problem_id: String,
    text: String,
  },
  Feedback {
    #[serde(rename = "problemId")]
    problem_id: String,
    text: String,
  },
  NoteSaved {
    message: String,
  },
  NoteProblems {
    problems: Vec<Attempt>,
  },
  NoteAttempts {
    attempts: Vec<Attempt>,
  },
  Rechallenge {
    problem: ProblemOut,
    attempt: Attempt,
    rendered: String,
  },
  Catalogs {
    files: Vec<String>,
    current: String,
    difficulties: Vec<String>,
    kinds: Vec<String>,
  },
  Favorites {
    favorites: Vec<Favorite>,
  },
  FavoriteToggled {
    #[serde(rename = "problemId")]
    problem_id: String,
    favorite: bool,
  },
  Error {
    message: String,
  },
}

/// DTO used by both WS and HTTP for problem delivery. The author hint is
/// deliberately not exposed to the client.
#[derive(Debug, Serialize)]
pub struct ProblemOut {
  pub id: String,
  pub title: String,
  pub body: String,
  pub difficulty: String,
  pub kind: String,
  #[serde(rename = "problemType")]
  pub problem_type: ProblemType,
  pub schema: String,
  #[serde(rename = "sampleRows")]
  pub sample_rows: Vec<String>,
}

/// Convert full `Problem` (internal) to the public DTO.
pub fn to_out(p: &Problem) -> ProblemOut {
  ProblemOut {
    id: p.id.clone(),
    title: p.title.clone(),
    body: p.body.clone(),
    difficulty: p.difficulty.clone(),
    kind: p.kind.clone(),
    problem_type: p.problem_type,
    schema: p.schema.clone(),
    sample_rows: p.sample_rows.clone(),
  }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct ProblemQuery {
  #[serde(rename = "catalogFile", default = "default_catalog")]
  pub catalog_file: String,
  #[serde(default)]
  pub difficulty: Option<String>,
  #[serde(default)]
  pub kind: Option<String>,
  /// Comma-separated list, e.g. "coding,concept".
  #[serde(rename = "problemTypes", default)]
  pub problem_types: Option<String>,
}

impl ProblemQuery {
  pub fn filters(&self) -> Filters {
    let mut filters = Filters::default();
    if let Some(d) = &self.difficulty {
      filters.difficulty = d.clone();
    }
    if let Some(k) = &self.kind {
      filters.kind = k.clone();
    }
    if let Some(types) = &self.problem_types {
      filters.problem_types = types
        .split(',')
        .filter_map(|t| serde_json::from_value(serde_json::Value::String(t.trim().into())).ok())
        .collect();
    }
    filters
  }
}

#[derive(Serialize)]
pub struct ProblemResponse {
  pub problem: Option<ProblemOut>,
  pub rendered: String,
  /// Set when strict filtering found no candidates.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub message: Option<String>,
}

/// Query for `GET /api/v1/problem/{id}`.
#[derive(Debug, Deserialize)]
pub struct LoadProblemQuery {
  #[serde(rename = "catalogFile", default = "default_catalog")]
  pub catalog_file: String,
}

#[derive(Debug, Deserialize)]
pub struct HintQuery {
  #[serde(rename = "problemId")]
  pub problem_id: String,
  #[serde(rename = "catalogFile", default = "default_catalog")]
  pub catalog_file: String,
}
#[derive(Serialize)]
pub struct HintOut {
  #[serde(rename = "problemId")]
  pub problem_id: String,
  pub text: String,
}

#[derive(Deserialize)]
pub struct FeedbackIn {
  #[serde(rename = "sessionId", default)]
  pub session_id: String,
  #[serde(rename = "problemId")]
  pub problem_id: String,
  pub code: String,
}
#[derive(Serialize)]
pub struct FeedbackOut {
  #[serde(rename = "problemId")]
  pub problem_id: String,
  pub text: String,
}

#[derive(Deserialize)]
pub struct SaveNoteIn {
  #[serde(rename = "problemId")]
  pub problem_id: String,
  #[serde(rename = "catalogFile", default = "default_catalog")]
  pub catalog_file: String,
  pub code: String,
  pub feedback: String,
  #[serde(default)]
  pub nickname: String,
}
#[derive(Serialize)]
pub struct SaveNoteOut {
  pub ok: bool,
  pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct NoteAttemptsQuery {
  #[serde(rename = "catalogFile")]
  pub catalog_file: String,
  #[serde(rename = "problemId")]
  pub problem_id: String,
}

#[derive(Deserialize)]
pub struct RechallengeIn {
  #[serde(rename = "catalogFile")]
  pub catalog_file: String,
  #[serde(rename = "problemId")]
  pub problem_id: String,
  pub nickname: String,
  pub timestamp: String,
}
#[derive(Serialize)]
pub struct RechallengeOut {
  pub problem: Option<ProblemOut>,
  pub attempt: Option<Attempt>,
  pub rendered: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub message: Option<String>,
}

#[derive(Serialize)]
pub struct CatalogsOut {
  pub files: Vec<String>,
  pub current: String,
  pub difficulties: Vec<String>,
  pub kinds: Vec<String>,
}

#[derive(Deserialize)]
pub struct ToggleFavoriteIn {
  #[serde(rename = "problemId")]
  pub problem_id: String,
  #[serde(rename = "catalogFile", default = "default_catalog")]
  pub catalog_file: String,
}
#[derive(Serialize)]
pub struct ToggleFavoriteOut {
  #[serde(rename = "problemId")]
  pub problem_id: String,
  pub favorite: bool,
}

#[derive(Serialize)]
pub struct FavoritesOut {
  pub favorites: Vec<Favorite>,
}

#[derive(Serialize)]
pub struct HealthOut {
  pub ok: bool,
}

#[derive(Serialize)]
pub struct ErrorOut {
  pub message: String,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::ProblemType;

  #[test]
  fn client_messages_parse_with_defaults() {
    let msg: ClientWsMessage = serde_json::from_str(r#"{"type":"new_problem"}"#).unwrap();
    match msg {
      ClientWsMessage::NewProblem { catalog_file, filters } => {
        assert_eq!(catalog_file, "problems.json");
        assert_eq!(filters, Filters::default());
      }
      other => panic!("unexpected message: {other:?}"),
    }
  }

  #[test]
  fn new_problem_filters_deserialize() {
    let msg: ClientWsMessage = serde_json::from_str(
      r#"{"type":"new_problem","catalogFile":"problems_sql.json",
          "filters":{"difficulty":"L2","kind":"Python","problem_types":["concept"]}}"#,
    )
    .unwrap();
    match msg {
      ClientWsMessage::NewProblem { catalog_file, filters } => {
        assert_eq!(catalog_file, "problems_sql.json");
        assert_eq!(filters.difficulty, "L2");
        assert!(filters.problem_types.contains(&ProblemType::Concept));
      }
      other => panic!("unexpected message: {other:?}"),
    }
  }

  #[test]
  fn hint_and_load_problem_messages_parse() {
    let msg: ClientWsMessage = serde_json::from_str(r#"{"type":"hint","problemId":"a"}"#).unwrap();
    match msg {
      ClientWsMessage::Hint { problem_id, catalog_file } => {
        assert_eq!(problem_id, "a");
        assert_eq!(catalog_file, "problems.json");
      }
      other => panic!("unexpected message: {other:?}"),
    }

    let msg: ClientWsMessage = serde_json::from_str(
      r#"{"type":"load_problem","problemId":"b","catalogFile":"problems_sql.json"}"#,
    )
    .unwrap();
    match msg {
      ClientWsMessage::LoadProblem { problem_id, catalog_file } => {
        assert_eq!(problem_id, "b");
        assert_eq!(catalog_file, "problems_sql.json");
      }
      other => panic!("unexpected message: {other:?}"),
    }
  }

  #[test]
  fn problem_query_parses_comma_separated_types() {
    let q = ProblemQuery {
      catalog_file: "problems.json".into(),
      difficulty: Some("L1".into()),
      kind: None,
      problem_types: Some("coding, fill-in-blank".into()),
    };
    let filters = q.filters();
    assert_eq!(filters.difficulty, "L1");
    assert_eq!(filters.kind, "any");
    assert!(filters.problem_types.contains(&ProblemType::Coding));
    assert!(filters.problem_types.contains(&ProblemType::FillInBlank));
    assert_eq!(filters.problem_types.len(), 2);
  }

  #[test]
  fn problem_out_hides_the_author_hint() {
    let p = Problem {
      id: "p1".into(),
      title: "t".into(),
      body: "b".into(),
      difficulty: "L1".into(),
      kind: "SQL".into(),
      problem_type: ProblemType::Coding,
      schema: String::new(),
      sample_rows: vec![],
      hint: "the secret answer".into(),
    };
    let v = serde_json::to_value(to_out(&p)).unwrap();
    assert!(v.get("hint").is_none());
    assert_eq!(v["id"], "p1");
  }
}
