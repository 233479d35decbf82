//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs include parameters and basic result info.

use std::sync::Arc;

use axum::{
  extract::{Path, Query, State},
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument, warn};

use crate::catalog::available_catalog_files;
use crate::domain::{Attempt, Problem};
use crate::favorites;
use crate::logic::{self, NewProblem};
use crate::notes;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
  Json(HealthOut { ok: true })
}

#[instrument(level = "info", skip(state), fields(%q.catalog_file))]
pub async fn http_get_problem(
  State(state): State<Arc<AppState>>,
  Query(q): Query<ProblemQuery>,
) -> impl IntoResponse {
  let filters = q.filters();
  match logic::new_problem(&state, &q.catalog_file, &filters).await {
    Ok(NewProblem::Picked { problem, rendered }) => {
      info!(target: "selection", id = %problem.id, "HTTP problem served");
      Json(ProblemResponse { problem: Some(to_out(&problem)), rendered, message: None })
    }
    Ok(NewProblem::NoMatch(no_match)) => Json(ProblemResponse {
      problem: None,
      rendered: String::new(),
      message: Some(no_match.to_string()),
    }),
    Err(e) => Json(ProblemResponse {
      problem: None,
      rendered: String::new(),
      message: Some(e.to_string()),
    }),
  }
}

#[instrument(level = "info", skip(state), fields(%id, %q.catalog_file))]
pub async fn http_get_problem_by_id(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Query(q): Query<LoadProblemQuery>,
) -> impl IntoResponse {
  match load_problem_flow(&state, &q.catalog_file, &id).await {
    Ok((problem, rendered)) => {
      info!(target: "selection", %id, "HTTP problem loaded by id");
      Json(ProblemResponse { problem: Some(to_out(&problem)), rendered, message: None })
    }
    Err(message) => Json(ProblemResponse {
      problem: None,
      rendered: String::new(),
      message: Some(message),
    }),
  }
}

/// Shared lookup for re-practicing a known problem (favorites and
/// rechallenge pickers). Renders the same card a fresh pick would.
pub async fn load_problem_flow(
  state: &AppState,
  catalog_file: &str,
  problem_id: &str,
) -> Result<(Problem, String), String> {
  state.ensure_catalog(catalog_file).await.map_err(|e| e.to_string())?;
  let problem = state
    .current_catalog()
    .await
    .get(problem_id)
    .cloned()
    .ok_or_else(|| format!("Unknown problem id: {}", problem_id))?;
  let rendered = logic::render_question(&problem, false, "");
  Ok((problem, rendered))
}

#[instrument(level = "info", skip(state), fields(%q.problem_id, %q.catalog_file))]
pub async fn http_get_hint(
  State(state): State<Arc<AppState>>,
  Query(q): Query<HintQuery>,
) -> impl IntoResponse {
  match hint_flow(&state, &q.catalog_file, &q.problem_id).await {
    Ok(text) => Json(HintOut { problem_id: q.problem_id, text }).into_response(),
    Err(message) => Json(ErrorOut { message }).into_response(),
  }
}

/// Shared hint flow. The author hint is excluded from the problem DTO;
/// this is the only place it is served, on explicit request.
pub async fn hint_flow(
  state: &AppState,
  catalog_file: &str,
  problem_id: &str,
) -> Result<String, String> {
  state.ensure_catalog(catalog_file).await.map_err(|e| e.to_string())?;
  match state.current_catalog().await.get(problem_id) {
    Some(p) if p.hint.is_empty() => Ok("No hint available for this problem.".into()),
    Some(p) => Ok(p.hint.clone()),
    None => Err(format!("Unknown problem id: {}", problem_id)),
  }
}

#[instrument(level = "info", skip(state, body), fields(%body.problem_id, code_len = body.code.len()))]
pub async fn http_post_feedback(
  State(state): State<Arc<AppState>>,
  Json(body): Json<FeedbackIn>,
) -> impl IntoResponse {
  // HTTP clients supply their own session id; an anonymous client shares
  // one guard slot.
  let session = if body.session_id.is_empty() { "http" } else { &body.session_id };
  let text = logic::request_feedback(&state, session, &body.problem_id, &body.code).await;
  Json(FeedbackOut { problem_id: body.problem_id, text })
}

#[instrument(level = "info", skip(state, body), fields(%body.problem_id, %body.catalog_file))]
pub async fn http_post_save_note(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SaveNoteIn>,
) -> impl IntoResponse {
  let outcome = save_note_flow(&state, &body).await;
  match outcome {
    Ok(message) => Json(SaveNoteOut { ok: true, message }),
    Err(message) => Json(SaveNoteOut { ok: false, message }),
  }
}

/// Shared save flow: look up the problem, summarize for rechallenge,
/// then persist. Used by both HTTP and WS.
pub async fn save_note_flow(state: &AppState, body: &SaveNoteIn) -> Result<String, String> {
  if let Err(e) = state.ensure_catalog(&body.catalog_file).await {
    return Err(e.to_string());
  }
  let problem = match state.current_catalog().await.get(&body.problem_id) {
    Some(p) => p.clone(),
    None => return Err(format!("Unknown problem id: {}", body.problem_id)),
  };

  // Duplicate check comes before the summary: a rejected save must not
  // cost an LLM round-trip.
  let existing = notes::load_all(&state.paths.notes_path);
  if notes::has_saved_attempt(&existing, &body.catalog_file, &body.problem_id, &body.nickname) {
    return Err("A note for this problem with the same nickname already exists.".into());
  }

  let hint = logic::summarize_for_rechallenge(state, &problem, &body.code, &body.feedback).await;
  logic::save_wrong_note(
    state,
    &problem,
    &body.catalog_file,
    &body.code,
    &body.feedback,
    &body.nickname,
    &hint,
  )
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_note_problems(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(note_problems(&state))
}

pub fn note_problems(state: &AppState) -> Vec<Attempt> {
  let entries = notes::failed_attempts(&notes::load_all(&state.paths.notes_path));
  notes::unique_problem_keys(&entries)
}

#[instrument(level = "info", skip(state), fields(%q.catalog_file, %q.problem_id))]
pub async fn http_get_note_attempts(
  State(state): State<Arc<AppState>>,
  Query(q): Query<NoteAttemptsQuery>,
) -> impl IntoResponse {
  let entries = notes::failed_attempts(&notes::load_all(&state.paths.notes_path));
  let attempts: Vec<Attempt> = notes::attempts_for_problem(&entries, &q.catalog_file, &q.problem_id)
    .into_iter()
    .cloned()
    .collect();
  Json(attempts)
}

#[instrument(level = "info", skip(state, body), fields(%body.problem_id, %body.catalog_file))]
pub async fn http_post_rechallenge(
  State(state): State<Arc<AppState>>,
  Json(body): Json<RechallengeIn>,
) -> impl IntoResponse {
  match logic::load_rechallenge(
    &state,
    &body.catalog_file,
    &body.problem_id,
    &body.nickname,
    &body.timestamp,
  )
  .await
  {
    Ok(Some((problem, attempt, rendered))) => Json(RechallengeOut {
      problem: Some(to_out(&problem)),
      attempt: Some(attempt),
      rendered,
      message: None,
    }),
    Ok(None) => Json(RechallengeOut {
      problem: None,
      attempt: None,
      rendered: String::new(),
      message: Some("No matching wrong-note attempt was found.".into()),
    }),
    Err(e) => {
      warn!(target: "notes", error = %e, "Rechallenge catalog load failed");
      Json(RechallengeOut {
        problem: None,
        attempt: None,
        rendered: String::new(),
        message: Some(e.to_string()),
      })
    }
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_catalogs(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(catalogs_out(&state).await)
}

pub async fn catalogs_out(state: &AppState) -> CatalogsOut {
  let catalog = state.current_catalog().await;
  CatalogsOut {
    files: available_catalog_files(&state.paths.data_dir),
    current: catalog.file.clone(),
    difficulties: catalog.difficulty_options(),
    kinds: catalog.kind_options(),
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_favorites(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(FavoritesOut { favorites: favorites::load(&state.paths.favorites_path) })
}

#[instrument(level = "info", skip(state, body), fields(%body.problem_id, %body.catalog_file))]
pub async fn http_post_toggle_favorite(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ToggleFavoriteIn>,
) -> impl IntoResponse {
  match toggle_favorite_flow(&state, &body.catalog_file, &body.problem_id).await {
    Ok(favorite) => Json(ToggleFavoriteOut { problem_id: body.problem_id, favorite }).into_response(),
    Err(message) => Json(ErrorOut { message }).into_response(),
  }
}

/// Shared toggle flow, used by both HTTP and WS.
pub async fn toggle_favorite_flow(
  state: &AppState,
  catalog_file: &str,
  problem_id: &str,
) -> Result<bool, String> {
  if let Err(e) = state.ensure_catalog(catalog_file).await {
    return Err(e.to_string());
  }
  let problem = match state.current_catalog().await.get(problem_id) {
    Some(p) => p.clone(),
    None => return Err(format!("Unknown problem id: {}", problem_id)),
  };
  favorites::toggle(&state.paths.favorites_path, &problem, catalog_file).map_err(|e| e.to_string())
}
