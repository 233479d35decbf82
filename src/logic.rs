//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Picking new problems (catalog swap + filter resolution + render)
//!   - Requesting LLM feedback behind the per-session busy guard
//!   - Saving wrong notes (duplicate guard + hint summary + append)
//!   - Rechallenge lookups against the record store

use tracing::{error, info, instrument, warn};

use crate::catalog::CatalogError;
use crate::domain::{status_for_score, Attempt, Problem};
use crate::notes;
use crate::selection::{pick, Filters, NoMatch};
use crate::state::AppState;
use crate::util::{clip_chars, fill_template, format_timestamp};

/// Character budget for the rechallenge hint summary.
pub const RECHALLENGE_HINT_MAX_CHARS: usize = 50;

/// Outcome of a "new problem" request. A filter that matches nothing is
/// an expected result, not an error.
#[derive(Debug)]
pub enum NewProblem {
  Picked { problem: Problem, rendered: String },
  NoMatch(NoMatch),
}

/// Swap to the requested catalog, resolve the filters, pick uniformly at
/// random. Catalog load failures propagate; an empty candidate set comes
/// back as `NewProblem::NoMatch`.
#[instrument(level = "info", skip(state), fields(%catalog_file, %filters))]
pub async fn new_problem(
  state: &AppState,
  catalog_file: &str,
  filters: &Filters,
) -> Result<NewProblem, CatalogError> {
  state.ensure_catalog(catalog_file).await?;
  let catalog = state.current_catalog().await;

  match pick(&catalog.problems, filters, &catalog.file) {
    Ok(problem) => {
      let rendered = render_question(problem, false, "");
      Ok(NewProblem::Picked { problem: problem.clone(), rendered })
    }
    Err(no_match) => {
      warn!(target: "selection", %no_match, "Strict filtering found no candidates");
      Ok(NewProblem::NoMatch(no_match))
    }
  }
}

/// Request LLM feedback for a submission, guarded per session: while one
/// request is in flight for a session, further ones get an immediate
/// "please wait" without contacting the LLM.
#[instrument(level = "info", skip(state, code), fields(%session_id, %problem_id, code_len = code.len()))]
pub async fn request_feedback(
  state: &AppState,
  session_id: &str,
  problem_id: &str,
  code: &str,
) -> String {
  let problem = match state.current_catalog().await.get(problem_id) {
    Some(p) => p.clone(),
    None => return format!("Unknown problem id: {}", problem_id),
  };

  if !state.try_begin_feedback(session_id).await {
    info!(target: "dojo_backend", %session_id, "Feedback already in progress; duplicate request rejected");
    return "Feedback generation is already in progress. Please wait a moment.".into();
  }

  let feedback = build_feedback(state, &problem, code).await;
  state.end_feedback(session_id).await;
  feedback
}

/// Build the grading prompt and call the LLM. On any failure the
/// deterministic fallback text is returned so the UI always has
/// something to render.
pub async fn build_feedback(state: &AppState, problem: &Problem, code: &str) -> String {
  let user = fill_template(
    &state.prompts.feedback_user_template,
    &[
      ("body", &problem.body),
      ("schema", &problem.schema),
      ("code", code),
    ],
  );
  match state.llm.chat(&state.prompts.feedback_system, &user).await {
    Ok(text) => text,
    Err(e) => {
      error!(target: "dojo_backend", problem_id = %problem.id, error = %e, "LLM feedback failed; returning fallback text");
      state.llm.fallback_text(&e)
    }
  }
}

/// Ask the LLM for a short "why this was wrong" summary, clipped to the
/// rechallenge hint budget (character boundary). A failed call yields
/// the clipped fallback text; the invariant on length holds either way.
pub async fn summarize_for_rechallenge(
  state: &AppState,
  problem: &Problem,
  code: &str,
  feedback: &str,
) -> String {
  let user = fill_template(
    &state.prompts.hint_summary_user_template,
    &[("body", &problem.body), ("code", code), ("feedback", feedback)],
  );
  let summary = match state.llm.chat(&state.prompts.hint_summary_system, &user).await {
    Ok(text) => text,
    Err(e) => {
      error!(target: "dojo_backend", problem_id = %problem.id, error = %e, "LLM hint summary failed; clipping fallback text");
      state.llm.fallback_text(&e)
    }
  };
  clip_chars(&summary, RECHALLENGE_HINT_MAX_CHARS)
}

/// Manually save a submission to the wrong notes.
///
/// The attempt is recorded with score 0 ("saved without scoring") and a
/// retry status. Saving the same (catalog, problem, nickname) twice is
/// rejected before anything is written.
#[instrument(level = "info", skip(state, code, feedback, rechallenge_hint), fields(problem_id = %problem.id, %nickname))]
pub fn save_wrong_note(
  state: &AppState,
  problem: &Problem,
  source_catalog_file: &str,
  code: &str,
  feedback: &str,
  nickname: &str,
  rechallenge_hint: &str,
) -> Result<String, String> {
  let existing = notes::load_all(&state.paths.notes_path);
  if notes::has_saved_attempt(&existing, source_catalog_file, &problem.id, nickname) {
    return Err("A note for this problem with the same nickname already exists.".into());
  }

  let timestamp = format_timestamp();
  let attempt = Attempt {
    problem_id: problem.id.clone(),
    title: problem.title.clone(),
    difficulty: problem.difficulty.clone(),
    kind: problem.kind.clone(),
    score: 0,
    status: status_for_score(0).into(),
    submitted_code: code.to_string(),
    feedback_text: feedback.to_string(),
    improvement_text: "Added manually to wrong notes".into(),
    reasoning_text: "manual save".into(),
    question_text: problem.body.clone(),
    timestamp: timestamp.clone(),
    rechallenge_hint: clip_chars(rechallenge_hint, RECHALLENGE_HINT_MAX_CHARS),
    nickname: nickname.to_string(),
    source_catalog_file: source_catalog_file.to_string(),
  };

  match notes::append(&state.paths.notes_path, &attempt) {
    Ok(()) => {
      info!(target: "notes", problem_id = %problem.id, %timestamp, "Wrong note appended");
      Ok(format!("Added to wrong notes. ({})", timestamp))
    }
    Err(e) => {
      error!(target: "notes", problem_id = %problem.id, error = %e, "Failed to append wrong note");
      Err(format!("Save failed: {}", e))
    }
  }
}

/// Load a previously failed attempt by its full composite key and
/// re-render its problem from the catalog it came from.
#[instrument(level = "info", skip(state), fields(%source_catalog_file, %problem_id))]
pub async fn load_rechallenge(
  state: &AppState,
  source_catalog_file: &str,
  problem_id: &str,
  nickname: &str,
  timestamp: &str,
) -> Result<Option<(Problem, Attempt, String)>, CatalogError> {
  let entries = notes::failed_attempts(&notes::load_all(&state.paths.notes_path));
  let attempt =
    match notes::find_attempt(&entries, source_catalog_file, problem_id, nickname, timestamp) {
      Some(a) => a.clone(),
      None => return Ok(None),
    };

  state.ensure_catalog(source_catalog_file).await?;
  let catalog = state.current_catalog().await;
  let problem = match catalog.get(problem_id) {
    Some(p) => p.clone(),
    None => {
      warn!(target: "notes", %problem_id, catalog = %source_catalog_file, "Attempt references a problem no longer in its catalog");
      return Ok(None);
    }
  };

  let rendered = render_question(&problem, true, &attempt.rechallenge_hint);
  Ok(Some((problem, attempt, rendered)))
}

/// Markdown rendering of a problem card, shared by every tab.
pub fn render_question(problem: &Problem, rechallenge: bool, rechallenge_hint: &str) -> String {
  let banner = if rechallenge { "Rechallenge" } else { "New Problem" };
  let hint_line = if rechallenge_hint.is_empty() {
    String::new()
  } else {
    format!("\n> 🔁 Rechallenge hint: {}\n", rechallenge_hint)
  };
  let library_info = problem
    .library()
    .map(|lib| format!(" ({})", lib))
    .unwrap_or_default();

  let mut out = format!(
    "### [{}] {}\n\
     - Difficulty: {}\n\
     - Kind: {}{}\n\
     {}\n\
     ---\n\n\
     **📝 Problem**\n\n\
     {}\n\n",
    banner, problem.title, problem.difficulty, problem.language(), library_info, hint_line,
    problem.body
  );

  if !problem.schema.is_empty() {
    out.push_str(&format!("**📊 Schema**\n```\n{}\n```\n\n", problem.schema));
  }
  if !problem.sample_rows.is_empty() {
    out.push_str("**📋 Sample data**\n```\n");
    for row in &problem.sample_rows {
      out.push_str(row);
      out.push('\n');
    }
    out.push_str("```\n");
  }
  out
}
