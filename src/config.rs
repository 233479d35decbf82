//! Loading backend configuration (prompts + data locations) from TOML.
//!
//! See `DojoConfig` and `Prompts` for the expected schema. Everything has
//! defaults; the TOML file (DOJO_CONFIG_PATH) only overrides.

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct DojoConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub data_dir: Option<String>,
}

/// Prompts used for LLM feedback and hint summarization. Defaults are
/// sensible for SQL/Python grading. Override them in TOML to tune tone.
#[derive(Clone, Debug, Deserialize)]
pub struct Prompts {
  pub feedback_system: String,
  pub feedback_user_template: String,
  pub hint_summary_system: String,
  pub hint_summary_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      feedback_system: "You are a teaching assistant grading SQL, Python, pseudocode and technical decomposition problems. \
        Analyze the submitted code and give feedback covering correctness, what was missed, \
        the author's likely intent and weak points, and efficiency/logic improvements.".into(),
      feedback_user_template: "Problem: {body}\nSchema: {schema}\nCode:```{code}\n```\n\
        Provide feedback covering:\n\
        - 1) Code analysis and evaluation\n\
        - 2) Points that need improvement\n\
        - 3) The author's likely intent and weak points\n\
        - 4) A more efficient or concise approach".into(),
      hint_summary_system: "You are a study assistant. Summarize in 50 characters or less why the student got the problem wrong.".into(),
      hint_summary_user_template: "Problem: {body}\nSubmitted code: {code}\nFeedback: {feedback}\n\n\
        Based on the above, summarize the core reason this answer was wrong in 50 characters or less.".into(),
    }
  }
}

/// Resolved runtime configuration: data directory plus the file paths the
/// two on-disk stores use.
#[derive(Clone, Debug)]
pub struct DataPaths {
  pub data_dir: PathBuf,
  pub notes_path: PathBuf,
  pub favorites_path: PathBuf,
}

impl DataPaths {
  pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
    let data_dir: PathBuf = dir.into();
    // The notes file keeps its historical .md name: the defensive reader
    // tolerates markdown headers that older revisions wrote into it.
    let notes_path = data_dir.join("wrong_notes.md");
    let favorites_path = data_dir.join("favorites.json");
    Self { data_dir, notes_path, favorites_path }
  }
}

/// Attempt to load `DojoConfig` from DOJO_CONFIG_PATH. On any parsing/IO
/// error, returns None and the defaults apply.
pub fn load_config_from_env() -> Option<DojoConfig> {
  let path = std::env::var("DOJO_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<DojoConfig>(&s) {
      Ok(cfg) => {
        info!(target: "dojo_backend", %path, "Loaded config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "dojo_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "dojo_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

/// Data directory: TOML `data_dir` wins, then DOJO_DATA_DIR, then "./data".
pub fn resolve_data_dir(cfg: Option<&DojoConfig>) -> PathBuf {
  if let Some(dir) = cfg.and_then(|c| c.data_dir.clone()) {
    return PathBuf::from(dir);
  }
  std::env::var("DOJO_DATA_DIR")
    .map(PathBuf::from)
    .unwrap_or_else(|_| PathBuf::from("data"))
}
