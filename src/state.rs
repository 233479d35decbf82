//! Application state: the active catalog, store paths, LLM client,
//! prompts, and the per-session feedback guard.
//!
//! The catalog is an explicit immutable value behind a lock; switching
//! catalogs constructs a new `Catalog` and replaces the reference, never
//! mutating the loaded problems in place. The on-disk stores are owned
//! by their modules; state only carries their paths.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::catalog::{available_catalog_files, Catalog, CatalogError};
use crate::config::{load_config_from_env, resolve_data_dir, DataPaths, Prompts};
use crate::domain::DEFAULT_CATALOG_FILE;
use crate::llm::LlmClient;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<RwLock<Catalog>>,
    pub paths: DataPaths,
    pub llm: LlmClient,
    pub prompts: Prompts,
    /// Sessions with a feedback request in flight. A duplicate request
    /// for a busy session is answered immediately without an LLM call.
    busy: Arc<RwLock<HashSet<String>>>,
}

impl AppState {
    /// Build state from env: load config, resolve the data directory,
    /// load the initial catalog, build the LLM client.
    ///
    /// A missing or invalid initial catalog is fatal: running with a
    /// silently empty catalog would be worse than stopping.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Result<Self, CatalogError> {
        let cfg = load_config_from_env();
        let prompts = cfg
            .as_ref()
            .map(|c| c.prompts.clone())
            .unwrap_or_default();
        let data_dir = resolve_data_dir(cfg.as_ref());
        let paths = DataPaths::from_dir(data_dir);

        let initial_file = available_catalog_files(&paths.data_dir)
            .into_iter()
            .next()
            .unwrap_or_else(|| DEFAULT_CATALOG_FILE.to_string());
        let catalog = Catalog::load(&paths.data_dir, &initial_file)?;

        let llm = LlmClient::from_env();
        info!(target: "dojo_backend", endpoint = %llm.endpoint, model = %llm.model, data_dir = %paths.data_dir.display(), catalog = %catalog.file, "AppState ready");

        Ok(Self {
            catalog: Arc::new(RwLock::new(catalog)),
            paths,
            llm,
            prompts,
            busy: Arc::new(RwLock::new(HashSet::new())),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_parts(catalog: Catalog, paths: DataPaths) -> Self {
        Self {
            catalog: Arc::new(RwLock::new(catalog)),
            paths,
            llm: LlmClient::from_env(),
            prompts: Prompts::default(),
            busy: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Snapshot of the currently loaded catalog.
    pub async fn current_catalog(&self) -> Catalog {
        self.catalog.read().await.clone()
    }

    /// Make sure `file` is the loaded catalog, swapping the whole value
    /// if a different one is requested. No merge: the new catalog fully
    /// replaces the old.
    #[instrument(level = "info", skip(self))]
    pub async fn ensure_catalog(&self, file: &str) -> Result<(), CatalogError> {
        {
            let current = self.catalog.read().await;
            if current.file == file {
                return Ok(());
            }
        }
        let fresh = Catalog::load(&self.paths.data_dir, file)?;
        let mut current = self.catalog.write().await;
        info!(target: "dojo_backend", from = %current.file, to = %fresh.file, "Catalog swapped");
        *current = fresh;
        Ok(())
    }

    /// Mark a session as having a feedback request in flight. Returns
    /// false when one is already outstanding for that session.
    pub async fn try_begin_feedback(&self, session: &str) -> bool {
        self.busy.write().await.insert(session.to_string())
    }

    /// Clear the in-flight mark for a session.
    pub async fn end_feedback(&self, session: &str) {
        self.busy.write().await.remove(session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataPaths;
    use std::fs;
    use tempfile::tempdir;

    fn state_with_catalogs() -> (tempfile::TempDir, AppState) {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("problems.json"),
            r#"[{"id":"a","title":"t","body":"b","difficulty":"L1","kind":"SQL"}]"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("problems_py.json"),
            r#"[{"id":"z","title":"t2","body":"b2","difficulty":"L2","kind":"Python"}]"#,
        )
        .unwrap();

        let paths = DataPaths::from_dir(dir.path());
        let catalog = Catalog::load(&paths.data_dir, "problems.json").unwrap();
        let state = AppState::with_parts(catalog, paths);
        (dir, state)
    }

    #[tokio::test]
    async fn ensure_catalog_replaces_the_whole_problem_set() {
        let (_dir, state) = state_with_catalogs();
        assert_eq!(state.current_catalog().await.file, "problems.json");

        state.ensure_catalog("problems_py.json").await.unwrap();
        let cat = state.current_catalog().await;
        assert_eq!(cat.file, "problems_py.json");
        assert_eq!(cat.problems.len(), 1);
        assert_eq!(cat.problems[0].id, "z", "old problems must not survive a swap");

        // Re-requesting the loaded catalog is a no-op.
        state.ensure_catalog("problems_py.json").await.unwrap();
        assert_eq!(state.current_catalog().await.file, "problems_py.json");
    }

    #[tokio::test]
    async fn ensure_catalog_propagates_missing_file() {
        let (_dir, state) = state_with_catalogs();
        assert!(state.ensure_catalog("absent.json").await.is_err());
        // The previous catalog stays loaded.
        assert_eq!(state.current_catalog().await.file, "problems.json");
    }

    #[tokio::test]
    async fn busy_guard_blocks_duplicate_sessions_only() {
        let (_dir, state) = state_with_catalogs();
        assert!(state.try_begin_feedback("s1").await);
        assert!(!state.try_begin_feedback("s1").await);
        assert!(state.try_begin_feedback("s2").await);

        state.end_feedback("s1").await;
        assert!(state.try_begin_feedback("s1").await);
    }
}
