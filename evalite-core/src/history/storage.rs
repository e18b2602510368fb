//! Run history storage abstraction

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::eval::{ResultRecord, RunRecord};

/// Log of runs keyed by evaluation name, ordered by creation time.
///
/// A run is appended when it starts and updated in place until it reaches a
/// terminal status.
#[async_trait]
pub trait RunHistory: Send + Sync {
    /// Add a run, keeping the evaluation's runs ordered by `created_at`
    async fn append(&self, run: RunRecord) -> Result<()>;

    /// Replace the stored run with the same id; a run retention already
    /// dropped is not re-added
    async fn update(&self, run: RunRecord) -> Result<()>;

    /// Replace one row of a stored run
    async fn update_result(
        &self,
        eval_name: &str,
        run_id: Uuid,
        index: usize,
        result: ResultRecord,
    ) -> Result<()>;

    /// All retained runs for an evaluation, oldest first
    async fn runs(&self, eval_name: &str) -> Result<Vec<RunRecord>>;

    /// Names of every evaluation with at least one run
    async fn eval_names(&self) -> Result<Vec<String>>;

    /// Most recent run for an evaluation
    async fn latest(&self, eval_name: &str) -> Result<Option<RunRecord>> {
        Ok(self.runs(eval_name).await?.pop())
    }

    /// Run identified by its creation timestamp
    async fn run_at(
        &self,
        eval_name: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Option<RunRecord>> {
        Ok(self
            .runs(eval_name)
            .await?
            .into_iter()
            .find(|run| run.created_at == created_at))
    }

    /// Closest finished run created before the one created at `created_at`
    async fn previous(
        &self,
        eval_name: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Option<RunRecord>> {
        let mut runs = self.runs(eval_name).await?;
        let Some(position) = runs.iter().position(|run| run.created_at == created_at) else {
            return Ok(None);
        };
        runs.truncate(position);
        Ok(runs.into_iter().rev().find(|run| run.status.is_terminal()))
    }
}

/// In-memory run history
pub struct InMemoryRunHistory {
    runs: Arc<RwLock<HashMap<String, Vec<RunRecord>>>>,
    max_runs_per_eval: Option<usize>,
}

impl InMemoryRunHistory {
    /// Unbounded history
    pub fn new() -> Self {
        Self {
            runs: Arc::new(RwLock::new(HashMap::new())),
            max_runs_per_eval: None,
        }
    }

    /// Keep only the newest `max` runs per evaluation
    pub fn with_retention(max: usize) -> Self {
        Self {
            max_runs_per_eval: Some(max),
            ..Self::new()
        }
    }
}

impl Default for InMemoryRunHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RunHistory for InMemoryRunHistory {
    async fn append(&self, run: RunRecord) -> Result<()> {
        let mut storage = self.runs.write().await;
        let runs = storage.entry(run.eval_name.clone()).or_default();
        let position = runs.partition_point(|stored| stored.created_at <= run.created_at);
        runs.insert(position, run);

        if let Some(max) = self.max_runs_per_eval
            && runs.len() > max
        {
            let excess = runs.len() - max;
            runs.drain(..excess);
        }

        Ok(())
    }

    async fn update(&self, run: RunRecord) -> Result<()> {
        let mut storage = self.runs.write().await;
        if let Some(runs) = storage.get_mut(&run.eval_name)
            && let Some(stored) = runs.iter_mut().find(|stored| stored.id == run.id)
        {
            *stored = run;
        } else {
            debug!(eval = %run.eval_name, run_id = %run.id, "Run no longer retained");
        }
        Ok(())
    }

    async fn update_result(
        &self,
        eval_name: &str,
        run_id: Uuid,
        index: usize,
        result: ResultRecord,
    ) -> Result<()> {
        let mut storage = self.runs.write().await;
        let slot = storage
            .get_mut(eval_name)
            .and_then(|runs| runs.iter_mut().find(|run| run.id == run_id))
            .and_then(|run| run.results.get_mut(index));
        match slot {
            Some(slot) => *slot = result,
            None => debug!(eval = eval_name, %run_id, index, "Row no longer retained"),
        }
        Ok(())
    }

    async fn runs(&self, eval_name: &str) -> Result<Vec<RunRecord>> {
        let storage = self.runs.read().await;
        Ok(storage.get(eval_name).cloned().unwrap_or_default())
    }

    async fn eval_names(&self) -> Result<Vec<String>> {
        let storage = self.runs.read().await;
        let mut names: Vec<String> = storage.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn latest(&self, eval_name: &str) -> Result<Option<RunRecord>> {
        let storage = self.runs.read().await;
        Ok(storage.get(eval_name).and_then(|runs| runs.last()).cloned())
    }
}
