//! Evaluation definitions: dataset, task and scorers under one name

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::record::RenderedColumn;
use crate::error::{EvalError, Result};
use crate::fingerprint::hash_source;
use crate::scorer::Scorer;

/// One dataset entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRow<I, E> {
    pub input: I,
    pub expected: Option<E>,
}

impl<I, E> DatasetRow<I, E> {
    /// A row with an expected value
    pub fn new(input: I, expected: E) -> Self {
        Self {
            input,
            expected: Some(expected),
        }
    }

    /// A row without an expected value
    pub fn input_only(input: I) -> Self {
        Self {
            input,
            expected: None,
        }
    }
}

/// Produces the rows of an evaluation; called once per run
#[async_trait]
pub trait Dataset<I, E>: Send + Sync {
    async fn rows(&self) -> anyhow::Result<Vec<DatasetRow<I, E>>>;
}

#[async_trait]
impl<I, E, F, Fut> Dataset<I, E> for F
where
    I: Send + 'static,
    E: Send + 'static,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Vec<DatasetRow<I, E>>>> + Send + 'static,
{
    async fn rows(&self) -> anyhow::Result<Vec<DatasetRow<I, E>>> {
        (self)().await
    }
}

/// Rows held in memory
#[derive(Debug, Clone)]
pub struct StaticDataset<I, E> {
    rows: Vec<DatasetRow<I, E>>,
}

impl<I, E> StaticDataset<I, E> {
    pub fn new(rows: Vec<DatasetRow<I, E>>) -> Self {
        Self { rows }
    }
}

#[async_trait]
impl<I, E> Dataset<I, E> for StaticDataset<I, E>
where
    I: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    async fn rows(&self) -> anyhow::Result<Vec<DatasetRow<I, E>>> {
        Ok(self.rows.clone())
    }
}

/// Rows read from a JSON file on every run.
///
/// The file holds either a JSON array of `{"input": .., "expected": ..}`
/// objects or one such object per line.
#[derive(Debug, Clone)]
pub struct JsonDataset {
    path: PathBuf,
}

impl JsonDataset {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse dataset content in either supported layout
    pub fn parse<I, E>(content: &str) -> Result<Vec<DatasetRow<I, E>>>
    where
        I: DeserializeOwned,
        E: DeserializeOwned,
    {
        let trimmed = content.trim_start();
        if trimmed.starts_with('[') {
            return Ok(serde_json::from_str(trimmed)?);
        }

        trimmed
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| serde_json::from_str(line).map_err(EvalError::from))
            .collect()
    }
}

#[async_trait]
impl<I, E> Dataset<I, E> for JsonDataset
where
    I: DeserializeOwned + Send + 'static,
    E: DeserializeOwned + Send + 'static,
{
    async fn rows(&self) -> anyhow::Result<Vec<DatasetRow<I, E>>> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        Ok(Self::parse(&content)?)
    }
}

/// The function under evaluation
#[async_trait]
pub trait Task<I, O>: Send + Sync {
    async fn run(&self, input: I) -> anyhow::Result<O>;
}

#[async_trait]
impl<I, O, F, Fut> Task<I, O> for F
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<O>> + Send + 'static,
{
    async fn run(&self, input: I) -> anyhow::Result<O> {
        (self)(input).await
    }
}

/// Renders extra columns for a row from its input, output and expected value
pub type ColumnsFn<I, O, E> =
    Arc<dyn Fn(&I, &O, Option<&E>) -> Vec<RenderedColumn> + Send + Sync>;

/// A named evaluation: dataset, task and ordered scorers
pub struct EvaluationDefinition<I, O, E> {
    name: String,
    dataset: Arc<dyn Dataset<I, E>>,
    task: Arc<dyn Task<I, O>>,
    scorers: Vec<Arc<dyn Scorer<O, E>>>,
    columns: Option<ColumnsFn<I, O, E>>,
    source_code_hash: String,
}

impl<I, O, E> EvaluationDefinition<I, O, E> {
    pub fn builder(name: impl Into<String>) -> EvaluationBuilder<I, O, E> {
        EvaluationBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dataset(&self) -> &dyn Dataset<I, E> {
        self.dataset.as_ref()
    }

    pub fn task(&self) -> &dyn Task<I, O> {
        self.task.as_ref()
    }

    pub fn scorers(&self) -> &[Arc<dyn Scorer<O, E>>] {
        &self.scorers
    }

    pub fn columns(&self) -> Option<&ColumnsFn<I, O, E>> {
        self.columns.as_ref()
    }

    pub fn source_code_hash(&self) -> &str {
        &self.source_code_hash
    }
}

impl<I, O, E> std::fmt::Debug for EvaluationDefinition<I, O, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationDefinition")
            .field("name", &self.name)
            .field(
                "scorers",
                &self.scorers.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("source_code_hash", &self.source_code_hash)
            .finish()
    }
}

/// Builder for [`EvaluationDefinition`]
pub struct EvaluationBuilder<I, O, E> {
    name: String,
    dataset: Option<Arc<dyn Dataset<I, E>>>,
    task: Option<Arc<dyn Task<I, O>>>,
    scorers: Vec<Arc<dyn Scorer<O, E>>>,
    columns: Option<ColumnsFn<I, O, E>>,
    source_code_hash: String,
}

impl<I, O, E> EvaluationBuilder<I, O, E> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dataset: None,
            task: None,
            scorers: Vec::new(),
            columns: None,
            source_code_hash: String::new(),
        }
    }

    /// Set the dataset
    pub fn data(mut self, dataset: impl Dataset<I, E> + 'static) -> Self {
        self.dataset = Some(Arc::new(dataset));
        self
    }

    /// Use a fixed list of rows as the dataset
    pub fn rows(self, rows: Vec<DatasetRow<I, E>>) -> Self
    where
        I: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        self.data(StaticDataset::new(rows))
    }

    /// Set the task
    pub fn task(mut self, task: impl Task<I, O> + 'static) -> Self {
        self.task = Some(Arc::new(task));
        self
    }

    /// Append a scorer
    pub fn scorer(mut self, scorer: impl Scorer<O, E> + 'static) -> Self {
        self.scorers.push(Arc::new(scorer));
        self
    }

    /// Append shared scorers
    pub fn scorers(mut self, scorers: impl IntoIterator<Item = Arc<dyn Scorer<O, E>>>) -> Self {
        self.scorers.extend(scorers);
        self
    }

    /// Render extra columns per row
    pub fn columns<F>(mut self, columns: F) -> Self
    where
        F: Fn(&I, &O, Option<&E>) -> Vec<RenderedColumn> + Send + Sync + 'static,
    {
        self.columns = Some(Arc::new(columns));
        self
    }

    /// Set a precomputed source hash
    pub fn source_code_hash(mut self, hash: impl Into<String>) -> Self {
        self.source_code_hash = hash.into();
        self
    }

    /// Hash the evaluation's source text
    pub fn source(self, source: impl AsRef<[u8]>) -> Self {
        let hash = hash_source(source);
        self.source_code_hash(hash)
    }

    /// Finish the definition.
    ///
    /// Scorers are not checked here; a definition without scorers is
    /// rejected when it is run.
    pub fn build(self) -> Result<EvaluationDefinition<I, O, E>> {
        if self.name.trim().is_empty() {
            return Err(EvalError::Configuration(
                "evaluation name must not be empty".to_string(),
            ));
        }
        let dataset = self.dataset.ok_or_else(|| {
            EvalError::Configuration(format!("evaluation '{}' has no dataset", self.name))
        })?;
        let task = self.task.ok_or_else(|| {
            EvalError::Configuration(format!("evaluation '{}' has no task", self.name))
        })?;

        Ok(EvaluationDefinition {
            name: self.name,
            dataset,
            task,
            scorers: self.scorers,
            columns: self.columns,
            source_code_hash: self.source_code_hash,
        })
    }
}
