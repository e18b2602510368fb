//! Single-row execution
//!
//! [`TaskRunner`] runs the task for one dataset row inside its own trace
//! scope, times it, and scores the output with every scorer concurrently.
//! Task and scorer failures (including panics) stay on the row.

use futures::FutureExt;
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::definition::{ColumnsFn, DatasetRow, Task};
use super::record::{ResultRecord, ResultStatus};
use crate::config::RunnerConfig;
use crate::scorer::{ScoreInput, ScoreRecord, Scorer};
use crate::trace::{TraceCollector, TraceEvent};

/// Runs one task invocation and its scorers
#[derive(Debug, Clone, Default)]
pub struct TaskRunner {
    task_timeout: Option<Duration>,
}

impl TaskRunner {
    /// Runner without a task time limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail rows whose task takes longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        Self {
            task_timeout: config.task_timeout,
        }
    }

    /// Run the task for `row` and score its output.
    ///
    /// `duration` covers the task only. Traces reported before a failure or
    /// timeout are kept on the row.
    pub async fn run<I, O, E>(
        &self,
        row: &DatasetRow<I, E>,
        task: &dyn Task<I, O>,
        scorers: &[Arc<dyn Scorer<O, E>>],
        columns: Option<&ColumnsFn<I, O, E>>,
    ) -> ResultRecord
    where
        I: Serialize + Clone + Send + Sync,
        O: Serialize + Send + Sync,
        E: Serialize + Send + Sync,
    {
        let (input, expected) = match encode_row(row) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(error = %err, "Dataset row could not be serialized");
                return failed_result(Value::Null, None, 0, Vec::new(), err);
            }
        };

        let started = Instant::now();
        let invocation = AssertUnwindSafe(self.invoke(task, row.input.clone())).catch_unwind();
        let (outcome, traces) = TraceCollector::collect(invocation).await;
        let duration = round_millis(started.elapsed());

        let output = match outcome {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                warn!(error = %err, duration_ms = duration, "Task failed");
                return failed_result(input, expected, duration, traces, format!("{err:#}"));
            }
            Err(panic) => {
                let message = format!("task panicked: {}", panic_message(panic.as_ref()));
                warn!(duration_ms = duration, "{}", message);
                return failed_result(input, expected, duration, traces, message);
            }
        };

        let output_value = match serde_json::to_value(&output) {
            Ok(value) => value,
            Err(err) => {
                let message = format!("failed to serialize task output: {err}");
                warn!("{}", message);
                return failed_result(input, expected, duration, traces, message);
            }
        };

        let scores = join_all(
            scorers
                .iter()
                .map(|scorer| score_one(scorer.as_ref(), &output, row.expected.as_ref())),
        )
        .await;

        let rendered_columns = columns
            .map(|render| render(&row.input, &output, row.expected.as_ref()))
            .unwrap_or_default();

        debug!(
            duration_ms = duration,
            traces = traces.len(),
            scores = scores.len(),
            "Row completed"
        );

        ResultRecord {
            input,
            expected,
            output: Some(output_value),
            duration,
            scores,
            traces,
            status: ResultStatus::Success,
            error: None,
            rendered_columns,
        }
    }

    async fn invoke<I, O>(&self, task: &dyn Task<I, O>, input: I) -> anyhow::Result<O> {
        match self.task_timeout {
            Some(limit) => match tokio::time::timeout(limit, task.run(input)).await {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!(
                    "task timed out after {}ms",
                    limit.as_millis()
                )),
            },
            None => task.run(input).await,
        }
    }
}

async fn score_one<O, E>(
    scorer: &dyn Scorer<O, E>,
    output: &O,
    expected: Option<&E>,
) -> ScoreRecord {
    let description = scorer.description().map(str::to_string);
    let outcome = AssertUnwindSafe(scorer.score(ScoreInput::new(output, expected)))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(score)) => ScoreRecord::scored(scorer.name(), description, score),
        Ok(Err(err)) => {
            warn!(scorer = scorer.name(), error = %err, "Scorer failed");
            ScoreRecord::failed(scorer.name(), description, err.to_string())
        }
        Err(panic) => {
            let message = format!("scorer panicked: {}", panic_message(panic.as_ref()));
            warn!(scorer = scorer.name(), "{}", message);
            ScoreRecord::failed(scorer.name(), description, message)
        }
    }
}

fn encode_row<I: Serialize, E: Serialize>(
    row: &DatasetRow<I, E>,
) -> std::result::Result<(Value, Option<Value>), String> {
    let input = serde_json::to_value(&row.input)
        .map_err(|e| format!("failed to serialize row input: {e}"))?;
    let expected = row
        .expected
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| format!("failed to serialize row expected value: {e}"))?;
    Ok((input, expected))
}

fn failed_result(
    input: Value,
    expected: Option<Value>,
    duration: u64,
    traces: Vec<TraceEvent>,
    error: impl Into<String>,
) -> ResultRecord {
    ResultRecord {
        input,
        expected,
        output: None,
        duration,
        scores: Vec::new(),
        traces,
        status: ResultStatus::Fail,
        error: Some(error.into()),
        rendered_columns: Vec::new(),
    }
}

/// Elapsed time rounded to whole milliseconds
pub(crate) fn round_millis(elapsed: Duration) -> u64 {
    (elapsed.as_secs_f64() * 1000.0).round() as u64
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
