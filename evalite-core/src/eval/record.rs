//! Run and result records
//!
//! These are the shapes a viewer consumes. A run is stored as `running` when
//! it starts, its rows are filled in as they complete, and neither changes
//! again once it reaches a terminal status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::metrics::{average_score, sum_token_usage};
use crate::scorer::ScoreRecord;
use crate::trace::{TokenUsage, TraceEvent};

/// Outcome of a single row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    /// Row has not completed yet
    Running,
    Success,
    Fail,
}

/// Outcome of a whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Rows are still executing
    Running,
    Success,
    Fail,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        self != RunStatus::Running
    }
}

/// Extra value rendered next to a row's output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedColumn {
    pub label: String,
    pub value: Value,
}

impl RenderedColumn {
    pub fn new(label: impl Into<String>, value: Value) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// Result of running the task and scorers for one dataset row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Row input
    pub input: Value,

    /// Row expected value, if the dataset had one
    #[serde(default)]
    pub expected: Option<Value>,

    /// Task output; absent when the task failed
    #[serde(default)]
    pub output: Option<Value>,

    /// Task wall-clock time in whole milliseconds, excluding scoring
    pub duration: u64,

    /// One record per configured scorer, in scorer order
    pub scores: Vec<ScoreRecord>,

    /// Traces reported by the task, in report order
    pub traces: Vec<TraceEvent>,

    pub status: ResultStatus,

    /// Why the row failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rendered_columns: Vec<RenderedColumn>,
}

impl ResultRecord {
    /// Placeholder for a row that has not completed
    pub fn running(input: Value, expected: Option<Value>) -> Self {
        Self {
            input,
            expected,
            output: None,
            duration: 0,
            scores: Vec::new(),
            traces: Vec::new(),
            status: ResultStatus::Running,
            error: None,
            rendered_columns: Vec::new(),
        }
    }

    /// Mean of this row's scores, failed scores counting as zero
    pub fn score(&self) -> Option<f64> {
        average_score(&self.scores)
    }

    /// Score record by scorer name
    pub fn score_named(&self, name: &str) -> Option<&ScoreRecord> {
        self.scores.iter().find(|s| s.name == name)
    }

    /// Token usage across this row's traces (see [`sum_token_usage`])
    pub fn token_usage(&self) -> Option<TokenUsage> {
        sum_token_usage(&self.traces)
    }

    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }
}

/// Summary of a run, without its rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: Uuid,
    pub eval_name: String,
    pub created_at: DateTime<Utc>,
    pub status: RunStatus,
    pub duration: u64,
    pub source_code_hash: String,
}

/// One execution of an evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: Uuid,

    pub eval_name: String,

    /// When the run started; also identifies the run within its evaluation
    pub created_at: DateTime<Utc>,

    pub status: RunStatus,

    /// Results in dataset order
    pub results: Vec<ResultRecord>,

    /// Wall-clock time for all rows in whole milliseconds
    pub duration: u64,

    /// Hash of the code that defined the evaluation
    pub source_code_hash: String,
}

impl RunRecord {
    /// Run metadata without results
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            id: self.id,
            eval_name: self.eval_name.clone(),
            created_at: self.created_at,
            status: self.status,
            duration: self.duration,
            source_code_hash: self.source_code_hash.clone(),
        }
    }

    /// Mean of the row scores; rows without scores are skipped
    pub fn average_score(&self) -> Option<f64> {
        let scores: Vec<f64> = self.results.iter().filter_map(ResultRecord::score).collect();
        if scores.is_empty() {
            return None;
        }
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    }

    /// Token usage across every trace in the run, all-or-nothing
    pub fn token_usage(&self) -> Option<TokenUsage> {
        let traces: Vec<TraceEvent> = self
            .results
            .iter()
            .flat_map(|r| r.traces.iter().cloned())
            .collect();
        sum_token_usage(&traces)
    }

    /// Number of rows that failed
    pub fn failed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == ResultStatus::Fail)
            .count()
    }
}
